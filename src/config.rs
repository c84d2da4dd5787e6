use std::path::PathBuf;

/// Server settings, read once from `SALONSLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub password: String,
    pub max_connections: usize,
    pub metrics_port: Option<u16>,
    /// JSON file with stylists, schedules and offerings to load at start-up.
    pub seed: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5433,
            password: "salonslot".into(),
            max_connections: 256,
            metrics_port: None,
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Self {
            bind: lookup("SALONSLOT_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "SALONSLOT_PORT")?.unwrap_or(defaults.port),
            password: lookup("SALONSLOT_PASSWORD").unwrap_or(defaults.password),
            max_connections: parse_var(&lookup, "SALONSLOT_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            metrics_port: parse_var(&lookup, "SALONSLOT_METRICS_PORT")?,
            seed: lookup("SALONSLOT_SEED")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.addr(), "0.0.0.0:5433");
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("SALONSLOT_PORT", "6000"),
            ("SALONSLOT_BIND", "127.0.0.1"),
            ("SALONSLOT_MAX_CONNECTIONS", "8"),
            ("SALONSLOT_METRICS_PORT", "9100"),
            ("SALONSLOT_SEED", "seed.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:6000");
        assert_eq!(cfg.max_connections, 8);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.seed, Some(PathBuf::from("seed.json")));
    }

    #[test]
    fn bad_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[("SALONSLOT_PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SALONSLOT_PORT",
                value: "http".into()
            }
        );
    }
}
