use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{AuthSource, DefaultServerParameterProvider, LoginInfo, Password, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use tokio::net::TcpStream;

use crate::engine::{Engine, EngineError};
use crate::model::AppointmentStatus;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::time::day_label;

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    password: String,
) -> std::io::Result<()> {
    let factory = SalonFactory::new(engine, password);
    pgwire::tokio::process_socket(socket, None, factory).await
}

// ── Auth ─────────────────────────────────────────────────────────

/// Single shared password for every user name.
#[derive(Debug)]
pub struct SalonAuthSource {
    password: String,
}

impl SalonAuthSource {
    pub fn new(password: String) -> Self {
        Self { password }
    }
}

#[async_trait]
impl AuthSource for SalonAuthSource {
    async fn get_password(&self, _login: &LoginInfo) -> PgWireResult<Password> {
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}

// ── Handler ──────────────────────────────────────────────────────

pub struct SalonHandler {
    engine: Arc<Engine>,
    query_parser: Arc<SalonQueryParser>,
}

impl SalonHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(SalonQueryParser),
        }
    }

    async fn run(&self, sql_text: &str) -> PgWireResult<Vec<Response>> {
        let cmd = sql::parse_sql(sql_text).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::debug!(command = label, "query failed: {e}");
        }
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::InsertStylist { id, name } => {
                engine.create_stylist(id, name).await.map_err(engine_err)?;
                Ok(vec![inserted()])
            }
            Command::DeleteStylist { id } => {
                engine.delete_stylist(id).await.map_err(engine_err)?;
                Ok(vec![deleted()])
            }
            Command::InsertWindow {
                id,
                stylist_id,
                day,
                start,
                end,
            } => {
                engine
                    .add_window(id, stylist_id, day, start, end)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted()])
            }
            Command::DeleteWindow { id } => {
                engine.remove_window(id).await.map_err(engine_err)?;
                Ok(vec![deleted()])
            }
            Command::InsertOffering {
                id,
                kind,
                name,
                duration,
            } => {
                engine
                    .create_offering(id, kind, name, duration)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted()])
            }
            Command::DeleteOffering { id } => {
                engine.delete_offering(id).await.map_err(engine_err)?;
                Ok(vec![deleted()])
            }
            Command::InsertAppointment {
                id,
                stylist_id,
                offering_id,
                date,
                start,
                client,
            } => {
                engine
                    .book_appointment(id, stylist_id, offering_id, date, start, client)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted()])
            }
            Command::SetAppointmentStatus { id, status } => {
                engine
                    .set_appointment_status(id, AppointmentStatus::new(status))
                    .await
                    .map_err(engine_err)?;
                Ok(vec![inserted()])
            }
            Command::DeleteAppointment { id } => {
                engine.delete_appointment(id).await.map_err(engine_err)?;
                Ok(vec![deleted()])
            }
            Command::SelectSlots {
                stylist_id,
                offering_id,
                date,
            } => {
                let slots = engine.available_slots(stylist_id, offering_id, date).await;
                let sid = stylist_id.to_string();
                let rows = slots
                    .iter()
                    .map(|s| vec![sid.clone(), s.start_hhmm(), s.end_hhmm()])
                    .collect();
                text_rows(slots_schema(), rows)
            }
            Command::SelectStylists => {
                let rows = engine
                    .list_stylists()
                    .await
                    .into_iter()
                    .map(|s| {
                        vec![
                            s.id.to_string(),
                            s.name.unwrap_or_default(),
                            s.windows.to_string(),
                        ]
                    })
                    .collect();
                text_rows(stylists_schema(), rows)
            }
            Command::SelectOfferings => {
                let rows = engine
                    .list_offerings()
                    .into_iter()
                    .map(|o| {
                        vec![
                            o.id.to_string(),
                            o.kind.as_str().to_string(),
                            o.name.unwrap_or_default(),
                            o.duration_minutes.to_string(),
                        ]
                    })
                    .collect();
                text_rows(offerings_schema(), rows)
            }
            Command::SelectSchedules { stylist_id, day } => {
                let rows = engine
                    .get_windows(stylist_id)
                    .await
                    .into_iter()
                    .filter(|w| day.is_none_or(|d| w.window.day == d))
                    .map(|w| {
                        vec![
                            w.id.to_string(),
                            w.stylist_id.to_string(),
                            day_label(w.window.day).to_string(),
                            w.window.start.to_string(),
                            w.window.end.to_string(),
                        ]
                    })
                    .collect();
                text_rows(schedules_schema(), rows)
            }
            Command::SelectAppointments { stylist_id, date } => {
                let rows = engine
                    .get_appointments(stylist_id, date)
                    .await
                    .into_iter()
                    .map(|a| {
                        vec![
                            a.id.to_string(),
                            a.stylist_id.to_string(),
                            a.offering_id.to_string(),
                            a.date.to_string(),
                            a.start.to_string(),
                            a.end.to_string(),
                            a.status.as_str().to_string(),
                            a.client.unwrap_or_default(),
                        ]
                    })
                    .collect();
                text_rows(appointments_schema(), rows)
            }
        }
    }
}

fn inserted() -> Response {
    Response::Execution(Tag::new("INSERT").with_rows(1))
}

fn deleted() -> Response {
    Response::Execution(Tag::new("DELETE").with_rows(1))
}

/// Encode rows of text values against `schema`.
fn text_rows(schema: Vec<FieldInfo>, rows: Vec<Vec<String>>) -> PgWireResult<Vec<Response>> {
    let schema = Arc::new(schema);
    let encoded: Vec<PgWireResult<_>> = rows
        .into_iter()
        .map(|row| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            for value in &row {
                encoder.encode_field(value)?;
            }
            Ok(encoder.take_row())
        })
        .collect();
    Ok(vec![Response::Query(QueryResponse::new(
        schema,
        stream::iter(encoded),
    ))])
}

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn slots_schema() -> Vec<FieldInfo> {
    ["stylist_id", "start", "end"].map(text_field).to_vec()
}

fn stylists_schema() -> Vec<FieldInfo> {
    ["id", "name", "windows"].map(text_field).to_vec()
}

fn offerings_schema() -> Vec<FieldInfo> {
    ["id", "kind", "name", "duration"].map(text_field).to_vec()
}

fn schedules_schema() -> Vec<FieldInfo> {
    ["id", "stylist_id", "weekday", "start", "end"]
        .map(text_field)
        .to_vec()
}

fn appointments_schema() -> Vec<FieldInfo> {
    [
        "id",
        "stylist_id",
        "offering_id",
        "booking_date",
        "start",
        "end",
        "status",
        "client",
    ]
    .map(text_field)
    .to_vec()
}

/// Result columns for a statement, guessed from its text (it may still hold `$N`).
fn result_schema(stmt: &str) -> Vec<FieldInfo> {
    let upper = stmt.to_uppercase();
    if !upper.trim_start().starts_with("SELECT") {
        return vec![];
    }
    let from = upper.split("FROM").nth(1).unwrap_or("");
    let table = from
        .split(|c: char| c.is_whitespace() || c == ';')
        .find(|s| !s.is_empty())
        .unwrap_or("");
    match table {
        "SLOTS" => slots_schema(),
        "STYLISTS" => stylists_schema(),
        "SERVICES" | "PACKAGES" | "OFFERINGS" => offerings_schema(),
        "SCHEDULES" => schedules_schema(),
        "APPOINTMENTS" => appointments_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for SalonHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SalonQueryParser;

#[async_trait]
impl QueryParser for SalonQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SalonHandler {
    type Statement = String;
    type QueryParser = SalonQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(&sql).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Positions and indexes of `$N` placeholders, skipping quoted literals and
/// identifiers.
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // A doubled quote closes and reopens, which lands in the same state.
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'$' => {
                let start = i;
                i += 1;
                let digits = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i > digits
                    && let Ok(n) = sql[digits..i].parse::<usize>() {
                        found.push((start..i, n));
                    }
            }
            None => i += 1,
        }
    }
    found
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    bind_text_params(&portal.statement.statement, &portal.parameters)
}

/// Single pass over `sql`: bound values are copied into the output and never
/// scanned again.
fn bind_text_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;
    for (range, n) in placeholders(sql) {
        out.push_str(&sql[last..range.start]);
        match n.checked_sub(1).and_then(|i| params.get(i)) {
            Some(Some(bytes)) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => out.push_str(&sql[range.clone()]),
        }
        last = range.end;
    }
    out.push_str(&sql[last..]);
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SalonFactory {
    handler: Arc<SalonHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SalonAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl SalonFactory {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        let auth_source = SalonAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(SalonHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for SalonFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
