use chrono::{NaiveDate, Weekday};
use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::{Minutes, OfferingKind};
use crate::time::{normalize_weekday, parse_date, TimeOfDay};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertStylist {
        id: Ulid,
        name: Option<String>,
    },
    DeleteStylist {
        id: Ulid,
    },
    InsertWindow {
        id: Ulid,
        stylist_id: Ulid,
        day: Weekday,
        start: TimeOfDay,
        end: TimeOfDay,
    },
    DeleteWindow {
        id: Ulid,
    },
    InsertOffering {
        id: Ulid,
        kind: OfferingKind,
        name: Option<String>,
        duration: Minutes,
    },
    DeleteOffering {
        id: Ulid,
    },
    InsertAppointment {
        id: Ulid,
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
        start: TimeOfDay,
        client: Option<String>,
    },
    SetAppointmentStatus {
        id: Ulid,
        status: String,
    },
    DeleteAppointment {
        id: Ulid,
    },
    SelectSlots {
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
    },
    SelectStylists,
    SelectOfferings,
    SelectSchedules {
        stylist_id: Ulid,
        day: Option<Weekday>,
    },
    SelectAppointments {
        stylist_id: Ulid,
        date: Option<NaiveDate>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Values are read by position in each table's documented column order. The
/// column list in the statement is not consulted.
fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "stylists" => {
            if values.is_empty() {
                return Err(SqlError::WrongArity("stylists", 1, 0));
            }
            let name = match values.get(1) {
                Some(v) => parse_string_or_null(v)?,
                None => None,
            };
            Ok(Command::InsertStylist {
                id: parse_ulid(&values[0])?,
                name,
            })
        }
        "schedules" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("schedules", 5, values.len()));
            }
            Ok(Command::InsertWindow {
                id: parse_ulid(&values[0])?,
                stylist_id: parse_ulid(&values[1])?,
                day: parse_weekday(&values[2])?,
                start: parse_time(&values[3])?,
                end: parse_time(&values[4])?,
            })
        }
        "services" | "packages" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("services", 3, values.len()));
            }
            let kind = if table == "services" {
                OfferingKind::Service
            } else {
                OfferingKind::Package
            };
            Ok(Command::InsertOffering {
                id: parse_ulid(&values[0])?,
                kind,
                name: parse_string_or_null(&values[1])?,
                duration: parse_i64_or_null(&values[2])?.unwrap_or(0),
            })
        }
        "appointments" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("appointments", 5, values.len()));
            }
            let client = match values.get(5) {
                Some(v) => parse_string_or_null(v)?,
                None => None,
            };
            Ok(Command::InsertAppointment {
                id: parse_ulid(&values[0])?,
                stylist_id: parse_ulid(&values[1])?,
                offering_id: parse_ulid(&values[2])?,
                date: parse_date_expr(&values[3])?,
                start: parse_time(&values[4])?,
                client,
            })
        }
        "appointment_status" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("appointment_status", 2, values.len()));
            }
            Ok(Command::SetAppointmentStatus {
                id: parse_ulid(&values[0])?,
                status: parse_string(&values[1])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "stylists" => Ok(Command::DeleteStylist { id }),
        "schedules" => Ok(Command::DeleteWindow { id }),
        "services" | "packages" => Ok(Command::DeleteOffering { id }),
        "appointments" => Ok(Command::DeleteAppointment { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots {
            stylist_id: filters.stylist_id.ok_or(SqlError::MissingFilter("stylist_id"))?,
            offering_id: filters.offering_id.ok_or(SqlError::MissingFilter("offering_id"))?,
            date: filters.date.ok_or(SqlError::MissingFilter("booking_date"))?,
        }),
        "stylists" => Ok(Command::SelectStylists),
        "services" | "packages" | "offerings" => Ok(Command::SelectOfferings),
        "schedules" => Ok(Command::SelectSchedules {
            stylist_id: filters.stylist_id.ok_or(SqlError::MissingFilter("stylist_id"))?,
            day: filters.day,
        }),
        "appointments" => Ok(Command::SelectAppointments {
            stylist_id: filters.stylist_id.ok_or(SqlError::MissingFilter("stylist_id"))?,
            date: filters.date,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Default)]
struct Filters {
    stylist_id: Option<Ulid>,
    offering_id: Option<Ulid>,
    date: Option<NaiveDate>,
    day: Option<Weekday>,
}

/// Walk an `a = x AND b = y ...` tree. Unknown columns are ignored.
fn collect_eq_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                collect_eq_filters(left, filters)?;
                collect_eq_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("stylist_id") => filters.stylist_id = Some(parse_ulid_expr(right)?),
                Some("offering_id") | Some("service_id") | Some("package_id") => {
                    filters.offering_id = Some(parse_ulid_expr(right)?)
                }
                Some("booking_date") => filters.date = Some(parse_date_expr(right)?),
                Some("weekday") => filters.day = Some(parse_weekday(right)?),
                _ => {}
            },
            _ => {}
        },
        Expr::Nested(inner) => collect_eq_filters(inner, filters)?,
        _ => {}
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            if values.rows.len() > 1 {
                return Err(SqlError::Unsupported("multi-row VALUES".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid_expr(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    parse_ulid_expr(expr)
}

fn parse_i64_or_null(expr: &Expr) -> Result<Option<i64>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_i64_expr(expr)?)),
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_string(expr).map(Some),
    }
}

fn parse_time(expr: &Expr) -> Result<TimeOfDay, SqlError> {
    parse_string(expr)?
        .parse()
        .map_err(|e: crate::time::TimeParseError| SqlError::Parse(e.to_string()))
}

fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    parse_date(&s).map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

/// Weekday as a name (`'Mon'`, `'monday'`) or a day index (`0` = Sunday).
fn parse_weekday(expr: &Expr) -> Result<Weekday, SqlError> {
    let raw = match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => s.clone(),
        Some(value) => return Err(SqlError::Parse(format!("expected weekday, got {value:?}"))),
        None => return Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    };
    normalize_weekday(&raw).map_err(|e| SqlError::Parse(e.to_string()))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const OTHER: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    #[test]
    fn parse_insert_stylist() {
        let sql = format!("INSERT INTO stylists (id, name) VALUES ('{ID}', 'Ana')");
        match parse_sql(&sql).unwrap() {
            Command::InsertStylist { id, name } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(name.as_deref(), Some("Ana"));
            }
            cmd => panic!("expected InsertStylist, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_stylist_without_name() {
        let sql = format!("INSERT INTO stylists (id) VALUES ('{ID}')");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::InsertStylist { name: None, .. }
        ));
        let sql = format!("INSERT INTO stylists (id, name) VALUES ('{ID}', NULL)");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::InsertStylist { name: None, .. }
        ));
    }

    #[test]
    fn parse_insert_schedule_by_name() {
        let sql = format!(
            r#"INSERT INTO schedules (id, stylist_id, weekday, start, "end") VALUES ('{ID}', '{OTHER}', 'tuesday', '09:00', '17:30')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertWindow { stylist_id, day, start, end, .. } => {
                assert_eq!(stylist_id.to_string(), OTHER);
                assert_eq!(day, Weekday::Tue);
                assert_eq!(start.to_string(), "09:00");
                assert_eq!(end.to_string(), "17:30");
            }
            cmd => panic!("expected InsertWindow, got {cmd:?}"),
        }
    }

    #[test]
    fn insert_columns_are_positional() {
        let sql = format!(
            r#"INSERT INTO schedules (stylist_id, id, weekday, start, "end") VALUES ('{ID}', '{OTHER}', 'Mon', '09:00', '12:00')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertWindow { id, stylist_id, .. } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(stylist_id.to_string(), OTHER);
            }
            cmd => panic!("expected InsertWindow, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_schedule_by_index() {
        let sql = format!(
            r#"INSERT INTO schedules (id, stylist_id, weekday, start, "end") VALUES ('{ID}', '{OTHER}', 0, '10:00:00', '14:00:00')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertWindow { day, start, .. } => {
                assert_eq!(day, Weekday::Sun);
                assert_eq!(start.minutes(), 600);
            }
            cmd => panic!("expected InsertWindow, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_schedule_bad_time() {
        let sql = format!(
            r#"INSERT INTO schedules (id, stylist_id, weekday, start, "end") VALUES ('{ID}', '{OTHER}', 'Mon', '9am', '17:00')"#
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_service_and_package() {
        let sql = format!("INSERT INTO services (id, name, duration) VALUES ('{ID}', 'Cut', 45)");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertOffering {
                id: Ulid::from_string(ID).unwrap(),
                kind: OfferingKind::Service,
                name: Some("Cut".into()),
                duration: 45,
            }
        );
        let sql = format!("INSERT INTO packages (id, name, duration) VALUES ('{ID}', 'Bridal', NULL)");
        match parse_sql(&sql).unwrap() {
            Command::InsertOffering { kind, duration, .. } => {
                assert_eq!(kind, OfferingKind::Package);
                assert_eq!(duration, 0);
            }
            cmd => panic!("expected InsertOffering, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment() {
        let sql = format!(
            "INSERT INTO appointments (id, stylist_id, offering_id, booking_date, start, client) VALUES ('{ID}', '{OTHER}', '{OTHER}', '2026-11-02', '10:30', 'Maria')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertAppointment { date, start, client, .. } => {
                assert_eq!(date.to_string(), "2026-11-02");
                assert_eq!(start.to_string(), "10:30");
                assert_eq!(client.as_deref(), Some("Maria"));
            }
            cmd => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_appointment_arity() {
        let sql = format!(
            "INSERT INTO appointments (id, stylist_id, offering_id) VALUES ('{ID}', '{OTHER}', '{OTHER}')"
        );
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::WrongArity("appointments", 5, 3))
        ));
    }

    #[test]
    fn parse_status_change() {
        let sql = format!(
            "INSERT INTO appointment_status (appointment_id, status) VALUES ('{ID}', 'Cancelled')"
        );
        match parse_sql(&sql).unwrap() {
            Command::SetAppointmentStatus { id, status } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(status, "Cancelled");
            }
            cmd => panic!("expected SetAppointmentStatus, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_deletes() {
        let cases = [
            ("stylists", "DeleteStylist"),
            ("schedules", "DeleteWindow"),
            ("services", "DeleteOffering"),
            ("packages", "DeleteOffering"),
            ("appointments", "DeleteAppointment"),
        ];
        for (table, expected) in cases {
            let sql = format!("DELETE FROM {table} WHERE id = '{ID}'");
            let cmd = parse_sql(&sql).unwrap();
            assert!(format!("{cmd:?}").starts_with(expected), "{table}: {cmd:?}");
        }
    }

    #[test]
    fn parse_delete_requires_id() {
        let sql = format!("DELETE FROM stylists WHERE name = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("id"))));
    }

    #[test]
    fn parse_select_slots() {
        let sql = format!(
            "SELECT * FROM slots WHERE stylist_id = '{ID}' AND offering_id = '{OTHER}' AND booking_date = '2026-11-02'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectSlots { stylist_id, offering_id, date } => {
                assert_eq!(stylist_id.to_string(), ID);
                assert_eq!(offering_id.to_string(), OTHER);
                assert_eq!(date.to_string(), "2026-11-02");
            }
            cmd => panic!("expected SelectSlots, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_slots_service_alias() {
        let sql = format!(
            "SELECT * FROM slots WHERE (stylist_id = '{ID}' AND service_id = '{OTHER}') AND booking_date = '2026-11-02'"
        );
        assert!(matches!(parse_sql(&sql).unwrap(), Command::SelectSlots { .. }));
    }

    #[test]
    fn parse_select_slots_missing_date() {
        let sql = format!("SELECT * FROM slots WHERE stylist_id = '{ID}' AND offering_id = '{OTHER}'");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingFilter("booking_date"))
        ));
    }

    #[test]
    fn parse_select_lists() {
        assert_eq!(parse_sql("SELECT * FROM stylists").unwrap(), Command::SelectStylists);
        assert_eq!(parse_sql("SELECT * FROM services").unwrap(), Command::SelectOfferings);
        let sql = format!("SELECT * FROM schedules WHERE stylist_id = '{ID}' AND weekday = 'sat'");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectSchedules { day: Some(Weekday::Sat), .. }
        ));
        let sql = format!("SELECT * FROM appointments WHERE stylist_id = '{ID}'");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectAppointments { date: None, .. }
        ));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO inventory (id) VALUES ('{ID}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
