use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::{Stream, TryStreamExt};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, Row as _, TypeInfo};

use super::domain_error::classify;
use super::{Output, Param, ProcedureCall, ProcedureError, ProcedureInvoker, Row, Shape};

pub struct MySqlProcedureInvoker {
    pool: MySqlPool,
}

impl MySqlProcedureInvoker {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn call_sql(call: &ProcedureCall) -> String {
    let placeholders = vec!["?"; call.params.len()].join(", ");
    format!("CALL {}({placeholders})", call.procedure.name())
}

fn bind_params(
    mut q: Query<'_, MySql, MySqlArguments>,
    params: Vec<Param>,
) -> Query<'_, MySql, MySqlArguments> {
    for p in params {
        q = match p {
            Param::Int(v) => q.bind(v),
            Param::OptInt(v) => q.bind(v),
            Param::Text(v) => q.bind(v),
            Param::OptText(v) => q.bind(v),
            Param::Bool(v) => q.bind(v),
            Param::Date(v) => q.bind(v),
            Param::Time(v) => q.bind(v),
        };
    }
    q
}

fn map_sqlx_error(e: sqlx::Error) -> ProcedureError {
    match e {
        sqlx::Error::Database(db) => ProcedureError::Domain(classify(db.message())),
        other => ProcedureError::Transport(other.to_string()),
    }
}

/// `ID_Agenda` -> `id_agenda`, `FechaSubida` -> `fecha_subida`, `nombre` -> `nombre`.
pub fn column_key(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn column_value(row: &MySqlRow, idx: usize) -> Value {
    let col = &row.columns()[idx];
    let ty = col.type_info().name().to_ascii_uppercase();

    let decoded: Option<Value> = if ty == "BOOLEAN" {
        row.try_get::<Option<bool>, _>(idx).ok().map(|v| v.map_or(Value::Null, Value::from))
    } else if ty.ends_with("UNSIGNED") {
        row.try_get::<Option<u64>, _>(idx).ok().map(|v| v.map_or(Value::Null, Value::from))
    } else if matches!(ty.as_str(), "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR") {
        row.try_get::<Option<i64>, _>(idx).ok().map(|v| v.map_or(Value::Null, Value::from))
    } else if matches!(ty.as_str(), "DOUBLE" | "FLOAT") {
        row.try_get::<Option<f64>, _>(idx).ok().map(|v| v.map_or(Value::Null, Value::from))
    } else if ty == "DATE" {
        row.try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |d| Value::from(d.format("%Y-%m-%d").to_string())))
    } else if ty == "TIME" {
        row.try_get::<Option<NaiveTime>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |t| Value::from(t.format("%H:%M:%S").to_string())))
    } else if ty == "DATETIME" {
        row.try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |t| Value::from(t.format("%Y-%m-%dT%H:%M:%S").to_string())))
    } else if ty == "TIMESTAMP" {
        row.try_get::<Option<DateTime<Utc>>, _>(idx)
            .ok()
            .map(|v| v.map_or(Value::Null, |t| Value::from(t.to_rfc3339())))
    } else if ty == "NULL" {
        Some(Value::Null)
    } else {
        None
    };

    // DECIMAL, ENUM, TEXT and anything else the driver sends as bytes.
    decoded.unwrap_or_else(|| {
        row.try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::from)
    })
}

pub fn row_to_json(row: &MySqlRow) -> Row {
    let mut out = Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        out.insert(column_key(col.name()), column_value(row, idx));
    }
    out
}

/// Reads the first result set as the primary record and, only when it is
/// non-empty, advances into the second set for its dependents. Each set ends
/// with a `Left` completion item.
pub(crate) async fn read_primary_then_dependent<S, Q, R, E>(
    mut stream: S,
) -> Result<Option<(R, Vec<R>)>, E>
where
    S: Stream<Item = Result<Either<Q, R>, E>> + Unpin,
{
    let mut primary = None;
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Right(row) => {
                if primary.is_none() {
                    primary = Some(row);
                }
            }
            Either::Left(_) => break,
        }
    }

    let Some(primary) = primary else {
        return Ok(None);
    };

    let mut dependents = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Right(row) => dependents.push(row),
            Either::Left(_) => break,
        }
    }
    Ok(Some((primary, dependents)))
}

#[async_trait]
impl ProcedureInvoker for MySqlProcedureInvoker {
    async fn invoke(&self, call: ProcedureCall, shape: Shape) -> Result<Output, ProcedureError> {
        let sql = call_sql(&call);
        let name = call.procedure.name();
        let started = Instant::now();

        let query = bind_params(sqlx::query(&sql), call.params);

        let result = match shape {
            Shape::PrimaryWithDependent => {
                let stream = (&self.pool).fetch_many(query);
                read_primary_then_dependent(stream)
                    .await
                    .map(|found| {
                        Output::PrimaryWithDependent(found.map(|(p, deps)| {
                            (row_to_json(&p), deps.iter().map(row_to_json).collect())
                        }))
                    })
            }
            Shape::Scalar => query.fetch_all(&self.pool).await.map(|rows| {
                Output::Scalar(
                    rows.first()
                        .filter(|r| !r.columns().is_empty())
                        .map(|r| column_value(r, 0)),
                )
            }),
            Shape::Row => query
                .fetch_all(&self.pool)
                .await
                .map(|rows| Output::Row(rows.first().map(row_to_json))),
            Shape::Rows => query
                .fetch_all(&self.pool)
                .await
                .map(|rows| Output::Rows(rows.iter().map(row_to_json).collect())),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(out) => {
                tracing::debug!(procedure = name, elapsed_ms, "procedure call finished");
                Ok(out)
            }
            Err(e) => {
                let err = map_sqlx_error(e);
                match &err {
                    ProcedureError::Domain(d) => {
                        tracing::debug!(procedure = name, elapsed_ms, kind = ?d.kind, "procedure raised")
                    }
                    other => {
                        tracing::error!(procedure = name, elapsed_ms, error = %other, "procedure call failed")
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedures::Procedure;
    use futures_util::{StreamExt, stream};
    use rstest::rstest;
    use std::cell::Cell;

    #[rstest]
    #[case("ID_Agenda", "id_agenda")]
    #[case("FechaSubida", "fecha_subida")]
    #[case("TipoDocumento", "tipo_documento")]
    #[case("ID_TipoDocumento", "id_tipo_documento")]
    #[case("nombre", "nombre")]
    #[case("id_termino", "id_termino")]
    #[case("Disponible", "disponible")]
    #[case("ID", "id")]
    fn column_names_become_snake_case(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(column_key(raw), expected);
    }

    #[test]
    fn call_sql_has_one_placeholder_per_param() {
        let call = ProcedureCall::new(Procedure::AgendaToggleSlot)
            .arg(2_i64)
            .arg(40_i64)
            .arg(false);
        assert_eq!(call_sql(&call), "CALL sp_agenda_toggle_slot(?, ?, ?)");

        let empty = ProcedureCall::new(Procedure::SpecialtyList);
        assert_eq!(call_sql(&empty), "CALL sp_especialidad_list()");
    }

    type Item = Result<Either<(), &'static str>, ()>;

    #[tokio::test]
    async fn empty_primary_set_does_not_advance_into_dependents() {
        let polled = Cell::new(0);
        let items: Vec<Item> = vec![
            Ok(Either::Left(())),
            Ok(Either::Right("entry-1")),
            Ok(Either::Left(())),
        ];
        let s = stream::iter(items).inspect(|_| polled.set(polled.get() + 1));

        let found = read_primary_then_dependent(s).await.unwrap();

        assert!(found.is_none());
        assert_eq!(polled.get(), 1);
    }

    #[tokio::test]
    async fn primary_and_dependents_are_split_by_set_boundary() {
        let items: Vec<Item> = vec![
            Ok(Either::Right("record")),
            Ok(Either::Left(())),
            Ok(Either::Right("entry-1")),
            Ok(Either::Right("entry-2")),
            Ok(Either::Left(())),
            Ok(Either::Left(())),
        ];

        let found = read_primary_then_dependent(stream::iter(items)).await.unwrap();

        assert_eq!(found, Some(("record", vec!["entry-1", "entry-2"])));
    }

    #[tokio::test]
    async fn record_without_entries_yields_empty_dependents() {
        let items: Vec<Item> = vec![
            Ok(Either::Right("record")),
            Ok(Either::Left(())),
            Ok(Either::Left(())),
        ];

        let found = read_primary_then_dependent(stream::iter(items)).await.unwrap();

        assert_eq!(found, Some(("record", vec![])));
    }

    #[tokio::test]
    async fn stream_errors_propagate() {
        let items: Vec<Result<Either<(), &'static str>, &'static str>> =
            vec![Ok(Either::Right("record")), Ok(Either::Left(())), Err("lost connection")];

        let err = read_primary_then_dependent(stream::iter(items)).await.unwrap_err();

        assert_eq!(err, "lost connection");
    }
}
