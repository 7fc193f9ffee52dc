use async_trait::async_trait;
use futures::future::try_join_all;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::{Consistency, SerialConsistency};
use scylla::value::{CqlValue, Row};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::CassandraConfig;

const MEDICINE_DDL: &str = "CREATE TABLE IF NOT EXISTS medicine (\
     name text PRIMARY KEY, count int, substitutes list<text>, \
     side_effects list<text>, uses list<text>, chemical_class text, \
     habit_forming text, therapeutic_class text, action_class text)";

const RESERVATION_DDL: &str = "CREATE TABLE IF NOT EXISTS reservation (\
     reservation_id uuid, id uuid, account_name text, medicine text, count int, \
     PRIMARY KEY (reservation_id, id, account_name))";

const LINE_COLUMNS: &str = "reservation_id, id, account_name, medicine, count";

const MEDICINE_COLUMNS: &str = "name, count, substitutes, side_effects, uses, \
     chemical_class, habit_forming, therapeutic_class, action_class";

type LineRow = (Uuid, Uuid, String, String, i32);

type MedicineRow = (
    String,
    Option<i32>,
    Option<Vec<String>>,
    Option<Vec<String>>,
    Option<Vec<String>>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result of a conditional catalog write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    NotApplied { current: Option<i32> },
}

/// One row of the `reservation` table. The `line_id` field maps to the
/// store column `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationLine {
    pub reservation_id: Uuid,
    pub line_id: Uuid,
    pub account_name: String,
    pub medicine: String,
    pub count: i32,
}

/// Row-level operations the reservation coordinator runs on. The workflows
/// are generic over this seam so the CAS orchestration can be exercised
/// against an in-memory store in tests.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Current catalog count per name, `None` for a missing row (a row with
    /// a null `count` cell counts as missing). Result order matches input
    /// order; reads run at the strongest consistency.
    async fn read_counts(&self, names: &[String]) -> Result<Vec<Option<i32>>, StoreError>;

    /// `count = new` iff the stored value still equals `expected`.
    async fn cas_set_count(
        &self,
        name: &str,
        expected: i32,
        new: i32,
    ) -> Result<CasOutcome, StoreError>;

    async fn insert_line(&self, line: &ReservationLine) -> Result<(), StoreError>;

    async fn delete_reservation(&self, reservation_id: Uuid) -> Result<(), StoreError>;

    async fn lines_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationLine>, StoreError>;

    async fn lines_by_account(&self, account_name: &str)
        -> Result<Vec<ReservationLine>, StoreError>;

    async fn all_lines(&self) -> Result<Vec<ReservationLine>, StoreError>;
}

/// Prepared once at startup; immutable afterwards.
struct Statements {
    read_count: PreparedStatement,
    cas_set_count: PreparedStatement,
    insert_line: PreparedStatement,
    delete_reservation: PreparedStatement,
    select_by_reservation: PreparedStatement,
    select_by_account: PreparedStatement,
    select_all: PreparedStatement,
    get_medicine: PreparedStatement,
}

impl Statements {
    async fn prepare(session: &Session) -> Result<Self, StoreError> {
        let mut read_count = session
            .prepare("SELECT count FROM medicine WHERE name = ?")
            .await
            .map_err(StoreError::backend)?;
        read_count.set_consistency(Consistency::All);

        let mut cas_set_count = session
            .prepare("UPDATE medicine SET count = ? WHERE name = ? IF count = ?")
            .await
            .map_err(StoreError::backend)?;
        cas_set_count.set_consistency(Consistency::All);
        cas_set_count.set_serial_consistency(Some(SerialConsistency::Serial));

        let insert_line = session
            .prepare(format!(
                "INSERT INTO reservation ({LINE_COLUMNS}) VALUES (?, ?, ?, ?, ?)"
            ))
            .await
            .map_err(StoreError::backend)?;

        let delete_reservation = session
            .prepare("DELETE FROM reservation WHERE reservation_id = ?")
            .await
            .map_err(StoreError::backend)?;

        let select_by_reservation = session
            .prepare(format!(
                "SELECT {LINE_COLUMNS} FROM reservation WHERE reservation_id = ?"
            ))
            .await
            .map_err(StoreError::backend)?;

        let select_by_account = session
            .prepare(format!(
                "SELECT {LINE_COLUMNS} FROM reservation WHERE account_name = ? ALLOW FILTERING"
            ))
            .await
            .map_err(StoreError::backend)?;

        let select_all = session
            .prepare(format!("SELECT {LINE_COLUMNS} FROM reservation"))
            .await
            .map_err(StoreError::backend)?;

        let get_medicine = session
            .prepare(format!("SELECT {MEDICINE_COLUMNS} FROM medicine WHERE name = ?"))
            .await
            .map_err(StoreError::backend)?;

        Ok(Self {
            read_count,
            cas_set_count,
            insert_line,
            delete_reservation,
            select_by_reservation,
            select_by_account,
            select_all,
            get_medicine,
        })
    }
}

pub struct ScyllaStore {
    session: Session,
    statements: Statements,
    keyspace: String,
    repl_factor: u32,
}

impl ScyllaStore {
    pub async fn connect(config: &CassandraConfig) -> anyhow::Result<Self> {
        info!(points = ?config.points, "connecting to store");
        let session = SessionBuilder::new()
            .known_nodes(&config.points)
            .build()
            .await?;

        if session.use_keyspace(&config.keyspace, false).await.is_err() {
            info!(keyspace = %config.keyspace, "keyspace missing, bootstrapping");
            bootstrap_keyspace(&session, &config.keyspace, config.repl_factor).await?;
            session.use_keyspace(&config.keyspace, false).await?;
        }
        sync_tables(&session).await?;

        info!("preparing statements");
        let statements = Statements::prepare(&session).await?;

        Ok(Self {
            session,
            statements,
            keyspace: config.keyspace.clone(),
            repl_factor: config.repl_factor,
        })
    }

    /// Drop the working keyspace and re-create it empty.
    pub async fn clean(&self) -> Result<(), StoreError> {
        info!(keyspace = %self.keyspace, "removing keyspace");
        self.session
            .query_unpaged(format!("DROP KEYSPACE IF EXISTS {}", self.keyspace), ())
            .await
            .map_err(StoreError::backend)?;
        bootstrap_keyspace(&self.session, &self.keyspace, self.repl_factor).await?;
        self.session
            .use_keyspace(&self.keyspace, false)
            .await
            .map_err(StoreError::backend)?;
        sync_tables(&self.session).await?;
        Ok(())
    }

    /// Prepare and execute a raw statement, rendering its rows as JSON
    /// objects keyed by column name. Statements without a row set yield an
    /// empty array.
    pub async fn raw_query(&self, query: &str) -> Result<Value, StoreError> {
        let prepared = self
            .session
            .prepare(query)
            .await
            .map_err(StoreError::backend)?;
        let result = self
            .session
            .execute_unpaged(&prepared, ())
            .await
            .map_err(StoreError::backend)?;
        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Value::Array(Vec::new())),
        };
        let names: Vec<String> = rows
            .column_specs()
            .iter()
            .map(|spec| spec.name().to_owned())
            .collect();
        let mut out = Vec::new();
        for row in rows.rows::<Row>().map_err(StoreError::backend)? {
            let row = row.map_err(StoreError::backend)?;
            let mut object = Map::new();
            for (name, value) in names.iter().zip(row.columns) {
                object.insert(name.clone(), cql_value_to_json(value));
            }
            out.push(Value::Object(object));
        }
        Ok(Value::Array(out))
    }

    /// Full catalog row as a key/value object, `None` when the medicine is
    /// unknown.
    pub async fn fetch_medicine(&self, name: &str) -> Result<Option<Value>, StoreError> {
        let result = self
            .session
            .execute_unpaged(&self.statements.get_medicine, (name,))
            .await
            .map_err(StoreError::backend)?;
        let rows = result.into_rows_result().map_err(StoreError::backend)?;
        let Some(row) = rows
            .maybe_first_row::<MedicineRow>()
            .map_err(StoreError::backend)?
        else {
            return Ok(None);
        };
        let (
            name,
            count,
            substitutes,
            side_effects,
            uses,
            chemical_class,
            habit_forming,
            therapeutic_class,
            action_class,
        ) = row;
        Ok(Some(json!({
            "name": name,
            "count": count,
            "substitutes": substitutes,
            "side_effects": side_effects,
            "uses": uses,
            "chemical_class": chemical_class,
            "habit_forming": habit_forming,
            "therapeutic_class": therapeutic_class,
            "action_class": action_class,
        })))
    }

    async fn collect_lines(
        &self,
        statement: &PreparedStatement,
        values: impl scylla::serialize::row::SerializeRow,
    ) -> Result<Vec<ReservationLine>, StoreError> {
        let result = self
            .session
            .execute_unpaged(statement, values)
            .await
            .map_err(StoreError::backend)?;
        let rows = result.into_rows_result().map_err(StoreError::backend)?;
        let mut lines = Vec::new();
        for row in rows.rows::<LineRow>().map_err(StoreError::backend)? {
            let (reservation_id, line_id, account_name, medicine, count) =
                row.map_err(StoreError::backend)?;
            lines.push(ReservationLine {
                reservation_id,
                line_id,
                account_name,
                medicine,
                count,
            });
        }
        Ok(lines)
    }
}

#[async_trait]
impl InventoryStore for ScyllaStore {
    async fn read_counts(&self, names: &[String]) -> Result<Vec<Option<i32>>, StoreError> {
        let reads = names.iter().map(|name| async move {
            let result = self
                .session
                .execute_unpaged(&self.statements.read_count, (name,))
                .await
                .map_err(StoreError::backend)?;
            let rows = result.into_rows_result().map_err(StoreError::backend)?;
            let row = rows
                .maybe_first_row::<(Option<i32>,)>()
                .map_err(StoreError::backend)?;
            Ok::<_, StoreError>(row.and_then(|(count,)| count))
        });
        try_join_all(reads).await
    }

    async fn cas_set_count(
        &self,
        name: &str,
        expected: i32,
        new: i32,
    ) -> Result<CasOutcome, StoreError> {
        let result = self
            .session
            .execute_unpaged(&self.statements.cas_set_count, (new, name, expected))
            .await
            .map_err(StoreError::backend)?;
        let rows = result.into_rows_result().map_err(StoreError::backend)?;
        let row = rows
            .maybe_first_row::<Row>()
            .map_err(StoreError::backend)?
            .ok_or_else(|| StoreError::Backend("conditional update returned no row".into()))?;
        let mut columns = row.columns.into_iter();
        match columns.next().flatten() {
            Some(CqlValue::Boolean(true)) => Ok(CasOutcome::Applied),
            Some(CqlValue::Boolean(false)) => {
                let current = columns.next().flatten().and_then(|value| match value {
                    CqlValue::Int(count) => Some(count),
                    _ => None,
                });
                Ok(CasOutcome::NotApplied { current })
            }
            other => Err(StoreError::Backend(format!(
                "unexpected conditional update response: {other:?}"
            ))),
        }
    }

    async fn insert_line(&self, line: &ReservationLine) -> Result<(), StoreError> {
        self.session
            .execute_unpaged(
                &self.statements.insert_line,
                (
                    line.reservation_id,
                    line.line_id,
                    &line.account_name,
                    &line.medicine,
                    line.count,
                ),
            )
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn delete_reservation(&self, reservation_id: Uuid) -> Result<(), StoreError> {
        self.session
            .execute_unpaged(&self.statements.delete_reservation, (reservation_id,))
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn lines_by_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationLine>, StoreError> {
        self.collect_lines(&self.statements.select_by_reservation, (reservation_id,))
            .await
    }

    async fn lines_by_account(
        &self,
        account_name: &str,
    ) -> Result<Vec<ReservationLine>, StoreError> {
        self.collect_lines(&self.statements.select_by_account, (account_name,))
            .await
    }

    async fn all_lines(&self) -> Result<Vec<ReservationLine>, StoreError> {
        self.collect_lines(&self.statements.select_all, ()).await
    }
}

async fn bootstrap_keyspace(
    session: &Session,
    keyspace: &str,
    repl_factor: u32,
) -> Result<(), StoreError> {
    info!(keyspace, repl_factor, "creating keyspace");
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {repl_factor}}}"
            ),
            (),
        )
        .await
        .map_err(StoreError::backend)?;
    Ok(())
}

async fn sync_tables(session: &Session) -> Result<(), StoreError> {
    for ddl in [MEDICINE_DDL, RESERVATION_DDL] {
        session
            .query_unpaged(ddl, ())
            .await
            .map_err(StoreError::backend)?;
    }
    Ok(())
}

fn cql_value_to_json(value: Option<CqlValue>) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    match value {
        CqlValue::Ascii(text) | CqlValue::Text(text) => Value::String(text),
        CqlValue::Boolean(flag) => Value::Bool(flag),
        CqlValue::Int(n) => Value::from(n),
        CqlValue::BigInt(n) => Value::from(n),
        CqlValue::SmallInt(n) => Value::from(n),
        CqlValue::TinyInt(n) => Value::from(n),
        CqlValue::Float(n) => serde_json::Number::from_f64(f64::from(n))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CqlValue::Double(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        CqlValue::Uuid(id) => Value::String(id.to_string()),
        CqlValue::List(items) | CqlValue::Set(items) => Value::Array(
            items
                .into_iter()
                .map(|item| cql_value_to_json(Some(item)))
                .collect(),
        ),
        CqlValue::Empty => Value::Null,
        other => Value::String(format!("{other:?}")),
    }
}
