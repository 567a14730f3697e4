use chrono::{DateTime, FixedOffset, NaiveDateTime};
use greenmap_common::config::DatabaseConfig;
use greenmap_common::{Credentials, Result};
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Row, SqlValue};
use serde_json::Value;

use super::{KeyValue, Record, RecordStore};
use crate::dates::format_datetime;

/// Oracle-backed store
///
/// A connection is opened for each query and closed as soon as its rows have
/// been read; there is no pooling.
pub struct OracleStore {
    credentials: Credentials,
    database: DatabaseConfig,
}

impl OracleStore {
    pub fn new(credentials: Credentials, database: DatabaseConfig) -> Self {
        Self {
            credentials,
            database,
        }
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::connect(
            &self.credentials.user,
            &self.credentials.password,
            self.database.connect_string(),
        )?)
    }

    fn query(&self, sql: &str, params: &[&dyn ToSql], limit: Option<usize>) -> Result<Vec<Record>> {
        tracing::debug!(sql, "oracle query");
        let conn = self.connect()?;

        let mut records = Vec::new();
        for row in conn.query(sql, params)? {
            records.push(row_to_record(&row?)?);
            if limit.is_some_and(|n| records.len() >= n) {
                break;
            }
        }

        conn.close()?;
        Ok(records)
    }
}

impl RecordStore for OracleStore {
    fn fetch_all(&self, table: &str) -> Result<Vec<Record>> {
        let sql = format!("SELECT * FROM {}", self.database.qualify(table));
        self.query(&sql, &[], None)
    }

    fn fetch_by_key(&self, table: &str, column: &str, key: &KeyValue) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {column} = :1",
            self.database.qualify(table)
        );
        let param: &dyn ToSql = match key {
            KeyValue::Int(v) => v,
            KeyValue::Float(v) => v,
            KeyValue::Text(v) => v,
        };
        Ok(self.query(&sql, &[param], Some(1))?.into_iter().next())
    }
}

fn row_to_record(row: &Row) -> Result<Record> {
    let mut record = Record::new();
    for (info, value) in row.column_info().iter().zip(row.sql_values()) {
        record.insert(info.name().to_string(), sql_to_json(info.oracle_type(), value)?);
    }
    Ok(record)
}

/// Map an Oracle value onto JSON; dates become `%Y-%m-%d` strings
fn sql_to_json(oracle_type: &OracleType, value: &SqlValue) -> Result<Value> {
    if value.is_null()? {
        return Ok(Value::Null);
    }

    let json = match oracle_type {
        OracleType::Number(precision, 0) if *precision > 0 => Value::from(value.get::<i64>()?),
        OracleType::Int64 => Value::from(value.get::<i64>()?),
        OracleType::Number(..) => number_to_json(value.get::<f64>()?),
        OracleType::Float(_) | OracleType::BinaryFloat | OracleType::BinaryDouble => {
            serde_json::Number::from_f64(value.get::<f64>()?)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        OracleType::Date | OracleType::Timestamp(_) => {
            Value::from(format_datetime(&value.get::<NaiveDateTime>()?))
        }
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => Value::from(format_datetime(
            &value.get::<DateTime<FixedOffset>>()?.naive_local(),
        )),
        _ => Value::from(value.get::<String>()?),
    };
    Ok(json)
}

/// Largest magnitude an f64 holds without losing integer precision
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Unconstrained NUMBER columns hold counts as often as measures
fn number_to_json(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < MAX_SAFE_INTEGER {
        return Value::from(value as i64);
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
