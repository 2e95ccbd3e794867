/// MySQL Engine Module
///
/// The production [`Engine`] implementation, built on `sqlx`'s MySQL driver.
/// Statements without parameters go over the text protocol so that commands
/// the prepared-statement protocol refuses (`USE`, some `SHOW` forms) work;
/// statements with parameters are prepared and bound.

use crate::core::db::connection::{Channel, ConnectParams, Engine};
use crate::core::db::query::QueryResult;
use crate::core::{AdminError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde_json::{json, Value};
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlQueryResult, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Decode, Either, Executor, Row, Type, TypeInfo, ValueRef};

/// Opens real MySQL connections.
#[derive(Debug, Clone, Default)]
pub struct MySqlEngine;

impl MySqlEngine {
    pub fn new() -> Self {
        MySqlEngine
    }

    fn options(params: &ConnectParams) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.user)
            .password(&params.password)
            .charset(&params.charset)
            .collation(&params.collation);
        if let Some(database) = &params.database {
            options = options.database(database);
        }
        // Statements are already logged by the scoped connection
        options.disable_statement_logging()
    }
}

#[async_trait]
impl Engine for MySqlEngine {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Channel>> {
        let conn = MySqlConnection::connect_with(&Self::options(params))
            .await
            .map_err(|e| AdminError::Connection(e.to_string()))?;
        Ok(Box::new(MySqlChannel { conn }))
    }
}

struct MySqlChannel {
    conn: MySqlConnection,
}

#[async_trait]
impl Channel for MySqlChannel {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        if params.is_empty() {
            let stream = Executor::fetch_many(&mut self.conn, sql);
            return drain(stream).await;
        }

        let mut query = sqlx::query(sql);
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        query.bind(i)
                    } else if let Some(u) = n.as_u64() {
                        query.bind(u)
                    } else if let Some(f) = n.as_f64() {
                        query.bind(f)
                    } else {
                        return Err(AdminError::validation(format!("Unsupported number parameter: {}", n)));
                    }
                }
                Value::String(s) => query.bind(s.clone()),
                Value::Array(_) | Value::Object(_) => query.bind(param.to_string()),
            };
        }
        let stream = Executor::fetch_many(&mut self.conn, query);
        drain(stream).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

async fn drain(
    mut stream: BoxStream<'_, std::result::Result<Either<MySqlQueryResult, MySqlRow>, sqlx::Error>>,
) -> Result<QueryResult> {
    let mut result = QueryResult::default();
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => {
                result.rows_affected += done.rows_affected();
                if done.last_insert_id() != 0 {
                    result.last_insert_id = Some(done.last_insert_id());
                }
            }
            Either::Right(row) => {
                if result.columns.is_empty() {
                    result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values = (0..row.len()).map(|i| decode_column(&row, i)).collect();
                result.rows.push(values);
            }
        }
    }
    Ok(result)
}

fn decoded<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<T, _>(index).ok()
}

fn text_or_bytes(row: &MySqlRow, index: usize) -> Value {
    if let Ok(text) = row.try_get_unchecked::<String, _>(index) {
        return Value::String(text);
    }
    match row.try_get_unchecked::<Vec<u8>, _>(index) {
        Ok(bytes) => bytes_to_value(bytes),
        Err(_) => Value::Null,
    }
}

fn bytes_to_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => {
            let hex: String = e.as_bytes().iter().map(|b| format!("{:02x}", b)).collect();
            Value::String(format!("0x{}", hex))
        }
    }
}

/// Parses DECIMAL text into a JSON number when it fits, keeping the text otherwise.
fn decimal_to_value(text: String) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return json!(i);
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => json!(f),
        _ => Value::String(text),
    }
}

/// Converts one column of a MySQL row into JSON, based on the column's type.
fn decode_column(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let type_name = row.columns()[index].type_info().name().to_uppercase();
    let typed = match type_name.as_str() {
        "BOOLEAN" => decoded::<bool>(row, index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decoded::<i64>(row, index).map(|v| json!(v))
        }
        name if name.ends_with("UNSIGNED") => decoded::<u64>(row, index).map(|v| json!(v)),
        "FLOAT" | "DOUBLE" => decoded::<f64>(row, index).map(|v| json!(v)),
        "DECIMAL" => row
            .try_get_unchecked::<String, _>(index)
            .ok()
            .map(decimal_to_value),
        "DATE" => decoded::<chrono::NaiveDate>(row, index).map(|v| json!(v.to_string())),
        "TIME" => decoded::<chrono::NaiveTime>(row, index).map(|v| json!(v.to_string())),
        "DATETIME" => decoded::<chrono::NaiveDateTime>(row, index)
            .map(|v| json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMP" => decoded::<chrono::DateTime<chrono::Utc>>(row, index)
            .map(|v| json!(v.to_rfc3339())),
        "JSON" => decoded::<Value>(row, index),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            decoded::<Vec<u8>>(row, index).map(bytes_to_value)
        }
        _ => None,
    };

    typed.unwrap_or_else(|| text_or_bytes(row, index))
}
