/// Query Results Module
///
/// This module provides the result type returned by every statement executed
/// over a connection, plus helpers that turn result sets into the JSON shapes
/// the operation catalog returns.

use serde_json::{Map, Value};

/// Represents the outcome of a single statement execution.
///
/// Row-returning statements fill `columns` and `rows`; data-changing
/// statements report `rows_affected` and, for inserts into tables with an
/// auto-increment key, `last_insert_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as JSON values
    pub rows: Vec<Vec<Value>>,
    /// Number of rows changed by the statement
    pub rows_affected: u64,
    /// Auto-increment id generated by the statement, if any
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        QueryResult {
            columns,
            rows,
            ..Default::default()
        }
    }

    /// Creates a QueryResult for a statement that changed rows without returning any
    pub fn affected(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        QueryResult {
            rows_affected,
            last_insert_id,
            ..Default::default()
        }
    }

    /// Number of rows returned
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the first row, if any
    pub fn first_row(&self) -> Option<&[Value]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Returns the first column of the first row, the usual shape of
    /// `SELECT COUNT(*)` and `SELECT DATABASE()`.
    pub fn scalar(&self) -> Option<&Value> {
        self.first_row().and_then(|row| row.first())
    }

    /// Collects one column of every row as strings, skipping NULLs.
    ///
    /// Used for single-column listings such as `SHOW TABLES` and `SHOW DATABASES`.
    pub fn column_strings(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|value| !value.is_null())
            .map(value_to_string)
            .collect()
    }

    /// Converts every row into a JSON object keyed by column name.
    pub fn to_objects(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (i, value) in row.iter().enumerate() {
                    let name = self
                        .columns
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("column_{}", i));
                    object.insert(name, value.clone());
                }
                Value::Object(object)
            })
            .collect()
    }
}

/// Renders a JSON value the way it reads in SQL output: strings without quotes.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

/// Reads an unsigned integer out of a value that may be a number or a numeric string.
///
/// Aggregates such as `SUM(data_length)` come back as DECIMAL, which the engine
/// layer may surface as text.
pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

/// Formats a parameter list for statement logging.
pub fn format_params(params: &[Value]) -> String {
    let rendered: Vec<String> = params.iter().map(Value::to_string).collect();
    format!("({})", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_objects_uses_column_names() {
        let result = QueryResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![vec![json!(1), json!("alice")], vec![json!(2), Value::Null]],
        );
        let objects = result.to_objects();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0], json!({"id": 1, "name": "alice"}));
        assert_eq!(objects[1], json!({"id": 2, "name": null}));
        assert_eq!(result.row_count(), 2);
    }

    #[test]
    fn test_scalar_and_column_strings() {
        let result = QueryResult::new(
            vec!["Tables_in_shop".to_string()],
            vec![vec![json!("orders")], vec![json!("users")], vec![Value::Null]],
        );
        assert_eq!(result.scalar(), Some(&json!("orders")));
        assert_eq!(result.column_strings(0), vec!["orders", "users"]);
        assert!(QueryResult::default().scalar().is_none());
    }

    #[test]
    fn test_value_as_u64() {
        assert_eq!(value_as_u64(&json!(42)), Some(42));
        assert_eq!(value_as_u64(&json!("16384")), Some(16384));
        assert_eq!(value_as_u64(&json!("16384.0")), Some(16384));
        assert_eq!(value_as_u64(&json!(-1)), None);
        assert_eq!(value_as_u64(&Value::Null), None);
    }

    #[test]
    fn test_format_params() {
        assert_eq!(format_params(&[json!("active"), json!(3)]), "(\"active\", 3)");
        assert_eq!(format_params(&[]), "()");
    }
}
