/// Schema Introspection Module
///
/// This module provides typed views over the result sets MySQL returns for
/// introspection statements (`DESCRIBE`, `SHOW INDEX`, `information_schema`
/// size queries), and the fixed SQL used to fetch them.

use crate::core::db::query::{value_as_u64, value_to_string, QueryResult};
use serde::Serialize;
use serde_json::Value;

/// Size and row estimate of one table in the current database.
pub const TABLE_SIZE_SQL: &str = "SELECT table_name, table_rows, data_length, index_length, \
     (data_length + index_length) AS total_size \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE() AND table_name = ?";

/// Aggregate size of the current database.
pub const DATABASE_SIZE_SQL: &str = "SELECT SUM(data_length + index_length) AS total_size, \
     SUM(data_length) AS data_size, SUM(index_length) AS index_size \
     FROM information_schema.tables \
     WHERE table_schema = DATABASE()";

/// Aggregate size and table count of a named database.
pub const DATABASE_DETAILS_SQL: &str = "SELECT table_schema, SUM(data_length + index_length) AS total_size, \
     SUM(data_length) AS data_size, SUM(index_length) AS index_size, COUNT(*) AS table_count \
     FROM information_schema.tables \
     WHERE table_schema = ? \
     GROUP BY table_schema";

fn cell(row: &[Value], index: usize) -> Value {
    row.get(index).cloned().unwrap_or(Value::Null)
}

fn text(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::Null) | None => String::new(),
        Some(value) => value_to_string(value),
    }
}

/// Represents a table column as reported by `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    /// Column name
    pub field: String,
    /// Full MySQL type (e.g. "varchar(100)", "int unsigned")
    #[serde(rename = "type")]
    pub type_name: String,
    /// "YES" or "NO"
    pub null: String,
    /// "PRI", "UNI", "MUL" or empty
    pub key: String,
    /// Default value expression (if any)
    pub default: Value,
    /// Extra attributes such as "auto_increment"
    pub extra: String,
}

impl ColumnInfo {
    fn from_describe_row(row: &[Value]) -> Self {
        ColumnInfo {
            field: text(row, 0),
            type_name: text(row, 1),
            null: text(row, 2),
            key: text(row, 3),
            default: cell(row, 4),
            extra: text(row, 5),
        }
    }
}

/// Converts a `DESCRIBE` result set into column descriptions.
pub fn describe_columns(result: &QueryResult) -> Vec<ColumnInfo> {
    result
        .rows
        .iter()
        .map(|row| ColumnInfo::from_describe_row(row))
        .collect()
}

/// One column's participation in an index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexColumn {
    pub column_name: Value,
    pub seq_in_index: Value,
    pub collation: Value,
    pub cardinality: Value,
    pub sub_part: Value,
    pub packed: Value,
    pub null: Value,
    pub index_type: Value,
}

/// Represents a table index
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexInfo {
    /// Index name ("PRIMARY" for the primary key)
    pub name: String,
    /// "UNIQUE" or "NONUNIQUE"
    #[serde(rename = "type")]
    pub kind: String,
    /// Columns in index order
    pub columns: Vec<IndexColumn>,
}

impl IndexInfo {
    /// Whether this is a UNIQUE index
    pub fn is_unique(&self) -> bool {
        self.kind == "UNIQUE"
    }
}

/// Groups `SHOW INDEX` rows by index name, keeping the order in which
/// indexes first appear.
///
/// `SHOW INDEX` columns: Table, Non_unique, Key_name, Seq_in_index,
/// Column_name, Collation, Cardinality, Sub_part, Packed, Null, Index_type.
pub fn group_indexes(result: &QueryResult) -> Vec<IndexInfo> {
    let mut indexes: Vec<IndexInfo> = Vec::new();

    for row in &result.rows {
        let name = text(row, 2);
        let position = match indexes.iter().position(|index| index.name == name) {
            Some(position) => position,
            None => {
                let unique = value_as_u64(&cell(row, 1)) == Some(0);
                indexes.push(IndexInfo {
                    name,
                    kind: if unique { "UNIQUE" } else { "NONUNIQUE" }.to_string(),
                    columns: Vec::new(),
                });
                indexes.len() - 1
            }
        };

        indexes[position].columns.push(IndexColumn {
            column_name: cell(row, 4),
            seq_in_index: cell(row, 3),
            collation: cell(row, 5),
            cardinality: cell(row, 6),
            sub_part: cell(row, 7),
            packed: cell(row, 8),
            null: cell(row, 9),
            index_type: cell(row, 10),
        });
    }

    indexes
}

/// Storage footprint in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageSize {
    pub total_size_bytes: u64,
    pub data_size_bytes: u64,
    pub index_size_bytes: u64,
}

impl StorageSize {
    /// Reads (total, data, index) from three cells, treating NULL as zero.
    ///
    /// `SUM` over a database without tables yields NULL.
    pub fn from_cells(total: &Value, data: &Value, index: &Value) -> Self {
        StorageSize {
            total_size_bytes: value_as_u64(total).unwrap_or(0),
            data_size_bytes: value_as_u64(data).unwrap_or(0),
            index_size_bytes: value_as_u64(index).unwrap_or(0),
        }
    }

    /// Reads the first row of a `DATABASE_SIZE_SQL` result
    pub fn from_database_size(result: &QueryResult) -> Self {
        match result.first_row() {
            Some(row) => StorageSize::from_cells(&cell(row, 0), &cell(row, 1), &cell(row, 2)),
            None => StorageSize::default(),
        }
    }
}

/// Statistics for one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub table_name: String,
    pub estimated_rows: Value,
    pub actual_rows: u64,
    pub data_size_bytes: Value,
    pub index_size_bytes: Value,
    pub total_size_bytes: Value,
}

impl TableStats {
    /// Combines an exact row count with the first row of a `TABLE_SIZE_SQL`
    /// result. Returns None when information_schema has no row for the table.
    pub fn from_size_row(actual_rows: u64, result: &QueryResult) -> Option<Self> {
        let row = result.first_row()?;
        Some(TableStats {
            table_name: text(row, 0),
            estimated_rows: cell(row, 1),
            actual_rows,
            data_size_bytes: cell(row, 2),
            index_size_bytes: cell(row, 3),
            total_size_bytes: cell(row, 4),
        })
    }
}

/// Size and table count of a database, from `DATABASE_DETAILS_SQL`
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseDetails {
    pub database_name: String,
    pub table_count: u64,
    pub size: StorageSize,
}

impl DatabaseDetails {
    pub fn from_details_row(result: &QueryResult) -> Option<Self> {
        let row = result.first_row()?;
        Some(DatabaseDetails {
            database_name: text(row, 0),
            table_count: value_as_u64(&cell(row, 4)).unwrap_or(0),
            size: StorageSize::from_cells(&cell(row, 1), &cell(row, 2), &cell(row, 3)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn show_index_row(non_unique: i64, key: &str, seq: i64, column: &str) -> Vec<Value> {
        vec![
            json!("orders"),
            json!(non_unique),
            json!(key),
            json!(seq),
            json!(column),
            json!("A"),
            json!(10),
            Value::Null,
            Value::Null,
            json!(""),
            json!("BTREE"),
        ]
    }

    #[test]
    fn test_describe_columns() {
        let result = QueryResult::new(
            vec!["Field", "Type", "Null", "Key", "Default", "Extra"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec![
                vec![json!("id"), json!("int"), json!("NO"), json!("PRI"), Value::Null, json!("auto_increment")],
                vec![json!("status"), json!("varchar(20)"), json!("YES"), json!(""), json!("new"), json!("")],
            ],
        );
        let columns = describe_columns(&result);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].field, "id");
        assert_eq!(columns[0].extra, "auto_increment");
        assert_eq!(columns[1].default, json!("new"));

        let rendered = serde_json::to_value(&columns[0]).unwrap();
        assert_eq!(rendered["type"], json!("int"));
    }

    #[test]
    fn test_group_indexes_keeps_first_seen_order() {
        let result = QueryResult::new(
            vec![],
            vec![
                show_index_row(0, "PRIMARY", 1, "id"),
                show_index_row(1, "idx_customer_date", 1, "customer_id"),
                show_index_row(1, "idx_customer_date", 2, "created_at"),
                show_index_row(0, "uniq_ref", 1, "reference"),
            ],
        );
        let indexes = group_indexes(&result);
        let names: Vec<&str> = indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["PRIMARY", "idx_customer_date", "uniq_ref"]);
        assert!(indexes[0].is_unique());
        assert!(!indexes[1].is_unique());
        assert_eq!(indexes[1].columns.len(), 2);
        assert_eq!(indexes[1].columns[1].column_name, json!("created_at"));
    }

    #[test]
    fn test_storage_size_treats_null_as_zero() {
        let result = QueryResult::new(vec![], vec![vec![Value::Null, Value::Null, Value::Null]]);
        assert_eq!(StorageSize::from_database_size(&result), StorageSize::default());

        let result = QueryResult::new(vec![], vec![vec![json!("32768"), json!("16384"), json!(16384)]]);
        let size = StorageSize::from_database_size(&result);
        assert_eq!(size.total_size_bytes, 32768);
        assert_eq!(size.index_size_bytes, 16384);
    }

    #[test]
    fn test_table_stats_requires_size_row() {
        assert!(TableStats::from_size_row(3, &QueryResult::default()).is_none());

        let result = QueryResult::new(
            vec![],
            vec![vec![json!("orders"), json!(2), json!(16384), json!(0), json!(16384)]],
        );
        let stats = TableStats::from_size_row(3, &result).unwrap();
        assert_eq!(stats.table_name, "orders");
        assert_eq!(stats.actual_rows, 3);
        assert_eq!(stats.estimated_rows, json!(2));
    }
}
