//! Snapshot tests for the SQL text the compiler produces for DDL.

use insta::assert_snapshot;
use mysqladm::sql::{ColumnDef, Compiler, TableOptions};
use mysqladm::validation::Validator;
use serde_json::json;

fn compiler() -> Compiler {
    Compiler::new(Validator::default(), 1000)
}

fn columns() -> Vec<ColumnDef> {
    serde_json::from_value(json!([
        { "name": "id", "type": "INT", "constraints": ["PRIMARY KEY", "AUTO_INCREMENT"] },
        { "name": "email", "type": "VARCHAR(255)", "constraints": ["NOT NULL", "UNIQUE"] },
        { "name": "nickname", "type": "VARCHAR(64)", "default": null },
        { "name": "status", "type": "VARCHAR(16)", "default": "it's new" },
        { "name": "score", "type": "DECIMAL(5,2)", "default": 0 },
        { "name": "active", "type": "BOOLEAN", "default": true }
    ]))
    .unwrap()
}

#[test]
fn test_create_table_snapshot() {
    let options = TableOptions {
        engine: Some("InnoDB".to_string()),
        charset: Some("utf8mb4".to_string()),
        collation: Some("utf8mb4_unicode_ci".to_string()),
    };
    let statement = compiler()
        .create_table("users", &columns(), Some(&options))
        .unwrap();

    assert_snapshot!(statement.sql, @r###"
    CREATE TABLE `users` (
      `id` INT PRIMARY KEY AUTO_INCREMENT,
      `email` VARCHAR(255) NOT NULL UNIQUE,
      `nickname` VARCHAR(64) DEFAULT NULL,
      `status` VARCHAR(16) DEFAULT 'it''s new',
      `score` DECIMAL(5,2) DEFAULT 0,
      `active` BOOLEAN DEFAULT TRUE
    ) ENGINE=InnoDB CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci
    "###);
    assert!(statement.params.is_empty());
}

#[test]
fn test_alter_table_snapshots() {
    let compiler = compiler();
    let constraints = vec!["NOT NULL".to_string()];

    let add = compiler
        .add_column("users", "age", "INT", &constraints, Some(&json!(18)), Some("email"))
        .unwrap();
    assert_snapshot!(add.sql, @"ALTER TABLE `users` ADD COLUMN `age` INT NOT NULL DEFAULT 18 AFTER `email`");

    let add_unplaced = compiler
        .add_column("users", "age", "INT", &[], None, Some("bad name"))
        .unwrap();
    assert_snapshot!(add_unplaced.sql, @"ALTER TABLE `users` ADD COLUMN `age` INT");

    let modify = compiler
        .modify_column("users", "age", "SMALLINT", &constraints, None)
        .unwrap();
    assert_snapshot!(modify.sql, @"ALTER TABLE `users` MODIFY COLUMN `age` SMALLINT NOT NULL");

    let index = compiler
        .create_index(
            "users",
            "idx_name",
            &["last_name".to_string(), "first_name".to_string()],
            "hash",
            false,
        )
        .unwrap();
    assert_snapshot!(index.sql, @"CREATE INDEX `idx_name` ON `users` (`last_name`, `first_name`) USING HASH");
}

#[test]
fn test_database_snapshots() {
    let compiler = compiler();

    let create = compiler
        .create_database("analytics", "utf8mb4", "utf8mb4_unicode_ci")
        .unwrap();
    assert_snapshot!(create.sql, @"CREATE DATABASE IF NOT EXISTS `analytics` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci");

    let copy = compiler.copy_rows("shop", "shop_copy", "orders").unwrap();
    assert_snapshot!(copy.sql, @"INSERT INTO `shop_copy`.`orders` SELECT * FROM `shop`.`orders`");

    let show = compiler.show_create_table("shop", "orders").unwrap();
    assert_snapshot!(show.sql, @"SHOW CREATE TABLE `shop`.`orders`");
}
