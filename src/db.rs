// 🗄️ MySQL plumbing - connection wrapper + schema + batch inserts

use crate::config::DbConfig;
use crate::loader::RowSink;
use crate::records::Row;
use anyhow::{Context, Result};
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Params, Value};

/// Thin wrapper over one blocking MySQL connection
pub struct SqlConnection {
    conn: Conn,
}

impl SqlConnection {
    /// Connect with the credentials from process configuration
    ///
    /// Connection failure is an explicit error here, not a silent dead
    /// connection; the caller decides whether to abort.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()));

        let conn = Conn::new(opts).with_context(|| {
            format!(
                "Failed to connect to MySQL database '{}' at {}",
                config.database, config.host
            )
        })?;

        println!("✓ Connected to MySQL database '{}'", config.database);
        Ok(SqlConnection { conn })
    }

    /// Create the five target tables if they do not exist
    pub fn setup_database(&mut self) -> Result<()> {
        const DDL: [&str; 5] = [
            "CREATE TABLE IF NOT EXISTS emitter (
                id VARCHAR(13) NOT NULL,
                name VARCHAR(255),
                fiscal_regime VARCHAR(3),
                PRIMARY KEY (id)
            )",
            "CREATE TABLE IF NOT EXISTS receiver (
                id VARCHAR(13) NOT NULL,
                name VARCHAR(255),
                cfdi_use VARCHAR(4),
                fiscal_address VARCHAR(5),
                fiscal_regime VARCHAR(3),
                PRIMARY KEY (id)
            )",
            "CREATE TABLE IF NOT EXISTS payslip (
                id VARCHAR(36) NOT NULL,
                emitter_id VARCHAR(13),
                receiver_id VARCHAR(13),
                initial_payment_date VARCHAR(10),
                final_payment_date VARCHAR(10),
                payment_date VARCHAR(10),
                days_paid DECIMAL(7,3),
                type VARCHAR(2),
                total_deductions DECIMAL(12,2),
                total_other_payments DECIMAL(12,2),
                total_perceptions DECIMAL(12,2),
                version VARCHAR(8),
                PRIMARY KEY (id)
            )",
            "CREATE TABLE IF NOT EXISTS movement_type (
                id VARCHAR(3) NOT NULL,
                concept VARCHAR(255),
                transaction_type CHAR(1) NOT NULL,
                transaction_sub_type VARCHAR(3) NOT NULL,
                PRIMARY KEY (id, transaction_type, transaction_sub_type)
            )",
            "CREATE TABLE IF NOT EXISTS movements (
                payslip_id VARCHAR(36) NOT NULL,
                movement_type_id VARCHAR(3),
                exempt_amount DECIMAL(12,2),
                taxable_amount DECIMAL(12,2),
                amount DECIMAL(12,2)
            )",
        ];

        for ddl in DDL {
            self.conn.query_drop(ddl).context("Failed to create table")?;
        }

        Ok(())
    }
}

impl RowSink for SqlConnection {
    /// One parameterized INSERT per category, executed as a batch
    fn insert_many(&mut self, table: &str, columns: &[&str], rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let stmt = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        self.conn
            .exec_batch(
                &stmt,
                rows.iter().map(|row| {
                    Params::Positional(row.iter().map(|v| Value::from(v.clone())).collect())
                }),
            )
            .with_context(|| format!("Batch insert into {} failed", table))?;

        Ok(rows.len() as u64)
    }
}
