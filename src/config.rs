// ⚙️ Process configuration - MySQL credentials from the environment

use anyhow::{Context, Result};
use std::env;

/// Database connection parameters, one env variable each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Read MYSQL_HOST / MYSQL_USER / MYSQL_PASSWORD / MYSQL_DATABASE
    ///
    /// `.env` files are honored when the caller ran `dotenvy::dotenv()` first.
    pub fn from_env() -> Result<Self> {
        Ok(DbConfig {
            host: env::var("MYSQL_HOST").context("MYSQL_HOST is not set")?,
            user: env::var("MYSQL_USER").context("MYSQL_USER is not set")?,
            password: env::var("MYSQL_PASSWORD").context("MYSQL_PASSWORD is not set")?,
            database: env::var("MYSQL_DATABASE").context("MYSQL_DATABASE is not set")?,
        })
    }
}
