// CFDI Nómina ETL - Core Library
// Exposes extraction, the record model, and load plumbing for the run binary and tests

pub mod config;
pub mod db;
pub mod extractor;
pub mod loader;
pub mod records;

// Re-export commonly used types
pub use config::DbConfig;
pub use db::SqlConnection;
pub use extractor::{extract_payroll, ExtractError, NOMINA_NS};
pub use loader::{LoadReport, PayrollLoader, RowSink};
pub use records::{
    Category, Emitter, Movement, MovementType, Payslip, Receiver, RecordSet, Row, TransactionKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
