// 💾 Batch Loader - RecordSet → relational tables
// Insert failures degrade to warnings so the remaining batches still run

use crate::records::{RecordSet, Row};
use anyhow::Result;

// ============================================================================
// SINK SEAM
// ============================================================================

/// Anything that can receive a batch of rows for a named table
///
/// The production implementation is `SqlConnection`; tests use a recording
/// mock. Implementations must treat an empty batch as a no-op.
pub trait RowSink {
    /// Insert `rows` into `table` with the given column order
    ///
    /// Returns the number of rows inserted.
    fn insert_many(&mut self, table: &str, columns: &[&str], rows: &[Row]) -> Result<u64>;
}

// ============================================================================
// LOAD REPORT
// ============================================================================

/// Outcome of one `insert_records` pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows inserted across all categories
    pub inserted: u64,
    /// Categories whose batch insert failed
    pub failed_batches: usize,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0
    }
}

// ============================================================================
// PAYROLL LOADER
// ============================================================================

pub struct PayrollLoader<S: RowSink> {
    sink: S,
}

impl<S: RowSink> PayrollLoader<S> {
    pub fn new(sink: S) -> Self {
        PayrollLoader { sink }
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Insert every non-empty category of `records`
    ///
    /// A failed batch is reported on stderr and counted, never raised: a
    /// duplicate-key collision in one table must not block the others.
    pub fn insert_records(&mut self, records: &RecordSet) -> LoadReport {
        let mut report = LoadReport::default();

        for (category, rows) in records.batches() {
            match self.sink.insert_many(category.table(), category.columns(), &rows) {
                Ok(count) => {
                    report.inserted += count;
                    println!("✓ {}: {} rows inserted", category.table(), count);
                }
                Err(err) => {
                    report.failed_batches += 1;
                    eprintln!("⚠️  Insert into {} failed: {:#}", category.table(), err);
                }
            }
        }

        report
    }
}
