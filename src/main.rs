use anyhow::{Context, Result};
use glob::glob;
use std::fs;

use nomina_etl::{extract_payroll, DbConfig, PayrollLoader, RecordSet, SqlConnection};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    println!("🧾 CFDI Nómina ETL - files/*.xml → MySQL");

    let config = DbConfig::from_env()?;
    let mut conn = SqlConnection::connect(&config)?;
    conn.setup_database()?;

    // Accumulate every document into one record set so emitters, receivers
    // and movement types shared across documents collapse before insertion.
    let mut all_records = RecordSet::new();
    let mut documents = 0usize;

    for entry in glob("files/*.xml").context("Invalid file pattern")? {
        let path = entry.context("Failed to read directory entry")?;
        let source_name = path.to_string_lossy().into_owned();

        let xml = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", source_name))?;
        let records = extract_payroll(&xml, &source_name)
            .with_context(|| format!("Failed to extract {}", source_name))?;

        println!("✓ {}: {} tuples", source_name, records.len());
        all_records.merge(records);
        documents += 1;
    }

    if documents == 0 {
        println!("No XML files found under files/");
        return Ok(());
    }

    println!("\n💾 Inserting {} tuples from {} documents...", all_records.len(), documents);
    let mut loader = PayrollLoader::new(conn);
    let report = loader.insert_records(&all_records);

    println!(
        "\n{} rows inserted, {} failed batches",
        report.inserted, report.failed_batches
    );

    Ok(())
}
