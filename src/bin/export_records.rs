//! export_records - dump detection/anomaly tables to CSV

use anyhow::{anyhow, Result};
use clap::Parser;

use sentrycam::{RecordStore, RecordTable};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the sentrycam database.
    #[arg(long, env = "SENTRYCAM_DB_PATH", default_value = "sentrycam.db")]
    db_path: String,
    /// Table to export (detections|anomalies).
    #[arg(long, default_value = "detections")]
    table: String,
    /// Output file path for the CSV dump.
    #[arg(long, default_value = "sentrycam_export.csv")]
    output: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let table = match args.table.as_str() {
        "detections" => RecordTable::Detections,
        "anomalies" => RecordTable::Anomalies,
        other => return Err(anyhow!("unknown table '{}'", other)),
    };

    let store = RecordStore::open(&args.db_path)?;
    let mut out = std::fs::File::create(&args.output)
        .map_err(|e| anyhow!("failed to create {}: {}", args.output, e))?;
    let rows = store.export_csv(table, &mut out)?;

    println!("{} rows written to {}", rows, args.output);
    Ok(())
}
