use anyhow::{Context, Result};
use clap::Parser;
use gramstat::{build_chart, csv_reader, ChartSpec, IdentityPosition};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gramstat")]
#[command(about = "Run a layered chart spec over CSV data and print the resolved layers as JSON", long_about = None)]
struct Args {
    /// Chart spec JSON file (mapping, layers, coord)
    spec: PathBuf,

    /// CSV file to read instead of stdin
    #[arg(long)]
    data: Option<PathBuf>,

    /// Emit compact JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let spec_text = fs::read_to_string(&args.spec)
        .with_context(|| format!("Failed to read spec {}", args.spec.display()))?;
    let spec = ChartSpec::from_json(&spec_text).context("Failed to parse chart spec")?;

    let data = match &args.data {
        Some(path) => csv_reader::read_csv_file(path).context("Failed to read CSV file")?,
        None => csv_reader::read_csv_from_stdin().context("Failed to read CSV from stdin")?,
    };
    log::info!("loaded {} rows, {} layers", data.len(), spec.layers.len());

    let chart = build_chart(&spec, &data, &IdentityPosition).context("Failed to build chart")?;
    let output = chart.to_json()?;
    let text = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", text).context("Failed to write JSON to stdout")?;
    handle.flush().context("Failed to flush stdout")?;

    Ok(())
}
