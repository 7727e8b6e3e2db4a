//! Bar ingestion: CSV files and seeded synthetic series.
//!
//! CSV columns are mapped by position, not by name: the first five columns
//! are open, high, low, close, volume. An optional sixth and seventh column
//! carry volatility and ATR; an empty cell means "absent". The first row is
//! always treated as a header.

use crate::domain::Bar;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Structured errors for bar ingestion.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {message}")]
    Row { row: usize, message: String },

    #[error("row {row}: bar fails OHLC sanity check")]
    InsaneBar { row: usize },

    #[error("no bars in input")]
    Empty,
}

/// Load bars from a CSV file.
pub fn load_csv(path: &Path) -> Result<Vec<Bar>, DataError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    read_records(reader)
}

/// Read bars from any CSV source (header row required).
pub fn read_csv<R: io::Read>(source: R) -> Result<Vec<Bar>, DataError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);
    read_records(reader)
}

fn read_records<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Bar>, DataError> {
    let mut bars = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // 1-based data rows, header excluded
        let row = i + 1;
        let record = record?;
        let bar = parse_record(&record, row)?;
        if !bar.is_sane() {
            return Err(DataError::InsaneBar { row });
        }
        bars.push(bar);
    }
    if bars.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(bars)
}

fn parse_record(record: &csv::StringRecord, row: usize) -> Result<Bar, DataError> {
    if record.len() < 5 {
        return Err(DataError::Row {
            row,
            message: format!("expected at least 5 columns (OHLCV), found {}", record.len()),
        });
    }
    let field = |idx: usize, name: &str| -> Result<f64, DataError> {
        let raw = record.get(idx).unwrap_or_default();
        raw.parse::<f64>().map_err(|e| DataError::Row {
            row,
            message: format!("{name} '{raw}': {e}"),
        })
    };
    let optional = |idx: usize, name: &str| -> Result<Option<f64>, DataError> {
        match record.get(idx) {
            None | Some("") => Ok(None),
            Some(_) => field(idx, name).map(Some),
        }
    };

    Ok(Bar {
        open: field(0, "open")?,
        high: field(1, "high")?,
        low: field(2, "low")?,
        close: field(3, "close")?,
        volume: field(4, "volume")?,
        volatility: optional(5, "volatility")?,
        atr: optional(6, "atr")?,
    })
}

/// Generate `n` synthetic bars for testing/development.
///
/// A simple random walk from `start_price`, deterministic for a given seed.
pub fn synthetic_bars(n: usize, seed: u64, start_price: f64) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start_price;
    let mut bars = Vec::with_capacity(n);

    for _ in 0..n {
        let step_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + step_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(10.0..1_000.0);

        bars.push(Bar::new(open, high, low, close, volume));
        price = close;
    }

    bars
}
