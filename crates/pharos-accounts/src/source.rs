//! Account sources and the rejected-record sink.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AccountError, Result};
use crate::types::{RawRecord, Rejected};

pub const COLUMN_PRIVATE_KEY: &str = "Private Key";
pub const COLUMN_PROXY: &str = "Proxy";
pub const COLUMN_TWITTER_TOKEN: &str = "Twitter Token";
pub const COLUMN_DISCORD_TOKEN: &str = "Discord Token";

/// Where raw account records come from. The registry never sees the format.
pub trait AccountSource {
    /// Human-readable location, used in log lines.
    fn describe(&self) -> String;

    fn read(&self) -> Result<Vec<RawRecord>>;
}

/// Where quarantined records go.
pub trait RejectedSink {
    fn persist(&self, rejected: &[Rejected]) -> Result<()>;
}

/// In-memory source, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub Vec<RawRecord>);

impl AccountSource for StaticSource {
    fn describe(&self) -> String {
        format!("{} in-memory record(s)", self.0.len())
    }

    fn read(&self) -> Result<Vec<RawRecord>> {
        Ok(self.0.clone())
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardRejected;

impl RejectedSink for DiscardRejected {
    fn persist(&self, _rejected: &[Rejected]) -> Result<()> {
        Ok(())
    }
}

/// CSV file with a header row. Only the private key column is mandatory;
/// header names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct CsvAccountSource {
    path: PathBuf,
}

impl CsvAccountSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AccountSource for CsvAccountSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<Vec<RawRecord>> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        read_records(reader)
    }
}

/// Column positions resolved from the header row.
struct ColumnMap {
    private_key: usize,
    proxy: Option<usize>,
    twitter_token: Option<usize>,
    discord_token: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            let wanted = normalize_header(name);
            headers.iter().position(|h| normalize_header(h) == wanted)
        };
        Ok(Self {
            private_key: find(COLUMN_PRIVATE_KEY)
                .ok_or_else(|| AccountError::MissingColumn(COLUMN_PRIVATE_KEY.to_string()))?,
            proxy: find(COLUMN_PROXY),
            twitter_token: find(COLUMN_TWITTER_TOKEN),
            discord_token: find(COLUMN_DISCORD_TOKEN),
        })
    }
}

fn normalize_header(h: &str) -> String {
    h.trim().to_ascii_lowercase().replace(['_', '-'], " ")
}

fn read_records<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<RawRecord>> {
    let columns = ColumnMap::from_headers(reader.headers()?)?;
    let cell = |record: &csv::StringRecord, idx: Option<usize>| {
        idx.and_then(|i| record.get(i)).unwrap_or("").to_string()
    };

    let mut out = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|c| c.trim().is_empty()) {
            debug!(row = i + 1, "skipping blank account row");
            continue;
        }
        out.push(RawRecord {
            row: i + 1,
            private_key: cell(&record, Some(columns.private_key)),
            proxy: cell(&record, columns.proxy),
            twitter_token: cell(&record, columns.twitter_token),
            discord_token: cell(&record, columns.discord_token),
        });
    }
    Ok(out)
}

/// Writes rejected rows to a CSV file, replacing any previous one. The
/// original columns are kept and a `reason` code plus a `detail` are appended.
#[derive(Debug, Clone)]
pub struct CsvRejectedSink {
    path: PathBuf,
}

impl CsvRejectedSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RejectedSink for CsvRejectedSink {
    fn persist(&self, rejected: &[Rejected]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record([
            "row",
            COLUMN_PRIVATE_KEY,
            COLUMN_PROXY,
            COLUMN_TWITTER_TOKEN,
            COLUMN_DISCORD_TOKEN,
            "reason",
            "detail",
        ])?;
        for r in rejected {
            writer.write_record([
                r.record.row.to_string().as_str(),
                r.record.private_key.as_str(),
                r.record.proxy.as_str(),
                r.record.twitter_token.as_str(),
                r.record.discord_token.as_str(),
                r.reason.code(),
                r.reason.to_string().as_str(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
