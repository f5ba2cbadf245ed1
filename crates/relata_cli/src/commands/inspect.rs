//! Inspect command implementation.

use relata_core::{ObjectRecord, StoreSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Snapshot file size in bytes.
    pub file_size: u64,
    /// Snapshot format version.
    pub format: u32,
    /// Last timestamp handed out by the store.
    pub clock: u64,
    /// Number of stored objects.
    pub record_count: usize,
    /// Object count per class.
    pub classes: Vec<ClassStats>,
    /// Every record (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordView>>,
}

/// Statistics for a single class.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ClassStats {
    /// Class name.
    pub class: String,
    /// Number of stored objects.
    pub count: usize,
}

/// Printable form of one record.
#[derive(Debug, Serialize)]
pub struct RecordView {
    /// Object ID.
    pub id: String,
    /// Version stamp.
    pub timestamp: u64,
    /// Values rendered as text, by property name.
    pub values: BTreeMap<String, String>,
}

impl From<&ObjectRecord> for RecordView {
    fn from(record: &ObjectRecord) -> Self {
        Self {
            id: record.id.to_string(),
            timestamp: record.timestamp.as_u64(),
            values: record
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_string()))
                .collect(),
        }
    }
}

/// Reads and summarizes the snapshot at `path`.
pub fn inspect(path: &Path, show_records: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }
    let bytes = std::fs::read(path)?;
    let snapshot = StoreSnapshot::from_bytes(&bytes)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in &snapshot.records {
        *counts.entry(record.id.class_id().to_string()).or_insert(0) += 1;
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: bytes.len() as u64,
        format: snapshot.format,
        clock: snapshot.clock.as_u64(),
        record_count: snapshot.records.len(),
        classes: counts
            .into_iter()
            .map(|(class, count)| ClassStats { class, count })
            .collect(),
        records: show_records.then(|| snapshot.records.iter().map(RecordView::from).collect()),
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, show_records: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, show_records)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Relata Snapshot Inspection");
    println!("==========================");
    println!();
    println!("Path:     {}", result.path);
    println!("Size:     {}", format_size(result.file_size));
    println!("Format:   v{}", result.format);
    println!("Clock:    {}", result.clock);
    println!();
    println!("Objects:  {}", result.record_count);
    for stats in &result.classes {
        println!("  {:<16} {}", stats.class, stats.count);
    }

    if let Some(records) = &result.records {
        println!();
        println!("Records:");
        for record in records {
            println!("  {} @{}", record.id, record.timestamp);
            for (name, value) in &record.values {
                println!("    {name} = {value}");
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} bytes")
    }
}
