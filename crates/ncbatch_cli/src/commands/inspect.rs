//! Inspect command implementation.

use ncbatch_engine::GroupAccumulator;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Summary of one cached group.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GroupSummary {
    /// Apply-group name.
    pub name: String,
    /// Size of the cached definition in bytes.
    pub bytes: usize,
}

/// Loads a saved group listing the way a coordinator hydrates its cache.
pub fn load_snapshot(path: &Path) -> Result<GroupAccumulator, Box<dyn std::error::Error>> {
    let document = std::fs::read_to_string(path)?;
    let accumulator = GroupAccumulator::new();
    accumulator.stage_read(&document)?;
    Ok(accumulator)
}

/// Lists the groups of a loaded snapshot, sorted by name.
pub fn summarize(accumulator: &GroupAccumulator) -> Vec<GroupSummary> {
    accumulator
        .groups()
        .into_iter()
        .map(|name| {
            let bytes = accumulator.read_group_raw(&name).read.len();
            GroupSummary { name, bytes }
        })
        .collect()
}

/// Runs the inspect command.
pub fn run(
    snapshot: &Path,
    group: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Inspecting group listing {:?}", snapshot);
    let accumulator = load_snapshot(snapshot)?;

    if let Some(group) = group {
        let document = accumulator.read_group(group);
        if document.is_empty() {
            return Err(format!("Group {} not found in {:?}", group, snapshot).into());
        }
        println!("{}", document);
        return Ok(());
    }

    let groups = summarize(&accumulator);
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        _ => {
            println!("Groups: {}", groups.len());
            for summary in &groups {
                println!("  {:<24} {:>8} bytes", summary.name, summary.bytes);
            }
        }
    }
    Ok(())
}
