//! Render command implementation.
//!
//! Stages a batch file into a coordinator whose transport only records what
//! it is sent, then commits. The recorded requests are exactly what a device
//! would receive.

use ncbatch_engine::{BatchCoordinator, MockTransport, RequestKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A batch of staged changes as read from a JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BatchFile {
    /// Groups to delete.
    pub deletes: Vec<String>,
    /// Fragments to write, each carrying its `apply-groups` reference.
    pub writes: Vec<String>,
    /// Groups to replace with a new fragment.
    pub replacements: Vec<Replacement>,
}

/// One group replacement.
#[derive(Debug, Deserialize)]
pub struct Replacement {
    /// Group being replaced.
    pub group: String,
    /// New fragment for the group.
    pub fragment: String,
}

/// One request the batch sends.
#[derive(Debug, Serialize)]
pub struct RenderedRequest {
    /// Request kind.
    pub kind: String,
    /// Request document.
    pub document: String,
}

/// Stages the batch and returns the requests its commit sends, in order.
pub fn render(batch: &BatchFile) -> Result<Vec<RenderedRequest>, Box<dyn std::error::Error>> {
    let transport = MockTransport::new();
    let recorder = transport.clone();
    let coordinator = BatchCoordinator::with_transport(transport);

    for group in &batch.deletes {
        coordinator.stage_delete(group)?;
    }
    for fragment in &batch.writes {
        coordinator.stage_write(fragment)?;
    }
    for replacement in &batch.replacements {
        coordinator.replace_group(&replacement.group, &replacement.fragment)?;
    }
    coordinator.commit()?;

    Ok(recorder
        .sent()
        .into_iter()
        .map(|document| RenderedRequest {
            kind: RequestKind::classify(&document).to_string(),
            document,
        })
        .collect())
}

/// Runs the render command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("Rendering batch {:?}", path);
    let contents = std::fs::read_to_string(path)?;
    let batch: BatchFile = serde_json::from_str(&contents)?;
    let requests = render(&batch)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&requests)?);
        }
        _ => {
            for request in &requests {
                println!("# {}", request.kind);
                println!("{}", request.document);
            }
        }
    }
    Ok(())
}
