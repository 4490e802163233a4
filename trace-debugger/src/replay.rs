//! Loading a captured envelope buffer from disk.
//!
//! Two layouts are accepted: a single JSON array of envelopes, or JSON lines
//! (one envelope per line). Envelopes that do not decode are skipped and
//! counted; arrival order is preserved for the rest.

use std::path::Path;

use shared_types::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read buffer file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer is not a JSON array: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedBuffer {
    pub envelopes: Vec<Envelope>,
    /// Entries that were present but did not decode as envelopes
    pub skipped: usize,
}

pub fn load_envelopes(path: impl AsRef<Path>) -> Result<LoadedBuffer, ReplayError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let loaded = parse_buffer(&text)?;
    tracing::info!(
        path = %path.display(),
        envelopes = loaded.envelopes.len(),
        skipped = loaded.skipped,
        "Loaded envelope buffer"
    );
    Ok(loaded)
}

pub fn parse_buffer(text: &str) -> Result<LoadedBuffer, ReplayError> {
    if text.trim_start().starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(text)?;
        Ok(decode_values(values.into_iter().enumerate()))
    } else {
        Ok(parse_lines(text))
    }
}

fn decode_values(values: impl Iterator<Item = (usize, serde_json::Value)>) -> LoadedBuffer {
    let mut loaded = LoadedBuffer::default();
    for (position, value) in values {
        match serde_json::from_value::<Envelope>(value) {
            Ok(envelope) => loaded.envelopes.push(envelope),
            Err(e) => {
                tracing::warn!(position, error = %e, "Skipping undecodable envelope");
                loaded.skipped += 1;
            }
        }
    }
    loaded
}

fn parse_lines(text: &str) -> LoadedBuffer {
    let mut loaded = LoadedBuffer::default();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => loaded.envelopes.push(envelope),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping malformed buffer line");
                loaded.skipped += 1;
            }
        }
    }
    loaded
}
