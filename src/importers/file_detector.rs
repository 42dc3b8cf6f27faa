use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::info;

/// Serialization format of a ledger file
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileType {
    Toml,
    Json,
}

/// Detect the ledger format
///
/// Detection strategy:
/// - `.toml` / `.json` extensions decide directly
/// - Otherwise the content is sniffed: a leading `{` means JSON, a
///   `[transactions]`-style table or `key = value` line means TOML
pub fn detect_file_type<P: AsRef<Path>>(path: P, content: &str) -> Result<FileType> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("toml") => return Ok(FileType::Toml),
        Some("json") => return Ok(FileType::Json),
        _ => {}
    }

    let first_line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'));

    match first_line {
        Some(line) if line.starts_with('{') => {
            info!("Detected JSON ledger by content");
            Ok(FileType::Json)
        }
        Some(line) if line.starts_with('[') || line.contains('=') => {
            info!("Detected TOML ledger by content");
            Ok(FileType::Toml)
        }
        _ => Err(anyhow!(
            "Unable to determine ledger format of {:?}. Supported formats: .toml, .json",
            path
        )),
    }
}
