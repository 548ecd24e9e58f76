//! Reading packets and configuration from disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use offerchain_core::{PacketInput, ReconcileConfig};

/// Configuration from `path`, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ReconcileConfig> {
    let Some(path) = path else {
        return Ok(ReconcileConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    ReconcileConfig::from_json_str(&json).with_context(|| format!("loading config {}", path.display()))
}

pub fn load_packet(path: &Path) -> anyhow::Result<PacketInput> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading packet {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing packet {}", path.display()))
}

/// `*.json` files directly inside `dir`, sorted by name.
pub fn packet_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
