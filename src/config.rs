use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Connection profile pulled from an external secrets file at session open.
/// The store is embedded, so the profile names its location on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionProfile {
    pub database: DatabaseLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseLocation {
    pub path: PathBuf,
}

pub fn load_profile(path: &Path) -> anyhow::Result<ConnectionProfile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secrets file {}", path.to_string_lossy()))?;
    let profile: ConnectionProfile = serde_json::from_str(&text)
        .with_context(|| format!("secrets file {} is not valid JSON", path.to_string_lossy()))?;
    Ok(profile)
}
