use anyhow::Context;
use rusqlite::Connection;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db;

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "servicedesk-reports-v1";

/// One report view read in full, ready for on-screen display and download.
pub struct ReportTable {
    pub view: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn filename(&self) -> String {
        format!("{}.csv", self.view)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(
            &self
                .columns
                .iter()
                .map(|c| csv_quote(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
        for row in &self.rows {
            out.push_str(
                &row.iter()
                    .map(|c| csv_quote(c))
                    .collect::<Vec<_>>()
                    .join(","),
            );
            out.push('\n');
        }
        out
    }
}

pub fn read_report(conn: &Connection, view: &str) -> anyhow::Result<ReportTable> {
    let table = db::fetch_view(conn, view)?;
    Ok(ReportTable {
        view: view.to_string(),
        columns: table.columns,
        rows: table.rows,
    })
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct BundleSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub entries: Vec<String>,
}

/// Writes both report artifacts into one zip bundle with a checksum
/// manifest, so a full export can travel as a single download.
pub fn write_report_bundle(
    out_path: &Path,
    reports: &[ReportTable],
) -> anyhow::Result<BundleSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let mut entry_names = Vec::with_capacity(reports.len());
    let mut manifest_entries = Vec::with_capacity(reports.len());
    let mut artifacts = Vec::with_capacity(reports.len());
    for report in reports {
        let name = report.filename();
        let csv = report.to_csv();
        let mut hasher = Sha256::new();
        hasher.update(csv.as_bytes());
        manifest_entries.push(json!({
            "name": name,
            "rows": report.rows.len(),
            "sha256": format!("{:x}", hasher.finalize()),
        }));
        entry_names.push(name.clone());
        artifacts.push((name, csv));
    }

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "entries": manifest_entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, csv) in &artifacts {
        zip.start_file(name, opts)
            .with_context(|| format!("failed to start bundle entry {}", name))?;
        zip.write_all(csv.as_bytes())
            .with_context(|| format!("failed to write bundle entry {}", name))?;
    }

    zip.finish().context("failed to finalize report bundle")?;

    Ok(BundleSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 1 + reports.len(),
        entries: entry_names,
    })
}
