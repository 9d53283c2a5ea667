//! ffprobe metadata extraction

use std::path::Path;

use anyhow::Context;
use tokio::process::Command;

/// Run ffprobe against a file and return its format/stream report.
///
/// The report echoes the input path in `format.filename`; that is stripped
/// before the value reaches the record so storage paths never leak to
/// clients.
pub async fn extract_probe(path: &Path, ffprobe_path: &str) -> anyhow::Result<serde_json::Value> {
    let output = Command::new(ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}", ffprobe_path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "ffprobe failed for {}: {}",
            path.display(),
            stderr.trim()
        );
    }

    let mut report: serde_json::Value = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("ffprobe produced invalid JSON for {}", path.display()))?;

    sanitize_probe(&mut report);
    Ok(report)
}

/// Remove the path echo from an ffprobe report.
pub fn sanitize_probe(report: &mut serde_json::Value) {
    if let Some(format) = report.get_mut("format").and_then(|f| f.as_object_mut()) {
        format.remove("filename");
    }
}
