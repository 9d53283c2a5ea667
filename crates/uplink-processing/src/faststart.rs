//! MP4 faststart layout check and rewrite
//!
//! Progressive playback needs the `moov` index box before the `mdat` data
//! box. Files recorded by most encoders put `moov` at the end, so completed
//! MP4-family uploads are scanned and remuxed with
//! `ffmpeg -c copy -movflags +faststart` when the index trails the data.

use std::path::Path;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Content types that get the faststart treatment.
const MP4_FAMILY: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "audio/mp4",
    "audio/x-m4a",
    "video/x-m4v",
];

/// How far into the file the box scan looks. A `moov` box that sits past
/// this window might as well be at the end for playback purposes.
const FASTSTART_SCAN_WINDOW: usize = 8 * 1024 * 1024;

fn is_mp4_family(content_type: &str) -> bool {
    MP4_FAMILY.contains(&content_type.to_lowercase().as_str())
}

/// Whether the file's box layout requires a faststart rewrite.
///
/// True when `moov` is absent from the scan window (missing or at the tail)
/// or appears after `mdat`. Not a full box parser; a marker match inside
/// unrelated data only costs a redundant remux.
pub async fn needs_faststart(path: &Path) -> anyhow::Result<bool> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut window = vec![0u8; FASTSTART_SCAN_WINDOW];
    let mut filled = 0;
    loop {
        let n = file
            .read(&mut window[filled..])
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == window.len() {
            break;
        }
    }
    window.truncate(filled);

    let moov_pos = find_marker(&window, b"moov");
    let mdat_pos = find_marker(&window, b"mdat");

    Ok(match (moov_pos, mdat_pos) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(moov), Some(mdat)) => moov > mdat,
    })
}

fn find_marker(haystack: &[u8], marker: &[u8; 4]) -> Option<usize> {
    haystack.windows(4).position(|w| w == marker)
}

/// Rewrite an MP4-family file so `moov` leads, replacing it in place.
///
/// Returns true when the file was rewritten, false when no rewrite was
/// needed or the type is not in the MP4 family. A missing file is an error;
/// the caller decides whether that fails the upload.
pub async fn ensure_faststart(
    path: &Path,
    content_type: &str,
    ffmpeg_path: &str,
) -> anyhow::Result<bool> {
    if !is_mp4_family(content_type) {
        return Ok(false);
    }

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!("File not found: {}", path.display());
    }

    if !needs_faststart(path).await? {
        return Ok(false);
    }

    let tmp_path = path.with_extension("faststart.tmp");

    let output = Command::new(ffmpeg_path)
        .arg("-y")
        .arg("-i")
        .arg(path)
        .arg("-c")
        .arg("copy")
        .arg("-movflags")
        .arg("+faststart")
        .arg("-f")
        .arg("mp4")
        .arg(&tmp_path)
        .output()
        .await
        .with_context(|| format!("Failed to spawn {}", ffmpeg_path))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let _ = tokio::fs::remove_file(&tmp_path).await;
        anyhow::bail!(
            "ffmpeg faststart remux failed for {}: {}",
            path.display(),
            stderr.trim()
        );
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to replace {} with remuxed file", path.display()))?;

    tracing::info!(path = %path.display(), "Rewrote file with faststart layout");
    Ok(true)
}
