//! Content-type sniffing
//!
//! The client's declared type is advisory; the type stored on the record
//! comes from the file's leading bytes. Magic-byte detection first, then a
//! plain-text heuristic, then the generic binary fallback.

use std::path::Path;

use anyhow::Context;
use tokio::io::AsyncReadExt;

/// How much of the file the sniffer reads.
const SNIFF_PREFIX_BYTES: usize = 8192;

/// Detect the content type of a file from its leading bytes.
///
/// Falls back to `text/plain` for non-empty valid UTF-8 without NUL bytes,
/// and `application/octet-stream` for everything else (including empty
/// files).
pub async fn detect_content_type(path: &Path) -> anyhow::Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {} for sniffing", path.display()))?;

    let mut prefix = vec![0u8; SNIFF_PREFIX_BYTES];
    let mut filled = 0;
    loop {
        let n = file
            .read(&mut prefix[filled..])
            .await
            .with_context(|| format!("Failed to read {} for sniffing", path.display()))?;
        if n == 0 {
            break;
        }
        filled += n;
        if filled == prefix.len() {
            break;
        }
    }
    prefix.truncate(filled);

    Ok(sniff_bytes(&prefix))
}

/// Classify a byte prefix. Split out from the IO so it is directly testable.
pub fn sniff_bytes(prefix: &[u8]) -> String {
    if let Some(kind) = infer::get(prefix) {
        return kind.mime_type().to_string();
    }

    if !prefix.is_empty()
        && !prefix.contains(&0)
        && std::str::from_utf8(prefix).is_ok()
    {
        return "text/plain".to_string();
    }

    "application/octet-stream".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_png_magic() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert_eq!(sniff_bytes(png), "image/png");
    }

    #[test]
    fn test_sniff_mp4_ftyp() {
        let mut mp4 = Vec::new();
        mp4.extend_from_slice(&[0x00, 0x00, 0x00, 0x18]);
        mp4.extend_from_slice(b"ftypisom");
        mp4.extend_from_slice(b"\x00\x00\x02\x00isomiso2avc1mp41");
        assert_eq!(sniff_bytes(&mp4), "video/mp4");
    }

    #[test]
    fn test_sniff_utf8_text() {
        assert_eq!(sniff_bytes(b"hello, world\n"), "text/plain");
    }

    #[test]
    fn test_sniff_binary_with_nul_is_octet_stream() {
        assert_eq!(sniff_bytes(b"abc\x00def"), "application/octet-stream");
    }

    #[test]
    fn test_sniff_empty_is_octet_stream() {
        assert_eq!(sniff_bytes(b""), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_detect_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        tokio::fs::write(&path, "plain text contents").await.unwrap();
        assert_eq!(detect_content_type(&path).await.unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_detect_missing_file_errors() {
        let path = Path::new("/nonexistent/sniff-target");
        assert!(detect_content_type(path).await.is_err());
    }
}
