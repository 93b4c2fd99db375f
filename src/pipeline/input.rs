//! Input resolution: normalise a user-supplied path or URL to deck bytes.
//!
//! Decks are small enough to hold in memory, and the ZIP reader works over
//! any `Read + Seek`, so both local files and downloads end up as one owned
//! buffer. The ZIP magic (`PK\x03\x04`) is checked here so a wrong file type
//! is reported as such rather than as a corrupt container.

use crate::error::EbookError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// ZIP local file header signature; every PPTX starts with it.
pub const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// A deck loaded into memory.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// Display name: the file name for local paths, the last URL segment for downloads.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load `input` (a local path or an HTTP/HTTPS URL) and validate it.
pub async fn load_input(
    input: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<LoadedInput, EbookError> {
    let loaded = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        load_local(input).await?
    };
    check_bytes(&loaded.name, &loaded.bytes, max_bytes)?;
    Ok(loaded)
}

/// Validate size and ZIP magic of an in-memory deck.
pub fn check_bytes(name: &str, bytes: &[u8], max_bytes: u64) -> Result<(), EbookError> {
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(EbookError::InputTooLarge {
            name: name.to_string(),
            size,
            limit: max_bytes,
        });
    }

    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    if magic != ZIP_MAGIC {
        return Err(EbookError::NotAPresentation {
            name: name.to_string(),
            magic,
        });
    }
    Ok(())
}

async fn load_local(path_str: &str) -> Result<LoadedInput, EbookError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(EbookError::FileNotFound { path });
    }

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(EbookError::PermissionDenied { path });
        }
        Err(_) => return Err(EbookError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local deck: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedInput { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedInput, EbookError> {
    info!("Downloading deck from: {}", url);

    let parsed = reqwest::Url::parse(url).map_err(|_| EbookError::InvalidInput {
        input: url.to_string(),
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EbookError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            EbookError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            EbookError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(parsed.clone()).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(EbookError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?.to_vec();
    let name = extract_filename(&parsed);

    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(LoadedInput { name, bytes })
}

/// Last non-empty path segment with an extension, or `downloaded.pptx`.
fn extract_filename(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty() && last.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| "downloaded.pptx".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/deck.pptx"));
        assert!(is_url("http://example.com/deck.pptx"));
        assert!(!is_url("/tmp/deck.pptx"));
        assert!(!is_url("deck.pptx"));
        assert!(!is_url(""));
    }

    #[test]
    fn extract_filename_from_url_path() {
        let u = reqwest::Url::parse("https://example.com/talks/keynote.pptx?dl=1").unwrap();
        assert_eq!(extract_filename(&u), "keynote.pptx");
        let u = reqwest::Url::parse("https://example.com/talks/").unwrap();
        assert_eq!(extract_filename(&u), "downloaded.pptx");
    }

    #[test]
    fn check_bytes_rejects_non_zip() {
        let err = check_bytes("notes.pdf", b"%PDF-1.7 ...", 1024).unwrap_err();
        match err {
            EbookError::NotAPresentation { name, magic } => {
                assert_eq!(name, "notes.pdf");
                assert_eq!(&magic, b"%PDF");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn check_bytes_rejects_short_and_oversized_input() {
        assert!(matches!(
            check_bytes("tiny", b"PK", 1024),
            Err(EbookError::NotAPresentation { .. })
        ));
        assert!(matches!(
            check_bytes("big", b"PK\x03\x04 plus more", 8),
            Err(EbookError::InputTooLarge { limit: 8, .. })
        ));
        assert!(check_bytes("ok", b"PK\x03\x04rest", 1024).is_ok());
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = load_input("/definitely/not/here.pptx", 5, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, EbookError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, b"PK\x03\x04payload").unwrap();
        let loaded = load_input(path.to_str().unwrap(), 5, 1024).await.unwrap();
        assert_eq!(loaded.name, "deck.pptx");
        assert_eq!(loaded.bytes.len(), 11);
    }
}
