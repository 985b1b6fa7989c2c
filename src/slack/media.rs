//! Bounded-concurrency media download with stable-id deduplication.
//!
//! Local filenames are derived from the attachment's display name plus a short
//! hash of its stable upstream file id, never from the fetch URL: the URL
//! embeds an authorization token that rotates between requests, while the file
//! id does not. The same logical file therefore always maps to the same local
//! name, and a file already on disk is skipped without a network call.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use super::{SlackClient, SlackFile};
use crate::config::MediaConfig;

/// Length of the hex suffix appended to derived filenames.
const HASH_SUFFIX_LEN: usize = 12;

/// Cap on the sanitized name portion of a filename.
const MAX_NAME_LEN: usize = 40;

/// Cap on the sanitized extension.
const MAX_EXT_LEN: usize = 10;

/// Fallback name when sanitization leaves nothing.
const FALLBACK_NAME: &str = "media";

/// Terminal state of one attachment. Each attachment makes a single
/// transition out of pending; retries belong to the caller, not this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStatus {
    /// The derived path already existed; no network call was made.
    Skipped,
    /// Fetched and written to disk.
    Downloaded,
    /// Rejected or errored; nothing was written.
    Failed(String),
}

/// Result record for one attachment.
#[derive(Debug, Clone)]
pub struct MediaRecord {
    pub original_name: Option<String>,
    pub file_name: String,
    pub local_path: PathBuf,
    pub mimetype: String,
    pub size: u64,
    pub is_image: bool,
    pub is_video: bool,
    pub status: MediaStatus,
}

impl MediaRecord {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status, MediaStatus::Failed(_))
    }
}

/// Slug a display name into a filesystem-safe `name.ext` form.
///
/// Lowercases, strips everything but ASCII alphanumerics, spaces, and dashes,
/// collapses separators to a single dash, and caps the length. An empty
/// result falls back to `"media"`.
pub fn sanitize_media_name(file_name: &str) -> String {
    let (name, ext) = match file_name.rsplit_once('.') {
        Some((name, ext)) => (name, slug(ext, MAX_EXT_LEN)),
        None => (file_name, String::new()),
    };

    let mut slugged = slug(name, MAX_NAME_LEN);
    if slugged.is_empty() {
        slugged = FALLBACK_NAME.to_string();
    }

    if ext.is_empty() {
        slugged
    } else {
        format!("{}.{}", slugged, ext)
    }
}

fn slug(text: &str, max_len: usize) -> String {
    let mut out = String::new();
    let mut pending_sep = false;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_sep = true;
        }
        // Everything else is dropped without forcing a separator.
    }

    out.truncate(max_len);
    out.trim_end_matches('-').to_string()
}

/// Derive the stable local filename for an attachment.
///
/// The hash source is the stable upstream file id, falling back to the fetch
/// URL only when no id exists.
pub fn derived_file_name(display_name: &str, stable_id: &str, url: &str) -> String {
    let sanitized = sanitize_media_name(display_name);

    let hash_source = if stable_id.is_empty() { url } else { stable_id };
    let digest = Sha256::digest(hash_source.as_bytes());
    let suffix = &hex::encode(digest)[..HASH_SUFFIX_LEN];

    match sanitized.rsplit_once('.') {
        Some((name, ext)) => format!("{}_{}.{}", name, suffix, ext),
        None => format!("{}_{}", sanitized, suffix),
    }
}

/// Write downloaded bytes if they fit the size ceiling.
///
/// Oversized bodies are rejected without touching the destination path.
fn persist_media(bytes: &[u8], path: &Path, max_file_size: u64) -> MediaStatus {
    if bytes.len() as u64 > max_file_size {
        return MediaStatus::Failed(format!(
            "exceeds size limit ({} > {} bytes)",
            bytes.len(),
            max_file_size
        ));
    }
    match std::fs::write(path, bytes) {
        Ok(()) => MediaStatus::Downloaded,
        Err(e) => MediaStatus::Failed(format!("write failed: {}", e)),
    }
}

/// Download all attachments of one message against a fixed-width worker pool.
///
/// Results are collected in completion order, not submission order. A
/// per-file failure is isolated: it is reported in that file's record and
/// never aborts the other in-flight downloads.
pub async fn download_message_media(
    client: &SlackClient,
    files: &[SlackFile],
    media_dir: &Path,
    limits: &MediaConfig,
) -> Vec<MediaRecord> {
    if files.is_empty() {
        return Vec::new();
    }

    if let Err(e) = std::fs::create_dir_all(media_dir) {
        tracing::error!("Failed to create media dir {}: {}", media_dir.display(), e);
        return files
            .iter()
            .map(|f| failure_record(f, media_dir, format!("media dir unavailable: {}", e)))
            .collect();
    }

    let downloads: Vec<_> = files
        .iter()
        .map(|file| download_one(client, file, media_dir, limits))
        .collect();
    let records: Vec<MediaRecord> = stream::iter(downloads)
        .buffer_unordered(limits.max_concurrent_downloads.max(1))
        .collect()
        .await;

    let downloaded = records
        .iter()
        .filter(|r| r.status == MediaStatus::Downloaded)
        .count();
    let skipped = records
        .iter()
        .filter(|r| r.status == MediaStatus::Skipped)
        .count();
    let failed = records.len() - downloaded - skipped;
    tracing::info!(
        downloaded,
        skipped,
        failed,
        "Processed {} attachment(s)",
        records.len()
    );

    records
}

async fn download_one(
    client: &SlackClient,
    file: &SlackFile,
    media_dir: &Path,
    limits: &MediaConfig,
) -> MediaRecord {
    let url = match file.url_private.as_deref() {
        Some(url) => url,
        None => {
            tracing::warn!(
                id = %file.id,
                "Attachment has no private URL, skipping download"
            );
            return failure_record(file, media_dir, "no private download URL".to_string());
        }
    };

    let display_name = file.name.as_deref().unwrap_or_default();
    let file_name = derived_file_name(display_name, &file.id, url);
    let local_path = media_dir.join(&file_name);
    let mimetype = file
        .mimetype
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    // Same stable id means same derived name, so an existing file is the
    // same logical content; skip the network call entirely.
    if let Ok(meta) = std::fs::metadata(&local_path) {
        tracing::info!("Skipping download, file already exists: {}", file_name);
        return MediaRecord {
            original_name: file.name.clone(),
            file_name,
            local_path,
            mimetype: mimetype.clone(),
            size: meta.len(),
            is_image: mimetype.starts_with("image/"),
            is_video: mimetype.starts_with("video/"),
            status: MediaStatus::Skipped,
        };
    }

    let status = match client.download(url).await {
        Ok(bytes) => persist_media(&bytes, &local_path, limits.max_file_size),
        Err(e) => MediaStatus::Failed(format!("download failed: {}", e)),
    };

    let size = match &status {
        MediaStatus::Downloaded => std::fs::metadata(&local_path).map(|m| m.len()).unwrap_or(0),
        _ => 0,
    };

    match &status {
        MediaStatus::Downloaded => {
            tracing::info!("Downloaded: {} ({} bytes)", file_name, size)
        }
        MediaStatus::Failed(reason) => {
            tracing::warn!("Failed to download {}: {}", file_name, reason)
        }
        MediaStatus::Skipped => {}
    }

    MediaRecord {
        original_name: file.name.clone(),
        file_name,
        local_path,
        mimetype: mimetype.clone(),
        size,
        is_image: mimetype.starts_with("image/"),
        is_video: mimetype.starts_with("video/"),
        status,
    }
}

fn failure_record(file: &SlackFile, media_dir: &Path, reason: String) -> MediaRecord {
    let file_name = derived_file_name(
        file.name.as_deref().unwrap_or_default(),
        &file.id,
        file.url_private.as_deref().unwrap_or_default(),
    );
    let mimetype = file
        .mimetype
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    MediaRecord {
        original_name: file.name.clone(),
        local_path: media_dir.join(&file_name),
        file_name,
        is_image: mimetype.starts_with("image/"),
        is_video: mimetype.starts_with("video/"),
        mimetype,
        size: 0,
        status: MediaStatus::Failed(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_name_is_stable_across_url_tokens() {
        let id = "F12345ABCDE";
        let name = "My Cool Image.png";
        let url_a = "https://files.example.com/F12345ABCDE/image.png?token=xoxe-abc123";
        let url_b = "https://files.example.com/F12345ABCDE/image.png?token=xoxe-xyz789";

        assert_eq!(
            derived_file_name(name, id, url_a),
            derived_file_name(name, id, url_b)
        );
    }

    #[test]
    fn url_fallback_differs_when_no_stable_id() {
        let name = "My Cool Image.png";
        let url_a = "https://files.example.com/image.png?token=abc";
        let url_b = "https://files.example.com/image.png?token=xyz";

        assert_ne!(
            derived_file_name(name, "", url_a),
            derived_file_name(name, "", url_b)
        );
    }

    #[test]
    fn distinct_ids_with_same_display_name_differ() {
        let name = "My Cool Image.png";
        assert_ne!(
            derived_file_name(name, "F12345ABCDE", ""),
            derived_file_name(name, "F67890FGHIJ", "")
        );
    }

    #[test]
    fn sanitize_strips_special_characters() {
        assert_eq!(
            sanitize_media_name("My Cool File (Final).mp4"),
            "my-cool-file-final.mp4"
        );
        assert_eq!(
            sanitize_media_name("Screenshot 2025-01-15 @ 3:45 PM.png"),
            "screenshot-2025-01-15-345-pm.png"
        );
        assert_eq!(sanitize_media_name(""), "media");
        assert_eq!(sanitize_media_name("..."), "media");
    }

    #[test]
    fn derived_name_has_hex_suffix_and_no_specials() {
        let derived = derived_file_name("My Cool File (Final).mp4", "F123ABC", "");
        assert!(!derived.contains('('));
        assert!(!derived.contains(')'));
        assert!(!derived.contains(' '));
        assert!(derived.ends_with(".mp4"));

        let stem = derived.trim_end_matches(".mp4");
        let suffix = stem.rsplit('_').next().expect("suffix");
        assert_eq!(suffix.len(), 12);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sanitize_caps_name_length() {
        let long = format!("{}.png", "a".repeat(120));
        let sanitized = sanitize_media_name(&long);
        let (name, ext) = sanitized.rsplit_once('.').expect("extension");
        assert!(name.len() <= 40);
        assert_eq!(ext, "png");
    }

    #[test]
    fn oversized_body_is_rejected_not_written() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("big_ab12cd34ef56.bin");

        // 101 bytes against a 100 byte ceiling, scaled down from the
        // production 100MB limit.
        let status = persist_media(&vec![0u8; 101], &path, 100);
        assert!(matches!(status, MediaStatus::Failed(_)));
        assert!(!path.exists());

        let status = persist_media(&vec![0u8; 100], &path, 100);
        assert_eq!(status, MediaStatus::Downloaded);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn existing_file_is_skipped_without_network() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let media_dir = tmp.path();

        let file = SlackFile {
            id: "F12345ABCDE".to_string(),
            name: Some("demo.gif".to_string()),
            title: None,
            mimetype: Some("image/gif".to_string()),
            url_private: Some("https://files.example.com/demo.gif?token=abc".to_string()),
        };

        let expected = derived_file_name("demo.gif", "F12345ABCDE", "");
        std::fs::write(media_dir.join(&expected), b"gif-bytes").expect("write");

        // The base URL points nowhere; a skip must short-circuit before any
        // network call or this test would fail on connection errors.
        let client = SlackClient::with_base_url("token", "http://127.0.0.1:9");
        let records =
            download_message_media(&client, &[file], media_dir, &MediaConfig::default()).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, MediaStatus::Skipped);
        assert_eq!(records[0].file_name, expected);
        assert_eq!(records[0].size, 9);
        assert!(records[0].is_image);
    }

    #[tokio::test]
    async fn missing_url_reports_failure_without_aborting_siblings() {
        let tmp = tempfile::tempdir().expect("tempdir");

        let no_url = SlackFile {
            id: "F1".to_string(),
            name: Some("locked.png".to_string()),
            title: None,
            mimetype: Some("image/png".to_string()),
            url_private: None,
        };
        let on_disk = SlackFile {
            id: "F2".to_string(),
            name: Some("cached.png".to_string()),
            title: None,
            mimetype: Some("image/png".to_string()),
            url_private: Some("https://files.example.com/cached.png".to_string()),
        };
        std::fs::write(
            tmp.path().join(derived_file_name("cached.png", "F2", "")),
            b"png",
        )
        .expect("write");

        let client = SlackClient::with_base_url("token", "http://127.0.0.1:9");
        let records = download_message_media(
            &client,
            &[no_url, on_disk],
            tmp.path(),
            &MediaConfig::default(),
        )
        .await;

        assert_eq!(records.len(), 2);
        let failed = records
            .iter()
            .find(|r| r.original_name.as_deref() == Some("locked.png"))
            .expect("failure record");
        assert!(matches!(failed.status, MediaStatus::Failed(_)));
        let skipped = records
            .iter()
            .find(|r| r.original_name.as_deref() == Some("cached.png"))
            .expect("skip record");
        assert_eq!(skipped.status, MediaStatus::Skipped);
    }
}
