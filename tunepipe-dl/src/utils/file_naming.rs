//! Artifact naming under `downloads/`
//!
//! Names are `<sanitized title>-<job uuid>.mp3`, so two jobs never share a
//! path even for identical titles. In-flight output lives in a hidden
//! `.<uuid>.part` staging file next to it.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest sanitized title, in UTF-8 bytes
///
/// Leaves room for `-<uuid>.mp3` and `.part` variants inside the common
/// 255-byte file name limit.
const MAX_TITLE_BYTES: usize = 200;

const FALLBACK_TITLE: &str = "track";

/// Make a track title safe to use as a file name component
///
/// Path separators, reserved and control characters become `_`, whitespace
/// runs collapse to one space, leading dots and surrounding spaces are
/// trimmed, and the result is capped at `MAX_TITLE_BYTES` on a char
/// boundary.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = false;

    for c in title.chars() {
        let mapped = match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c if c.is_whitespace() => ' ',
            c => c,
        };
        if mapped == ' ' {
            if last_was_space {
                continue;
            }
            last_was_space = true;
        } else {
            last_was_space = false;
        }
        out.push(mapped);
    }

    let trimmed = truncate_to_bytes(out.trim().trim_start_matches('.').trim(), MAX_TITLE_BYTES)
        .trim_end()
        .to_string();

    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Final artifact location for a job
pub fn artifact_path(downloads_dir: &Path, title: &str, job_id: Uuid) -> PathBuf {
    downloads_dir.join(format!("{}-{}.mp3", sanitize_title(title), job_id))
}

/// Staging location used while a job is writing
pub fn staging_path(downloads_dir: &Path, job_id: Uuid) -> PathBuf {
    downloads_dir.join(format!(".{}.part", job_id))
}

/// Name offered to clients in `Content-Disposition`
///
/// Strips the `-<uuid>` suffix from an artifact name produced by
/// `artifact_path`; other names pass through sanitized.
pub fn download_filename(artifact: &Path, job_id: Uuid) -> String {
    let stem = artifact
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(FALLBACK_TITLE);
    let suffix = format!("-{}", job_id);
    let title = stem.strip_suffix(&suffix).unwrap_or(stem);
    format!("{}.mp3", sanitize_title(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_title_unchanged() {
        assert_eq!(sanitize_title("Blueming"), "Blueming");
        assert_eq!(sanitize_title("Eine kleine Nachtmusik (K. 525)"), "Eine kleine Nachtmusik (K. 525)");
    }

    #[test]
    fn test_path_unsafe_characters_replaced() {
        assert_eq!(sanitize_title("AC/DC: Back\\In*Black?"), "AC_DC_ Back_In_Black_");
        assert_eq!(sanitize_title("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_title("line\nbreak\ttab"), "line_break_tab");
    }

    #[test]
    fn test_whitespace_and_dots_trimmed() {
        assert_eq!(sanitize_title("   spaced    out  "), "spaced out");
        assert_eq!(sanitize_title("...hidden"), "hidden");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(sanitize_title(""), "track");
        assert_eq!(sanitize_title("  ..  "), "track");
    }

    #[test]
    fn test_length_capped_on_char_boundary() {
        // 3-byte chars: 200 is not a multiple of 3
        let sanitized = sanitize_title(&"가".repeat(500));
        assert_eq!(sanitized.len(), 198);
        assert!(sanitized.chars().all(|c| c == '가'));

        let ascii = sanitize_title(&"a".repeat(500));
        assert_eq!(ascii.len(), MAX_TITLE_BYTES);
    }

    #[test]
    fn test_multibyte_artifact_name_fits_filesystem_limit() {
        let id = Uuid::new_v4();
        for title in ["가".repeat(100), "日本語のタイトル".repeat(40), "🎵".repeat(90)] {
            let path = artifact_path(Path::new("/data/downloads"), &title, id);
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.len() <= 255, "{} bytes", name.len());
            assert!(name.ends_with(&format!("-{}.mp3", id)));
            assert_eq!(download_filename(&path, id), format!("{}.mp3", sanitize_title(&title)));
        }
    }

    #[test]
    fn test_long_title_renames_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let staged = staging_path(dir.path(), id);
        std::fs::write(&staged, b"audio").unwrap();

        let artifact = artifact_path(dir.path(), &"가".repeat(100), id);
        std::fs::rename(&staged, &artifact).unwrap();
        assert_eq!(std::fs::read(&artifact).unwrap(), b"audio");
    }

    #[test]
    fn test_same_title_distinct_jobs_distinct_paths() {
        let dir = Path::new("/data/downloads");
        let a = artifact_path(dir, "Same Song", Uuid::new_v4());
        let b = artifact_path(dir, "Same Song", Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with(dir));
    }

    #[test]
    fn test_staging_is_hidden() {
        let id = Uuid::new_v4();
        let path = staging_path(Path::new("downloads"), id);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with('.'));
        assert!(name.ends_with(".part"));
    }

    #[test]
    fn test_download_filename_strips_uuid() {
        let id = Uuid::new_v4();
        let path = artifact_path(Path::new("downloads"), "Blueming", id);
        assert_eq!(download_filename(&path, id), "Blueming.mp3");
        assert_eq!(download_filename(Path::new("downloads/other.mp3"), id), "other.mp3");
    }
}
