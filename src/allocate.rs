//! Storage placement.
//!
//! Stored files are named `<sanitized-stem>__<suffix>.<ext>`, where the
//! suffix is 8 random hex characters (a 2^32 namespace). The original name
//! only contributes a cleaned-up stem, so untrusted names can never escape
//! the storage directory or overwrite each other.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const SUFFIX_LEN: usize = 8;
pub const MAX_STEM_CHARS: usize = 80;
const MAX_ATTEMPTS: usize = 16;
const FALLBACK_STEM: &str = "document";

/// Strips any directory components a client may have sent along with a
/// file name (either separator style).
pub fn base_name(original_name: &str) -> &str {
    original_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_name)
}

/// Keeps alphanumerics, `-`, `_` and spaces; trims; turns spaces into `_`.
pub fn sanitize_stem(stem: &str) -> String {
    let kept: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect();
    let cleaned: String = kept
        .trim()
        .replace(' ', "_")
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();

    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(base_name(name))
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string()
}

/// Picks a destination in `target_dir` that does not exist yet. Does not
/// create the file; callers claim it with an exclusive create.
pub fn allocate(original_name: &str, target_dir: &Path) -> io::Result<PathBuf> {
    allocate_with(original_name, target_dir, random_suffix)
}

/// [`allocate`] with an injectable suffix source.
pub fn allocate_with(
    original_name: &str,
    target_dir: &Path,
    mut next_suffix: impl FnMut() -> String,
) -> io::Result<PathBuf> {
    let name = base_name(original_name);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let stem = sanitize_stem(stem);
    let ext = extension_of(name);

    for _ in 0..MAX_ATTEMPTS {
        let suffix = next_suffix();
        let file_name = match &ext {
            Some(ext) => format!("{}__{}.{}", stem, suffix, ext),
            None => format!("{}__{}", stem, suffix),
        };
        let candidate = target_dir.join(file_name);
        match std::fs::symlink_metadata(&candidate) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(candidate),
            Err(e) => return Err(e),
            Ok(_) => continue,
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "no free storage name for '{}' after {} attempts",
            name, MAX_ATTEMPTS
        ),
    ))
}

/// True for names produced by the allocator, e.g. `bank_statement__0a1b2c3d.pdf`.
pub fn is_managed_name(file_name: &str) -> bool {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => stem,
        _ => file_name,
    };
    match stem.rsplit_once("__") {
        Some((head, suffix)) => {
            !head.is_empty()
                && suffix.len() == SUFFIX_LEN
                && suffix
                    .bytes()
                    .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}
