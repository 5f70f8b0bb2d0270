//! Canonicalization of acquired-file paths.
//!
//! The filename index and every overlay lookup pass through
//! [`normalize_filename`], so a file acquired as
//! `/C:/WINDOWS/SYSTEM32/config/SYSTEM` and requested as
//! `c:\windows\system32\config\system` meet at one key.

/// Normalize a filename to its index key.
///
/// Windows drive-letter paths (either separator, any case, optionally
/// prefixed by a leading separator) canonicalize to lower-case backslash
/// form, with the `sysnative` path segment rewritten to `system32`:
/// 32-bit imaging tools reach native system files through the SysNative
/// alias, but on disk those files live in System32. Paths without a drive
/// letter are already POSIX-style and are returned unchanged,
/// case-sensitive.
pub fn normalize_filename(filename: &str) -> String {
    let trimmed = filename
        .strip_prefix('/')
        .or_else(|| filename.strip_prefix('\\'))
        .unwrap_or(filename);

    if !is_drive_path(trimmed) {
        return filename.to_string();
    }

    let lowered = trimmed.replace('/', "\\").to_lowercase();
    lowered
        .split('\\')
        .map(|segment| {
            if segment == "sysnative" {
                "system32"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// `<letter>:<separator><rest>` with a non-empty rest.
fn is_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() > 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}
