//! Path utilities for detecting convertible files and naming converted output.
//!
//! Output names follow a single rule: the longest known source extension that
//! matches the end of the name (ASCII case-insensitive) is replaced with the
//! target extension. When nothing matches, the target extension is appended.

use std::path::Path;

/// HEIF container extensions produced by phones and cameras.
const HEIF_EXTENSIONS: &[&str] = &["heic", "heif"];

/// Source extensions stripped from output names by default.
const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["heic", "heif", "png", "webp", "avif"];

/// Default extension of converted files.
pub const DEFAULT_TARGET_EXTENSION: &str = "jpg";

/// Derive the output file name for a converted source.
///
/// # Examples
///
/// ```
/// use heicforge_common::paths::derive_output_name;
///
/// let known = ["heic", "heif", "png"];
/// assert_eq!(derive_output_name("IMG_0001.HEIC", &known, "jpg"), "IMG_0001.jpg");
/// assert_eq!(derive_output_name("scan.png", &known, "jpg"), "scan.jpg");
/// assert_eq!(derive_output_name("notes.txt", &known, "jpg"), "notes.txt.jpg");
/// ```
pub fn derive_output_name<S: AsRef<str>>(name: &str, known: &[S], target: &str) -> String {
    let target = target.trim_start_matches('.');

    let stem_len = known
        .iter()
        .map(|ext| ext.as_ref().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .filter_map(|ext| matched_stem_len(name, ext))
        .min();

    match stem_len {
        Some(len) => format!("{}.{}", &name[..len], target),
        None => format!("{}.{}", name, target),
    }
}

/// Length of the stem when `name` ends with `.ext`, ignoring ASCII case.
///
/// A bare extension (`.heic`) has no stem and does not match.
fn matched_stem_len(name: &str, ext: &str) -> Option<usize> {
    let suffix_len = ext.len() + 1;
    if name.len() <= suffix_len {
        return None;
    }
    let split = name.len() - suffix_len;
    if !name.is_char_boundary(split) {
        return None;
    }
    let suffix = &name[split..];
    (suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext)).then_some(split)
}

/// Check if a path's extension is one of `extensions` (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use heicforge_common::paths::has_extension;
///
/// assert!(has_extension(Path::new("/tmp/IMG_0001.HEIC"), &["heic"]));
/// assert!(!has_extension(Path::new("/tmp/IMG_0001.jpg"), &["heic"]));
/// ```
pub fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|e| e.as_ref().trim_start_matches('.').eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Check if the final path component is a dotfile.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Get the HEIF container extensions.
#[must_use]
pub fn heif_extensions() -> &'static [&'static str] {
    HEIF_EXTENSIONS
}

/// Get the source extensions stripped from output names by default.
#[must_use]
pub fn default_source_extensions() -> &'static [&'static str] {
    DEFAULT_SOURCE_EXTENSIONS
}
