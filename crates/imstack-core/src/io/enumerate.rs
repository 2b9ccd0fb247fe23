use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{LoadError, Result};

/// List the files with the given extension next to or inside `path`,
/// in natural sort order.
///
/// A directory is scanned directly. A file path scans its parent directory,
/// so pointing at `image0001.fits` picks up `image0002.fits` and onward.
/// Subdirectories and hidden files are skipped; the extension must match
/// exactly.
pub fn get_file_names(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let path = expand_home(path);
    let extension = extension.trim_start_matches('.');
    let dir = match path.parent() {
        Some(parent) if path.is_file() && !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ if path.is_file() => PathBuf::from("."),
        _ => path.clone(),
    };
    let not_found = || LoadError::NotFound {
        path: path.clone(),
        extension: extension.to_string(),
    };

    if !dir.is_dir() {
        return Err(not_found());
    }

    let entries = fs::read_dir(&dir).map_err(|e| LoadError::io(&dir, e))?;
    let mut files = matching_files(&dir, entries.map(|e| e.map(|e| e.path())), extension)?;

    if files.is_empty() {
        return Err(not_found());
    }

    // Directory order is not acquisition order; frame2 must precede frame10.
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));

    debug!(count = files.len(), dir = %dir.display(), extension, "Enumerated image files");
    Ok(files)
}

/// Keep regular files with `extension`. A failed entry fails the listing;
/// a partial one would shift every later frame index.
fn matching_files(
    dir: &Path,
    entries: impl IntoIterator<Item = std::io::Result<PathBuf>>,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| LoadError::io(dir, e))?;
        if path.is_file() && matches_extension(&path, extension) {
            files.push(path);
        }
    }
    Ok(files)
}

fn matches_extension(path: &Path, extension: &str) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

/// One run of a natural sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPart<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Split into alternating text and digit runs, always starting with text
/// (possibly empty): `"angle31.fits"` -> `["angle", 31, ".fits"]`.
pub fn natural_key(s: &str) -> Vec<KeyPart<'_>> {
    let mut parts = Vec::new();
    let mut rest = s;
    loop {
        let text_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        parts.push(KeyPart::Text(&rest[..text_end]));
        rest = &rest[text_end..];
        if rest.is_empty() {
            break;
        }
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        parts.push(KeyPart::Number(&rest[..digits_end]));
        rest = &rest[digits_end..];
        if rest.is_empty() {
            break;
        }
    }
    parts
}

/// Compare two strings run by run, digit runs by integer value.
///
/// Strings whose keys are equal (`"a01"` vs `"a1"`) fall back to plain
/// string order so the result is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ka = natural_key(a);
    let kb = natural_key(b);
    for (pa, pb) in ka.iter().zip(kb.iter()) {
        let ord = match (pa, pb) {
            (KeyPart::Text(x), KeyPart::Text(y)) => x.cmp(y),
            (KeyPart::Number(x), KeyPart::Number(y)) => cmp_digits(x, y),
            // Runs alternate from a text start, so positions always agree.
            (KeyPart::Text(_), KeyPart::Number(_)) => Ordering::Less,
            (KeyPart::Number(_), KeyPart::Text(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ka.len().cmp(&kb.len()).then_with(|| a.cmp(b))
}

/// Integer comparison of two ASCII digit runs of any length.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
