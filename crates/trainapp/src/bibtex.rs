//! Collecting and merging BibTeX citations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};

/// The framework's own citation file.
#[must_use]
pub fn default_bibtex_files() -> Vec<PathBuf> {
    vec![Path::new(env!("CARGO_MANIFEST_DIR")).join("trainapp.bib")]
}

/// Read `files` and concatenate their entries, keeping only the first
/// entry for each citation key.
pub fn merge_bibtex_files(files: &[PathBuf]) -> Result<String> {
    let mut texts = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(file)
            .map_err(|e| AppError::FileNotFound(format!("{}: {e}", file.display())))?;
        texts.push(text);
    }
    Ok(merge_bibtex(texts.iter().map(String::as_str)))
}

/// Merge BibTeX sources, dropping entries whose key was already emitted.
pub fn merge_bibtex<'a>(sources: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for source in sources {
        for entry in split_entries(source) {
            match entry_key(entry) {
                Some(key) if !seen.insert(key.to_ascii_lowercase()) => {
                    debug!(key, "skipping duplicate citation");
                }
                _ => entries.push(entry.trim()),
            }
        }
    }

    let mut merged = entries.join("\n\n");
    if !merged.is_empty() {
        merged.push('\n');
    }
    merged
}

/// Split a BibTeX source into `@type{...}` or `@type(...)` entries.
///
/// Only the delimiter that opens an entry is counted, so a stray `)` inside
/// a braced entry does not end it.
fn split_entries(source: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find('@') {
        let candidate = &rest[start..];
        let Some(open) = candidate.find(['{', '(']) else {
            break;
        };
        let (opener, closer) = if candidate[open..].starts_with('{') {
            ('{', '}')
        } else {
            ('(', ')')
        };

        let mut depth = 0usize;
        let mut end = None;
        for (i, c) in candidate.char_indices().skip_while(|&(i, _)| i < open) {
            if c == opener {
                depth += 1;
            } else if c == closer {
                depth -= 1;
                if depth == 0 {
                    end = Some(i + c.len_utf8());
                    break;
                }
            }
        }

        match end {
            Some(end) => {
                entries.push(&candidate[..end]);
                rest = &candidate[end..];
            }
            None => {
                entries.push(candidate);
                break;
            }
        }
    }

    entries
}

/// The citation key of an entry (`@article{key, ...}`), if it has one.
fn entry_key(entry: &str) -> Option<&str> {
    let open = entry.find(['{', '('])?;
    let key = entry[open + 1..].split(',').next()?.trim();
    if key.is_empty() || key.contains(['=', '}', ')']) {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FISHER: &str = "@article{fisher1936,\n  title={The Use of Multiple Measurements in {Taxonomic} Problems},\n  year={1936}\n}";

    #[test]
    fn test_split_entries_handles_nested_braces() {
        let source = format!("% comment\n{FISHER}\n\n@misc{{other, note={{x}}}}\n");
        let entries = split_entries(&source);
        assert_eq!(entries.len(), 2);
        assert_eq!(entry_key(entries[0]), Some("fisher1936"));
        assert_eq!(entry_key(entries[1]), Some("other"));
    }

    #[test]
    fn test_split_entries_ignores_other_delimiter() {
        let source = "@article{odd, title={A) note}, year={2001}}\n@misc(paren, note={x})\n";
        let entries = split_entries(source);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("year={2001}}"));
        assert_eq!(entry_key(entries[0]), Some("odd"));
        assert_eq!(entry_key(entries[1]), Some("paren"));

        let merged = merge_bibtex([source, source]);
        assert_eq!(merged.matches("@article{odd").count(), 1);
        assert!(merged.contains("title={A) note}"));
    }

    #[test]
    fn test_merge_drops_duplicate_keys() {
        let merged = merge_bibtex([FISHER, FISHER, "@misc{burn, title={Burn}}"]);
        assert_eq!(merged.matches("fisher1936").count(), 1);
        assert!(merged.contains("@misc{burn"));
    }

    #[test]
    fn test_default_bibtex_file_exists() {
        for file in default_bibtex_files() {
            assert!(file.is_file(), "{} is missing", file.display());
        }
    }
}
