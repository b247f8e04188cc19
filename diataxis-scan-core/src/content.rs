//! Resolve a [`FileRef`] to a file on disk and read it within a character budget.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::SiteConfig;
use crate::error::ScanError;
use crate::nav::FileRef;
use crate::repo::{GitOps, RepoResolver};

pub const DEFAULT_MAX_CHARS: usize = 15_000;

/// Content of one navigation entry, ready for prompting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDoc {
    pub path: PathBuf,
    pub content: String,
    pub truncated: bool,
}

/// Keep at most `max_chars` characters (not bytes) of `content`.
pub fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

/// Absolute path for `file_ref`: the repository checkout for prefixed refs,
/// the site's docs root otherwise.
pub fn resolve_path<G: GitOps>(
    file_ref: &FileRef,
    site: &SiteConfig,
    resolver: &mut RepoResolver<G>,
) -> Result<PathBuf, ScanError> {
    match &file_ref.repo {
        Some(repo) => {
            let checkout = resolver.resolve(repo).map_err(|e| ScanError::MissingFile {
                file_ref: file_ref.raw.clone(),
                message: e.to_string(),
            })?;
            Ok(checkout.join(&file_ref.path))
        }
        None => Ok(site.docs_dir.join(&file_ref.path)),
    }
}

/// Resolve, read and truncate one document.
pub fn load_content<G: GitOps>(
    file_ref: &FileRef,
    site: &SiteConfig,
    resolver: &mut RepoResolver<G>,
    max_chars: usize,
) -> Result<LoadedDoc, ScanError> {
    let path = resolve_path(file_ref, site, resolver)?;
    let raw = fs::read_to_string(&path).map_err(|e| {
        let message = match e.kind() {
            ErrorKind::NotFound => format!("{} does not exist", path.display()),
            _ => format!("cannot read {}: {e}", path.display()),
        };
        warn!(file = %file_ref.raw, path = %path.display(), error = %e, "Could not read file");
        ScanError::MissingFile {
            file_ref: file_ref.raw.clone(),
            message,
        }
    })?;

    let content = truncate_content(&raw, max_chars);
    let truncated = content.len() < raw.len();
    if truncated {
        debug!(file = %file_ref.raw, max_chars, "Truncated file content");
    }
    Ok(LoadedDoc {
        content: content.to_string(),
        path,
        truncated,
    })
}
