//! # nav: MkDocs navigation tree parsing and flattening
//!
//! The `nav` section of an MkDocs descriptor is a duck-typed mix of strings,
//! single-key mappings and nested lists. [`parse_nav`] classifies every node
//! once into a [`NavNode`] so that [`flatten_nav`] is a plain depth-first walk.
//!
//! Accepted shapes:
//! - `- path.md` (leaf without label)
//! - `- Label: path.md` (leaf)
//! - `- Label: https://...` or `- Label: !import https://...` (external link, never emitted)
//! - `- Label: [ ...children ]` (group)
//! - `- [ ...items ]` (bare nested list, spliced into its parent)
//!
//! Numeric and boolean labels (`- 2024: notes.md`) are read as titles.
//!
//! Flattened entries are deduplicated on their normalised path, keeping the
//! first occurrence, and each is bound to a [`FileRef`] that records whether it
//! lives in the local docs root or in a registered external repository.

use serde_yaml::Value;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::ScanError;
use crate::repo::RepoRegistry;

/// One node of the navigation tree.
#[derive(Debug, Clone, PartialEq)]
pub enum NavNode {
    Leaf {
        label: Option<String>,
        target: String,
    },
    Link {
        label: Option<String>,
        url: String,
    },
    Group {
        label: String,
        children: Vec<NavNode>,
    },
}

/// A document reference, optionally prefixed by a registered repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// Normalised reference as it appears in the nav; also the report key.
    pub raw: String,
    /// Registered repository the file comes from, if any.
    pub repo: Option<String>,
    /// Path relative to the docs root, or to the repository checkout.
    pub path: String,
}

impl FileRef {
    /// Split `raw` into an optional repository prefix and a relative path.
    ///
    /// A reference matching more than one registered prefix is rejected.
    pub fn resolve(raw: &str, registry: &RepoRegistry) -> Result<Self, ScanError> {
        let matches: Vec<&str> = registry
            .names()
            .filter(|name| {
                raw.strip_prefix(*name)
                    .map(|rest| rest.starts_with('/'))
                    .unwrap_or(false)
            })
            .collect();

        match matches.as_slice() {
            [] => Ok(FileRef {
                raw: raw.to_string(),
                repo: None,
                path: raw.to_string(),
            }),
            [repo] => {
                let path = raw[repo.len() + 1..].trim_start_matches('/').to_string();
                if path.is_empty() {
                    return Err(ScanError::Nav(format!(
                        "reference '{raw}' names repository '{repo}' but no file inside it"
                    )));
                }
                Ok(FileRef {
                    raw: raw.to_string(),
                    repo: Some(repo.to_string()),
                    path,
                })
            }
            many => Err(ScanError::Nav(format!(
                "reference '{raw}' matches several repositories: {}",
                many.join(", ")
            ))),
        }
    }
}

/// A flattened navigation leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct NavEntry {
    pub label: Option<String>,
    pub file_ref: FileRef,
}

/// Strip the fragment, surrounding whitespace and any leading `./`.
pub fn normalize_ref(target: &str) -> String {
    let without_fragment = target.split('#').next().unwrap_or_default().trim();
    let mut normalized = without_fragment;
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest;
    }
    normalized.to_string()
}

/// Parse the raw `nav` value of a site descriptor.
///
/// `null` (or an absent key) is an empty tree. A top-level value that is not a
/// sequence or a mapping is a config error; malformed nodes below it are nav errors.
pub fn parse_nav(value: &Value) -> Result<Vec<NavNode>, ScanError> {
    match untag(value) {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => {
            let mut nodes = Vec::new();
            for item in items {
                nodes.extend(parse_item(item)?);
            }
            Ok(nodes)
        }
        Value::Mapping(_) => parse_item(value),
        other => Err(ScanError::Config(format!(
            "'nav' must be a list or mapping, found {}",
            shape_name(other)
        ))),
    }
}

fn parse_item(value: &Value) -> Result<Vec<NavNode>, ScanError> {
    match untag(value) {
        Value::String(s) => Ok(vec![leaf_or_link(None, s)?]),
        Value::Sequence(items) => {
            let mut nodes = Vec::new();
            for item in items {
                nodes.extend(parse_item(item)?);
            }
            Ok(nodes)
        }
        Value::Mapping(map) => {
            let mut nodes = Vec::with_capacity(map.len());
            for (key, child) in map {
                let label = match untag(key) {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(ScanError::Nav(format!(
                            "nav label must be a string, found {}",
                            shape_name(other)
                        )))
                    }
                };
                nodes.push(parse_entry(label, child)?);
            }
            Ok(nodes)
        }
        other => Err(ScanError::Nav(format!(
            "unrecognised nav node: {}",
            shape_name(other)
        ))),
    }
}

fn parse_entry(label: String, value: &Value) -> Result<NavNode, ScanError> {
    match untag(value) {
        Value::String(s) => leaf_or_link(Some(label), s),
        Value::Sequence(items) => {
            let mut children = Vec::new();
            for item in items {
                children.extend(parse_item(item)?);
            }
            Ok(NavNode::Group { label, children })
        }
        Value::Null => Err(ScanError::Nav(format!(
            "nav entry '{label}' has no target"
        ))),
        other => Err(ScanError::Nav(format!(
            "nav entry '{label}' has unsupported value: {}",
            shape_name(other)
        ))),
    }
}

fn leaf_or_link(label: Option<String>, target: &str) -> Result<NavNode, ScanError> {
    let trimmed = target.trim();
    if let Some(url) = trimmed.strip_prefix("!import") {
        return Ok(NavNode::Link {
            label,
            url: url.trim().to_string(),
        });
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(NavNode::Link {
            label,
            url: trimmed.to_string(),
        });
    }
    let normalized = normalize_ref(trimmed);
    if normalized.is_empty() {
        return Err(ScanError::Nav(format!(
            "nav entry '{}' has an empty target",
            label.as_deref().unwrap_or("<unlabelled>")
        )));
    }
    Ok(NavNode::Leaf {
        label,
        target: normalized,
    })
}

/// Depth-first, sibling-ordered list of leaf references with duplicates removed.
pub fn flatten_nav(nodes: &[NavNode], registry: &RepoRegistry) -> Result<Vec<NavEntry>, ScanError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    walk(nodes, registry, &mut seen, &mut entries)?;
    info!(files = entries.len(), "Flattened navigation tree");
    Ok(entries)
}

fn walk(
    nodes: &[NavNode],
    registry: &RepoRegistry,
    seen: &mut HashSet<String>,
    out: &mut Vec<NavEntry>,
) -> Result<(), ScanError> {
    for node in nodes {
        match node {
            NavNode::Leaf { label, target } => {
                if !seen.insert(target.clone()) {
                    debug!(file = %target, "Skipping duplicate nav entry");
                    continue;
                }
                out.push(NavEntry {
                    label: label.clone(),
                    file_ref: FileRef::resolve(target, registry)?,
                });
            }
            NavNode::Link { url, .. } => {
                debug!(url = %url, "Ignoring external nav link");
            }
            NavNode::Group { children, .. } => walk(children, registry, seen, out)?,
        }
    }
    Ok(())
}

/// Drop application-specific YAML tags (`!ENV`, `!!python/name:...`) and keep the inner value.
pub(crate) fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
