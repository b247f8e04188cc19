//! Site descriptor (`mkdocs.yml`) loading.

use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::ScanError;
use crate::nav::{parse_nav, untag, NavNode};
use crate::repo::RepoRegistry;

pub const DEFAULT_DOCS_DIR: &str = "docs";

/// Immutable view of a site descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub config_path: PathBuf,
    /// `docs_dir`, resolved against the descriptor's own directory.
    pub docs_dir: PathBuf,
    pub nav: Vec<NavNode>,
    /// Repositories declared by the multirepo plugin's `nav_repos`.
    pub repos: RepoRegistry,
}

impl SiteConfig {
    pub fn trace_loaded(&self) {
        info!(
            config_path = %self.config_path.display(),
            docs_dir = %self.docs_dir.display(),
            nav_roots = self.nav.len(),
            repos = self.repos.len(),
            "Loaded site config"
        );
        debug!(?self, "Site config loaded (full debug)");
    }
}

/// Read and parse the descriptor at `path`.
pub fn load_site_config<P: AsRef<Path>>(path: P) -> Result<SiteConfig, ScanError> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading site descriptor");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read site descriptor");
        ScanError::Config(format!("failed to read {}: {e}", path_ref.display()))
    })?;

    let site = parse_site_config(&content, path_ref)?;
    site.trace_loaded();
    Ok(site)
}

/// Parse descriptor text; `path` anchors the relative `docs_dir`.
pub fn parse_site_config(content: &str, path: &Path) -> Result<SiteConfig, ScanError> {
    let root: Value = serde_yaml::from_str(content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse site descriptor YAML");
        ScanError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;

    let empty = Mapping::new();
    let map = match untag(&root) {
        Value::Mapping(map) => map,
        Value::Null => &empty,
        _ => {
            return Err(ScanError::Config(format!(
                "{} must contain a mapping at the top level",
                path.display()
            )))
        }
    };

    let docs_dir = match map.get("docs_dir").map(untag) {
        None | Some(Value::Null) => DEFAULT_DOCS_DIR.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(ScanError::Config("'docs_dir' must be a string".to_string())),
    };

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let nav = match map.get("nav") {
        Some(value) => parse_nav(value)?,
        None => Vec::new(),
    };

    let repos = map
        .get("plugins")
        .map(multirepo_registry)
        .unwrap_or_default();

    Ok(SiteConfig {
        config_path: path.to_path_buf(),
        docs_dir: base.join(docs_dir),
        nav,
        repos,
    })
}

/// Collect `nav_repos` from the `multirepo` plugin, whether `plugins` is a list or a mapping.
fn multirepo_registry(plugins: &Value) -> RepoRegistry {
    let settings = match untag(plugins) {
        Value::Sequence(items) => items.iter().find_map(|item| match untag(item) {
            Value::Mapping(m) => m.get("multirepo"),
            _ => None,
        }),
        Value::Mapping(m) => m.get("multirepo"),
        _ => None,
    };

    let mut registry = RepoRegistry::default();
    let Some(Value::Mapping(settings)) = settings.map(untag) else {
        debug!("No multirepo plugin configuration found");
        return registry;
    };
    let Some(Value::Sequence(nav_repos)) = settings.get("nav_repos").map(untag) else {
        debug!("multirepo plugin has no nav_repos entries");
        return registry;
    };

    for repo in nav_repos {
        let field = |key: &str| match repo.get(key).map(untag) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        };
        match (field("name"), field("import_url")) {
            (Some(name), Some(import_url)) => {
                let url = import_url
                    .split('?')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                info!(repo = %name, url = %url, "Registered multirepo repository");
                registry.insert(name.trim_matches('/'), url);
            }
            _ => warn!(entry = ?repo, "Skipping invalid nav_repos entry"),
        }
    }
    registry
}
