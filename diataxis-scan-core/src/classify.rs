//! High-level pipeline: load content → build prompt → classify → record, one file at a time.
//!
//! [`classify_site`] walks the flattened navigation strictly in order. Every
//! failure below this point (missing file, unusable reply, network trouble) is
//! caught per file, logged and recorded in the [`RunReport`]; nothing here aborts
//! the run. Fatal problems (config, credentials, nav shape) are expected to have
//! been raised by the caller before this is invoked.

use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::SiteConfig;
use crate::content::{load_content, DEFAULT_MAX_CHARS};
use crate::contract::{ClassificationResult, Classifier, ClassifyOptions};
use crate::error::ScanError;
use crate::nav::NavEntry;
use crate::prompt::build_prompt;
use crate::repo::{GitOps, RepoResolver};
use crate::report::{ErrorPolicy, FileOutcome, RunReport};

/// Knobs for a single classification run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Model name; `None` uses the provider default.
    pub model: Option<String>,
    pub options: ClassifyOptions,
    pub max_chars: usize,
    /// Pause between consecutive provider requests.
    pub delay: Duration,
    pub error_policy: ErrorPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            model: None,
            options: ClassifyOptions::default(),
            max_chars: DEFAULT_MAX_CHARS,
            delay: Duration::from_secs(1),
            error_policy: ErrorPolicy::Omit,
        }
    }
}

/// Classify every entry in `entries`, in order.
pub async fn classify_site<G: GitOps>(
    site: &SiteConfig,
    entries: &[NavEntry],
    resolver: &mut RepoResolver<G>,
    classifier: &dyn Classifier,
    settings: &RunSettings,
) -> RunReport {
    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| classifier.default_model().to_string());
    info!(files = entries.len(), model = %model, max_chars = settings.max_chars, "Starting classification run");

    let mut report = RunReport::new(settings.error_policy);
    let mut requests_sent = 0usize;

    for entry in entries {
        let file = entry.file_ref.raw.as_str();
        let span = info_span!("file", file, label = entry.label.as_deref().unwrap_or(""));

        let loaded = span.in_scope(|| {
            load_content(&entry.file_ref, site, &mut *resolver, settings.max_chars)
        });
        let doc = match loaded {
            Ok(doc) => doc,
            Err(e) => {
                span.in_scope(|| warn!(error = %e, "Skipping file"));
                report.record(file, FileOutcome::Failed(e));
                continue;
            }
        };

        if requests_sent > 0 && !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
        requests_sent += 1;

        let outcome = classify_one(classifier, &doc.content, &model, &settings.options)
            .instrument(span.clone())
            .await;
        match outcome {
            Ok(result) => {
                span.in_scope(|| {
                    info!(
                        dominant = %result.dominant,
                        tutorial = result.tutorial,
                        how_to = result.how_to,
                        explanation = result.explanation,
                        reference = result.reference,
                        truncated = doc.truncated,
                        path = %doc.path.display(),
                        "Classified file"
                    )
                });
                report.record(file, FileOutcome::Classified(result));
            }
            Err(e) => {
                span.in_scope(|| error!(error = %e, "Classification failed"));
                report.record(file, FileOutcome::Failed(e));
            }
        }
    }

    report.trace_summary();
    report
}

async fn classify_one(
    classifier: &dyn Classifier,
    content: &str,
    model: &str,
    options: &ClassifyOptions,
) -> Result<ClassificationResult, ScanError> {
    let prompt = build_prompt(content);
    classifier.classify(&prompt, model, options).await
}
