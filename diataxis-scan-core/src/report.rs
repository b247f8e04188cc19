//! Run report: per-file outcomes in navigation order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::info;

use crate::contract::ClassificationResult;
use crate::error::ScanError;

/// How failed entries appear in the serialized report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Failed entries are left out of the JSON (they are still logged).
    #[default]
    Omit,
    /// Failed entries appear as `{"error": "<message>"}`.
    Mark,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Classified(ClassificationResult),
    Failed(ScanError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    entries: Vec<(String, FileOutcome)>,
    policy: ErrorPolicy,
}

#[derive(Serialize)]
struct ErrorMarker<'a> {
    error: &'a str,
}

impl RunReport {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// Append an outcome; a key already present keeps its first outcome.
    pub fn record(&mut self, file_ref: impl Into<String>, outcome: FileOutcome) {
        let key = file_ref.into();
        if self.entries.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.entries.push((key, outcome));
    }

    pub fn entries(&self) -> &[(String, FileOutcome)] {
        &self.entries
    }

    pub fn get(&self, file_ref: &str) -> Option<&FileOutcome> {
        self.entries
            .iter()
            .find(|(k, _)| k == file_ref)
            .map(|(_, o)| o)
    }

    pub fn classified(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Classified(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.classified()
    }

    pub fn trace_summary(&self) {
        info!(
            processed = self.entries.len(),
            classified = self.classified(),
            failed = self.failed(),
            "Run complete"
        );
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for RunReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, outcome) in &self.entries {
            match (outcome, self.policy) {
                (FileOutcome::Classified(result), _) => map.serialize_entry(key, result)?,
                (FileOutcome::Failed(e), ErrorPolicy::Mark) => map.serialize_entry(
                    key,
                    &ErrorMarker {
                        error: &e.to_string(),
                    },
                )?,
                (FileOutcome::Failed(_), ErrorPolicy::Omit) => {}
            }
        }
        map.end()
    }
}
