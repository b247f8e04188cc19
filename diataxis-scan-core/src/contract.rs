//! # contract: classification types and the provider seam
//!
//! [`Classifier`] is the single capability every provider backend exposes.
//! The pipeline only ever sees this trait, so tests drive it with the
//! `mockall`-generated [`MockClassifier`].

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScanError;

/// The four Diátaxis quadrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    Tutorial,
    HowTo,
    Explanation,
    Reference,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Tutorial,
        Quadrant::HowTo,
        Quadrant::Explanation,
        Quadrant::Reference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Tutorial => "tutorial",
            Quadrant::HowTo => "how_to",
            Quadrant::Explanation => "explanation",
            Quadrant::Reference => "reference",
        }
    }

    pub fn from_key(key: &str) -> Option<Quadrant> {
        Quadrant::ALL.into_iter().find(|q| q.as_str() == key)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file verdict. Percentages are each 0..=100; their sum is not constrained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub dominant: Quadrant,
    pub tutorial: u8,
    pub how_to: u8,
    pub explanation: u8,
    pub reference: u8,
}

/// Provider-independent knobs forwarded with each request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifyOptions {
    pub temperature: Option<f32>,
}

/// A backend able to classify one prompt.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &'static str;

    /// Send `prompt` to `model` and parse the structured verdict.
    async fn classify(
        &self,
        prompt: &str,
        model: &str,
        options: &ClassifyOptions,
    ) -> Result<ClassificationResult, ScanError>;
}
