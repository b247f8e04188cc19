#![doc = "diataxis-scan-core: navigation resolution, content gathering and classification pipeline for diataxis-scan."]

//! This crate holds every pipeline component; the `diataxis-scan` crate is CLI glue only.
//!
//! Flow: [`config`] → [`nav`] → [`repo`] (lazily) → [`content`] → [`prompt`] →
//! [`provider`] (via [`contract::Classifier`]) → [`report`], orchestrated by [`classify`].

pub mod classify;
pub mod config;
pub mod content;
pub mod contract;
pub mod error;
pub mod nav;
pub mod prompt;
pub mod provider;
pub mod repo;
pub mod report;

pub use error::ScanError;
