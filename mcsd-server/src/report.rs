//! Update Report (§3, §6): the per-source report block, and the aggregated
//! response shape returned by `POST /mcsd/update`.

use std::collections::BTreeMap;

use serde::Serialize;

/// Per-source outcome of one sync attempt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceReport {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SourceReport {
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn record_status(&mut self, status_code: u16) {
        match status_code {
            201 => self.created += 1,
            200 => self.updated += 1,
            204 => self.deleted += 1,
            other => self.push_warning(format!("unexpected response status {other}")),
        }
    }

    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The whole-run report: `directoryKey -> SourceReport` (§6).
pub type RunReport = BTreeMap<String, SourceReport>;
