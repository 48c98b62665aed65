use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::repository::{FinalizedCase, Verdict, TIMESTAMP_FORMAT};

/// Criteria applied when browsing finalized cases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Case-insensitive substring of the client name.
    #[serde(default)]
    pub client_contains: Option<String>,
    #[serde(default)]
    pub verdict: Option<Verdict>,
}

impl HistoryFilter {
    pub fn client(mut self, fragment: impl Into<String>) -> Self {
        self.client_contains = Some(fragment.into());
        self
    }

    pub fn verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    pub fn matches(&self, case: &FinalizedCase) -> bool {
        let client_ok = match self.client_contains.as_deref().map(str::trim) {
            Some(fragment) if !fragment.is_empty() => case
                .client
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            _ => true,
        };
        client_ok && self.verdict.map_or(true, |verdict| case.verdict == verdict)
    }

    pub fn apply(&self, cases: Vec<FinalizedCase>) -> Vec<FinalizedCase> {
        cases.into_iter().filter(|case| self.matches(case)).collect()
    }
}

/// Portfolio-level counts over every finalized case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total: usize,
    pub approved: usize,
    pub rejected: usize,
    pub under_review: usize,
    pub per_day: BTreeMap<NaiveDate, usize>,
}

impl PortfolioSummary {
    pub fn from_cases(cases: &[FinalizedCase]) -> Self {
        let mut summary = Self::default();
        for case in cases {
            summary.total += 1;
            match case.verdict {
                Verdict::Approved => summary.approved += 1,
                Verdict::Rejected => summary.rejected += 1,
                Verdict::UnderReview => summary.under_review += 1,
            }
            *summary.per_day.entry(case.recorded_at.date()).or_default() += 1;
        }
        summary
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::Approved => self.approved,
            Verdict::Rejected => self.rejected,
            Verdict::UnderReview => self.under_review,
        }
    }

    /// Share of approved cases, `None` for an empty portfolio.
    pub fn approval_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.approved as f64 / self.total as f64)
    }
}

/// Locate the case recorded for `client` at `recorded_at` (second precision).
///
/// Two cases finalized for the same client within one second share a key;
/// the latest appended one wins.
pub fn find_case<'a>(
    cases: &'a [FinalizedCase],
    client: &str,
    recorded_at: NaiveDateTime,
) -> Option<&'a FinalizedCase> {
    cases
        .iter()
        .rev()
        .find(|case| case.client == client && case.recorded_at == recorded_at)
}

/// Accepts the ledger layout (`2025-03-14 09:30:05`) or the ISO form used in
/// JSON payloads (`2025-03-14T09:30:05`).
pub fn parse_recorded_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}
