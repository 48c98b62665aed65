use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::record::CaseRecord;

/// Timestamp layout used for case keys and the ledger file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Client label stored when the record never captured a client name.
pub const UNNAMED_CLIENT: &str = "N/A";

/// Operator decision recorded at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Approved,
    Rejected,
    UnderReview,
}

impl Verdict {
    pub const ALL: [Self; 3] = [Self::Approved, Self::Rejected, Self::UnderReview];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::UnderReview => "UNDER_REVIEW",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|verdict| verdict.label() == normalized)
    }
}

/// Externally visible identity of a finalized case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseKey {
    pub client: String,
    pub recorded_at: NaiveDateTime,
}

/// Immutable snapshot taken when the operator records a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedCase {
    pub recorded_at: NaiveDateTime,
    pub client: String,
    pub verdict: Verdict,
    pub record: CaseRecord,
    pub justification: String,
}

impl FinalizedCase {
    pub fn new(
        record: CaseRecord,
        verdict: Verdict,
        justification: impl Into<String>,
        recorded_at: NaiveDateTime,
    ) -> Self {
        let client = record
            .client_name()
            .unwrap_or_else(|| UNNAMED_CLIENT.to_string());
        let recorded_at = recorded_at.with_nanosecond(0).unwrap_or(recorded_at);

        Self {
            recorded_at,
            client,
            verdict,
            record,
            justification: justification.into(),
        }
    }

    pub fn key(&self) -> CaseKey {
        CaseKey {
            client: self.client.clone(),
            recorded_at: self.recorded_at,
        }
    }

    pub fn recorded_at_label(&self) -> String {
        self.recorded_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Append-only store of finalized cases shared by every operator session.
///
/// `append` must be atomic per call and durable before returning `Ok`;
/// `list` returns cases in append order.
pub trait CaseRepository: Send + Sync {
    fn append(&self, case: FinalizedCase) -> Result<(), PersistenceError>;
    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("case store unavailable: {0}")]
    Unavailable(String),
    #[error("case ledger io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("case ledger csv failure: {0}")]
    Csv(#[from] csv::Error),
    #[error("case record could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("ledger row {row} is corrupt: {reason}")]
    Corrupt { row: usize, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    recorded_at: String,
    client: String,
    verdict: String,
    record_json: String,
    justification: String,
}

impl LedgerRow {
    fn from_case(case: &FinalizedCase) -> Result<Self, PersistenceError> {
        Ok(Self {
            recorded_at: case.recorded_at_label(),
            client: case.client.clone(),
            verdict: case.verdict.label().to_string(),
            record_json: case.record.to_json()?,
            justification: case.justification.clone(),
        })
    }

    fn into_case(self, row: usize) -> Result<FinalizedCase, PersistenceError> {
        let corrupt = |reason: String| PersistenceError::Corrupt { row, reason };

        let recorded_at = NaiveDateTime::parse_from_str(self.recorded_at.trim(), TIMESTAMP_FORMAT)
            .map_err(|err| corrupt(format!("timestamp '{}': {err}", self.recorded_at)))?;
        let verdict = Verdict::parse(&self.verdict)
            .ok_or_else(|| corrupt(format!("unknown verdict '{}'", self.verdict)))?;
        let record: CaseRecord = serde_json::from_str(&self.record_json)
            .map_err(|err| corrupt(format!("record json: {err}")))?;

        Ok(FinalizedCase {
            recorded_at,
            client: self.client,
            verdict,
            record,
            justification: self.justification,
        })
    }
}

/// CSV-file ledger: one row per finalized case
/// (`recorded_at, client, verdict, record_json, justification`).
#[derive(Debug)]
pub struct CsvCaseLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvCaseLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaseRepository for CsvCaseLedger {
    fn append(&self, case: FinalizedCase) -> Result<(), PersistenceError> {
        let row = LedgerRow::from_case(&case)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PersistenceError::Unavailable("ledger lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(&row)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_data()?;

        tracing::info!(
            client = %case.client,
            verdict = case.verdict.label(),
            path = %self.path.display(),
            "finalized case appended to ledger"
        );
        Ok(())
    }

    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&self.path)?;

        reader
            .deserialize::<LedgerRow>()
            .enumerate()
            .map(|(index, row)| row?.into_case(index + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::credit::record::{CaseField, FieldValue, PartialRecord};
    use chrono::NaiveDate;

    fn timestamp(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .and_then(|date| date.and_hms_milli_opt(hour, 30, 5, 250))
            .expect("valid timestamp")
    }

    fn finalized(client: &str, verdict: Verdict, hour: u32) -> FinalizedCase {
        let record = CaseRecord::from_updates(
            &PartialRecord::new()
                .with(CaseField::ClientName, client)
                .with(CaseField::BureauScore, "1.000")
                .with(CaseField::FiscalYears, FieldValue::series(["2023"])),
        );
        FinalizedCase::new(
            record,
            verdict,
            "Solid, \"long\" history,\nsecond line",
            timestamp(hour),
        )
    }

    #[test]
    fn verdict_labels_parse_back() {
        for verdict in Verdict::ALL {
            assert_eq!(Verdict::parse(verdict.label()), Some(verdict));
        }
        assert_eq!(Verdict::parse("under review"), Some(Verdict::UnderReview));
        assert_eq!(Verdict::parse("maybe"), None);
    }

    #[test]
    fn finalized_case_truncates_to_seconds_and_defaults_client() {
        let case = FinalizedCase::new(CaseRecord::new(), Verdict::Rejected, "", timestamp(9));
        assert_eq!(case.client, UNNAMED_CLIENT);
        assert_eq!(case.recorded_at_label(), "2025-03-14 09:30:05");
        assert_eq!(case.recorded_at.nanosecond(), 0);
    }

    #[test]
    fn ledger_appends_and_lists_in_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ledger = CsvCaseLedger::new(dir.path().join("ledger/cases.csv"));

        assert!(ledger.list().expect("empty ledger lists").is_empty());

        let first = finalized("Acme Ltda", Verdict::Approved, 9);
        let second = finalized("Borealis SA", Verdict::Rejected, 10);
        ledger.append(first.clone()).expect("first append");
        ledger.append(second.clone()).expect("second append");

        let cases = ledger.list().expect("ledger lists");
        assert_eq!(cases, vec![first, second]);
    }

    #[test]
    fn corrupt_rows_surface_as_persistence_errors() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cases.csv");
        std::fs::write(
            &path,
            "recorded_at,client,verdict,record_json,justification\nyesterday,Acme,APPROVED,{},ok\n",
        )
        .expect("write fixture");

        match CsvCaseLedger::new(path).list() {
            Err(PersistenceError::Corrupt { row: 1, reason }) => {
                assert!(reason.contains("timestamp"));
            }
            other => panic!("expected corrupt row error, got {other:?}"),
        }
    }
}
