use chrono::NaiveDateTime;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tenant_credit::config::StorageConfig;
use tenant_credit::workflows::credit::{
    parse_recorded_at, CaseDesk, CaseRepository, CsvCaseLedger, FinalizedCase, JsonReplyExtractor,
    PersistenceError, PlainTextReportRenderer, ScoringConfig, ScoringPreset, Verdict,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ServiceDesk = CaseDesk<JsonReplyExtractor, CaseStore, PlainTextReportRenderer>;

pub(crate) fn build_desk(store: CaseStore, scoring: ScoringConfig) -> ServiceDesk {
    CaseDesk::new(
        Arc::new(JsonReplyExtractor),
        Arc::new(store),
        Arc::new(PlainTextReportRenderer::default()),
        scoring,
    )
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCaseRepository {
    cases: Arc<Mutex<Vec<FinalizedCase>>>,
}

impl CaseRepository for InMemoryCaseRepository {
    fn append(&self, case: FinalizedCase) -> Result<(), PersistenceError> {
        let mut guard = self.cases.lock().expect("repository mutex poisoned");
        guard.push(case);
        Ok(())
    }

    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError> {
        let guard = self.cases.lock().expect("repository mutex poisoned");
        Ok(guard.clone())
    }
}

/// Finalized-case storage selected from `CREDIT_LEDGER_PATH`.
pub(crate) enum CaseStore {
    Ledger(CsvCaseLedger),
    Memory(InMemoryCaseRepository),
}

impl CaseStore {
    pub(crate) fn from_config(storage: &StorageConfig) -> Self {
        match &storage.ledger_path {
            Some(path) => Self::Ledger(CsvCaseLedger::new(path.clone())),
            None => Self::Memory(InMemoryCaseRepository::default()),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ledger(ledger) => format!("CSV ledger at {}", ledger.path().display()),
            Self::Memory(_) => "in-memory store (cases are lost on exit)".to_string(),
        }
    }
}

impl CaseRepository for CaseStore {
    fn append(&self, case: FinalizedCase) -> Result<(), PersistenceError> {
        match self {
            Self::Ledger(ledger) => ledger.append(case),
            Self::Memory(memory) => memory.append(case),
        }
    }

    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError> {
        match self {
            Self::Ledger(ledger) => ledger.list(),
            Self::Memory(memory) => memory.list(),
        }
    }
}

pub(crate) fn parse_verdict(raw: &str) -> Result<Verdict, String> {
    Verdict::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not one of APPROVED, REJECTED, UNDER_REVIEW"))
}

pub(crate) fn parse_preset(raw: &str) -> Result<ScoringPreset, String> {
    ScoringPreset::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not a scoring preset (three_factor, two_factor)"))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    parse_recorded_at(raw)
        .ok_or_else(|| format!("failed to parse '{raw}' as YYYY-MM-DD HH:MM:SS"))
}
