use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::workflows::credit::extraction::{DocumentExtractor, ExtractionError, ExtractionRequest};
use crate::workflows::credit::record::{CaseField, FieldValue, PartialRecord};
use crate::workflows::credit::report::PlainTextReportRenderer;
use crate::workflows::credit::repository::{CaseRepository, FinalizedCase, PersistenceError};
use crate::workflows::credit::scoring::ScoringConfig;
use crate::workflows::credit::sequencer::CaseStep;
use crate::workflows::credit::workflow::CaseWorkflow;

pub(super) fn recorded_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 18)
        .and_then(|date| date.and_hms_opt(14, 5, 30))
        .expect("valid timestamp")
}

pub(super) fn corporate_fields() -> PartialRecord {
    PartialRecord::new()
        .with(CaseField::ClientName, "Acme Comercio Ltda")
        .with(CaseField::TaxId, "12.345.678/0001-90")
        .with(CaseField::ShareCapital, "R$ 500.000,00")
}

pub(super) fn proposal_fields() -> PartialRecord {
    PartialRecord::new()
        .with(CaseField::Property, "Store 14, Central Mall")
        .with(CaseField::MonthlyRent, "R$ 12.500,00")
        .with(CaseField::Guarantee, "Bank guarantee")
}

pub(super) fn bureau_fields() -> PartialRecord {
    PartialRecord::new()
        .with(CaseField::BureauScore, "820")
        .with(CaseField::RiskLevel, "Low")
        .with(CaseField::Restrictions, "None")
}

pub(super) fn financial_fields() -> PartialRecord {
    PartialRecord::new()
        .with(CaseField::FiscalYears, FieldValue::series(["2023", "2024"]))
        .with(
            CaseField::GrossRevenue,
            FieldValue::series(["4.800.000,00", "5.250.000,00"]),
        )
        .with(
            CaseField::NetIncome,
            FieldValue::series(["610.000,00", "702.500,00"]),
        )
        .with(CaseField::FinancialRating, 78.0)
        .with(CaseField::GuaranteeRating, 90.0)
        .with(CaseField::ExecutiveSummary, "Growing revenue, low leverage.")
}

pub(super) type TestWorkflow<E, R> = CaseWorkflow<E, R, PlainTextReportRenderer>;

pub(super) fn workflow_with<E, R>(extractor: Arc<E>, repository: Arc<R>) -> TestWorkflow<E, R>
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
{
    CaseWorkflow::new(
        extractor,
        repository,
        Arc::new(PlainTextReportRenderer::default()),
        ScoringConfig::three_factor(),
    )
}

/// Fill every step by manual edit and stop at the decision step.
pub(super) fn walk_to_decision<E, R>(workflow: &mut TestWorkflow<E, R>)
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
{
    workflow.start_or_resume_case();
    for fields in [
        corporate_fields(),
        proposal_fields(),
        bureau_fields(),
        financial_fields(),
    ] {
        workflow.apply_manual_edit(&fields);
        workflow.advance().expect("advance through the case");
    }
    assert_eq!(workflow.current_step(), CaseStep::Decision);
}

#[derive(Default, Clone)]
pub(super) struct MemoryLedger {
    cases: Arc<Mutex<Vec<FinalizedCase>>>,
}

impl MemoryLedger {
    pub(super) fn cases(&self) -> Vec<FinalizedCase> {
        self.cases.lock().expect("ledger mutex poisoned").clone()
    }
}

impl CaseRepository for MemoryLedger {
    fn append(&self, case: FinalizedCase) -> Result<(), PersistenceError> {
        self.cases.lock().expect("ledger mutex poisoned").push(case);
        Ok(())
    }

    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError> {
        Ok(self.cases())
    }
}

pub(super) struct UnavailableLedger;

impl CaseRepository for UnavailableLedger {
    fn append(&self, _case: FinalizedCase) -> Result<(), PersistenceError> {
        Err(PersistenceError::Unavailable("ledger volume offline".to_string()))
    }

    fn list(&self) -> Result<Vec<FinalizedCase>, PersistenceError> {
        Err(PersistenceError::Unavailable("ledger volume offline".to_string()))
    }
}

/// Returns canned fields per step and remembers every request it receives.
#[derive(Default, Clone)]
pub(super) struct ScriptedExtractor {
    replies: HashMap<CaseStep, PartialRecord>,
    requests: Arc<Mutex<Vec<ExtractionRequest>>>,
}

impl ScriptedExtractor {
    pub(super) fn reply(mut self, step: CaseStep, fields: PartialRecord) -> Self {
        self.replies.insert(step, fields);
        self
    }

    pub(super) fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().expect("extractor mutex poisoned").clone()
    }
}

impl DocumentExtractor for ScriptedExtractor {
    fn extract(&self, request: &ExtractionRequest) -> Result<PartialRecord, ExtractionError> {
        self.requests
            .lock()
            .expect("extractor mutex poisoned")
            .push(request.clone());
        self.replies
            .get(&request.step)
            .cloned()
            .ok_or_else(|| ExtractionError::Unavailable(format!("no reply for {:?}", request.step)))
    }
}

pub(super) struct FailingExtractor;

impl DocumentExtractor for FailingExtractor {
    fn extract(&self, _request: &ExtractionRequest) -> Result<PartialRecord, ExtractionError> {
        Err(ExtractionError::Unavailable("model quota exhausted".to_string()))
    }
}

pub(super) fn document(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 body")
}
