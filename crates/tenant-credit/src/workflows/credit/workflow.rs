use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use super::extraction::{DocumentExtractor, ExtractionError, ExtractionRequest};
use super::history::{self, HistoryFilter, PortfolioSummary};
use super::record::{CaseField, CaseRecord, MergeSummary, PartialRecord};
use super::report::{RenderError, ReportRenderer};
use super::repository::{CaseRepository, FinalizedCase, PersistenceError, Verdict};
use super::scoring::{ScoreCalculator, ScoreResult, ScoringConfig};
use super::sequencer::{CaseStep, SequenceError, StepSequencer, StepTransition};

/// Fields from earlier steps handed to the accounting audit as hints.
const FINANCIALS_CONTEXT: [CaseField; 2] = [CaseField::MonthlyRent, CaseField::Guarantee];

/// Live state of the case the operator is working on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseSession {
    record: CaseRecord,
    sequencer: StepSequencer,
}

impl CaseSession {
    pub fn record(&self) -> &CaseRecord {
        &self.record
    }

    pub fn step(&self) -> CaseStep {
        self.sequencer.current()
    }

    fn reset(&mut self) -> CaseStep {
        self.record.clear();
        self.sequencer.reset()
    }
}

/// Serializable snapshot of a live case.
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    pub step: CaseStep,
    pub step_label: &'static str,
    pub expected_fields: Vec<&'static str>,
    pub record: CaseRecord,
    pub score: ScoreResult,
}

/// Orchestrates one operator's case: extraction, manual edits, step
/// navigation, scoring, finalization and reporting.
pub struct CaseWorkflow<E, R, P> {
    extractor: Arc<E>,
    repository: Arc<R>,
    renderer: Arc<P>,
    calculator: ScoreCalculator,
    session: Option<CaseSession>,
}

impl<E, R, P> CaseWorkflow<E, R, P>
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    pub fn new(
        extractor: Arc<E>,
        repository: Arc<R>,
        renderer: Arc<P>,
        scoring: ScoringConfig,
    ) -> Self {
        Self {
            extractor,
            repository,
            renderer,
            calculator: ScoreCalculator::new(scoring),
            session: None,
        }
    }

    /// Ensure a live case exists, keeping any work already in progress.
    pub fn start_or_resume_case(&mut self) -> &CaseSession {
        if self.session.is_none() {
            tracing::info!("credit case started");
        }
        self.session_mut()
    }

    pub fn session(&self) -> Option<&CaseSession> {
        self.session.as_ref()
    }

    pub fn current_step(&self) -> CaseStep {
        self.session
            .as_ref()
            .map_or_else(CaseStep::first, CaseSession::step)
    }

    pub fn record(&self) -> CaseRecord {
        self.session
            .as_ref()
            .map(|session| session.record.clone())
            .unwrap_or_default()
    }

    pub fn view(&self) -> CaseView {
        let step = self.current_step();
        let record = self.record();
        CaseView {
            step,
            step_label: step.label(),
            expected_fields: step.field_schema().into_iter().map(CaseField::key).collect(),
            score: self.calculator.score(&record),
            record,
        }
    }

    /// Run the extractor for `step` and merge what it finds.
    ///
    /// On failure the record and step are left untouched.
    pub fn request_extraction(
        &mut self,
        step: CaseStep,
        documents: Vec<Vec<u8>>,
    ) -> Result<MergeSummary, CaseWorkflowError> {
        let session = self.session_mut();
        let request = ExtractionRequest::new(step, documents)
            .with_context(extraction_context(step, &session.record));
        let document_count = request.documents.len();

        let extracted = match self.extractor.extract(&request) {
            Ok(extracted) => extracted,
            Err(error) => {
                tracing::warn!(
                    step = step.label(),
                    documents = document_count,
                    error = %error,
                    "document extraction failed"
                );
                return Err(error.into());
            }
        };

        let summary = self.session_mut().record.merge(&extracted);
        tracing::info!(
            step = step.label(),
            documents = document_count,
            written = summary.written.len(),
            kept = summary.kept.len(),
            "extraction merged into case"
        );
        Ok(summary)
    }

    pub fn apply_manual_edit(&mut self, fields: &PartialRecord) -> MergeSummary {
        let summary = self.session_mut().record.merge(fields);
        tracing::info!(
            written = summary.written.len(),
            kept = summary.kept.len(),
            "manual edit merged into case"
        );
        summary
    }

    pub fn advance(&mut self) -> Result<CaseStep, CaseWorkflowError> {
        self.transition(StepTransition::Advance)
    }

    pub fn retreat(&mut self) -> Result<CaseStep, CaseWorkflowError> {
        self.transition(StepTransition::Retreat)
    }

    /// Discard the record and return to the first step.
    pub fn reset(&mut self) -> CaseStep {
        let step = self.session_mut().reset();
        tracing::info!("credit case reset");
        step
    }

    pub fn compute_score(&self) -> ScoreResult {
        match &self.session {
            Some(session) => self.calculator.score(&session.record),
            None => self.calculator.score(&CaseRecord::new()),
        }
    }

    pub fn finalize(
        &mut self,
        verdict: Verdict,
        justification: &str,
    ) -> Result<FinalizedCase, CaseWorkflowError> {
        self.finalize_at(verdict, justification, Local::now().naive_local())
    }

    /// Snapshot the case, append it to the repository, then reset.
    ///
    /// Only allowed at [`CaseStep::Decision`]. A persistence failure leaves the
    /// live record and step exactly as they were.
    pub fn finalize_at(
        &mut self,
        verdict: Verdict,
        justification: &str,
        recorded_at: NaiveDateTime,
    ) -> Result<FinalizedCase, CaseWorkflowError> {
        let current = self.current_step();
        if current != CaseStep::Decision {
            return Err(CaseWorkflowError::NotAtDecision { current });
        }

        let case = FinalizedCase::new(self.record(), verdict, justification, recorded_at);
        if let Err(error) = self.repository.append(case.clone()) {
            tracing::warn!(client = %case.client, error = %error, "finalize failed; case kept");
            return Err(error.into());
        }

        tracing::info!(
            client = %case.client,
            verdict = verdict.label(),
            recorded_at = %case.recorded_at_label(),
            "credit case finalized"
        );
        self.session_mut().reset();
        Ok(case)
    }

    pub fn render_report(
        &self,
        record: &CaseRecord,
        verdict: Verdict,
        justification: &str,
    ) -> Result<Vec<u8>, CaseWorkflowError> {
        Ok(self.renderer.render(record, verdict, justification)?)
    }

    /// Render the live record as a draft with the given verdict.
    pub fn render_live_report(
        &self,
        verdict: Verdict,
        justification: &str,
    ) -> Result<Vec<u8>, CaseWorkflowError> {
        self.render_report(&self.record(), verdict, justification)
    }

    pub fn render_finalized(&self, case: &FinalizedCase) -> Result<Vec<u8>, CaseWorkflowError> {
        Ok(self.renderer.render_finalized(case)?)
    }

    pub fn history(&self, filter: &HistoryFilter) -> Result<Vec<FinalizedCase>, CaseWorkflowError> {
        Ok(filter.apply(self.repository.list()?))
    }

    pub fn portfolio_summary(&self) -> Result<PortfolioSummary, CaseWorkflowError> {
        Ok(PortfolioSummary::from_cases(&self.repository.list()?))
    }

    pub fn find_case(
        &self,
        client: &str,
        recorded_at: NaiveDateTime,
    ) -> Result<Option<FinalizedCase>, CaseWorkflowError> {
        let cases = self.repository.list()?;
        Ok(history::find_case(&cases, client, recorded_at).cloned())
    }

    fn transition(&mut self, transition: StepTransition) -> Result<CaseStep, CaseWorkflowError> {
        let session = self.session_mut();
        let from = session.step();
        let to = session.sequencer.apply(transition)?;
        tracing::info!(from = from.label(), to = to.label(), "case step changed");
        Ok(to)
    }

    fn session_mut(&mut self) -> &mut CaseSession {
        self.session.get_or_insert_with(CaseSession::default)
    }
}

fn extraction_context(step: CaseStep, record: &CaseRecord) -> PartialRecord {
    if step != CaseStep::Financials {
        return PartialRecord::new();
    }

    FINANCIALS_CONTEXT
        .into_iter()
        .filter_map(|field| {
            record
                .field(field)
                .map(|value| (field.key().to_string(), value.clone()))
        })
        .collect()
}

/// Error raised by [`CaseWorkflow`] operations.
#[derive(Debug, thiserror::Error)]
pub enum CaseWorkflowError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("verdicts are recorded at the decision step (case is at {})", .current.label())]
    NotAtDecision { current: CaseStep },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
