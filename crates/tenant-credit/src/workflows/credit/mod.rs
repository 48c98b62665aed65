//! Guided credit analysis for prospective commercial tenants.
//!
//! A case moves through corporate, proposal, credit bureau and financial steps
//! while extracted or manually entered fields accumulate into one
//! [`CaseRecord`]. At the decision step the operator records a [`Verdict`];
//! the snapshot is appended to a [`CaseRepository`] and can be replayed
//! through a [`ReportRenderer`] at any later time.

pub mod extraction;
pub mod history;
pub mod numeric;
pub mod record;
pub mod report;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod sequencer;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use extraction::{DocumentExtractor, ExtractionError, ExtractionRequest, JsonReplyExtractor};
pub use history::{find_case, parse_recorded_at, HistoryFilter, PortfolioSummary};
pub use numeric::{format_amount, parse_numeric, NumericReading};
pub use record::{merge, CaseField, CaseRecord, FieldValue, MergeSummary, PartialRecord};
pub use report::{PlainTextReportRenderer, RenderError, ReportRenderer};
pub use repository::{
    CaseKey, CaseRepository, CsvCaseLedger, FinalizedCase, PersistenceError, Verdict,
    TIMESTAMP_FORMAT, UNNAMED_CLIENT,
};
pub use router::{
    case_desk_router, CaseDesk, CaseSessionId, DeskError, DEFAULT_SESSION_IDLE_TIMEOUT,
};
pub use scoring::{
    RiskTier, ScoreCalculator, ScoreComponent, ScoreInput, ScoreResult, ScoringConfig,
    ScoringConfigError, ScoringPreset,
};
pub use sequencer::{CaseStep, SequenceError, StepSequencer, StepTransition};
pub use workflow::{CaseSession, CaseView, CaseWorkflow, CaseWorkflowError};
