use std::sync::Arc;

use super::common::*;
use crate::workflows::credit::extraction::{ExtractionError, JsonReplyExtractor};
use crate::workflows::credit::history::HistoryFilter;
use crate::workflows::credit::record::{CaseField, CaseRecord, FieldValue, PartialRecord};
use crate::workflows::credit::repository::{PersistenceError, Verdict};
use crate::workflows::credit::sequencer::{CaseStep, SequenceError};
use crate::workflows::credit::workflow::CaseWorkflowError;

#[test]
fn extraction_merges_fields_and_passes_financial_context() {
    let extractor = ScriptedExtractor::default()
        .reply(CaseStep::Proposal, proposal_fields())
        .reply(CaseStep::Financials, financial_fields());
    let mut workflow = workflow_with(Arc::new(extractor.clone()), Arc::new(MemoryLedger::default()));
    workflow.start_or_resume_case();

    let summary = workflow
        .request_extraction(CaseStep::Proposal, vec![document("proposal.pdf")])
        .expect("proposal extraction");
    assert!(summary.written.contains(&"monthly_rent".to_string()));

    workflow
        .request_extraction(CaseStep::Financials, vec![document("dre-2024.pdf")])
        .expect("financial extraction");

    let requests = extractor.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].context.is_empty());
    let context = &requests[1].context;
    assert_eq!(
        context.get("monthly_rent"),
        Some(&FieldValue::text("R$ 12.500,00"))
    );
    assert_eq!(context.get("guarantee"), Some(&FieldValue::text("Bank guarantee")));
    assert_eq!(requests[1].field_schema, CaseStep::Financials.field_schema());

    let record = workflow.record();
    assert_eq!(record.series(CaseField::FiscalYears), vec!["2023", "2024"]);
}

#[test]
fn failed_extraction_leaves_record_and_step_untouched() {
    let mut workflow =
        workflow_with(Arc::new(FailingExtractor), Arc::new(MemoryLedger::default()));
    workflow.start_or_resume_case();
    workflow.apply_manual_edit(&corporate_fields());
    workflow.advance().expect("advance to proposal");
    let before = workflow.record();

    let outcome = workflow.request_extraction(CaseStep::Proposal, vec![document("scan")]);

    assert!(matches!(
        outcome,
        Err(CaseWorkflowError::Extraction(ExtractionError::Unavailable(_)))
    ));
    assert_eq!(workflow.record(), before);
    assert_eq!(workflow.current_step(), CaseStep::Proposal);
}

#[test]
fn json_replies_populate_the_record() {
    let mut workflow = workflow_with(
        Arc::new(JsonReplyExtractor),
        Arc::new(MemoryLedger::default()),
    );

    workflow
        .request_extraction(
            CaseStep::CreditBureau,
            vec![document(
                "```json\n{\"bureau_score\": \"1.000\", \"risk_level\": \"Very low\", \"restrictions\": null}\n```",
            )],
        )
        .expect("bureau reply parses");

    let record = workflow.record();
    assert_eq!(record.number(CaseField::BureauScore).value(), Some(1000.0));
    assert_eq!(record.text(CaseField::Restrictions), None);
    assert_eq!(workflow.compute_score().components[0].normalized, 100.0);
}

#[test]
fn sequencer_bounds_are_enforced() {
    let mut workflow =
        workflow_with(Arc::new(FailingExtractor), Arc::new(MemoryLedger::default()));
    workflow.start_or_resume_case();

    assert!(matches!(
        workflow.retreat(),
        Err(CaseWorkflowError::Sequence(SequenceError::AtFirstStep(
            CaseStep::Corporate
        )))
    ));
    assert_eq!(workflow.current_step(), CaseStep::Corporate);

    for _ in 0..4 {
        workflow.advance().expect("advance");
    }
    assert!(matches!(
        workflow.advance(),
        Err(CaseWorkflowError::Sequence(SequenceError::AtFinalStep(
            CaseStep::Decision
        )))
    ));
    assert_eq!(workflow.current_step(), CaseStep::Decision);

    assert_eq!(workflow.retreat().expect("retreat"), CaseStep::Financials);
}

#[test]
fn reset_discards_the_record() {
    let mut workflow =
        workflow_with(Arc::new(FailingExtractor), Arc::new(MemoryLedger::default()));
    walk_to_decision(&mut workflow);

    assert_eq!(workflow.reset(), CaseStep::Corporate);
    assert!(workflow.record().is_empty());
    assert_eq!(workflow.current_step(), CaseStep::Corporate);
}

#[test]
fn finalize_requires_the_decision_step() {
    let ledger = MemoryLedger::default();
    let mut workflow = workflow_with(Arc::new(FailingExtractor), Arc::new(ledger.clone()));
    workflow.start_or_resume_case();
    workflow.apply_manual_edit(&corporate_fields());

    match workflow.finalize(Verdict::Approved, "too early") {
        Err(CaseWorkflowError::NotAtDecision { current }) => {
            assert_eq!(current, CaseStep::Corporate);
        }
        other => panic!("expected not-at-decision error, got {other:?}"),
    }
    assert!(ledger.cases().is_empty());
    assert_eq!(
        workflow.record().client_name().as_deref(),
        Some("Acme Comercio Ltda")
    );
}

#[test]
fn finalize_appends_snapshot_then_resets() {
    let ledger = MemoryLedger::default();
    let mut workflow = workflow_with(Arc::new(FailingExtractor), Arc::new(ledger.clone()));
    walk_to_decision(&mut workflow);
    let snapshot = workflow.record();

    let case = workflow
        .finalize_at(Verdict::Approved, "Strong cash position", recorded_at())
        .expect("finalize succeeds");

    assert_eq!(case.client, "Acme Comercio Ltda");
    assert_eq!(case.verdict, Verdict::Approved);
    assert_eq!(case.record, snapshot);
    assert_eq!(ledger.cases(), vec![case]);

    assert_eq!(workflow.current_step(), CaseStep::Corporate);
    assert!(workflow.record().is_empty());
}

#[test]
fn failed_finalize_keeps_state() {
    let mut workflow = workflow_with(Arc::new(FailingExtractor), Arc::new(UnavailableLedger));
    walk_to_decision(&mut workflow);
    let before = workflow.record();

    let outcome = workflow.finalize(Verdict::Rejected, "insufficient guarantee");

    assert!(matches!(
        outcome,
        Err(CaseWorkflowError::Persistence(PersistenceError::Unavailable(_)))
    ));
    assert_eq!(workflow.current_step(), CaseStep::Decision);
    assert_eq!(workflow.record(), before);
}

#[test]
fn finalized_cases_replay_without_live_state() {
    let ledger = MemoryLedger::default();
    let mut workflow = workflow_with(Arc::new(FailingExtractor), Arc::new(ledger.clone()));
    walk_to_decision(&mut workflow);
    workflow
        .finalize_at(Verdict::UnderReview, "Awaiting audited 2024 statements", recorded_at())
        .expect("finalize succeeds");

    let archive = workflow_with(Arc::new(FailingExtractor), Arc::new(ledger));
    let case = archive
        .find_case("Acme Comercio Ltda", recorded_at())
        .expect("history readable")
        .expect("case found");
    let report = String::from_utf8(archive.render_finalized(&case).expect("report renders"))
        .expect("utf8 report");

    assert!(report.contains("Acme Comercio Ltda"));
    assert!(report.contains("VERDICT: UNDER_REVIEW"));
    assert!(report.contains("Awaiting audited 2024 statements"));
    assert!(report.contains("R$ 12,500.00"));
    assert!(report.contains("R$ 5,250,000.00"));
}

#[test]
fn history_and_summary_read_through_the_repository() {
    let ledger = MemoryLedger::default();
    let mut workflow = workflow_with(Arc::new(FailingExtractor), Arc::new(ledger));

    for (client, verdict) in [
        ("Acme Comercio Ltda", Verdict::Approved),
        ("Borealis Foods SA", Verdict::Rejected),
    ] {
        walk_to_decision(&mut workflow);
        workflow.apply_manual_edit(&PartialRecord::new().with(CaseField::ClientName, client));
        workflow.finalize(verdict, "reviewed").expect("finalize succeeds");
    }

    let rejected = workflow
        .history(&HistoryFilter::default().verdict(Verdict::Rejected))
        .expect("history readable");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].client, "Borealis Foods SA");

    let summary = workflow.portfolio_summary().expect("summary readable");
    assert_eq!(summary.total, 2);
    assert_eq!(summary.approved, 1);
    assert_eq!(summary.rejected, 1);
}

#[test]
fn live_report_renders_draft_verdict() {
    let mut workflow =
        workflow_with(Arc::new(FailingExtractor), Arc::new(MemoryLedger::default()));
    walk_to_decision(&mut workflow);

    let report = String::from_utf8(
        workflow
            .render_live_report(Verdict::Approved, "draft")
            .expect("report renders"),
    )
    .expect("utf8 report");

    assert!(report.contains("CLIENT: Acme Comercio Ltda"));
    assert!(report.contains("Score: 820 | Risk: Low"));
    assert_eq!(workflow.current_step(), CaseStep::Decision);

    let empty = workflow
        .render_report(&CaseRecord::new(), Verdict::Rejected, "")
        .expect("empty record renders");
    assert!(!empty.is_empty());
}
