use crate::infra::{parse_verdict, CaseStore, InMemoryCaseRepository};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tenant_credit::config::StorageConfig;
use tenant_credit::error::AppError;
use tenant_credit::workflows::credit::{
    CaseStep, CaseWorkflow, JsonReplyExtractor, PlainTextReportRenderer, ScoringConfig, Verdict,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Verdict recorded at the end of the walkthrough.
    #[arg(long, value_parser = parse_verdict, default_value = "APPROVED")]
    pub(crate) verdict: Verdict,
    /// Append the finalized case to this CSV ledger instead of memory.
    #[arg(long)]
    pub(crate) ledger: Option<PathBuf>,
    /// Use the two-factor weighting (bureau 0.3 / financial 0.7).
    #[arg(long)]
    pub(crate) two_factor: bool,
}

/// Replies in the shape a document-reading model returns for each step.
const DEMO_REPLIES: [(CaseStep, &str); 4] = [
    (
        CaseStep::Corporate,
        r#"```json
{"client_name": "Acme Comercio de Alimentos Ltda", "tax_id": "12.345.678/0001-90",
 "registered_address": "Av. Paulista, 1000 - Sao Paulo", "incorporation_date": "2014-03-02",
 "share_capital": "R$ 500.000,00", "legal_representatives": ["Maria Souza", "Joao Lima"]}
```"#,
    ),
    (
        CaseStep::Proposal,
        r#"{"property": "Store 14, Central Mall", "monthly_rent": "R$ 12.500,00",
 "lease_term": "60 months", "guarantee": "Bank guarantee (6 months)"}"#,
    ),
    (
        CaseStep::CreditBureau,
        r#"Extracted data:
{"bureau_score": "812", "risk_level": "Low", "restrictions": "None"}"#,
    ),
    (
        CaseStep::Financials,
        r#"{"fiscal_years": ["2022", "2023", "2024"],
 "gross_revenue": ["4.100.000,00", "4.800.000,00", "5.250.000,00"],
 "net_income": ["480.000,00", "610.000,00", "702.500,00"],
 "financial_rating": 78, "guarantee_rating": 85,
 "executive_summary": "Consistent revenue growth; rent is 2.9% of monthly revenue."}"#,
    ),
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        verdict,
        ledger,
        two_factor,
    } = args;

    let store = match ledger {
        Some(path) => CaseStore::from_config(&StorageConfig {
            ledger_path: Some(path),
        }),
        None => CaseStore::Memory(InMemoryCaseRepository::default()),
    };
    let scoring = if two_factor {
        ScoringConfig::two_factor()
    } else {
        ScoringConfig::three_factor()
    };

    println!("Tenant credit desk demo");
    println!("Storage: {}", store.describe());

    let mut workflow = CaseWorkflow::new(
        Arc::new(JsonReplyExtractor),
        Arc::new(store),
        Arc::new(PlainTextReportRenderer::default()),
        scoring,
    );
    workflow.start_or_resume_case();

    for (step, reply) in DEMO_REPLIES {
        println!("\n[{}]", step.label());
        let summary = workflow.request_extraction(step, vec![reply.as_bytes().to_vec()])?;
        println!("- fields captured: {}", summary.written.join(", "));
        if !summary.kept.is_empty() {
            println!("- fields kept from earlier steps: {}", summary.kept.join(", "));
        }
        workflow.advance()?;
    }

    let score = workflow.compute_score();
    println!("\nProbability of approval: {}", score.summary());
    for component in &score.components {
        println!(
            "  - {}: {:.1} x {:.2} = {:.1} ({})",
            component.input.label(),
            component.normalized,
            component.weight,
            component.contribution,
            component.notes
        );
    }

    let case = workflow.finalize(verdict, "Demo walkthrough: figures match audited statements.")?;
    println!(
        "\nFinalized {} as {} at {}",
        case.client,
        case.verdict.label(),
        case.recorded_at_label()
    );

    let report = workflow.render_finalized(&case)?;
    println!("\n{}", String::from_utf8_lossy(&report));

    let summary = workflow.portfolio_summary()?;
    println!(
        "Portfolio: {} cases | {} approved | {} rejected | {} under review",
        summary.total, summary.approved, summary.rejected, summary.under_review
    );

    Ok(())
}
