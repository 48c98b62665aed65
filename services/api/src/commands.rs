use crate::infra::{parse_preset, parse_timestamp, parse_verdict, CaseStore};
use chrono::NaiveDateTime;
use clap::Args;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tenant_credit::config::{AppConfig, StorageConfig};
use tenant_credit::error::AppError;
use tenant_credit::workflows::credit::{
    CaseRecord, CaseWorkflow, HistoryFilter, JsonReplyExtractor, PartialRecord,
    PlainTextReportRenderer, ScoreCalculator, ScoringPreset, Verdict,
};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON object holding the case fields (e.g. bureau_score, financial_rating)
    pub(crate) record: PathBuf,
    /// Weighting preset; defaults to the configured scoring policy
    #[arg(long, value_parser = parse_preset)]
    pub(crate) preset: Option<ScoringPreset>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct LedgerArgs {
    /// CSV ledger to read; defaults to CREDIT_LEDGER_PATH
    #[arg(long)]
    pub(crate) ledger: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryListArgs {
    /// Case-insensitive fragment of the client name
    #[arg(long)]
    pub(crate) client: Option<String>,
    /// Only show cases with this verdict
    #[arg(long, value_parser = parse_verdict)]
    pub(crate) verdict: Option<Verdict>,
    #[command(flatten)]
    pub(crate) ledger: LedgerArgs,
}

#[derive(Args, Debug)]
pub(crate) struct HistoryReportArgs {
    /// Client name exactly as recorded
    #[arg(long)]
    pub(crate) client: String,
    /// Timestamp of the finalized case (YYYY-MM-DD HH:MM:SS)
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) recorded_at: NaiveDateTime,
    #[command(flatten)]
    pub(crate) ledger: LedgerArgs,
}

type ArchiveWorkflow = CaseWorkflow<JsonReplyExtractor, CaseStore, PlainTextReportRenderer>;

fn archive(args: LedgerArgs) -> Result<ArchiveWorkflow, AppError> {
    let config = AppConfig::load()?;
    let storage = StorageConfig {
        ledger_path: args.ledger.or(config.storage.ledger_path),
    };
    if storage.ledger_path.is_none() {
        println!("No ledger configured; set CREDIT_LEDGER_PATH or pass --ledger.");
    }

    Ok(CaseWorkflow::new(
        Arc::new(JsonReplyExtractor),
        Arc::new(CaseStore::from_config(&storage)),
        Arc::new(PlainTextReportRenderer::default()),
        config.scoring,
    ))
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let scoring = match args.preset {
        Some(preset) => preset.config(),
        None => AppConfig::load()?.scoring,
    };

    let raw = std::fs::read_to_string(&args.record)?;
    let record = CaseRecord::from_updates(&parse_record(&raw)?);
    let result = ScoreCalculator::new(scoring).score(&record);

    println!(
        "{}: probability {}",
        record.client_name().unwrap_or_else(|| "Unnamed client".to_string()),
        result.summary()
    );
    for component in &result.components {
        let marker = if component.defaulted { " [default]" } else { "" };
        println!(
            "  - {}: {:.1} x {:.2} = {:.1}{}",
            component.input.label(),
            component.normalized,
            component.weight,
            component.contribution,
            marker
        );
    }
    Ok(())
}

fn parse_record(raw: &str) -> Result<PartialRecord, AppError> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(object)) => Ok(PartialRecord::from_json_object(object)),
        Ok(_) => Err(invalid_record("expected a JSON object of case fields")),
        Err(err) => Err(invalid_record(&err.to_string())),
    }
}

fn invalid_record(reason: &str) -> AppError {
    AppError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("case record file is not usable: {reason}"),
    ))
}

pub(crate) fn run_history_list(args: HistoryListArgs) -> Result<(), AppError> {
    let HistoryListArgs {
        client,
        verdict,
        ledger,
    } = args;
    let filter = HistoryFilter {
        client_contains: client,
        verdict,
    };

    let cases = archive(ledger)?.history(&filter)?;
    if cases.is_empty() {
        println!("No finalized cases match.");
        return Ok(());
    }

    println!("{:<19}  {:<12}  CLIENT", "RECORDED AT", "VERDICT");
    for case in &cases {
        println!(
            "{:<19}  {:<12}  {}",
            case.recorded_at_label(),
            case.verdict.label(),
            case.client
        );
    }
    Ok(())
}

pub(crate) fn run_history_summary(args: LedgerArgs) -> Result<(), AppError> {
    let summary = archive(args)?.portfolio_summary()?;

    println!("Finalized cases: {}", summary.total);
    println!(
        "- approved {} | rejected {} | under review {}",
        summary.approved, summary.rejected, summary.under_review
    );
    if let Some(rate) = summary.approval_rate() {
        println!("- approval rate {:.0}%", rate * 100.0);
    }
    if !summary.per_day.is_empty() {
        println!("Cases per day:");
        for (day, count) in &summary.per_day {
            println!("  {day}: {count}");
        }
    }
    Ok(())
}

pub(crate) fn run_history_report(args: HistoryReportArgs) -> Result<(), AppError> {
    let HistoryReportArgs {
        client,
        recorded_at,
        ledger,
    } = args;

    let archive = archive(ledger)?;
    match archive.find_case(&client, recorded_at)? {
        Some(case) => {
            let report = archive.render_finalized(&case)?;
            println!("{}", String::from_utf8_lossy(&report));
        }
        None => println!("No finalized case for {client} at {recorded_at}."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_files_must_hold_objects() {
        let record = parse_record(r#"{"bureau_score": "750", "financial_rating": 64}"#)
            .expect("object parses");
        assert_eq!(record.len(), 2);

        assert!(matches!(parse_record("[1, 2]"), Err(AppError::Io(_))));
        assert!(matches!(parse_record("{"), Err(AppError::Io(_))));
    }
}
