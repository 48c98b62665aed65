use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::AppError;

use super::extraction::DocumentExtractor;
use super::history::{parse_recorded_at, HistoryFilter};
use super::record::PartialRecord;
use super::report::ReportRenderer;
use super::repository::{CaseRepository, FinalizedCase, Verdict};
use super::scoring::ScoringConfig;
use super::sequencer::CaseStep;
use super::workflow::{CaseWorkflow, CaseWorkflowError};

/// Identifier of one operator session on the desk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseSessionId(pub String);

impl std::fmt::Display for CaseSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

type SharedWorkflow<E, R, P> = Arc<Mutex<CaseWorkflow<E, R, P>>>;

/// Sessions untouched for this long are dropped when the next one opens.
pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct SessionEntry<E, R, P> {
    workflow: SharedWorkflow<E, R, P>,
    last_used: Instant,
}

/// Registry of live operator sessions sharing one set of collaborators.
///
/// Each session owns an independent [`CaseWorkflow`] behind its own lock, so
/// operators never observe each other's in-progress records.
pub struct CaseDesk<E, R, P> {
    extractor: Arc<E>,
    repository: Arc<R>,
    renderer: Arc<P>,
    scoring: ScoringConfig,
    sessions: Mutex<HashMap<CaseSessionId, SessionEntry<E, R, P>>>,
    sequence: AtomicU64,
    idle_timeout: Duration,
}

impl<E, R, P> CaseDesk<E, R, P>
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
            scoring,
            sessions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn workflow(&self) -> CaseWorkflow<E, R, P> {
        CaseWorkflow::new(
            Arc::clone(&self.extractor),
            Arc::clone(&self.repository),
            Arc::clone(&self.renderer),
            self.scoring.clone(),
        )
    }

    /// Workflow with no live case, used for history and replay.
    pub fn archive(&self) -> CaseWorkflow<E, R, P> {
        self.workflow()
    }

    pub fn open_session(&self) -> Result<(CaseSessionId, SharedWorkflow<E, R, P>), DeskError> {
        let id = CaseSessionId(format!(
            "case-{:06}",
            self.sequence.fetch_add(1, Ordering::Relaxed)
        ));
        let mut workflow = self.workflow();
        workflow.start_or_resume_case();
        let workflow = Arc::new(Mutex::new(workflow));

        let mut sessions = self.sessions.lock().map_err(|_| DeskError::Poisoned)?;
        let evicted = self.evict_idle(&mut sessions);
        sessions.insert(
            id.clone(),
            SessionEntry {
                workflow: Arc::clone(&workflow),
                last_used: Instant::now(),
            },
        );
        tracing::info!(case_id = %id, evicted, "operator session opened");
        Ok((id, workflow))
    }

    /// Drop a session and its live case. Finalized cases are unaffected.
    pub fn close_session(&self, id: &CaseSessionId) -> Result<(), DeskError> {
        self.sessions
            .lock()
            .map_err(|_| DeskError::Poisoned)?
            .remove(id)
            .ok_or_else(|| DeskError::UnknownSession(id.clone()))?;
        tracing::info!(case_id = %id, "operator session closed");
        Ok(())
    }

    /// Drop sessions idle for longer than the configured timeout.
    pub fn evict_idle_sessions(&self) -> Result<usize, DeskError> {
        let mut sessions = self.sessions.lock().map_err(|_| DeskError::Poisoned)?;
        Ok(self.evict_idle(&mut sessions))
    }

    // Sessions with an operation in flight hold a second reference and stay.
    fn evict_idle(&self, sessions: &mut HashMap<CaseSessionId, SessionEntry<E, R, P>>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.last_used.elapsed() < self.idle_timeout || Arc::strong_count(&entry.workflow) > 1
        });
        before - sessions.len()
    }

    /// Run `operation` against the session's workflow under its lock.
    pub fn with_session<T>(
        &self,
        id: &CaseSessionId,
        operation: impl FnOnce(&mut CaseWorkflow<E, R, P>) -> T,
    ) -> Result<T, DeskError> {
        let workflow = {
            let mut sessions = self.sessions.lock().map_err(|_| DeskError::Poisoned)?;
            let entry = sessions
                .get_mut(id)
                .ok_or_else(|| DeskError::UnknownSession(id.clone()))?;
            entry.last_used = Instant::now();
            Arc::clone(&entry.workflow)
        };
        let mut guard = workflow.lock().map_err(|_| DeskError::Poisoned)?;
        Ok(operation(&mut *guard))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("unknown case session '{0}'")]
    UnknownSession(CaseSessionId),
    #[error("case session state is unavailable")]
    Poisoned,
}

/// Router builder exposing the case desk over HTTP.
pub fn case_desk_router<E, R, P>(desk: Arc<CaseDesk<E, R, P>>) -> Router
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    Router::new()
        .route("/api/v1/cases", post(open_handler::<E, R, P>))
        .route(
            "/api/v1/cases/:case_id",
            get(view_handler::<E, R, P>).delete(close_handler::<E, R, P>),
        )
        .route(
            "/api/v1/cases/:case_id/extractions",
            post(extraction_handler::<E, R, P>),
        )
        .route("/api/v1/cases/:case_id/fields", post(fields_handler::<E, R, P>))
        .route("/api/v1/cases/:case_id/advance", post(advance_handler::<E, R, P>))
        .route("/api/v1/cases/:case_id/retreat", post(retreat_handler::<E, R, P>))
        .route("/api/v1/cases/:case_id/reset", post(reset_handler::<E, R, P>))
        .route("/api/v1/cases/:case_id/score", get(score_handler::<E, R, P>))
        .route(
            "/api/v1/cases/:case_id/finalize",
            post(finalize_handler::<E, R, P>),
        )
        .route("/api/v1/cases/:case_id/report", post(report_handler::<E, R, P>))
        .route("/api/v1/history", get(history_handler::<E, R, P>))
        .route("/api/v1/history/summary", get(summary_handler::<E, R, P>))
        .route("/api/v1/history/report", get(replay_handler::<E, R, P>))
        .with_state(desk)
}

#[derive(Debug, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub step: Option<String>,
    pub documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FieldsPayload {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct VerdictPayload {
    pub verdict: String,
    #[serde(default)]
    pub justification: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub verdict: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplayQuery {
    pub client: String,
    pub recorded_at: String,
}

#[derive(Debug, Serialize)]
struct FinalizedView<'a> {
    client: &'a str,
    recorded_at: String,
    verdict: Verdict,
    justification: &'a str,
}

impl<'a> From<&'a FinalizedCase> for FinalizedView<'a> {
    fn from(case: &'a FinalizedCase) -> Self {
        Self {
            client: &case.client,
            recorded_at: case.recorded_at_label(),
            verdict: case.verdict,
            justification: &case.justification,
        }
    }
}

pub(crate) async fn open_handler<E, R, P>(State(desk): State<Arc<CaseDesk<E, R, P>>>) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let opened = desk.open_session().and_then(|(id, _)| {
        let view = desk.with_session(&id, |workflow| workflow.view())?;
        Ok((id, view))
    });

    match opened {
        Ok((id, view)) => {
            let payload = json!({ "case_id": id, "case": view });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn view_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let id = CaseSessionId(case_id);
    match desk.with_session(&id, |workflow| workflow.view()) {
        Ok(view) => (StatusCode::OK, Json(json!({ "case_id": id, "case": view }))).into_response(),
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn close_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    match desk.close_session(&CaseSessionId(case_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn extraction_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
    Json(payload): Json<ExtractionPayload>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let requested_step = match payload.step.as_deref().map(CaseStep::from_key) {
        Some(None) => {
            return bad_request(format!(
                "unknown step '{}'",
                payload.step.unwrap_or_default()
            ))
        }
        Some(Some(step)) => Some(step),
        None => None,
    };
    let documents = payload
        .documents
        .into_iter()
        .map(String::into_bytes)
        .collect::<Vec<_>>();

    let id = CaseSessionId(case_id);
    let outcome = desk.with_session(&id, |workflow| {
        let step = requested_step.unwrap_or_else(|| workflow.current_step());
        workflow
            .request_extraction(step, documents)
            .map(|summary| (summary, workflow.view()))
    });

    match outcome {
        Ok(Ok((summary, view))) => {
            let payload = json!({ "merge": summary, "case": view });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(error)) => workflow_error_response(error),
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn fields_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
    Json(payload): Json<FieldsPayload>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let fields = PartialRecord::from_json_object(payload.fields);
    let id = CaseSessionId(case_id);
    match desk.with_session(&id, |workflow| {
        let summary = workflow.apply_manual_edit(&fields);
        (summary, workflow.view())
    }) {
        Ok((summary, view)) => {
            let payload = json!({ "merge": summary, "case": view });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn advance_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    step_response(desk.with_session(&CaseSessionId(case_id), |workflow| {
        workflow.advance()
    }))
}

pub(crate) async fn retreat_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    step_response(desk.with_session(&CaseSessionId(case_id), |workflow| {
        workflow.retreat()
    }))
}

pub(crate) async fn reset_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    step_response(desk.with_session(&CaseSessionId(case_id), |workflow| {
        Ok(workflow.reset())
    }))
}

pub(crate) async fn score_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    match desk.with_session(&CaseSessionId(case_id), |workflow| workflow.compute_score()) {
        Ok(score) => (StatusCode::OK, Json(score)).into_response(),
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn finalize_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
    Json(payload): Json<VerdictPayload>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let Some(verdict) = Verdict::parse(&payload.verdict) else {
        return bad_request(format!("unknown verdict '{}'", payload.verdict));
    };

    let id = CaseSessionId(case_id);
    let outcome = run_blocking(move || {
        desk.with_session(&id, |workflow| {
            workflow.finalize(verdict, &payload.justification)
        })
    })
    .await;

    match outcome {
        Err(response) => response,
        Ok(Ok(Ok(case))) => {
            (StatusCode::CREATED, Json(FinalizedView::from(&case))).into_response()
        }
        Ok(Ok(Err(error))) => workflow_error_response(error),
        Ok(Err(error)) => desk_error_response(error),
    }
}

pub(crate) async fn report_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Path(case_id): Path<String>,
    Json(payload): Json<VerdictPayload>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let Some(verdict) = Verdict::parse(&payload.verdict) else {
        return bad_request(format!("unknown verdict '{}'", payload.verdict));
    };

    match desk.with_session(&CaseSessionId(case_id), |workflow| {
        workflow.render_live_report(verdict, &payload.justification)
    }) {
        Ok(Ok(bytes)) => text_response(bytes),
        Ok(Err(error)) => workflow_error_response(error),
        Err(error) => desk_error_response(error),
    }
}

pub(crate) async fn history_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Query(query): Query<HistoryQuery>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let mut filter = HistoryFilter {
        client_contains: query.client,
        verdict: None,
    };
    if let Some(raw) = query.verdict.as_deref().filter(|raw| !raw.trim().is_empty()) {
        match Verdict::parse(raw) {
            Some(verdict) => filter.verdict = Some(verdict),
            None => return bad_request(format!("unknown verdict '{raw}'")),
        }
    }

    match run_blocking(move || desk.archive().history(&filter)).await {
        Err(response) => response,
        Ok(Ok(cases)) => {
            let views: Vec<FinalizedView<'_>> = cases.iter().map(FinalizedView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Ok(Err(error)) => workflow_error_response(error),
    }
}

pub(crate) async fn summary_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    match run_blocking(move || desk.archive().portfolio_summary()).await {
        Err(response) => response,
        Ok(Ok(summary)) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Err(error)) => workflow_error_response(error),
    }
}

pub(crate) async fn replay_handler<E, R, P>(
    State(desk): State<Arc<CaseDesk<E, R, P>>>,
    Query(query): Query<ReplayQuery>,
) -> Response
where
    E: DocumentExtractor + 'static,
    R: CaseRepository + 'static,
    P: ReportRenderer + 'static,
{
    let Some(recorded_at) = parse_recorded_at(&query.recorded_at) else {
        return bad_request(format!("invalid timestamp '{}'", query.recorded_at));
    };

    let client = query.client.clone();
    let replayed = run_blocking(move || {
        let archive = desk.archive();
        archive
            .find_case(&client, recorded_at)
            .and_then(|found| found.map(|case| archive.render_finalized(&case)).transpose())
    })
    .await;

    match replayed {
        Err(response) => response,
        Ok(Ok(Some(bytes))) => text_response(bytes),
        Ok(Ok(None)) => {
            let payload = json!({
                "error": "finalized case not found",
                "client": query.client,
                "recorded_at": query.recorded_at,
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Ok(Err(error)) => workflow_error_response(error),
    }
}

/// Run repository-bound work (ledger appends and reads) off the async workers.
async fn run_blocking<T, F>(job: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|error| {
        tracing::error!(error = %error, "case desk task failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "case desk task failed" })),
        )
            .into_response()
    })
}

fn step_response(outcome: Result<Result<CaseStep, CaseWorkflowError>, DeskError>) -> Response {
    match outcome {
        Ok(Ok(step)) => {
            let payload = json!({ "step": step, "step_label": step.label() });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(Err(error)) => workflow_error_response(error),
        Err(error) => desk_error_response(error),
    }
}

fn text_response(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        bytes,
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn desk_error_response(error: DeskError) -> Response {
    let status = match error {
        DeskError::UnknownSession(_) => StatusCode::NOT_FOUND,
        DeskError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn workflow_error_response(error: CaseWorkflowError) -> Response {
    AppError::from(error).into_response()
}
