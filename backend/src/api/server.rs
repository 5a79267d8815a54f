//! HTTP server for the Pilotage dashboard.
//!
//! # API Endpoints
//!
//! | Method | Path                      | Description                               |
//! |--------|---------------------------|-------------------------------------------|
//! | GET    | `/health`                 | Health check                              |
//! | POST   | `/api/login`              | Open a session                            |
//! | POST   | `/api/logout`             | Close the session                         |
//! | GET    | `/api/dataset`            | Normalized dataset (cached load)          |
//! | GET    | `/api/kpis`               | Dashboard figures (`?service=&raise=`)    |
//! | GET    | `/api/employees/{name}`   | Employee card                             |
//! | PUT    | `/api/sheets/{sheet}`     | Replace a sheet with an edited table      |
//! | POST   | `/api/upload`             | Upload CSV/xlsx (`?sheet=` saves it)      |
//! |        |                           | (`?tab=` picks the uploaded workbook tab) |
//! | GET    | `/api/logs`               | SSE stream for real-time logs             |
//!
//! Every `/api` route but login and logs needs the `x-session-id` header.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        Json, Sse,
    },
    routing::{get, post, put},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, log_warning, LOG_BROADCASTER};
use super::types::{
    error_response, DataStatus, DatasetResponse, KpiQuery, KpiResponse, LoginRequest, LoginResponse,
    SaveResponse, UploadQuery, UploadResponse,
};
use crate::cache::LoadCache;
use crate::config::AppConfig;
use crate::error::{ServerError, SourceError};
use crate::kpi::{dashboard, employee_card_for, DepartmentFilter, EmployeeCard};
use crate::models::RawTable;
use crate::normalize::normalize_headers;
use crate::parser::parse_upload;
use crate::session::{Credentials, Session, SessionStore};
use crate::source::{self, SheetSource};
use crate::transform::pipeline::{load_dataset, Dataset};
use crate::writeback::save_table;

pub const SESSION_HEADER: &str = "x-session-id";

type ApiError = (StatusCode, Json<Value>);

/// Shared server state
pub struct AppState {
    pub config: AppConfig,
    pub credentials: Credentials,
    pub source: Arc<dyn SheetSource>,
    pub cache: LoadCache<Dataset>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, credentials: Credentials, source: Arc<dyn SheetSource>) -> Self {
        Self {
            cache: LoadCache::new(config.cache_ttl),
            sessions: SessionStore::with_idle_timeout(config.session_idle),
            config,
            credentials,
            source,
        }
    }

    /// Cached dataset, loading it on a miss. A failed load falls back to the
    /// session's last good dataset.
    async fn dataset_for(&self, session: &Session) -> Result<(Arc<Dataset>, DataStatus, Option<String>), ApiError> {
        let options = self.config.pipeline_options();
        let loaded = self
            .cache
            .get_or_try_load(self.source.workbook(), || load_dataset(self.source.as_ref(), &options))
            .await;

        match loaded {
            Ok(dataset) => {
                self.sessions.update(session.id, |s| s.remember(Arc::clone(&dataset)));
                Ok((dataset, DataStatus::Ready, None))
            }
            Err(e) => {
                log_error(format!("Load failed: {}", e));
                match &session.last_dataset {
                    Some(stale) => Ok((Arc::clone(stale), DataStatus::Stale, Some(e.to_string()))),
                    None => Err(api_error(ServerError::Pipeline(e))),
                }
            }
        }
    }

    fn session(&self, headers: &HeaderMap) -> Result<Session, ApiError> {
        session_id(headers)
            .and_then(|id| self.sessions.get(id))
            .ok_or_else(|| api_error(ServerError::Unauthorized))
    }
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

fn api_error(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::BadRequest(_) | ServerError::Parse(_) => StatusCode::BAD_REQUEST,
        ServerError::Unauthorized => StatusCode::UNAUTHORIZED,
        ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Source(SourceError::InvalidSheetName(_)) => StatusCode::BAD_REQUEST,
        ServerError::Source(SourceError::ReadOnly(_)) => StatusCode::CONFLICT,
        ServerError::Pipeline(_) | ServerError::Source(_) => StatusCode::BAD_GATEWAY,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error_response(&err.to_string())))
}

/// Build the router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, HeaderName::from_static(SESSION_HEADER)])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/dataset", get(dataset))
        .route("/api/kpis", get(kpis))
        .route("/api/employees/{name}", get(employee))
        .route("/api/sheets/{sheet}", put(put_sheet))
        .route("/api/upload", post(upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = config.require_credentials()?.clone();
    let source: Arc<dyn SheetSource> = Arc::from(source::open(&config.source));
    let port = config.port;
    let state = Arc::new(AppState::new(config, credentials, source));
    let app = router(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, workbook = state.source.workbook(), "🚀 Pilotage server running on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pilotage",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn login(State(state): State<Arc<AppState>>, Json(body): Json<LoginRequest>) -> Result<Json<LoginResponse>, ApiError> {
    match state.sessions.login(&state.credentials, &body.username, &body.password) {
        Some(session_id) => {
            log_info(format!("🔑 Session opened for '{}'", body.username.trim()));
            Ok(Json(LoginResponse { session_id }))
        }
        None => {
            log_warning(format!("Rejected login for '{}'", body.username.trim()));
            Err(api_error(ServerError::Unauthorized))
        }
    }
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    if let Some(id) = session_id(&headers) {
        state.sessions.logout(id);
    }
    StatusCode::NO_CONTENT
}

async fn dataset(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<DatasetResponse>, ApiError> {
    let session = state.session(&headers)?;
    let (dataset, status, error) = state.dataset_for(&session).await?;
    Ok(Json(DatasetResponse {
        status,
        error,
        dataset: dataset.as_ref().clone(),
    }))
}

async fn kpis(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<KpiQuery>,
) -> Result<Json<KpiResponse>, ApiError> {
    let mut session = state.session(&headers)?;
    if let Some(service) = query.service.as_deref() {
        let filter = DepartmentFilter::from_param(Some(service));
        state.sessions.update(session.id, |s| s.department_filter = filter.clone());
        session.department_filter = filter;
    }

    let (dataset, status, error) = state.dataset_for(&session).await?;
    Ok(Json(KpiResponse {
        status,
        error,
        loaded_on: dataset.loaded_on,
        kpis: dashboard(&dataset, &session.department_filter, query.raise.unwrap_or(0.0)),
    }))
}

async fn employee(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Json<EmployeeCard>, ApiError> {
    let session = state.session(&headers)?;
    let (dataset, _, _) = state.dataset_for(&session).await?;
    employee_card_for(&dataset, &name)
        .map(Json)
        .ok_or_else(|| api_error(ServerError::NotFound(format!("employee '{}'", name))))
}

async fn put_sheet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(sheet): Path<String>,
    Json(table): Json<RawTable>,
) -> Result<Json<SaveResponse>, ApiError> {
    state.session(&headers)?;
    let saved = write_back(&state, &sheet, &table).await?;
    Ok(Json(SaveResponse {
        status: "saved".to_string(),
        sheet,
        row_count: saved.len(),
    }))
}

async fn write_back(state: &AppState, sheet: &str, table: &RawTable) -> Result<RawTable, ApiError> {
    let saved = save_table(state.source.as_ref(), sheet, table)
        .await
        .map_err(|e| {
            log_error(format!("Save failed: {}", e));
            api_error(ServerError::Source(e))
        })?;
    state.cache.invalidate(state.source.workbook());
    Ok(saved)
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Upload a CSV or workbook file; saved over `?sheet=` when given
async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    state.session(&headers)?;

    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        api_error(ServerError::BadRequest(format!("Multipart error: {}", e)))
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(field.bytes().await.map_err(|e| {
                api_error(ServerError::BadRequest(format!("Read error: {}", e)))
            })?.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| api_error(ServerError::BadRequest("No file provided".to_string())))?;
    let file_name = file_name.unwrap_or_else(|| "upload.csv".to_string());
    ingest_upload(&state, bytes, file_name, query).await.map(Json)
}

/// Decode an uploaded file and save it over `query.sheet` when set. A
/// workbook upload is read from `query.tab`, or its first tab.
async fn ingest_upload(
    state: &AppState,
    bytes: Vec<u8>,
    file_name: String,
    query: UploadQuery,
) -> Result<UploadResponse, ApiError> {
    log_info(format!("📄 Upload: {} ({} bytes)", file_name, bytes.len()));

    let sheet = non_blank(query.sheet);
    let tab = non_blank(query.tab);
    let parse_name = file_name.clone();
    let mut table = tokio::task::spawn_blocking(move || parse_upload(bytes, &parse_name, tab.as_deref()))
        .await
        .map_err(|e| api_error(ServerError::Internal(e.to_string())))?
        .map_err(|e| api_error(ServerError::Parse(e)))?;

    normalize_headers(&mut table);
    let table = match &sheet {
        Some(target) => write_back(state, target, &table).await?,
        None => table,
    };

    Ok(UploadResponse::new(table, &file_name, sheet))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use crate::source::MemorySource;
    use axum::http::HeaderValue;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|v| Cell::from(*v)).collect()).collect(),
        )
    }

    fn state() -> (Arc<AppState>, Arc<MemorySource>) {
        let source = Arc::new(
            MemorySource::new("Test_Dashboard")
                .with_sheet(table(
                    "Données Sociales",
                    &["Nom", "Service", "Sexe"],
                    &[&["A", "RH", "Homme"], &["B", "IT", "Femme"]],
                ))
                .with_sheet(table("Salaires", &["Nom", "Salaire (€)"], &[&["A", "3 000 €"], &["B", "2 000 €"]])),
        );
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.reference_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 1);
        let state = AppState::new(config, Credentials::new("admin", "secret"), source.clone());
        (Arc::new(state), source)
    }

    async fn logged_in(state: &Arc<AppState>) -> HeaderMap {
        let Json(response) = login(
            State(Arc::clone(state)),
            Json(LoginRequest { username: "admin".into(), password: "secret".into() }),
        )
        .await
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&response.session_id.to_string()).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_rejects_bad_login() {
        let (state, _) = state();
        let err = login(
            State(state),
            Json(LoginRequest { username: "admin".into(), password: "x".into() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_dataset_requires_session() {
        let (state, _) = state();
        let err = dataset(State(state), HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_dataset_is_cached() {
        let (state, source) = state();
        let headers = logged_in(&state).await;

        let Json(first) = dataset(State(Arc::clone(&state)), headers.clone()).await.unwrap();
        assert_eq!(first.status, DataStatus::Ready);
        assert_eq!(first.dataset.employees.len(), 2);
        let reads = source.reads();

        dataset(State(Arc::clone(&state)), headers).await.unwrap();
        assert_eq!(source.reads(), reads);
    }

    #[tokio::test]
    async fn test_failed_reload_serves_stale_data() {
        let (state, source) = state();
        let headers = logged_in(&state).await;
        dataset(State(Arc::clone(&state)), headers.clone()).await.unwrap();

        state.cache.clear();
        source.set_offline(true);
        let Json(stale) = dataset(State(Arc::clone(&state)), headers).await.unwrap();
        assert_eq!(stale.status, DataStatus::Stale);
        assert!(stale.error.is_some());
        assert_eq!(stale.dataset.employees.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_first_load_is_an_error() {
        let (state, source) = state();
        let headers = logged_in(&state).await;
        source.set_offline(true);
        let err = dataset(State(state), headers).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_kpis_filter_sticks_to_session() {
        let (state, _) = state();
        let headers = logged_in(&state).await;

        let query = KpiQuery { service: Some("RH".into()), raise: Some(10.0) };
        let Json(rh) = kpis(State(Arc::clone(&state)), headers.clone(), Query(query)).await.unwrap();
        assert_eq!(rh.kpis.workforce.headcount, 1);
        assert!((rh.kpis.simulation.extra_cost - 3000.0 * 0.1 * 12.0 * 1.45).abs() < 1e-6);

        let Json(again) = kpis(State(Arc::clone(&state)), headers.clone(), Query(KpiQuery::default())).await.unwrap();
        assert_eq!(again.kpis.filter, DepartmentFilter::Only("RH".into()));

        let query = KpiQuery { service: Some("Tous".into()), raise: None };
        let Json(all) = kpis(State(state), headers, Query(query)).await.unwrap();
        assert_eq!(all.kpis.workforce.headcount, 2);
    }

    #[tokio::test]
    async fn test_employee_card_and_missing_employee() {
        let (state, _) = state();
        let headers = logged_in(&state).await;
        let Json(card) = employee(State(Arc::clone(&state)), headers.clone(), Path("A".into())).await.unwrap();
        assert_eq!(card.salary, 3000.0);

        let err = employee(State(state), headers, Path("Z".into())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_save_invalidates_cache() {
        let (state, source) = state();
        let headers = logged_in(&state).await;
        dataset(State(Arc::clone(&state)), headers.clone()).await.unwrap();

        let edited = table("Salaires", &["Nom", "Salaire (€)"], &[&["A", "3 500"], &["B", "2 000"]]);
        let Json(saved) = put_sheet(State(Arc::clone(&state)), headers.clone(), Path("Salaires".into()), Json(edited))
            .await
            .unwrap();
        assert_eq!(saved.row_count, 2);
        assert!(state.cache.get("Test_Dashboard").is_none());

        let Json(reloaded) = dataset(State(state), headers).await.unwrap();
        assert_eq!(reloaded.dataset.employee("A").unwrap().salary, 3500.0);
        assert_eq!(source.sheet("Salaires").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_closes_session() {
        let (state, _) = state();
        let headers = logged_in(&state).await;
        assert_eq!(logout(State(Arc::clone(&state)), headers.clone()).await, StatusCode::NO_CONTENT);
        assert_eq!(dataset(State(state), headers).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
    }

    fn export_xlsx(tab: &str) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(tab).unwrap();
        sheet.write_string(0, 0, "Nom").unwrap();
        sheet.write_string(0, 1, "Salaire (€) ").unwrap();
        sheet.write_string(1, 0, "A").unwrap();
        sheet.write_number(1, 1, 3900.0).unwrap();
        sheet.write_string(2, 0, "B").unwrap();
        sheet.write_number(2, 1, 2100.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[tokio::test]
    async fn test_upload_workbook_into_another_sheet() {
        let (state, source) = state();
        let query = UploadQuery { sheet: Some("Salaires".into()), tab: None };
        let response = ingest_upload(&state, export_xlsx("Sheet1"), "export.xlsx".into(), query)
            .await
            .unwrap();
        assert_eq!(response.status, "saved");
        assert_eq!(response.metadata.sheet.as_deref(), Some("Salaires"));

        let saved = source.sheet("Salaires").unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved.headers, vec!["Nom", "Salaire (€)"]);
        assert_eq!(saved.cell(0, "Salaire (€)"), &Cell::Number(3900.0));
    }

    #[tokio::test]
    async fn test_upload_reads_the_requested_tab() {
        let (state, _) = state();
        let query = UploadQuery { sheet: None, tab: Some("Paie".into()) };
        let response = ingest_upload(&state, export_xlsx("Paie"), "export.xlsx".into(), query)
            .await
            .unwrap();
        assert_eq!(response.status, "ready");
        assert_eq!(response.table.len(), 2);

        let query = UploadQuery { sheet: Some("Salaires".into()), tab: Some("Absent".into()) };
        let err = ingest_upload(&state, export_xlsx("Paie"), "export.xlsx".into(), query)
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_source_errors_map_to_client_statuses() {
        let bad = api_error(ServerError::Source(SourceError::InvalidSheetName("../x".into())));
        assert_eq!(bad.0, StatusCode::BAD_REQUEST);
        let read_only = api_error(ServerError::Source(SourceError::ReadOnly("book.ods".into())));
        assert_eq!(read_only.0, StatusCode::CONFLICT);
    }

    #[test]
    fn test_router_builds() {
        let (state, _) = state();
        let _ = router(state);
    }
}
