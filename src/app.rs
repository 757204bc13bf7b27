use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::ServerConfig;
use crate::dashboard::Dashboard;
use crate::downloader::{ExportBlob, ExportOptions};
use crate::error::DashboardError;
use crate::filter::{AttendanceBucket, FilterParams, SortCriteria};
use crate::graph::{ChartRasterizer, PlottersRasterizer};
use crate::loader;
use crate::record::ParticipationLevel;

/// The single session: at most one uploaded dataset at a time.
pub struct AppState {
    dashboard: RwLock<Option<Arc<Dashboard>>>,
    export_options: ExportOptions,
}

impl AppState {
    pub fn new(export_options: ExportOptions) -> Self {
        AppState {
            dashboard: RwLock::new(None),
            export_options,
        }
    }

    fn current(&self) -> Option<Arc<Dashboard>> {
        self.dashboard
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace(&self, dashboard: Dashboard) {
        let mut slot = self
            .dashboard
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(dashboard));
    }
}

/// Widget state as the page sends it.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct DashboardRequest {
    /// Slider position, 0..=100 in steps of 25
    attendance: u32,
    courses: BTreeSet<String>,
    participation: BTreeSet<ParticipationLevel>,
    /// Comma-separated student IDs
    search: String,
    sort: SortCriteria,
}

impl DashboardRequest {
    fn into_filter(self) -> FilterParams {
        FilterParams {
            attendance: AttendanceBucket::from_slider(self.attendance),
            courses: self.courses,
            participation: self.participation,
            search_ids: self
                .search
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            sort: self.sort,
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    students: usize,
    dropped_rows: usize,
    courses: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
enum ExportFormat {
    Pdf,
    Xlsx,
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(config.export_options()));
    let app = router(state, config.max_upload_bytes());

    let listener = TcpListener::bind(config.addr).await?;
    log::info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/upload", post(upload_dataset))
        .route("/api/dashboard", post(render_dashboard))
        .route("/api/chart/:name", post(render_chart))
        .route("/api/export/pdf", post(export_pdf))
        .route("/api/export/xlsx", post(export_xlsx))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read upload: {}", e),
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file data received".to_string());
    };

    match loader::load_upload(&filename, &bytes) {
        Ok(dataset) => {
            let response = UploadResponse {
                status: "ok".to_string(),
                students: dataset.len(),
                dropped_rows: dataset.dropped_rows(),
                courses: dataset.courses(),
            };
            state.replace(Dashboard::new(dataset));
            Json(response).into_response()
        }
        Err(e) => {
            log::warn!("rejected upload {filename:?}: {e}");
            dashboard_error(&e)
        }
    }
}

async fn render_dashboard(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DashboardRequest>,
) -> Response {
    let Some(dashboard) = state.current() else {
        return no_dataset();
    };
    Json(dashboard.render(&request.into_filter())).into_response()
}

async fn render_chart(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(request): Json<DashboardRequest>,
) -> Response {
    let Some(dashboard) = state.current() else {
        return no_dataset();
    };
    let (width, height) = (
        state.export_options.chart_width,
        state.export_options.chart_height,
    );

    let job = tokio::task::spawn_blocking(move || {
        let view = dashboard.render(&request.into_filter());
        let spec = match name.as_str() {
            "test_comparison" => view.search.as_ref().map(|s| &s.comparison),
            other => view.charts.get(other),
        };
        spec.map(|spec| PlottersRasterizer.rasterize(spec, width, height))
    });

    match job.await {
        Ok(Some(Ok(png))) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(Some(Err(e))) => dashboard_error(&e),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Unknown chart".to_string()),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Chart task failed: {}", e),
        ),
    }
}

async fn export_pdf(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DashboardRequest>,
) -> Response {
    export_report(state, request, ExportFormat::Pdf).await
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DashboardRequest>,
) -> Response {
    export_report(state, request, ExportFormat::Xlsx).await
}

async fn export_report(
    state: Arc<AppState>,
    request: DashboardRequest,
    format: ExportFormat,
) -> Response {
    let Some(dashboard) = state.current() else {
        return no_dataset();
    };
    let params = request.into_filter();
    let options = state.export_options.clone();

    // Rasterizing and PDF assembly are CPU and disk bound.
    let job = tokio::task::spawn_blocking(move || {
        let bundle = dashboard.report_bundle(&params);
        match format {
            ExportFormat::Pdf => bundle.into_pdf(&PlottersRasterizer, &options),
            ExportFormat::Xlsx => bundle.into_xlsx(),
        }
    });

    match job.await {
        Ok(Ok(blob)) => attachment(blob),
        Ok(Err(e)) => {
            log::error!("{:?} export failed: {}", format, e);
            dashboard_error(&e)
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Export task failed: {}", e),
        ),
    }
}

fn attachment(blob: ExportBlob) -> Response {
    (
        [
            (header::CONTENT_TYPE, blob.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", blob.filename),
            ),
        ],
        blob.bytes,
    )
        .into_response()
}

fn no_dataset() -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "Please upload a CSV file first".to_string(),
    )
}

fn dashboard_error(err: &DashboardError) -> Response {
    let status = match err {
        DashboardError::Export(_) | DashboardError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err.to_string())
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(StatusResponse {
            status: "error".to_string(),
            message: Some(message),
        }),
    )
        .into_response()
}
