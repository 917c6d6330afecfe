//! ---
//! fhm_section: "05-networking-external-interfaces"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Networking API surface for external integrations."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use r_fhm_common::{Mode, ModelConfig, VersionInfo};
use r_fhm_core::{
    annotate_safety, retrain_from_log, AlertDispatcher, SampleOrigin, TelemetryPipeline,
    TrainingError,
};
use r_fhm_diagnosis::maintenance::NO_RECENT_ANOMALIES_MESSAGE;
use r_fhm_diagnosis::{
    aggregate_maintenance, estimate_rul, MaintenanceSuggestion, RulEstimate, DEFAULT_WINDOW,
};
use r_fhm_metrics::PipelineMetrics;
use r_fhm_model::{ModelError, ModelStore};
use r_fhm_persistence::{
    PersistenceError, ScanOrder, Tank, TankRegistry, TankStatus, TelemetryLog,
};
use r_fhm_telemetry::{round4, FuelSample};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod export;

const MODEL_NOT_TRAINED_MESSAGE: &str = "Anomaly detection model not found. Train it first.";
const MODEL_UNAVAILABLE_MESSAGE: &str = "Anomaly detection model not available. Train it first.";

fn default_history_limit() -> usize {
    20
}

fn default_alert_limit() -> usize {
    10
}

/// Shared API state exposed to handlers.
pub struct ApiState {
    pipeline: Arc<TelemetryPipeline>,
    store: Arc<ModelStore>,
    log: Arc<TelemetryLog>,
    tanks: Arc<TankRegistry>,
    dispatcher: Arc<AlertDispatcher>,
    model_config: ModelConfig,
    metrics: Option<PipelineMetrics>,
    mode: Mode,
    version: VersionInfo,
    start: Instant,
}

impl ApiState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pipeline: Arc<TelemetryPipeline>,
        store: Arc<ModelStore>,
        log: Arc<TelemetryLog>,
        tanks: Arc<TankRegistry>,
        dispatcher: Arc<AlertDispatcher>,
        model_config: ModelConfig,
        metrics: Option<PipelineMetrics>,
        mode: Mode,
        version: VersionInfo,
    ) -> Self {
        Self {
            pipeline,
            store,
            log,
            tanks,
            dispatcher,
            model_config,
            metrics,
            mode,
            version,
            start: Instant::now(),
        }
    }

    fn status(&self) -> StatusResponse {
        StatusResponse {
            mode: self.mode,
            version: self.version.semver.clone(),
            uptime_seconds: self.start.elapsed().as_secs(),
            model_loaded: self.store.is_loaded(),
        }
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("version", &self.version)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Spawn the REST API on the given address.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/telemetry", get(get_telemetry))
        .route("/api/telemetry/history", get(get_history))
        .route("/api/telemetry/export", get(export::get_export))
        .route("/api/predict", post(post_predict))
        .route("/api/safety-recommendation", post(post_safety_recommendation))
        .route("/api/simulate-fault", post(post_simulate_fault))
        .route("/api/maintenance-suggestions", get(get_maintenance_suggestions))
        .route("/api/predictive-maintenance", get(get_predictive_maintenance))
        .route("/api/alerts", get(get_alerts))
        .route("/api/alert/send", post(post_alert_send))
        .route("/api/retrain", post(post_retrain))
        .route("/api/tanks/init", post(post_tanks_init))
        .route("/api/tanks", get(get_tanks))
        .route("/api/tanks/status", post(post_tank_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %local_addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %local_addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr: local_addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    mode: Mode,
    version: String,
    uptime_seconds: u64,
    model_loaded: bool,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    anomaly: bool,
    score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    probable_cause: Option<String>,
    telemetry: FuelSample,
}

#[derive(Debug, Serialize)]
struct SafetyResponse {
    anomaly_detected: bool,
    probable_cause: String,
    safety_measures: String,
    telemetry: FuelSample,
}

// `anomaly` and `score` stay nullable here: a fault drill is still
// recorded when no model is installed, and the caller needs to see
// the difference between "not anomalous" and "not scored".
#[derive(Debug, Serialize)]
struct FaultDrillResponse {
    fault_type: String,
    anomaly: Option<bool>,
    score: Option<f64>,
    telemetry: FuelSample,
}

#[derive(Debug, Serialize)]
struct MaintenanceReport {
    maintenance_suggestions: Vec<MaintenanceSuggestion>,
    total_anomalies_analyzed: usize,
}

#[derive(Debug, Serialize)]
struct PredictiveMaintenanceResponse {
    remaining_useful_life_days_estimated: RulEstimate,
    total_anomalies_analyzed: usize,
}

#[derive(Debug, Serialize)]
struct AlertListResponse {
    count: usize,
    alerts: Vec<FuelSample>,
}

#[derive(Debug, Serialize)]
struct RetrainResponse {
    message: String,
    trained_rows: usize,
}

#[derive(Debug, Serialize)]
struct AlertSendResponse {
    message: String,
    alert_data: String,
}

#[derive(Debug, Serialize)]
struct TankListResponse {
    fuel_tanks: Vec<Tank>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(err: impl fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(state.status())
}

async fn get_telemetry(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<FuelSample>, ApiError> {
    let sample = state.pipeline.raw_sample();
    state.log.append(&sample).map_err(ApiError::internal)?;
    Ok(Json(sample))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    limit: usize,
}

async fn get_history(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<FuelSample>>, ApiError> {
    let records = state.log.recent(query.limit).map_err(ApiError::internal)?;
    Ok(Json(records))
}

async fn post_predict(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PredictResponse>, ApiError> {
    if !state.pipeline.is_model_loaded() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            MODEL_NOT_TRAINED_MESSAGE,
        ));
    }
    let sample = state.pipeline.produce(SampleOrigin::Request);
    state.log.append(&sample).map_err(ApiError::internal)?;

    let score = match sample.score {
        Some(score) => round4(score),
        None => {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                MODEL_NOT_TRAINED_MESSAGE,
            ))
        }
    };
    Ok(Json(PredictResponse {
        anomaly: sample.is_anomalous(),
        score,
        probable_cause: sample.probable_cause.clone(),
        telemetry: sample,
    }))
}

async fn post_safety_recommendation(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SafetyResponse>, ApiError> {
    if !state.pipeline.is_model_loaded() {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            MODEL_UNAVAILABLE_MESSAGE,
        ));
    }
    let mut sample = state.pipeline.produce(SampleOrigin::Request);
    let (probable_cause, safety_measures) = annotate_safety(&mut sample);
    state.log.append(&sample).map_err(ApiError::internal)?;

    Ok(Json(SafetyResponse {
        anomaly_detected: sample.is_anomalous(),
        probable_cause: probable_cause.to_owned(),
        safety_measures: safety_measures.to_owned(),
        telemetry: sample,
    }))
}

#[derive(Debug, Deserialize)]
struct SimulateFaultRequest {
    #[serde(rename = "type")]
    fault_type: String,
}

async fn post_simulate_fault(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SimulateFaultRequest>,
) -> Result<Json<FaultDrillResponse>, ApiError> {
    let sample = state.pipeline.produce_with_fault(&request.fault_type);
    state.log.append(&sample).map_err(ApiError::internal)?;

    Ok(Json(FaultDrillResponse {
        fault_type: request.fault_type,
        anomaly: sample.anomaly,
        score: sample.score.map(round4),
        telemetry: sample,
    }))
}

async fn get_maintenance_suggestions(
    State(state): State<Arc<ApiState>>,
) -> Result<Response, ApiError> {
    let anomalies = state
        .log
        .anomalies(ScanOrder::Descending, DEFAULT_WINDOW)
        .map_err(ApiError::internal)?;
    if anomalies.is_empty() {
        return Ok(Json(MessageResponse {
            message: NO_RECENT_ANOMALIES_MESSAGE.to_owned(),
        })
        .into_response());
    }

    let causes: Vec<String> = anomalies
        .iter()
        .map(|sample| {
            sample
                .probable_cause
                .clone()
                .unwrap_or_else(|| "Unknown".to_owned())
        })
        .collect();
    let suggestions = aggregate_maintenance(&causes, DEFAULT_WINDOW);
    let total_anomalies_analyzed = suggestions.iter().map(|row| row.occurrences).sum();
    Ok(Json(MaintenanceReport {
        maintenance_suggestions: suggestions,
        total_anomalies_analyzed,
    })
    .into_response())
}

async fn get_predictive_maintenance(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PredictiveMaintenanceResponse>, ApiError> {
    let anomalies = state
        .log
        .anomalies(ScanOrder::Ascending, DEFAULT_WINDOW)
        .map_err(ApiError::internal)?;
    let timestamps: Vec<_> = anomalies.iter().map(|sample| sample.timestamp).collect();
    Ok(Json(PredictiveMaintenanceResponse {
        remaining_useful_life_days_estimated: estimate_rul(&timestamps),
        total_anomalies_analyzed: timestamps.len(),
    }))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    #[serde(default = "default_alert_limit")]
    limit: usize,
}

async fn get_alerts(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertListResponse>, ApiError> {
    let alerts = state
        .log
        .anomalies(ScanOrder::Descending, query.limit)
        .map_err(ApiError::internal)?;
    Ok(Json(AlertListResponse {
        count: alerts.len(),
        alerts,
    }))
}

async fn post_alert_send(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let latest = state.log.latest_anomaly().map_err(ApiError::internal)?;
    let Some(sample) = latest else {
        return Ok(Json(MessageResponse {
            message: "No anomaly found in the log.".to_owned(),
        })
        .into_response());
    };

    let dispatch = state.dispatcher.dispatch(&sample).await;
    Ok(Json(AlertSendResponse {
        message: "Alert dispatched.".to_owned(),
        alert_data: dispatch.body,
    })
    .into_response())
}

async fn post_retrain(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<RetrainResponse>, ApiError> {
    let outcome = retrain_from_log(
        &state.model_config,
        &state.log,
        &state.store,
        &state.model_config.artifact_path,
    )
    .map_err(|err| match err {
        TrainingError::Model(ModelError::InsufficientData { need, .. }) => ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Not enough data to train model. Insert at least {need} telemetry records."),
        ),
        other => ApiError::internal(other),
    })?;

    if let Some(metrics) = &state.metrics {
        metrics.inc_model_swap();
        metrics.set_model_loaded(true);
    }
    Ok(Json(RetrainResponse {
        message: "Model retrained and saved.".to_owned(),
        trained_rows: outcome.trained_rows,
    }))
}

async fn post_tanks_init(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let tanks = state
        .tanks
        .provision_default_tanks()
        .map_err(ApiError::internal)?;
    Ok(Json(MessageResponse {
        message: format!("{} fuel tanks initialized successfully.", tanks.len()),
    }))
}

async fn get_tanks(State(state): State<Arc<ApiState>>) -> Json<TankListResponse> {
    Json(TankListResponse {
        fuel_tanks: state.tanks.all(),
    })
}

#[derive(Debug, Deserialize)]
struct TankStatusRequest {
    tank_id: String,
    status: String,
}

async fn post_tank_status(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<TankStatusRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let status = TankStatus::from_str(&request.status).map_err(|_| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid status. Use Active, Inactive, or Under Maintenance.",
        )
    })?;
    let updated = state
        .tanks
        .update_status(&request.tank_id, status)
        .map_err(|err| match err {
            PersistenceError::TankNotFound(tank_id) => {
                ApiError::new(StatusCode::NOT_FOUND, format!("Tank {tank_id} not found."))
            }
            other => ApiError::internal(other),
        })?;
    Ok(Json(MessageResponse {
        message: format!("{} status updated to {}.", updated.tank_id, updated.status),
    }))
}
