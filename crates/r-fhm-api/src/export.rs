//! ---
//! fhm_section: "05-networking-external-interfaces"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Anomaly export rendering for the REST API."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Date-ranged anomaly export as CSV or JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use r_fhm_common::time::{day_after, day_start, parse_day};
use r_fhm_telemetry::FuelSample;
use serde::Deserialize;

use crate::{ApiError, ApiState};

const CSV_HEADER: [&str; 12] = [
    "timestamp",
    "rpm",
    "throttle",
    "fuel_pressure",
    "fuel_temp",
    "flow_rate",
    "anomaly",
    "score",
    "probable_cause",
    "fault_type",
    "safety_measures",
    "note",
];

#[derive(Debug, Deserialize)]
pub(crate) struct ExportQuery {
    #[serde(default = "default_format")]
    format: String,
    start_date: Option<String>,
    end_date: Option<String>,
}

fn default_format() -> String {
    "csv".to_owned()
}

pub(crate) async fn get_export(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let (start, end) = resolve_range(query.start_date.as_deref(), query.end_date.as_deref())?;
    let records = state
        .log
        .anomalies_between(start, end)
        .map_err(ApiError::internal)?;
    if records.is_empty() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "No anomalies found in the specified date range.",
        ));
    }

    match query.format.as_str() {
        "json" => Ok(Json(records).into_response()),
        "csv" => {
            let body = render_csv(&records).map_err(ApiError::internal)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=anomalies.csv",
                    ),
                ],
                body,
            )
                .into_response())
        }
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Unsupported format. Use 'csv' or 'json'.",
        )),
    }
}

/// Turn optional `YYYY-MM-DD` bounds into a half-open UTC interval.
///
/// The end bound is inclusive at day granularity, so it maps to an
/// exclusive instant at midnight of the following day.
fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ApiError> {
    let start = match start {
        Some(raw) => {
            let day = parse_day(raw).map_err(|_| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Invalid start_date format. Use YYYY-MM-DD",
                )
            })?;
            day_start(day)
        }
        None => DateTime::<Utc>::MIN_UTC,
    };
    let end = match end {
        Some(raw) => {
            let day = parse_day(raw).map_err(|_| {
                ApiError::new(
                    StatusCode::BAD_REQUEST,
                    "Invalid end_date format. Use YYYY-MM-DD",
                )
            })?;
            day_after(day).unwrap_or(DateTime::<Utc>::MAX_UTC)
        }
        None => DateTime::<Utc>::MAX_UTC,
    };
    Ok((start, end))
}

// Records carry optional diagnostic columns, so rows are written by
// hand with explicit blanks instead of serialized per struct field.
fn render_csv(records: &[FuelSample]) -> Result<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record(CSV_HEADER)
            .context("failed to write export header")?;
        for record in records {
            writer
                .write_record(csv_row(record))
                .context("failed to write export row")?;
        }
        writer.flush().context("failed to finish csv export")?;
    }
    String::from_utf8(buffer).context("export produced non-utf8 output")
}

fn csv_row(record: &FuelSample) -> [String; 12] {
    [
        record.timestamp.to_rfc3339(),
        record.rpm.to_string(),
        record.throttle.to_string(),
        record.fuel_pressure.to_string(),
        record.fuel_temp.to_string(),
        record.flow_rate.to_string(),
        record
            .anomaly
            .map(|flag| flag.to_string())
            .unwrap_or_default(),
        record
            .score
            .map(|score| score.to_string())
            .unwrap_or_default(),
        record.probable_cause.clone().unwrap_or_default(),
        record.fault_type.clone().unwrap_or_default(),
        record.safety_measures.clone().unwrap_or_default(),
        record.note.clone().unwrap_or_default(),
    ]
}
