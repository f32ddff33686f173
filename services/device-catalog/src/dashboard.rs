//! Web dashboard with JSON API endpoints

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::store::{CatalogStore, LoadState};
use crate::telemetry::{DateRange, TelemetryClient};
use crate::CatalogError;

/// Dashboard application state
#[derive(Clone)]
pub struct DashboardState {
    pub store: CatalogStore,
    pub telemetry: Arc<TelemetryClient>,
}

/// Build the dashboard axum router
pub fn build_router(store: CatalogStore, telemetry: Arc<TelemetryClient>) -> Router {
    let dashboard_state = DashboardState { store, telemetry };

    Router::new()
        .route("/", get(index_handler))
        .route("/api/catalog", get(catalog_handler))
        .route("/api/catalog/refresh", post(refresh_handler))
        .route("/api/catalog/select", post(select_handler))
        .route("/api/temperature/data", get(temperature_handler))
        .route("/api/water/data", get(water_handler))
        .route("/health", get(health_handler))
        .with_state(dashboard_state)
}

#[derive(Serialize)]
struct SnapshotBody<'a> {
    load_state: LoadState,
    catalog: &'a Catalog,
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    device_type: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelemetryQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    device_id: Option<String>,
}

impl TelemetryQuery {
    /// Missing bounds default to today
    fn range(&self) -> crate::Result<DateRange> {
        let today = DateRange::today();
        match (&self.start_date, &self.end_date) {
            (None, None) => Ok(today),
            (start, end) => {
                let start = start
                    .clone()
                    .unwrap_or_else(|| today.start().format("%Y-%m-%d").to_string());
                let end = end
                    .clone()
                    .unwrap_or_else(|| today.end().format("%Y-%m-%d").to_string());
                DateRange::parse(&start, &end)
            }
        }
    }
}

fn snapshot_response(store: &CatalogStore) -> Response {
    let snapshot = store.snapshot();
    Json(SnapshotBody {
        load_state: snapshot.load_state,
        catalog: &snapshot.catalog,
    })
    .into_response()
}

fn error_response(err: &CatalogError) -> Response {
    let status = match err {
        CatalogError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
        CatalogError::UnknownDevice(_) => StatusCode::NOT_FOUND,
        CatalogError::Network(_)
        | CatalogError::MalformedResponse(_)
        | CatalogError::LoadAborted(_) => StatusCode::BAD_GATEWAY,
        CatalogError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

/// Registry strings are untrusted and must not reach the page as markup
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

async fn index_handler(State(dashboard): State<DashboardState>) -> impl IntoResponse {
    let snapshot = dashboard.store.snapshot();

    let group_sections: String = snapshot
        .catalog
        .groups()
        .iter()
        .map(|group| {
            let rows: String = group
                .devices()
                .iter()
                .map(|name| {
                    let marker = if group.selected() == Some(name.as_str()) {
                        " (selected)"
                    } else {
                        ""
                    };
                    format!(
                        r#"<tr style="border-bottom: 1px solid #dee2e6;">
                    <td style="padding: 0.5rem;">{}{}</td>
                    <td style="padding: 0.5rem; font-family: monospace;">{}</td>
                </tr>"#,
                        escape_html(name),
                        marker,
                        escape_html(group.identifier_for(name).unwrap_or_default())
                    )
                })
                .collect();
            format!(
                r#"<section>
        <h2>{}</h2>
        <table style="width: 100%; border-collapse: collapse;">
            <thead>
                <tr style="border-bottom: 2px solid #dee2e6;">
                    <th style="padding: 0.5rem; text-align: left;">Device</th>
                    <th style="padding: 0.5rem; text-align: left;">DevEUI</th>
                </tr>
            </thead>
            <tbody>{}</tbody>
        </table>
    </section>"#,
                escape_html(group.label()),
                rows
            )
        })
        .collect();

    let empty_notice = if snapshot.catalog.is_empty() {
        "<p>No devices known.</p>"
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Device Catalog</title>
</head>
<body style="font-family: system-ui, sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem;">
    <h1>Device Catalog</h1>
    <p>Catalog state: <strong>{load_state}</strong></p>
    {empty_notice}
    {group_sections}
</body>
</html>"#,
        load_state = snapshot.load_state,
        empty_notice = empty_notice,
        group_sections = group_sections,
    );

    Html(html)
}

async fn catalog_handler(State(dashboard): State<DashboardState>) -> Response {
    snapshot_response(&dashboard.store)
}

async fn refresh_handler(State(dashboard): State<DashboardState>) -> Response {
    match dashboard.store.initialize().await {
        Ok(()) => snapshot_response(&dashboard.store),
        Err(e) => error_response(&e),
    }
}

async fn select_handler(
    State(dashboard): State<DashboardState>,
    Json(request): Json<SelectRequest>,
) -> Response {
    let result = match &request.name {
        Some(name) => dashboard.store.select_device(&request.device_type, name),
        None => dashboard.store.clear_selection(&request.device_type),
    };
    match result {
        Ok(()) => snapshot_response(&dashboard.store),
        Err(e) => error_response(&e),
    }
}

async fn temperature_handler(
    State(dashboard): State<DashboardState>,
    Query(query): Query<TelemetryQuery>,
) -> Response {
    let range = match query.range() {
        Ok(range) => range,
        Err(e) => return error_response(&e),
    };
    match dashboard
        .telemetry
        .fetch_temperature(&range, query.device_id.as_deref())
        .await
    {
        Ok(readings) => Json(serde_json::json!({ "result": readings })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn water_handler(
    State(dashboard): State<DashboardState>,
    Query(query): Query<TelemetryQuery>,
) -> Response {
    let range = match query.range() {
        Ok(range) => range,
        Err(e) => return error_response(&e),
    };
    match dashboard
        .telemetry
        .fetch_water(&range, query.device_id.as_deref())
        .await
    {
        Ok(readings) => Json(serde_json::json!({ "result": readings })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn health_handler() -> impl IntoResponse {
    "OK"
}
