use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::info;

use super::{ApiError, ApiResult, AppState};
use crate::export::{InventoryView, SystemProfileView};
use crate::model::{ApplicationField, ScanResultField};
use crate::orchestrator::ScanError;

/// Request body for the PATCH endpoints: column name to new value.
type FieldMap = BTreeMap<String, String>;

/// Id path segment; a non-numeric id is answered with the error envelope.
type IdPath = Result<Path<i64>, PathRejection>;

/// PATCH body; malformed JSON is answered with the error envelope.
type FieldBody = Result<Json<FieldMap>, JsonRejection>;

fn success(data: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

fn message(text: impl Into<String>) -> Json<Value> {
    Json(json!({ "status": "success", "message": text.into() }))
}

/// Maps a field map onto an allow-listed column enum.
fn parse_fields<F>(fields: FieldMap) -> ApiResult<Vec<(F, String)>>
where
    F: FromStr<Err = String>,
{
    fields
        .into_iter()
        .map(|(name, value)| {
            F::from_str(&name)
                .map(|field| (field, value))
                .map_err(|e| ApiError::bad_request("INVALID_FIELD", "Unknown field").with_details(e))
        })
        .collect()
}

pub async fn get_status(State(ctx): State<AppState>) -> Json<Value> {
    success(ctx.get_status())
}

pub async fn get_system(State(ctx): State<AppState>) -> Json<Value> {
    let profile = ctx.system_profile().await;
    success(SystemProfileView::from(&profile))
}

pub async fn get_applications(State(ctx): State<AppState>) -> ApiResult<Json<Value>> {
    let apps = ctx.fetch_cached_inventory().map_err(|e| {
        ApiError::internal("APP_LIST_FAILED", "Failed to get application inventory").with_details(e)
    })?;
    Ok(success(InventoryView::new(&apps)))
}

pub async fn update_application(
    State(ctx): State<AppState>,
    id: IdPath,
    body: FieldBody,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let Json(fields) = body?;
    let fields = parse_fields::<ApplicationField>(fields)?;
    let changed = ctx.store().update_application(id, &fields).map_err(|e| {
        ApiError::internal("UPDATE_FAILED", "Failed to update app").with_details(e)
    })?;

    if changed == 0 && !fields.is_empty() {
        return Err(ApiError::not_found("UPDATE_FAILED", format!("App {} not found", id)));
    }
    Ok(message(format!("App {} updated", id)))
}

pub async fn delete_application(
    State(ctx): State<AppState>,
    id: IdPath,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let removed = ctx.store().delete_application(id).map_err(|e| {
        ApiError::internal("DELETE_FAILED", "Failed to delete app").with_details(e)
    })?;

    if removed == 0 {
        return Err(ApiError::not_found("DELETE_FAILED", format!("App {} not found", id)));
    }
    info!(id, "application deleted");
    Ok(message(format!("App {} deleted", id)))
}

pub async fn get_scans(State(ctx): State<AppState>) -> ApiResult<Json<Value>> {
    let scans = ctx.store().fetch_scan_results().map_err(|e| {
        ApiError::internal("HISTORY_FAILED", "Failed to get scan history").with_details(e)
    })?;
    Ok(success(scans))
}

pub async fn update_scan_result(
    State(ctx): State<AppState>,
    id: IdPath,
    body: FieldBody,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let Json(fields) = body?;
    let fields = parse_fields::<ScanResultField>(fields)?;
    for (field, value) in &fields {
        field.validate(value).map_err(|e| {
            ApiError::bad_request("INVALID_FIELD", "Invalid field value").with_details(e)
        })?;
    }
    let changed = ctx.store().update_scan_result(id, &fields).map_err(|e| {
        ApiError::internal("UPDATE_FAILED", "Failed to update scan result").with_details(e)
    })?;

    if changed == 0 && !fields.is_empty() {
        return Err(ApiError::not_found("UPDATE_FAILED", format!("Scan {} not found", id)));
    }
    Ok(message(format!("Scan {} updated", id)))
}

pub async fn delete_scan_result(
    State(ctx): State<AppState>,
    id: IdPath,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let removed = ctx.store().delete_scan_result(id).map_err(|e| {
        ApiError::internal("DELETE_FAILED", "Failed to delete scan result").with_details(e)
    })?;

    if removed == 0 {
        return Err(ApiError::not_found("DELETE_FAILED", format!("Scan {} not found", id)));
    }
    Ok(message(format!("Scan {} deleted", id)))
}

pub async fn trigger_scan(State(ctx): State<AppState>) -> ApiResult<impl IntoResponse> {
    match ctx.trigger_scan() {
        Ok(_) => Ok((StatusCode::ACCEPTED, message("Scan started"))),
        Err(ScanError::AlreadyRunning) => Err(ApiError::conflict(
            "SCAN_IN_PROGRESS",
            "A scan is already in progress",
        )),
    }
}

pub async fn send_data(State(ctx): State<AppState>) -> ApiResult<Json<Value>> {
    let outcome = ctx.send_inventory().await.map_err(|e| {
        ApiError::internal("SEND_FAILED", "Failed to read inventory").with_details(e)
    })?;

    if outcome.success {
        Ok(Json(json!({
            "status": "success",
            "message": "Data sent to remote server",
            "data": outcome,
        })))
    } else {
        let details = outcome.error.unwrap_or_default();
        Err(ApiError::new(StatusCode::BAD_GATEWAY, "SEND_FAILED", "Failed to send data")
            .with_details(details))
    }
}

pub async fn get_dashboard(State(ctx): State<AppState>) -> ApiResult<Json<Value>> {
    let applications = ctx.fetch_cached_inventory().map_err(|e| {
        ApiError::internal("DASHBOARD_FAILED", "Failed to get dashboard data").with_details(e)
    })?;
    let system_profile = ctx.system_profile().await;

    Ok(success(json!({
        "status": ctx.get_status(),
        "system_profile": system_profile,
        "applications": applications,
    })))
}
