//! Scan endpoints
//!
//! Saving, listing, deleting and exporting scanned QR payloads. A payload
//! that does not decode is still saved; its raw text is kept verbatim.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection, PathRejection},
        Path, State,
    },
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use qrcard_common::{NewScan, ScanRecord};

use super::value_text;
use crate::export::{export_workbook, XLSX_CONTENT_TYPE};
use crate::{ApiResult, AppState};

/// Form fields posted by simple scanner clients
#[derive(Debug, Default, Deserialize)]
pub struct SaveScanForm {
    #[serde(default, alias = "qr_data")]
    pub data: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// JSON body for `POST /api/save-scan`
#[derive(Debug, Default, Deserialize)]
pub struct SaveScanRequest {
    #[serde(default, alias = "data")]
    pub qr_data: Option<Value>,
    #[serde(default)]
    pub additional_info: Option<Value>,
}

/// Response for `POST /api/save-scan`
#[derive(Debug, Serialize)]
pub struct SaveScanResponse {
    pub success: bool,
    pub message: String,
    pub scan_id: i64,
    /// Whether the payload decoded into contact fields
    pub parsed: bool,
}

/// Response for `GET /api/get-scans`
#[derive(Debug, Serialize)]
pub struct ScanListResponse {
    pub success: bool,
    pub scans: Vec<ScanRecord>,
}

/// Build scan routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/save_scan", post(save_scan_form))
        .route("/api/save-scan", post(save_scan))
        .route("/api/get-scans", get(get_scans))
        .route("/api/delete-scan/:id", delete(delete_scan))
        .route("/api/clear-all", delete(clear_all))
        .route("/api/export-excel", get(export_excel))
}

async fn store_scan(state: &AppState, scan: NewScan) -> ApiResult<ScanRecord> {
    let record = state.store.append_scan(scan).await?;
    if record.parsed {
        info!("Scan saved with ID: {} (contact {})", record.id, record.fields.id);
    } else {
        warn!(
            "Scan saved with ID: {} but payload was not recognized; raw text stored",
            record.id
        );
    }
    Ok(record)
}

/// POST /save_scan
///
/// Form field `data` holds the scanned text. Responds with plain `Saved`.
pub async fn save_scan_form(
    State(state): State<AppState>,
    form: Result<Form<SaveScanForm>, FormRejection>,
) -> ApiResult<&'static str> {
    let Form(form) = form?;
    let scan = NewScan::new(form.data.unwrap_or_default(), form.additional_info)?;
    store_scan(&state, scan).await?;
    Ok("Saved")
}

/// POST /api/save-scan
///
/// **Request:** `{"qr_data": "...", "additional_info": "..."}`
/// **Response:** `{"success": true, "message": "...", "scan_id": 1, "parsed": true}`
///
/// **Errors:**
/// - 400 Bad Request: `qr_data` missing or blank
/// - 500 Internal Server Error: store unavailable
pub async fn save_scan(
    State(state): State<AppState>,
    payload: Result<Json<SaveScanRequest>, JsonRejection>,
) -> ApiResult<Json<SaveScanResponse>> {
    let Json(request) = payload?;
    let additional_info = Some(value_text(request.additional_info));
    let scan = NewScan::new(value_text(request.qr_data), additional_info)?;

    let record = store_scan(&state, scan).await?;

    Ok(Json(SaveScanResponse {
        success: true,
        message: "Scan saved successfully".to_string(),
        scan_id: record.id,
        parsed: record.parsed,
    }))
}

/// GET /api/get-scans
///
/// All scans, newest first
pub async fn get_scans(State(state): State<AppState>) -> ApiResult<Json<ScanListResponse>> {
    let scans = state.store.list_scans().await?;
    Ok(Json(ScanListResponse {
        success: true,
        scans,
    }))
}

/// DELETE /api/delete-scan/:id
///
/// **Errors:**
/// - 404 Not Found: no scan with that ID
pub async fn delete_scan(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    state.store.delete_scan(id).await?;
    info!("Scan {} deleted", id);

    Ok(Json(json!({
        "success": true,
        "message": "Scan deleted successfully",
    })))
}

/// DELETE /api/clear-all
pub async fn clear_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deleted = state.store.clear_scans().await?;
    info!("Cleared {} scans", deleted);

    Ok(Json(json!({
        "success": true,
        "message": "All scans cleared",
        "deleted": deleted,
    })))
}

/// GET /api/export-excel
///
/// Streams an `.xlsx` attachment; 404 when there are no scans.
pub async fn export_excel(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let scans = state.store.list_scans().await?;
    let bytes = export_workbook(&scans)?;
    let file_name = qrcard_common::time::export_file_name(&qrcard_common::time::now());
    info!("Exported {} scans as {}", scans.len(), file_name);

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}
