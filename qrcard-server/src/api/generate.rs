//! QR generation endpoints
//!
//! - `POST /` form submission, answered with the index page plus the image
//! - `POST /api/generate-qr` JSON submission, answered with a data URI
//!
//! Both validate the contact, encode the payload, render the image and log
//! the contact in the generator log.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    response::Html,
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use qrcard_common::{encode, ContactRecord};

use super::ui::render_index;
use super::value_text;
use crate::{qr, ApiResult, AppState};

/// Form fields posted by the index page
#[derive(Debug, Default, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// JSON body for `POST /api/generate-qr`
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub phone: Option<Value>,
}

/// Response for `POST /api/generate-qr`
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    /// `data:image/png;base64,...`
    pub qr_image: String,
    pub qr_data: String,
}

/// Rendered output for one contact
struct Generated {
    payload: String,
    data_uri: String,
    image_file: Option<String>,
}

/// Build routes for the JSON generator (the form route lives with the UI)
pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/api/generate-qr", post(generate_qr))
}

async fn generate(state: &AppState, contact: ContactRecord, save_file: bool) -> ApiResult<Generated> {
    let payload = encode(&contact, state.payload_format)?;
    let png = state.emitter.render_png(&payload)?;

    let saved = if save_file {
        let file_name = format!(
            "qr_{}.png",
            qrcard_common::time::now().format("%Y%m%d_%H%M%S_%6f")
        );
        let path = qr::write_png(&png, &state.static_dir, &file_name).await?;
        Some((file_name, path))
    } else {
        None
    };
    let image_file = saved.as_ref().map(|(file_name, _)| file_name.clone());

    let contact_id = contact.id.clone();
    if let Err(e) = state.store.record_generated(contact, image_file.clone()).await {
        // No log row, so the image must not outlive the failed request
        if let Some((_, path)) = &saved {
            if let Err(remove_err) = tokio::fs::remove_file(path).await {
                warn!("Failed to remove {}: {}", path.display(), remove_err);
            }
        }
        return Err(e.into());
    }
    info!("Generated QR code for contact {}", contact_id);

    Ok(Generated {
        payload,
        data_uri: qr::data_uri(&png),
        image_file,
    })
}

/// POST /
///
/// Form submission of `user_id`, `name`, `email`, `phone`. Saves the image
/// under the static directory and shows it inline.
pub async fn generate_page(
    State(state): State<AppState>,
    form: Result<Form<GenerateForm>, FormRejection>,
) -> ApiResult<Html<String>> {
    let Form(form) = form?;
    let contact = ContactRecord::new(
        form.user_id.unwrap_or_default(),
        form.name.unwrap_or_default(),
        form.email.unwrap_or_default(),
        form.phone.unwrap_or_default(),
    )?;

    let generated = generate(&state, contact, true).await?;

    let download = generated
        .image_file
        .as_deref()
        .map(|file| {
            format!(
                r#"<a class="button" href="/static/{}" download>Download PNG</a>"#,
                html_escape::encode_double_quoted_attribute(file)
            )
        })
        .unwrap_or_default();
    let result = format!(
        r#"<section class="result">
    <h2>QR code generated</h2>
    <img src="{}" alt="QR code">
    <pre>{}</pre>
    {}
</section>"#,
        generated.data_uri,
        html_escape::encode_text(&generated.payload),
        download
    );

    Ok(render_index(&result))
}

/// POST /api/generate-qr
///
/// **Request:** `{"id": "42", "name": "Ann", "email": "a@x.com", "phone": "555"}`
/// **Response:** `{"success": true, "qr_image": "data:image/png;base64,...", "qr_data": "..."}`
///
/// **Errors:**
/// - 400 Bad Request: a field is missing or blank
pub async fn generate_qr(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let Json(request) = payload?;
    let contact = ContactRecord::new(
        value_text(request.id),
        value_text(request.name),
        value_text(request.email),
        value_text(request.phone),
    )?;

    let generated = generate(&state, contact, false).await?;

    Ok(Json(GenerateResponse {
        success: true,
        qr_image: generated.data_uri,
        qr_data: generated.payload,
    }))
}
