//! UI serving routes
//!
//! HTML pages are embedded at compile time. The index page carries a
//! `{{RESULT}}` placeholder filled in after a form submission.

use axum::{
    response::Html,
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../../ui/index.html");
const GENERATE_HTML: &str = include_str!("../../ui/generate.html");
const SCAN_HTML: &str = include_str!("../../ui/scan.html");
const RECORDS_HTML: &str = include_str!("../../ui/records.html");

const RESULT_PLACEHOLDER: &str = "{{RESULT}}";

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index_page).post(super::generate::generate_page))
        .route("/generate", get(generate_page))
        .route("/scan", get(scan_page))
        .route("/records", get(records_page))
}

/// GET /
///
/// Contact form
pub async fn index_page() -> Html<String> {
    render_index("")
}

/// GET /generate
pub async fn generate_page() -> Html<&'static str> {
    Html(GENERATE_HTML)
}

/// GET /scan
///
/// Camera scanner that posts decoded text to `/api/save-scan`
pub async fn scan_page() -> Html<&'static str> {
    Html(SCAN_HTML)
}

/// GET /records
pub async fn records_page() -> Html<&'static str> {
    Html(RECORDS_HTML)
}

/// Index page with the `result` fragment below the form
///
/// `result` is inserted as HTML; callers escape any user text in it.
pub(crate) fn render_index(result: &str) -> Html<String> {
    Html(INDEX_HTML.replace(RESULT_PLACEHOLDER, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_has_placeholder() {
        assert!(INDEX_HTML.contains(RESULT_PLACEHOLDER));
        assert!(!render_index("").0.contains(RESULT_PLACEHOLDER));
    }
}
