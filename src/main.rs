//! W-2 Extractor - transcribes uploaded W-2 images into normalized records.

mod coerce;
mod config;
mod extractor;
mod json_extract;
mod openrouter;
mod prompt;
mod vision;
mod w2;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::ServiceConfig;
use extractor::W2Extractor;
use openrouter::OpenRouterClient;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use vision::ImageInput;
use w2::W2;

const SAMPLE_W2_FILE: &str = "Sample_W2.jpg";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractor: Arc<W2Extractor>,
    forms_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "w2_extractor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;

    let client = OpenRouterClient::new(&config.openrouter_api_key).with_model(&config.model);
    info!("OpenRouter client initialized (model: {})", config.model);

    let state = AppState {
        extractor: Arc::new(W2Extractor::new(client)),
        forms_dir: config.forms_dir.clone(),
    };

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/forms/w2/upload", post(upload_w2))
        .route("/forms/w2/parse", post(parse_w2))
        .route("/forms/w2/extract-json", post(extract_json))
        .route("/forms/w2/prompt", get(w2_prompt))
        .route("/forms/w2/sample", get(sample_w2))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

/// Upload a W-2 image and return the normalized record.
async fn upload_w2(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<W2>, ApiError> {
    let request_id = Uuid::new_v4().simple().to_string();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // A plain text field named "file" is not an upload.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            api_error(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
        })?;
        image = Some(ImageInput::new(filename, content_type.as_deref(), data.to_vec()));
        break;
    }

    let image = match image {
        Some(image) if !image.data.is_empty() => image,
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "Missing file")),
    };

    let span = info_span!("w2_upload", %request_id, filename = %image.filename);
    async {
        info!("Received W-2 upload ({} bytes, {})", image.data.len(), image.mime_type);
        state.extractor.extract(&image).await.map(Json).map_err(|e| {
            error!("W-2 extraction failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process W-2 image")
        })
    }
    .instrument(span)
    .await
}

/// Normalize an already-received model reply (request body is the raw text).
async fn parse_w2(body: String) -> Result<Json<W2>, ApiError> {
    extractor::parse_raw(&body).map(Json).map_err(|e| {
        warn!("Raw W-2 reply rejected: {}", e);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })
}

/// Return the canonical JSON payload of a raw model reply, without normalizing it.
async fn extract_json(body: String) -> Result<Response, ApiError> {
    let json = json_extract::extract_json_string(&body).map_err(|e| {
        warn!("Raw reply has no JSON: {}", e);
        api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}

async fn w2_prompt() -> &'static str {
    prompt::W2_PROMPT
}

/// Serve the sample W-2 image used to try the upload flow.
async fn sample_w2(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = state.forms_dir.join(SAMPLE_W2_FILE);
    let data = tokio::fs::read(&path).await.map_err(|e| {
        warn!("Sample W-2 unavailable at {:?}: {}", path, e);
        api_error(StatusCode::NOT_FOUND, "Sample W-2 not found")
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", SAMPLE_W2_FILE),
            ),
            (header::CACHE_CONTROL, "public, max-age=3600, immutable".to_string()),
        ],
        Bytes::from(data),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::tests::CannedModel;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "w2-test-boundary";

    fn test_router(reply: &str, forms_dir: PathBuf) -> Router {
        let state = AppState {
            extractor: Arc::new(W2Extractor::new(CannedModel::replying(reply))),
            forms_dir,
        };
        router(state, 1024 * 1024)
    }

    fn multipart_request(field: &str, filename: Option<&str>, data: &str) -> Request<Body> {
        let disposition = match filename {
            Some(f) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, f),
            None => format!("form-data; name=\"{}\"", field),
        };
        let body = format!(
            "--{b}\r\nContent-Disposition: {d}\r\nContent-Type: image/jpeg\r\n\r\n{data}\r\n--{b}--\r\n",
            b = BOUNDARY,
            d = disposition,
            data = data,
        );
        Request::builder()
            .method("POST")
            .uri("/forms/w2/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router("{}", PathBuf::from("forms"));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upload_returns_normalized_record() {
        let reply = "```json\n{\"tax_year\": 2024, \"identification_and_address\": {\"box_a_employee_ssn\": \"123-45-6789\"}}\n```";
        let app = test_router(reply, PathBuf::from("forms"));
        let response = app
            .oneshot(multipart_request("file", Some("w2.jpg"), "not-really-a-jpeg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["tax_year"], 2024);
        assert_eq!(body["identification_and_address"]["box_a_employee_ssn"], "123-45-6789");
        assert_eq!(body["federal_wages_and_taxes"]["box_12_items"], serde_json::json!([]));
        assert_eq!(body["federal_wages_and_taxes"]["box_1_wages_tips_other_comp"], 0.0);
    }

    #[tokio::test]
    async fn test_upload_without_file() {
        let app = test_router("{}", PathBuf::from("forms"));
        let response = app
            .oneshot(multipart_request("file", None, "just text"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Missing file");
    }

    #[tokio::test]
    async fn test_upload_with_unusable_reply() {
        let app = test_router("Sorry, I cannot help with that.", PathBuf::from("forms"));
        let response = app
            .oneshot(multipart_request("file", Some("w2.jpg"), "bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to process W-2 image");
    }

    #[tokio::test]
    async fn test_parse_route() {
        let app = test_router("{}", PathBuf::from("forms"));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/forms/w2/parse")
                    .body(Body::from("Result: {\"tax_year\": \"2021\"} done"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["tax_year"], 2021);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/forms/w2/parse")
                    .body(Body::from("nothing here"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_extract_json_route() {
        let response = test_router("{}", PathBuf::from("forms"))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/forms/w2/extract-json")
                    .body(Body::from("```json\n{ \"a\" : [1, 2] }\n```"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"a":[1,2]}"#);
    }

    #[tokio::test]
    async fn test_sample_image() {
        let dir = std::env::temp_dir().join(format!("w2-forms-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SAMPLE_W2_FILE), [0xFF, 0xD8, 0xFF]).unwrap();

        let response = test_router("{}", dir.clone())
            .oneshot(Request::builder().uri("/forms/w2/sample").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        let missing = test_router("{}", dir.join("nope"))
            .oneshot(Request::builder().uri("/forms/w2/sample").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_prompt_route() {
        let response = test_router("{}", PathBuf::from("forms"))
            .oneshot(Request::builder().uri("/forms/w2/prompt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("box_12_items"));
    }
}
