use crate::batch_planner::{plan_keys, PlanRequestEntry, PlannedArtifact};
use crate::config::ApiConfig;
use crate::object_keys::TaskIdentity;
use crate::object_store::StoreClient;
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

/// Expiry for the presigned GET returned after a proxied upload
const UPLOAD_GET_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);
/// Expiry for the single-key presign probe
const PING_PUT_EXPIRY: Duration = Duration::from_secs(600);
/// Expiry for every PUT URL in a checklist batch
const BATCH_PUT_EXPIRY: Duration = Duration::from_secs(3600);

/// Uploads are buffered in memory, so cap the request body
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Client on the internal endpoint, used for object writes
    pub internal: Arc<StoreClient>,
    /// Client on the public endpoint, used for every URL handed to clients
    pub signer: Arc<StoreClient>,
    pub upload_bucket: String,
    pub presign_bucket: String,
}

/// Service info returned at the root route
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfoResponse {
    pub ok: bool,
    pub upload_bucket: String,
    pub presign_bucket: String,
    pub public: PublicEndpoint,
}

/// Public endpoint advertised to clients
#[derive(Debug, Serialize)]
pub struct PublicEndpoint {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
}

/// Store health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub ts: String,
}

/// Successful upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub bucket: String,
    pub key: String,
    pub url: String,
    pub meta: UploadMeta,
}

/// Opaque client fields echoed back with the upload result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMeta {
    pub comment_key: Option<String>,
    pub id_code: Option<String>,
    pub stt: Option<String>,
}

/// Upload error body, `ok` always false
#[derive(Debug, Serialize)]
pub struct UploadErrorResponse {
    pub ok: bool,
    pub error: String,
}

/// Error body for the presign routes
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query parameters for the single-key presign probe
#[derive(Debug, Deserialize)]
pub struct PresignPutQuery {
    #[serde(default = "default_ping_key")]
    pub key: String,
}

fn default_ping_key() -> String {
    "ping.txt".to_string()
}

/// Single-key presign response
#[derive(Debug, Serialize)]
pub struct PresignPutResponse {
    pub bucket: String,
    pub key: String,
    pub url: String,
}

/// Batch presign request: the task identity fields sit at the top level
/// next to the plan entries
#[derive(Debug, Deserialize)]
pub struct BatchPresignRequest {
    #[serde(flatten)]
    pub identity: TaskIdentity,
    #[serde(default)]
    pub plans: Vec<PlanRequestEntry>,
}

/// Batch presign response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPresignResponse {
    pub bucket: String,
    pub expires_in: u64,
    pub results: Vec<SignedArtifact>,
}

/// One planned artifact with its signed upload URL
#[derive(Debug, Serialize)]
pub struct SignedArtifact {
    #[serde(flatten)]
    pub artifact: PlannedArtifact,
    pub url: String,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(service_info))
        .route("/health-minio", get(health_check))
        .route("/upload", post(upload_object))
        .route("/presign-put", get(presign_put))
        .route("/presign-checklist-batch", post(presign_checklist_batch))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Service info endpoint
async fn service_info(State(state): State<AppState>) -> Json<ServiceInfoResponse> {
    let profile = state.signer.profile();
    Json(ServiceInfoResponse {
        ok: true,
        upload_bucket: state.upload_bucket.clone(),
        presign_bucket: state.presign_bucket.clone(),
        public: PublicEndpoint {
            host: profile.host.clone(),
            port: profile.port,
            ssl: profile.use_ssl,
        },
    })
}

/// Store health endpoint
async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .internal
        .bucket_exists(&state.upload_bucket)
        .await
        .map_err(|e| {
            error!(error = %e, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "Object store unreachable".to_string(),
                }),
            )
        })?;

    Ok(Json(HealthResponse {
        ok: true,
        ts: Utc::now().to_rfc3339(),
    }))
}

fn upload_error(
    status: StatusCode,
    message: &str,
) -> (StatusCode, Json<UploadErrorResponse>) {
    (
        status,
        Json(UploadErrorResponse {
            ok: false,
            error: message.to_string(),
        }),
    )
}

/// Accept a multipart upload, store it under a date-partitioned key and
/// return a presigned GET for the stored object
#[instrument(skip(state, multipart))]
async fn upload_object(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<UploadErrorResponse>)> {
    let mut file: Option<(Vec<u8>, Option<String>, Option<String>)> = None;
    let mut filename_override: Option<String> = None;
    let mut comment_key: Option<String> = None;
    let mut id_code: Option<String> = None;
    let mut stt: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        counter!("gateway.uploads.rejected").increment(1);
        upload_error(StatusCode::BAD_REQUEST, &format!("Invalid multipart body: {e}"))
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let original_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    counter!("gateway.uploads.rejected").increment(1);
                    upload_error(
                        StatusCode::BAD_REQUEST,
                        &format!("Failed to read file field: {e}"),
                    )
                })?;
                file = Some((bytes.to_vec(), original_name, content_type));
            }
            Some("filename") => {
                filename_override = field.text().await.ok().filter(|s| !s.is_empty());
            }
            Some("commentKey") => comment_key = field.text().await.ok(),
            Some("idCode") => id_code = field.text().await.ok(),
            Some("stt") => stt = field.text().await.ok(),
            _ => {}
        }
    }

    let Some((data, original_name, content_type)) = file else {
        counter!("gateway.uploads.rejected").increment(1);
        return Err(upload_error(
            StatusCode::BAD_REQUEST,
            "Missing file field 'image'",
        ));
    };

    let filename = filename_override
        .or(original_name)
        .unwrap_or_else(|| "upload.bin".to_string());
    let content_type =
        content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let key = format!("{}/{}", Utc::now().format("%Y/%m/%d"), filename);

    state
        .internal
        .put_object(&state.upload_bucket, &key, data, &content_type)
        .await
        .map_err(|e| {
            error!(error = %e, key = %key, "Upload to object store failed");
            counter!("gateway.uploads.failed").increment(1);
            upload_error(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed")
        })?;

    let url = state
        .signer
        .presigned_get_url(&state.upload_bucket, &key, UPLOAD_GET_EXPIRY)
        .await
        .map_err(|e| {
            error!(error = %e, key = %key, "Failed to presign download URL");
            counter!("gateway.uploads.failed").increment(1);
            upload_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to presign download URL",
            )
        })?;

    info!(bucket = %state.upload_bucket, key = %key, "Upload stored");
    counter!("gateway.uploads.completed").increment(1);

    Ok(Json(UploadResponse {
        ok: true,
        bucket: state.upload_bucket.clone(),
        key,
        url,
        meta: UploadMeta {
            comment_key,
            id_code,
            stt,
        },
    }))
}

/// Presign a single PUT on the presign bucket
#[instrument(skip(state))]
async fn presign_put(
    State(state): State<AppState>,
    Query(params): Query<PresignPutQuery>,
) -> Result<Json<PresignPutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let url = state
        .signer
        .presigned_put_url(&state.presign_bucket, &params.key, PING_PUT_EXPIRY)
        .await
        .map_err(|e| {
            error!(error = %e, key = %params.key, "Failed to presign PUT URL");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Failed to presign upload URL".to_string(),
                }),
            )
        })?;

    counter!("gateway.presign.urls_issued").increment(1);

    Ok(Json(PresignPutResponse {
        bucket: state.presign_bucket.clone(),
        key: params.key,
        url,
    }))
}

/// Plan object keys for a checklist batch and presign one PUT per slot
///
/// Planning is all-or-nothing and so is signing: the first failure aborts
/// the call with no partial results.
#[instrument(skip(state, request), fields(plan_count = request.plans.len()))]
async fn presign_checklist_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchPresignRequest>,
) -> Result<Json<BatchPresignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let planned = plan_keys(&request.identity, &request.plans).map_err(|e| {
        counter!("gateway.presign.batch_rejected").increment(1);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let mut results = Vec::with_capacity(planned.len());
    for artifact in planned {
        let url = state
            .signer
            .presigned_put_url(&state.presign_bucket, &artifact.key, BATCH_PUT_EXPIRY)
            .await
            .map_err(|e| {
                error!(error = %e, key = %artifact.key, "Failed to presign batch PUT URL");
                counter!("gateway.presign.batch_rejected").increment(1);
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Failed to presign upload URL".to_string(),
                    }),
                )
            })?;
        results.push(SignedArtifact { artifact, url });
    }

    counter!("gateway.presign.batches_planned").increment(1);
    counter!("gateway.presign.urls_issued").increment(results.len() as u64);

    Ok(Json(BatchPresignResponse {
        bucket: state.presign_bucket.clone(),
        expires_in: BATCH_PUT_EXPIRY.as_secs(),
        results,
    }))
}

/// Start the gateway API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting media gateway API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}
