//! HTTP product-creation API.
//!
//! `POST /products` enriches the submitted text, merges the result into the
//! record and stores it. Enrichment degradation never fails the request;
//! only a vector-length mismatch does.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::catalog::{self, store, types::NewProduct, types::ProductRecord, CatalogError};
use crate::config::ShelfvecConfig;
use crate::enrich::{EmbeddingStatus, EnrichError, EnrichmentService, FallbackReason};

/// Shared state handed to every handler.
pub struct AppState {
    pub catalog: Arc<Mutex<Connection>>,
    pub enrichment: Arc<EnrichmentService>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("product not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    ConfigurationMismatch(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ConfigurationMismatch(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::ConfigurationMismatch(_) => "configuration_mismatch",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<EnrichError> for ApiError {
    fn from(err: EnrichError) -> Self {
        ApiError::ConfigurationMismatch(err.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DimensionMismatch { .. } => {
                ApiError::ConfigurationMismatch(err.to_string())
            }
            CatalogError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateProductResponse {
    pub id: String,
    pub embedding_status: EmbeddingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/products", post(create_product))
        .route("/products/{id}", get(get_product))
        .with_state(state)
}

/// Run a catalog operation on the blocking pool with the connection locked.
async fn with_catalog<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, CatalogError> + Send + 'static,
{
    let catalog = Arc::clone(&state.catalog);
    tokio::task::spawn_blocking(move || {
        let mut conn = catalog
            .lock()
            .map_err(|e| ApiError::Internal(format!("catalog lock poisoned: {e}")))?;
        f(&mut conn).map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("catalog task failed: {e}")))?
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<CreateProductResponse>), ApiError> {
    if product.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }

    tracing::info!(name = %product.name, category = %product.category, "create_product called");

    let enrichment = state.enrichment.enrich(&product.to_enrichment_request()).await?;
    let fallback_reason = enrichment.fallback_reason();
    let dimensions = state.enrichment.dimensions();

    let record = with_catalog(&state, move |conn| {
        store::insert_product(conn, &product, &enrichment, dimensions)
    })
    .await?;

    tracing::info!(
        id = %record.id,
        status = %record.embedding_status,
        "product stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateProductResponse {
            id: record.id,
            embedding_status: record.embedding_status,
            fallback_reason,
        }),
    ))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductRecord>, ApiError> {
    let lookup = id.clone();
    let record = with_catalog(&state, move |conn| store::get_product(conn, &lookup)).await?;
    record.map(Json).ok_or(ApiError::NotFound(id))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let stats = with_catalog(&state, |conn| store::catalog_stats(conn)).await?;
    let backend = if state.enrichment.is_initialized() {
        "ready"
    } else {
        "cold"
    };

    Ok(Json(json!({
        "status": "healthy",
        "embedding_backend": backend,
        "embedding_dimensions": state.enrichment.dimensions(),
        "products": stats.products,
        "placeholders": stats.placeholder,
    })))
}

/// Open the catalog, build the enrichment service, and warn on model drift.
fn setup_shared_state(config: &ShelfvecConfig) -> Result<Arc<AppState>> {
    let db_path = config.resolved_db_path();
    let embedding = &config.embedding;
    let conn = catalog::open_catalog(&db_path, embedding.dimensions, &embedding.model)?;
    tracing::info!(db = %db_path.display(), "catalog ready");

    if let Ok(Some(stored_model)) = catalog::meta::get_embedding_model(&conn) {
        if stored_model != config.embedding.model {
            tracing::warn!(
                stored = %stored_model,
                configured = %config.embedding.model,
                "embedding model changed, run `shelfvec re-enrich --all` to update all vectors"
            );
        }
    }

    Ok(Arc::new(AppState {
        catalog: Arc::new(Mutex::new(conn)),
        enrichment: Arc::new(EnrichmentService::from_config(&config.embedding)),
    }))
}

/// Start the HTTP server and run until ctrl-c.
pub async fn serve(config: ShelfvecConfig) -> Result<()> {
    let bind_addr = config.bind_addr();
    let state = setup_shared_state(&config)?;

    // Failure here only means products are stored with placeholders.
    if let Err(e) = state.enrichment.warm_up().await {
        tracing::warn!(error = %e, "embedding backend not ready, serving in degraded mode");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
