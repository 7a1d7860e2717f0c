use crate::{
    app::{AppError, LinkCounts, LinkQuery, LinkSave, LinkService, SharePayload},
    links::{LinkId, SavedLink},
    metadata::{url_info, LinkMetadata, PageFetcher, Resolver, UrlInfo},
};
use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

struct SharedState<F> {
    service: LinkService,
    resolver: Resolver<F>,
}

type AppState<F> = State<Arc<SharedState<F>>>;

pub fn router<F: PageFetcher + 'static>(service: LinkService, resolver: Resolver<F>) -> Router {
    let shared_state = Arc::new(SharedState { service, resolver });

    Router::new()
        .route("/api/links/save", post(save::<F>))
        .route("/api/links/share", post(share::<F>))
        .route("/api/links/list", post(list::<F>))
        .route("/api/links/get", post(get_link::<F>))
        .route("/api/links/toggle_read", post(toggle_read::<F>))
        .route("/api/links/mark_read", post(mark_read::<F>))
        .route("/api/links/delete", post(delete::<F>))
        .route("/api/links/reset_unread", post(reset_unread::<F>))
        .route("/api/links/migrate_metadata", post(migrate_metadata::<F>))
        .route("/api/links/tags", post(tags::<F>))
        .route("/api/links/counts", post(counts::<F>))
        .route("/api/preview", post(preview::<F>))
        .route("/api/resolve", post(resolve::<F>))
        .route("/api/url_info", post(info))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

pub async fn start_daemon<F: PageFetcher + 'static>(
    addr: &str,
    service: LinkService,
    resolver: Resolver<F>,
) -> anyhow::Result<()> {
    let app = router(service, resolver);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            AppError::NotFound => axum::http::StatusCode::NOT_FOUND,
            AppError::Forbidden => axum::http::StatusCode::FORBIDDEN,
            AppError::InvalidUrl(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Persistence(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Run a store-bound operation off the async executor
fn blocking<T>(f: impl FnOnce() -> Result<T, AppError>) -> Result<Json<T>, HttpError> {
    tokio::task::block_in_place(f).map(Json).map_err(HttpError)
}

/// Resolve metadata for a freshly saved link without holding up the response
fn spawn_resolution<F: PageFetcher + 'static>(resolver: &Resolver<F>, link: &SavedLink) {
    let resolver = resolver.clone();
    let url = link.url.clone();
    let id = link.id.clone();

    tokio::spawn(async move {
        resolver.resolve_and_apply(&url, &id).await;
    });
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub user_id: String,
    pub id: LinkId,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SaveRequest {
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub original_app: Option<String>,

    /// Skip fetching the page. The link is still saved with what can be
    /// inferred from the url.
    #[serde(default)]
    pub no_meta: bool,
}

async fn save<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(payload): Json<SaveRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    log::debug!("payload: {payload:?}");
    let no_meta = payload.no_meta;

    let Json(link) = blocking(|| {
        let link =
            state
                .service
                .save_link_with_metadata(&payload.user_id, &payload.url, payload.original_app)?;

        if payload.title.is_none() && payload.description.is_none() && payload.tags.is_none() {
            return Ok(link);
        }

        state.service.save_link(
            &payload.user_id,
            LinkSave {
                url: link.url,
                title: payload.title,
                description: payload.description,
                tags: payload.tags,
                ..Default::default()
            },
        )
    })?;

    if !no_meta {
        spawn_resolution(&state.resolver, &link);
    }

    Ok(Json(link))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub payload: SharePayload,
}

async fn share<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    log::debug!("payload: {req:?}");

    let Json(link) = blocking(|| state.service.save_shared(&req.user_id, &req.payload))?;
    spawn_resolution(&state.resolver, &link);

    Ok(Json(link))
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub query: LinkQuery,
}

async fn list<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<ListRequest>,
) -> Result<Json<Vec<SavedLink>>, HttpError> {
    log::debug!("payload: {req:?}");
    blocking(|| state.service.list_links(&req.user_id, &req.query))
}

async fn get_link<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    blocking(|| state.service.get_link(&req.user_id, &req.id))
}

async fn toggle_read<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    blocking(|| state.service.toggle_read(&req.user_id, &req.id))
}

async fn mark_read<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    blocking(|| state.service.mark_as_read(&req.user_id, &req.id))
}

async fn delete<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    blocking(|| {
        state.service.delete_link(&req.user_id, &req.id)?;
        Ok(json!({"id": req.id}))
    })
}

async fn reset_unread<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<UserRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    blocking(|| {
        let count = state.service.reset_all_to_unread(&req.user_id)?;
        Ok(json!({"count": count}))
    })
}

#[derive(Debug, Deserialize)]
pub struct MigrateRequest {
    pub user_id: String,
    /// Only this link
    pub id: Option<LinkId>,
}

async fn migrate_metadata<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<MigrateRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    blocking(|| match &req.id {
        Some(id) => {
            let link = state.service.update_link_metadata(&req.user_id, id)?;
            Ok(json!({"count": 1, "link": link}))
        }
        None => {
            let count = state.service.migrate_all_links_metadata(&req.user_id)?;
            Ok(json!({"count": count}))
        }
    })
}

async fn tags<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<UserRequest>,
) -> Result<Json<Vec<String>>, HttpError> {
    blocking(|| state.service.tags(&req.user_id))
}

async fn counts<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<UserRequest>,
) -> Result<Json<LinkCounts>, HttpError> {
    blocking(|| state.service.counts(&req.user_id))
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

async fn preview<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<UrlRequest>,
) -> Json<LinkMetadata> {
    Json(state.resolver.resolve(&req.url).await)
}

/// Fetch metadata for a saved link and merge it in before responding
async fn resolve<F: PageFetcher + 'static>(
    State(state): AppState<F>,
    Json(req): Json<LinkRequest>,
) -> Result<Json<SavedLink>, HttpError> {
    let Json(link) = blocking(|| state.service.get_link(&req.user_id, &req.id))?;
    state.resolver.resolve_and_apply(&link.url, &link.id).await;
    blocking(|| state.service.get_link(&req.user_id, &req.id))
}

async fn info(Json(req): Json<UrlRequest>) -> Json<UrlInfo> {
    Json(url_info(&req.url))
}
