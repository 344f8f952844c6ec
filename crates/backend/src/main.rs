mod assets;
mod config;
mod error;
mod gateway;
mod graphql;
mod identity;
mod projects;
mod state_store;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::http::{HeaderMap, HeaderValue};
use axum::{extract::State, response::Html, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use gateway::Gateway;
use graphql::Schema;
use identity::UserId;
use projects::Projects;
use state_store::StateStore;

#[derive(Clone)]
struct AppState {
    schema: Schema,
    dist_dir: Arc<PathBuf>,
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut req = req.into_inner();
    if let Some(user) = UserId::from_headers(&headers) {
        req = req.data(user);
    }
    state.schema.execute(req).await.into()
}

async fn graphiql() -> Html<String> {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/graphql")
            .finish(),
    )
}

/// Build a cache-controlled static file router.
///
/// Separated so tests can exercise the caching layer with arbitrary directories.
fn cached_static_router(dir: &Path, cache_header: &'static str) -> Router {
    let layer = SetResponseHeaderLayer::overriding(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(cache_header),
    );
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(layer)
}

const CACHE_1DAY: &str = "public, max-age=86400, must-revalidate";
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Everything the router needs, assembled from [`Config`] at start-up.
struct Services {
    gateway: Gateway,
    projects: Projects,
    schema: Schema,
}

/// Build the full application router.
fn build_app(config: &Config, services: Services) -> Router {
    // Static file routers are stateless, merge them before adding app state
    let static_files = Router::new()
        .nest(
            "/static",
            cached_static_router(&config.assets_dir, CACHE_1DAY),
        )
        .nest(
            "/dist",
            cached_static_router(&config.dist_dir, CACHE_IMMUTABLE),
        )
        .nest(
            "/assets",
            cached_static_router(&config.dist_dir.join("assets"), CACHE_IMMUTABLE),
        );

    let state = AppState {
        schema: services.schema,
        dist_dir: Arc::new(config.dist_dir.clone()),
    };

    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/", get(serve_index))
        .route("/editor", get(serve_index))
        .route("/map-view/{id}", get(serve_index))
        .route("/central-db", get(serve_index))
        .route("/personal-db", get(serve_index))
        .route("/demo", get(serve_index))
        .with_state(state)
        .nest(
            "/api/bhuvan",
            gateway::handlers::router().with_state(services.gateway),
        )
        .nest(
            "/api/map",
            projects::router().with_state(services.projects),
        )
        .merge(static_files)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let missing = config.missing_tokens();
    if !missing.is_empty() {
        warn!(?missing, "upstream tokens not set, requests will carry empty tokens");
    }

    let loaded_assets = Arc::new(assets::Assets::load(&config.assets_dir)?);
    let storage = storage::Storage::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;

    let gateway = Gateway::new(config.upstream.clone(), config.executor_url.clone())
        .context("Failed to build HTTP client")?;
    let store = if gateway.has_executor() {
        StateStore::Executor(gateway.clone())
    } else {
        StateStore::Local(storage.clone())
    };
    info!(store = store.name(), "map state store selected");

    let schema = graphql::build_schema(loaded_assets, storage.clone(), store.clone());
    let app = build_app(
        &config,
        Services {
            gateway,
            projects: Projects { storage, store },
            schema,
        },
    );

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Server running at http://localhost:{}", config.port);
    info!("GraphiQL playground at http://localhost:{}/graphql", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index(State(state): State<AppState>) -> Html<String> {
    // Try to serve the built frontend, fall back to a simple message
    match tokio::fs::read_to_string(state.dist_dir.join("index.html")).await {
        Ok(html) => Html(html),
        Err(_) => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Bhuvan Map Editor</title></head>
<body>
<h1>Bhuvan Map Editor</h1>
<p>Frontend not built yet. Visit <a href="/graphql">GraphiQL</a> to explore the API.</p>
</body>
</html>"#
                .to_string(),
        ),
    }
}
