use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use super::{
    EllipsoidQuery, FloodRunoffQuery, Gateway, QueryBody, Relayed, RoutingQuery, ThematicQuery,
    VillageQuery,
};
use crate::error::ApiError;
use crate::identity::UserId;

/// Gateway routes, meant to be nested under `/api/bhuvan`.
pub fn router() -> Router<Gateway> {
    Router::new()
        .route("/routing", get(routing))
        .route("/thematic", get(thematic))
        .route("/vg", get(village))
        .route("/ellipsoid", get(ellipsoid))
        .route("/floodrunoff", get(flood_runoff))
        .route("/execute-query", post(execute_query))
        .route("/execute-central-query", post(execute_central_query))
}

async fn routing(
    user: UserId,
    State(gw): State<Gateway>,
    Query(q): Query<RoutingQuery>,
) -> Result<Relayed, ApiError> {
    info!(%user, "routing request");
    Ok(gw.routing(&q).await?)
}

async fn thematic(
    user: UserId,
    State(gw): State<Gateway>,
    Query(q): Query<ThematicQuery>,
) -> Result<Relayed, ApiError> {
    info!(%user, year = %q.year, "thematic request");
    Ok(gw.thematic(&q).await?)
}

async fn village(
    _user: UserId,
    State(gw): State<Gateway>,
    Query(q): Query<VillageQuery>,
) -> Result<Relayed, ApiError> {
    Ok(gw.village(&q).await?)
}

async fn ellipsoid(
    user: UserId,
    State(gw): State<Gateway>,
    Query(q): Query<EllipsoidQuery>,
) -> Result<Response, ApiError> {
    info!(%user, id = %q.id, "ellipsoid download");
    Ok(gw.ellipsoid(&q).await?)
}

async fn flood_runoff(
    _user: UserId,
    State(gw): State<Gateway>,
    Query(q): Query<FloodRunoffQuery>,
) -> Result<Relayed, ApiError> {
    Ok(gw.flood_runoff(&q).await?)
}

fn require_query(body: &QueryBody) -> Result<&str, ApiError> {
    let query = body.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query is required".into()));
    }
    Ok(query)
}

async fn execute_query(
    user: UserId,
    State(gw): State<Gateway>,
    Json(body): Json<QueryBody>,
) -> Result<Relayed, ApiError> {
    let query = require_query(&body)?;
    Ok(gw.execute_query(&user, query).await?)
}

async fn execute_central_query(
    user: UserId,
    State(gw): State<Gateway>,
    Json(body): Json<QueryBody>,
) -> Result<Relayed, ApiError> {
    let query = require_query(&body)?;
    Ok(gw.execute_central_query(&user, query).await?)
}
