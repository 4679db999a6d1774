//! REST API for the placement service.
//!
//! Accepts container and item records as JSON, runs the placement engine on
//! a blocking worker and returns the result, either at once (`/place`) or as
//! a stream of Server-Sent Events (`/place_stream`).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, OptimizerConfig};
use crate::error::PlacementError;
use crate::model::{
    Axis, ContainerBlueprint, DEFAULT_PRIORITY, Item, NormalizationNotice, PriorityBand,
};
use crate::optimizer::{
    ContainerStats, PackingConfig, PackingResult, Placement, pack_items_cancellable,
    pack_items_with_config, validate_inputs,
};
use crate::types::{Dimensions, Position};

const DEFAULT_CONTAINER_DIMENSION: f64 = 100.0;
const DEFAULT_ITEM_DIMENSION: f64 = 50.0;
const DEFAULT_ITEM_MASS: f64 = 1.0;
const DEFAULT_ZONE: &str = "A";

#[derive(Clone)]
struct ApiState {
    packing: PackingConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>stowplan API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Dimensions as sent by clients; missing axes take a default.
#[derive(Deserialize, Clone, Copy, Debug, Default, ToSchema)]
pub struct DimensionsRecord {
    pub width: Option<f64>,
    pub depth: Option<f64>,
    pub height: Option<f64>,
}

impl DimensionsRecord {
    fn resolve(self, default: f64) -> Dimensions {
        Dimensions::new(
            self.width.unwrap_or(default),
            self.depth.unwrap_or(default),
            self.height.unwrap_or(default),
        )
    }
}

/// A storage container.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub container_id: String,
    #[serde(default)]
    pub dimensions: DimensionsRecord,
    #[serde(default)]
    pub zone: Option<String>,
}

/// An item to stow.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub item_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dimensions: DimensionsRecord,
    #[serde(default)]
    pub mass: Option<f64>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// ISO-8601 date; compared lexicographically.
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub preferred_zone: Option<String>,
    /// Present if the item is already stowed.
    #[serde(default)]
    pub position: Option<Position>,
}

/// Request body of the placement endpoints.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "containers": [
            { "containerId": "contA", "zone": "Crew Quarters",
              "dimensions": { "width": 100.0, "depth": 85.0, "height": 200.0 } }
        ],
        "items": [
            { "itemId": "001", "name": "Food Packet", "priority": 8,
              "expiryDate": "2026-11-01", "preferredZone": "Crew Quarters",
              "dimensions": { "width": 10.0, "depth": 10.0, "height": 20.0 }, "mass": 5.0 }
        ],
        "enforceZones": false
    })
)]
pub struct PlaceRequest {
    pub containers: Vec<ContainerRecord>,
    pub items: Vec<ItemRecord>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub enforce_zones: Option<bool>,
}

/// Normalized engine inputs of one request.
#[derive(Debug)]
struct PreparedRequest {
    items: Vec<Item>,
    containers: Vec<ContainerBlueprint>,
    notices: Vec<NormalizationNotice>,
    enforce_zones: Option<bool>,
}

impl PlaceRequest {
    fn prepare(self) -> PreparedRequest {
        let mut notices = Vec::new();

        let containers = self
            .containers
            .into_iter()
            .map(|record| {
                let zone = record.zone.unwrap_or_else(|| DEFAULT_ZONE.to_string());
                let dims = record.dimensions.resolve(DEFAULT_CONTAINER_DIMENSION);
                let (blueprint, mut adjusted) =
                    ContainerBlueprint::new(record.container_id, zone, dims).into_parts();
                notices.append(&mut adjusted);
                blueprint
            })
            .collect();

        let items = self
            .items
            .into_iter()
            .map(|record| {
                let name = record.name.unwrap_or_else(|| record.item_id.clone());
                let dims = record.dimensions.resolve(DEFAULT_ITEM_DIMENSION);
                let mass = record.mass.unwrap_or(DEFAULT_ITEM_MASS);
                let (item, mut adjusted) = Item::new(record.item_id, name, dims, mass).into_parts();
                notices.append(&mut adjusted);

                let mut item = item
                    .with_priority(record.priority.unwrap_or(DEFAULT_PRIORITY))
                    .with_preferred_zone(
                        record
                            .preferred_zone
                            .unwrap_or_else(|| DEFAULT_ZONE.to_string()),
                    );
                if let Some(expiry) = record.expiry_date {
                    item = item.with_expiry(expiry);
                }
                if let Some(position) = record.position {
                    item = item.with_position(position);
                }
                item
            })
            .collect();

        PreparedRequest {
            items,
            containers,
            notices,
            enforce_zones: self.enforce_zones,
        }
    }
}

impl PreparedRequest {
    fn packing_config(&self, defaults: PackingConfig) -> PackingConfig {
        let mut config = defaults;
        if let Some(enforce) = self.enforce_zones {
            config.enforce_zones = enforce;
        }
        config
    }
}

/// An item that could not be placed.
#[derive(Serialize, Debug, ToSchema)]
pub struct UnplacedItemResponse {
    pub item_id: String,
    pub reason_code: String,
    pub reason: String,
}

/// Response of `POST /place`.
#[derive(Serialize, Debug, ToSchema)]
pub struct PlaceResponse {
    pub successful_placements: Vec<Placement>,
    pub unplaced_items: Vec<UnplacedItemResponse>,
    pub container_stats: Vec<ContainerStats>,
    pub normalization_warnings: Vec<NormalizationNotice>,
    pub is_complete: bool,
}

impl PlaceResponse {
    pub fn from_packing_result(result: PackingResult, notices: Vec<NormalizationNotice>) -> Self {
        let is_complete = result.is_complete();
        let PackingResult {
            successful_placements,
            unplaced_items,
            container_stats,
            ..
        } = result;

        Self {
            successful_placements,
            unplaced_items: unplaced_items
                .into_iter()
                .map(|entry| UnplacedItemResponse {
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                    item_id: entry.item_id,
                })
                .collect(),
            container_stats,
            normalization_warnings: notices,
            is_complete,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn placement_error(err: &PlacementError) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        format!("Invalid placement input ({})", err.code()),
        err.to_string(),
    )
}

fn parse_place_request(
    payload: Result<Json<PlaceRequest>, JsonRejection>,
) -> Result<PreparedRequest, Response> {
    match payload {
        Ok(Json(request)) => Ok(request.prepare()),
        Err(err) => Err(json_deserialize_error(err)),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_place, handle_place_stream, handle_health),
    components(
        schemas(
            PlaceRequest,
            ContainerRecord,
            ItemRecord,
            DimensionsRecord,
            PlaceResponse,
            Placement,
            UnplacedItemResponse,
            ContainerStats,
            NormalizationNotice,
            Axis,
            PriorityBand,
            Dimensions,
            Position,
            ErrorResponse
        )
    ),
    tags((name = "placement", description = "Endpoints for item placement"))
)]
struct ApiDoc;

/// Builds the application router with `packing` as the per-request default.
pub fn router(packing: PackingConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/place", post(handle_place))
        .route("/place_stream", post(handle_place_stream))
        .route("/health", get(handle_health))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(ApiState { packing })
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(
    config: ApiConfig,
    optimizer_config: OptimizerConfig,
) -> std::io::Result<()> {
    let app = router(optimizer_config.packing_config());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        host = config.display_host(),
        port = config.port(),
        "Server running"
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Endpoints: POST /place, POST /place_stream, GET /health, GET /docs");

    axum::serve(listener, app).await
}

/// Handler for POST /place.
///
/// Runs a full placement and returns placements, unplaced items and
/// per-container statistics.
#[utoipa::path(
    post,
    path = "/place",
    request_body = PlaceRequest,
    responses(
        (status = 200, description = "Placement finished", body = PlaceResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request or invalid placement input",
            body = ErrorResponse
        )
    ),
    tag = "placement"
)]
async fn handle_place(
    State(state): State<ApiState>,
    payload: Result<Json<PlaceRequest>, JsonRejection>,
) -> Response {
    let request = match parse_place_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let config = request.packing_config(state.packing);
    let PreparedRequest {
        items,
        containers,
        notices,
        ..
    } = request;

    info!(
        items = items.len(),
        containers = containers.len(),
        "New placement request"
    );

    let outcome =
        tokio::task::spawn_blocking(move || pack_items_with_config(items, containers, config))
            .await;

    match outcome {
        Ok(Ok(result)) => {
            info!(
                placed = result.placed_count(),
                unplaced = result.unplaced_count(),
                "Placement request finished"
            );
            let response = PlaceResponse::from_packing_result(result, notices);
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Err(err)) => {
            warn!(%err, "Rejected placement request");
            placement_error(&err)
        }
        Err(err) => {
            error!(%err, "Placement worker failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Placement failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /place_stream (SSE).
///
/// Streams placement events as they happen; the last event is `Finished`.
/// Invalid input is rejected before the stream starts.
#[utoipa::path(
    post,
    path = "/place_stream",
    request_body = PlaceRequest,
    responses(
        (
            status = 200,
            description = "Streams placement events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Malformed request or invalid placement input",
            body = ErrorResponse
        )
    ),
    tag = "placement"
)]
async fn handle_place_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlaceRequest>, JsonRejection>,
) -> Response {
    let request = match parse_place_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let config = request.packing_config(state.packing);
    if let Err(err) = validate_inputs(&request.items, &request.containers, &config) {
        warn!(%err, "Rejected streaming placement request");
        return placement_error(&err);
    }
    let PreparedRequest {
        items, containers, ..
    } = request;

    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || stream_placement(items, containers, config, &tx));

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Runs a placement and forwards every event to `tx` as JSON.
///
/// Stops before the next item once the receiving side is gone.
fn stream_placement(
    items: Vec<Item>,
    containers: Vec<ContainerBlueprint>,
    config: PackingConfig,
    tx: &mpsc::Sender<String>,
) -> Option<PackingResult> {
    let outcome = pack_items_cancellable(
        items,
        containers,
        config,
        |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                let _ = tx.blocking_send(json);
            }
        },
        || tx.is_closed(),
    );
    match outcome {
        Ok(result) => Some(result),
        Err(PlacementError::Cancelled { processed }) => {
            debug!(processed, "Client disconnected, stopped streaming placement");
            None
        }
        Err(err) => {
            warn!(%err, "Streaming placement aborted");
            None
        }
    }
}

/// Handler for GET /health.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is running")),
    tag = "placement"
)]
async fn handle_health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
