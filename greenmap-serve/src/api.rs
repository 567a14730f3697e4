//! HTTP API handlers with Axum and Utoipa

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use greenmap_common::error::suggest_correction;
use greenmap_data::get_site_details;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::colormap::{plasma as plasma_colors, DEFAULT_SAMPLES};
use crate::html;
use crate::state::ServerState;

pub const GEOJSON_CONTENT_TYPE: &str = "application/geo+json";

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(layer, layers, site_details, plasma, health),
    components(schemas(LayerInfo, HealthResponse, ErrorResponse)),
    info(
        title = "Greenmap API",
        version = "1.0.0",
        description = "GeoJSON layers and site details for green-space access mapping"
    )
)]
struct ApiDoc;

/// Build the Axum router
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Pages
        .route("/", get(index))
        .route("/map", get(map_page))
        .route("/info_overview", get(info_overview))
        // Data
        .route("/layer/{name}", get(layer))
        .route("/layers", get(layers))
        .route("/site_details/{reference}", get(site_details))
        .route("/plasma", get(plasma))
        .route("/health", get(health))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Closest known layer name, only on layer lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: error.into(),
        suggestion: None,
    };
    (status, Json(body)).into_response()
}

// ============ Layer Endpoints ============

/// Fetch one layer as a GeoJSON FeatureCollection in EPSG:4326
#[utoipa::path(
    get,
    path = "/layer/{name}",
    params(("name" = String, Path, description = "Layer name, e.g. buffers")),
    responses(
        (status = 200, description = "GeoJSON FeatureCollection (application/geo+json)"),
        (status = 404, description = "Layer not found", body = ErrorResponse),
    )
)]
async fn layer(State(state): State<Arc<ServerState>>, Path(name): Path<String>) -> Response {
    let Some(layer) = state.catalog.get(&name) else {
        let suggestion = suggest_correction(&name, &state.catalog.names());
        let body = ErrorResponse {
            error: "Layer not found".to_string(),
            suggestion,
        };
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    match layer.to_geojson() {
        Ok(body) => ([(header::CONTENT_TYPE, GEOJSON_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(layer = %name, error = %e, "failed to serialize layer");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to serialize layer")
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LayerInfo {
    #[schema(example = "buffers")]
    pub name: String,
    pub feature_count: usize,
    /// `[min_lon, min_lat, max_lon, max_lat]`, absent for layers without geometry
    pub bbox: Option<Vec<f64>>,
}

/// List the loaded layers
#[utoipa::path(
    get,
    path = "/layers",
    responses((status = 200, description = "Loaded layers in configuration order", body = Vec<LayerInfo>))
)]
async fn layers(State(state): State<Arc<ServerState>>) -> Json<Vec<LayerInfo>> {
    let infos = state
        .catalog
        .summaries()
        .map(|summary| LayerInfo {
            name: summary.name.clone(),
            feature_count: summary.feature_count,
            bbox: summary.bbox.map(|bbox| bbox.to_vec()),
        })
        .collect();
    Json(infos)
}

// ============ Site Details Endpoint ============

/// Joined records for one site
///
/// Every configured record name is present; a record with no matching row is `null`.
#[utoipa::path(
    get,
    path = "/site_details/{reference}",
    params(("reference" = String, Path, description = "Site reference (DES_REF)")),
    responses(
        (status = 200, description = "Object keyed by record name: site_info, site_catchment, simd_score, open_spaces, community_centres"),
        (status = 404, description = "Site not found", body = ErrorResponse),
        (status = 500, description = "Database error", body = ErrorResponse),
    )
)]
async fn site_details(
    State(state): State<Arc<ServerState>>,
    Path(reference): Path<String>,
) -> Response {
    let Some(config) = state.site_details.clone() else {
        return error_response(StatusCode::NOT_FOUND, "Site details are not configured");
    };

    let store = Arc::clone(&state.store);
    let key = reference.clone();
    let lookup =
        tokio::task::spawn_blocking(move || get_site_details(store.as_ref(), &config, &key)).await;

    match lookup {
        Ok(Ok(Some(details))) => Json(details).into_response(),
        Ok(Ok(None)) => error_response(StatusCode::NOT_FOUND, "Site not found"),
        Ok(Err(e)) => {
            tracing::error!(%reference, error = %e, "site details lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load site details")
        }
        Err(e) => {
            tracing::error!(%reference, error = %e, "site details task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load site details")
        }
    }
}

// ============ Colormap Endpoint ============

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlasmaQuery {
    /// Number of colours, clamped to 2..=1024 (default 256)
    n: Option<usize>,
}

/// Plasma colormap as `[r, g, b]` fractions
#[utoipa::path(
    get,
    path = "/plasma",
    params(PlasmaQuery),
    responses(
        (status = 200, description = "Colours from dark blue to yellow", body = Vec<Vec<f64>>),
        (status = 400, description = "n is not a non-negative integer"),
    )
)]
async fn plasma(Query(query): Query<PlasmaQuery>) -> Json<Vec<[f64; 3]>> {
    Json(plasma_colors(query.n.unwrap_or(DEFAULT_SAMPLES)))
}

// ============ Health Endpoint ============

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub version: String,
    pub layers: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Server is healthy", body = HealthResponse))
)]
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        layers: state.catalog.len(),
    })
}

// ============ Pages ============

async fn index(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(html::render_index(&state.catalog))
}

async fn map_page(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(html::render_map(&state.catalog))
}

async fn info_overview(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(html::render_info_overview(&state.catalog))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{HeaderMap, Request};
    use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
    use greenmap_common::config::SiteDetailsConfig;
    use greenmap_data::{Layer, LayerCatalog, MemoryStore, Record, RecordStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn point_layer(name: &str, points: &[[f64; 2]]) -> Layer {
        let features = points
            .iter()
            .map(|[lon, lat]| Feature {
                bbox: None,
                geometry: Some(Geometry::new(GeoValue::Point(vec![*lon, *lat]))),
                id: None,
                properties: None,
                foreign_members: None,
            })
            .collect();
        let collection = FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        Layer::new(name, "test", collection)
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_table(
                "SITES",
                vec![record(json!({"DES_REF": "LNR1", "ENT_TITLE": "Corstorphine Hill", "CLOSEST_OS_ID": 3}))],
            )
            .with_table(
                "SITE_CATCHMENTS",
                vec![record(json!({"DES_REF": "LNR1", "POPULATION": 12450, "CLOSEST_CC_ID": "CC7"}))],
            )
            .with_table("OPEN_SPACES", vec![record(json!({"OS_ID": 3, "NAME": "Corstorphine Hill"}))])
            .with_table("COMMUNITY_CENTRES", Vec::new())
    }

    struct Fixture {
        router: Router,
        _static_dir: tempfile::TempDir,
    }

    fn fixture_with(store: Arc<dyn RecordStore>, site_details: Option<SiteDetailsConfig>) -> Fixture {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::write(static_dir.path().join("main.js"), "console.log('map');").unwrap();

        let catalog = LayerCatalog::new(vec![
            point_layer("buffers", &[[-3.2, 55.95], [-3.3, 55.9]]),
            point_layer("spaces", &[[-3.25, 55.93]]),
        ]);
        let state = ServerState::new(catalog, store, site_details, static_dir.path());
        Fixture {
            router: build_router(Arc::new(state)),
            _static_dir: static_dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(store()), Some(SiteDetailsConfig::default()))
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = get(router, uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_layer_is_geojson() {
        let fixture = fixture();
        let (status, headers, body) = get(&fixture.router, "/layer/buffers").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], GEOJSON_CONTENT_TYPE);
        let collection: FeatureCollection = serde_json::from_slice(&body).unwrap();
        assert_eq!(collection.features.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_layer_suggests_closest_name() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/layer/bufers").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Layer not found");
        assert_eq!(body["suggestion"], "buffers");
    }

    #[tokio::test]
    async fn test_unknown_layer_without_suggestion() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/layer/qqqqqqqqqq").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Layer not found"}));
    }

    #[tokio::test]
    async fn test_layers_listing() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/layers").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "buffers");
        assert_eq!(body[0]["feature_count"], 2);
        assert_eq!(body[1]["name"], "spaces");
        assert_eq!(body[0]["bbox"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_site_details_found() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/site_details/LNR1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["site_info"]["ENT_TITLE"], "Corstorphine Hill");
        assert_eq!(body["site_catchment"]["POPULATION"], 12450);
        assert_eq!(body["open_spaces"]["NAME"], "Corstorphine Hill");
        assert_eq!(body["community_centres"], Value::Null);
        assert!(body["simd_score"].is_object());
    }

    #[tokio::test]
    async fn test_site_details_not_found() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/site_details/NOPE").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Site not found");
    }

    #[tokio::test]
    async fn test_site_details_store_error_is_500() {
        let store = MemoryStore::new().with_table(
            "SITES",
            vec![record(json!({"DES_REF": "LNR1"}))],
        );
        let fixture = fixture_with(Arc::new(store), Some(SiteDetailsConfig::default()));
        let (status, body) = get_json(&fixture.router, "/site_details/LNR1").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to load site details");
    }

    #[tokio::test]
    async fn test_site_details_disabled() {
        let fixture = fixture_with(Arc::new(store()), None);
        let (status, _) = get_json(&fixture.router, "/site_details/LNR1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_plasma() {
        let fixture = fixture();

        let (status, body) = get_json(&fixture.router, "/plasma").await;
        assert_eq!(status, StatusCode::OK);
        let colours = body.as_array().unwrap();
        assert_eq!(colours.len(), 256);
        assert_eq!(colours[0].as_array().unwrap().len(), 3);

        let (_, body) = get_json(&fixture.router, "/plasma?n=5").await;
        assert_eq!(body.as_array().unwrap().len(), 5);

        let (status, _, _) = get(&fixture.router, "/plasma?n=many").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["layers"], 2);
    }

    #[tokio::test]
    async fn test_pages_render() {
        let fixture = fixture();

        let (status, headers, body) = get(&fixture.router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        let page = String::from_utf8(body).unwrap();
        assert!(page.contains("/layer/spaces"));

        let (status, _, _) = get(&fixture.router, "/map").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = get(&fixture.router, "/info_overview").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_static_files() {
        let fixture = fixture();

        let (status, _, body) = get(&fixture.router, "/static/main.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"console.log('map');");

        let (status, _, _) = get(&fixture.router, "/static/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_openapi_lists_paths() {
        let fixture = fixture();
        let (status, body) = get_json(&fixture.router, "/api-docs/openapi.json").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/layer/{name}"].is_object());
        assert!(body["paths"]["/site_details/{reference}"].is_object());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let fixture = fixture();
        let response = fixture
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://example.org")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
