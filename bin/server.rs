// Stock Control System - Web Server
// REST API with Axum: pass-through list reads and single-row partial updates

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use stock_control::db;
use stock_control::{MaterialPatch, RevenuePatch, StatPatch};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// Error response body: `{ "message": "..." }`
#[derive(Serialize)]
struct ErrorMessage {
    message: String,
}

impl ErrorMessage {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

fn internal_error(context: &str, err: anyhow::Error) -> axum::response::Response {
    eprintln!("Error {}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorMessage::new("Erro interno do servidor")),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/materials - Full materials list, creation order
async fn get_materials(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::list_materials(&conn) {
        Ok(materials) => (StatusCode::OK, Json(materials)).into_response(),
        Err(e) => internal_error("listing materials", e),
    }
}

/// GET /api/revenue - Full movement chart, creation order
async fn get_revenue(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::list_revenue(&conn) {
        Ok(points) => (StatusCode::OK, Json(points)).into_response(),
        Err(e) => internal_error("listing revenue", e),
    }
}

/// GET /api/stats - Full stat card list, creation order
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::list_stats(&conn) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => internal_error("listing stats", e),
    }
}

/// PATCH /api/materials/:code - Merge-patch balance/order point
async fn patch_material(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<MaterialPatch>,
) -> impl IntoResponse {
    if let Err(message) = body.validate() {
        return (StatusCode::BAD_REQUEST, Json(ErrorMessage::new(message))).into_response();
    }

    let conn = state.db.lock().unwrap();

    match db::update_material(&conn, &code, &body) {
        Ok(Some(material)) => (StatusCode::OK, Json(material)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorMessage::new("Material não encontrado")),
        )
            .into_response(),
        Err(e) => internal_error("updating material", e),
    }
}

/// PATCH /api/revenue/:month - Merge-patch in/out figures
async fn patch_revenue(
    State(state): State<AppState>,
    Path(month): Path<String>,
    Json(body): Json<RevenuePatch>,
) -> impl IntoResponse {
    if let Err(message) = body.validate() {
        return (StatusCode::BAD_REQUEST, Json(ErrorMessage::new(message))).into_response();
    }

    let conn = state.db.lock().unwrap();

    match db::update_revenue(&conn, &month, &body) {
        Ok(Some(point)) => (StatusCode::OK, Json(point)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorMessage::new("Mês não encontrado")),
        )
            .into_response(),
        Err(e) => internal_error("updating revenue", e),
    }
}

/// PATCH /api/stats/:label - Merge-patch value/change/trend
async fn patch_stat(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Json(body): Json<StatPatch>,
) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match db::update_stat(&conn, &label, &body) {
        Ok(Some(stat)) => (StatusCode::OK, Json(stat)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorMessage::new("Stat não encontrado")),
        )
            .into_response(),
        Err(e) => internal_error("updating stat", e),
    }
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    // Path params (:code, :month, :label) arrive percent-decoded from the
    // extractor, so "Revenue%20Growth" is looked up as "Revenue Growth".
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/materials", get(get_materials))
        .route("/materials/:code", patch(patch_material))
        .route("/revenue", get(get_revenue))
        .route("/revenue/:month", patch(patch_revenue))
        .route("/stats", get(get_stats))
        .route("/stats/:label", patch(patch_stat))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    println!("🌐 Stock Control System - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::var("STOCK_DB").unwrap_or_else(|_| "stock.db".to_string());
    let db_path = std::path::Path::new(&db_path);

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: cargo run seed");
        eprintln!("   to create and seed it first.");
        std::process::exit(1);
    }

    let conn = Connection::open(db_path).expect("Failed to open database");
    println!("✓ Database opened: {:?}", db_path);

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let app = app(state);

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   API: http://localhost:3000/api/materials");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use stock_control::Material;
    use tower::ServiceExt;

    /// Router over an in-memory store seeded with the default datasets
    fn test_app() -> Router {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        db::insert_materials(&conn, &db::default_materials()).unwrap();
        db::insert_revenue_points(&conn, &db::default_revenue()).unwrap();
        db::insert_stats(&conn, &db::default_stats()).unwrap();

        app(AppState {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn patch_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = test_app()
            .oneshot(get_request("/api/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_materials_returns_rows_in_creation_order() {
        let response = test_app()
            .oneshot(get_request("/api/materials"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let materials: Vec<Material> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(materials.len(), 8);
        assert_eq!(materials[0].code, "M-102");
        assert_eq!(materials[0].id, 1);
        assert!(materials.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[tokio::test]
    async fn test_patch_stat_updates_trend_only() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(patch_request(
                "/api/stats/Revenue%20Growth",
                r#"{"trend":"down"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stat = body_json(response).await;
        assert_eq!(stat["trend"], "down");
        assert_eq!(stat["value"], "12%", "value must keep its prior value");
        assert_eq!(stat["change"], 12, "change must keep its prior value");
    }

    #[tokio::test]
    async fn test_patch_unknown_stat_label_is_404_with_message() {
        let response = test_app()
            .oneshot(patch_request(
                "/api/stats/Unknown%20Label",
                r#"{"trend":"up"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert!(body.get("message").is_some(), "404 body must carry a message");
    }

    #[tokio::test]
    async fn test_patch_material_is_partial_and_idempotent() {
        let app = test_app();

        let first = app
            .clone()
            .oneshot(patch_request(
                "/api/materials/M-102",
                r#"{"currentBalance":50}"#,
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let first_body = body_json(first).await;
        assert_eq!(first_body["currentBalance"], 50);
        assert_eq!(first_body["orderPoint"], 40, "orderPoint must be untouched");

        let second = app
            .clone()
            .oneshot(patch_request(
                "/api/materials/M-102",
                r#"{"currentBalance":50}"#,
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_json(second).await, first_body);
    }

    #[tokio::test]
    async fn test_patch_unknown_material_code_is_404() {
        let response = test_app()
            .oneshot(patch_request(
                "/api/materials/UNKNOWN-CODE",
                r#"{"currentBalance":1}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Material não encontrado");
    }

    #[tokio::test]
    async fn test_patch_negative_balance_is_rejected() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(patch_request(
                "/api/materials/M-102",
                r#"{"currentBalance":-5}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Row is untouched
        let list = app.oneshot(get_request("/api/materials")).await.unwrap();
        let bytes = to_bytes(list.into_body(), usize::MAX).await.unwrap();
        let materials: Vec<Material> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(materials[0].current_balance, 120);
    }

    #[tokio::test]
    async fn test_patch_empty_body_returns_unchanged_row() {
        let response = test_app()
            .oneshot(patch_request("/api/materials/M-405", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["currentBalance"], 60);
        assert_eq!(body["orderPoint"], 60);
    }

    #[tokio::test]
    async fn test_patch_revenue_month() {
        let response = test_app()
            .oneshot(patch_request("/api/revenue/Jan", r#"{"expenses":1900}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["expenses"], 1900);
        assert_eq!(body["revenue"], 2400, "revenue must keep its prior value");
    }

    #[tokio::test]
    async fn test_patch_unknown_month_is_404() {
        let response = test_app()
            .oneshot(patch_request("/api/revenue/Sem", r#"{"revenue":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Mês não encontrado");
    }

    #[tokio::test]
    async fn test_patch_invalid_trend_is_rejected_by_extractor() {
        let response = test_app()
            .oneshot(patch_request(
                "/api/stats/Revenue%20Growth",
                r#"{"trend":"sideways"}"#,
            ))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }
}
