//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS for the configured origins (comma separated, `*` for any)
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    ships: usize,
    chests: usize,
    events_applied: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        ships: state.session.ship_count(),
        chests: state.session.chest_count(),
        events_applied: state.session.events_applied(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{Config, LogFormat};
    use crate::game::board::Tile;
    use crate::game::{BoardSnapshot, Direction, Identity, SyncEvent, SyncSession};

    fn test_config() -> Config {
        config_with_origin("*")
    }

    fn config_with_origin(client_origin: &str) -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            local_identity: Identity::new("me"),
            client_origin: client_origin.to_string(),
            input_rate_limit: 30,
            event_queue_capacity: 8,
        }
    }

    #[tokio::test]
    async fn health_reports_registry_counts() {
        let (mut session, handle) = SyncSession::new(Identity::new("me"), 8);
        let mut board = BoardSnapshot::empty(10);
        board.set(1, 1, Tile::player(Identity::new("me"), Direction::Up));
        board.set(2, 2, Tile::chest());
        board.set(3, 3, Tile::chest());
        session.handle_event(SyncEvent::BoardChanged(board));

        let router = build_router(AppState::new(test_config(), handle));
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ships"], 1);
        assert_eq!(body["chests"], 2);
        assert_eq!(body["events_applied"], 1);
    }

    async fn allowed_origin(router: Router, origin: &str) -> Option<String> {
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn cors_echoes_only_listed_origins() {
        let (_session, handle) = SyncSession::new(Identity::new("me"), 8);
        let config = config_with_origin("http://localhost:3000, https://seas.example");
        let router = build_router(AppState::new(config, handle));

        assert_eq!(
            allowed_origin(router.clone(), "https://seas.example").await,
            Some("https://seas.example".to_string())
        );
        assert_eq!(allowed_origin(router, "https://elsewhere.example").await, None);
    }

    #[tokio::test]
    async fn cors_wildcard_allows_any_origin() {
        let (_session, handle) = SyncSession::new(Identity::new("me"), 8);
        let router = build_router(AppState::new(test_config(), handle));

        assert_eq!(
            allowed_origin(router, "https://elsewhere.example").await,
            Some("*".to_string())
        );
    }
}
