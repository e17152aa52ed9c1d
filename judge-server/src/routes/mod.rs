use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use judge_config::CorsConfig;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::AppState;
use crate::handlers::{health, invocations, session};

pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const SESSION: &str = "/session";
    pub const SESSION_BY_ID: &str = "/session/{session_id}";
    pub const RESULT: &str = "/result";
    pub const INVOCATIONS: &str = "/invocations";
    pub const ASSETS: &str = "/assets";
}

/// Builds the full application router, including middleware.
pub fn create_router(state: AppState) -> Router {
    let config = state.config();

    let mut router = Router::new()
        .route(paths::HEALTH, get(health::health_check))
        .route(paths::SESSION, post(session::submit_session))
        .route(paths::SESSION_BY_ID, get(session::get_session))
        .route(paths::RESULT, get(session::latest_result));

    if config.mock.enabled {
        router = router.route(paths::INVOCATIONS, post(invocations::invoke));
    }

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors));

    router
        .nest_service(paths::ASSETS, ServeDir::new(&config.assets.dir))
        .layer(middleware)
        .with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let allow_origin = if cors.is_wildcard_included() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}
