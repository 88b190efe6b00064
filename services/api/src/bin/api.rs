//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        reported_location_channel, GeminiFaceAdapter, NominatimAdapter, ReportedLocationAdapter,
        SimulatedFaceAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler},
        hash_password,
        middleware::require_auth,
        rest::{
            acquire_center_handler, check_in_handler, create_course_handler, create_unit_handler,
            create_user_handler, create_venue_handler, delete_course_handler, delete_unit_handler,
            delete_venue_handler, end_session_handler, get_geofence_handler, list_courses_handler,
            list_sessions_handler, list_units_handler, list_users_handler, list_venues_handler,
            presence_handler, report_location_handler, search_places_handler,
            set_center_from_map_handler, set_center_from_search_handler, set_radius_handler,
            start_session_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use geoattend_core::{
    ports::{FaceComparisonService, GeolocationService, PlaceSearchService},
    AttendanceWorkflow, LocationTracker, Registry, Role,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let face: Arc<dyn FaceComparisonService> = match &config.gemini_api_key {
        Some(api_key) => {
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.face_api_base);
            Arc::new(GeminiFaceAdapter::new(
                Client::with_config(openai_config),
                config.face_model.clone(),
            ))
        }
        None => Arc::new(SimulatedFaceAdapter::new()),
    };

    let (location_tx, location_rx) = reported_location_channel();
    let geolocation: Arc<dyn GeolocationService> = Arc::new(ReportedLocationAdapter::new(
        location_rx,
        config.location_wait,
    ));
    let place_search: Arc<dyn PlaceSearchService> = Arc::new(
        NominatimAdapter::new(config.geocoder_base_url.clone())
            .map_err(|e| ApiError::Internal(format!("failed to build the geocoder client: {e}")))?,
    );
    let tracker = Arc::new(LocationTracker::new(geolocation, place_search));

    let (events, _) = broadcast::channel(64);

    let workflow = AttendanceWorkflow::with_threshold(face, config.face_confidence_threshold);

    // --- 3. Seed the Registry with the Bootstrap Admin ---
    let registry = Arc::new(RwLock::new(Registry::new()));
    {
        let mut reg = registry.write().unwrap();
        if reg.user_by_email(&config.admin_email).is_err() {
            let hashed = hash_password(&config.admin_password)
                .map_err(|e| ApiError::Internal(format!("failed to hash admin password: {e}")))?;
            let admin = reg
                .add_user(
                    "Administrator",
                    &config.admin_email,
                    &hashed,
                    Role::Admin,
                    Vec::new(),
                    None,
                )
                .map_err(ApiError::Core)?;
            info!("Bootstrap admin account created: {}", admin.email);
        }
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        registry,
        workflow,
        tracker,
        events,
        drafts: Mutex::new(HashMap::new()),
        location_tx,
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("invalid CORS_ORIGIN: {e}")))?;
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/courses", get(list_courses_handler).post(create_course_handler))
        .route("/courses/{id}", delete(delete_course_handler))
        .route("/units", get(list_units_handler).post(create_unit_handler))
        .route("/units/{id}", delete(delete_unit_handler))
        .route("/venues", get(list_venues_handler).post(create_venue_handler))
        .route("/venues/{id}", delete(delete_venue_handler))
        .route("/users", get(list_users_handler).post(create_user_handler))
        .route("/location/report", post(report_location_handler))
        .route("/geofence", get(get_geofence_handler))
        .route("/geofence/center/device", post(acquire_center_handler))
        .route("/geofence/center/map", post(set_center_from_map_handler))
        .route("/geofence/center/search", post(set_center_from_search_handler))
        .route("/geofence/radius", post(set_radius_handler))
        .route("/places/search", get(search_places_handler))
        .route("/sessions", get(list_sessions_handler).post(start_session_handler))
        .route("/sessions/{id}/end", post(end_session_handler))
        .route("/sessions/{id}/presence", get(presence_handler))
        .route("/sessions/{id}/checkin", post(check_in_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes. The body limit leaves room for base64 photos.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
