//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::ReportedFix;
use crate::web::{protocol::ServerMessage, state::AppState};
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use geoattend_core::{
    presence, CheckInOutcome, CoreError, GeoPoint, PlaceCandidate, Role, Session, SessionScope,
    User,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        list_courses_handler,
        create_course_handler,
        delete_course_handler,
        list_units_handler,
        create_unit_handler,
        delete_unit_handler,
        list_venues_handler,
        create_venue_handler,
        delete_venue_handler,
        list_users_handler,
        create_user_handler,
        report_location_handler,
        acquire_center_handler,
        set_center_from_map_handler,
        set_center_from_search_handler,
        set_radius_handler,
        get_geofence_handler,
        search_places_handler,
        list_sessions_handler,
        start_session_handler,
        end_session_handler,
        presence_handler,
        check_in_handler,
    ),
    components(
        schemas(
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            NameRequest,
            CreateUnitRequest,
            CreateVenueRequest,
            CreateUserRequest,
            ReportLocationRequest,
            CoordinatesRequest,
            PlaceCandidateDto,
            RadiusRequest,
            GeofenceDraftDto,
            StartSessionRequest,
            CheckInRequest,
            CheckInResponse,
            CourseDto,
            UnitDto,
            VenueDto,
            UserDto,
            SessionDto,
            PresenceDto,
        )
    ),
    tags(
        (name = "GeoAttend API", description = "Geofenced, face-verified attendance tracking.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUnitRequest {
    pub name: String,
    pub course_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateVenueRequest {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// One of "admin", "lecturer" or "student".
    pub role: String,
    /// Base64-encoded reference photo, compared against at check-in time.
    pub reference_photo: String,
    /// Required for students: the course they enrol in.
    pub course_id: Option<Uuid>,
}

/// What the browser reports after a geolocation attempt: either a fix or
/// the failure reason, never both.
#[derive(Deserialize, ToSchema)]
pub struct ReportLocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub error: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CoordinatesRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PlaceCandidateDto {
    pub id: String,
    pub display_name: String,
    /// Raw geocoder coordinate strings; parsed (and validated) only when a
    /// candidate is selected as the fence center.
    pub latitude: String,
    pub longitude: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RadiusRequest {
    pub meters: f64,
}

#[derive(Serialize, ToSchema)]
pub struct GeofenceDraftDto {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: f64,
    pub location_error: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub name: String,
    /// Present together for a class session; both absent for a faculty one.
    pub unit_id: Option<Uuid>,
    pub venue_id: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckInRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Base64-encoded capture from the device camera.
    pub photo: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    /// "recorded" or "already_marked".
    pub status: String,
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDto {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct UnitDto {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct VenueDto {
    pub id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub course_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionDto {
    pub id: Uuid,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    /// "faculty" or "class".
    pub scope: String,
    pub unit_id: Option<Uuid>,
    pub venue_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    /// "active" or "ended".
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct PresenceDto {
    pub present: Vec<UserDto>,
    pub absent: Vec<UserDto>,
}

//=========================================================================================
// DTO Conversions and Error Mapping
//=========================================================================================

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Lecturer => "lecturer",
        Role::Student => "student",
    }
}

fn parse_role(raw: &str) -> Result<Role, (StatusCode, String)> {
    match raw {
        "admin" => Ok(Role::Admin),
        "lecturer" => Ok(Role::Lecturer),
        "student" => Ok(Role::Student),
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("'{other}' is not a valid role"),
        )),
    }
}

fn user_dto(user: &User) -> UserDto {
    UserDto {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: role_label(user.role).to_string(),
        course_id: user.course_id,
    }
}

fn session_dto(session: &Session) -> SessionDto {
    let (scope, unit_id, venue_id) = match &session.scope {
        SessionScope::Faculty => ("faculty", None, None),
        SessionScope::Class { unit_id, venue_id } => ("class", Some(*unit_id), Some(*venue_id)),
    };
    SessionDto {
        id: session.id,
        name: session.name.clone(),
        latitude: session.geofence.center.latitude,
        longitude: session.geofence.center.longitude,
        radius_meters: session.geofence.radius_meters,
        scope: scope.to_string(),
        unit_id,
        venue_id,
        started_at: session.started_at,
        status: match session.status {
            geoattend_core::SessionStatus::Active => "active".to_string(),
            geoattend_core::SessionStatus::Ended => "ended".to_string(),
        },
    }
}

/// One mapping from domain failures to HTTP statuses, shared by every
/// handler. The message is the error's Display output.
fn core_error_response(err: CoreError) -> (StatusCode, String) {
    let status = match &err {
        CoreError::Validation(_) | CoreError::GeocodeParse(_) | CoreError::InvalidCoordinate {
            ..
        } => StatusCode::BAD_REQUEST,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::InUse(_) | CoreError::SessionNotActive | CoreError::FenceUnset => {
            StatusCode::CONFLICT
        }
        CoreError::OutsideGeofence { .. } | CoreError::FaceMismatch { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CoreError::LocationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::SearchUnavailable(_) | CoreError::VerificationService(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    (status, err.to_string())
}

/// Admin-gated endpoints call this first.
fn require_admin(state: &AppState, user_id: Uuid) -> Result<(), (StatusCode, String)> {
    let registry = state.registry.read().unwrap();
    let user = registry.user(user_id).map_err(core_error_response)?;
    if user.role != Role::Admin {
        return Err((
            StatusCode::FORBIDDEN,
            "This action requires an administrator account".to_string(),
        ));
    }
    Ok(())
}

//=========================================================================================
// Courses / Units / Venues
//=========================================================================================

/// List all courses.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "All courses", body = [CourseDto]))
)]
pub async fn list_courses_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.registry.read().unwrap();
    let courses: Vec<CourseDto> = registry
        .courses()
        .map(|c| CourseDto {
            id: c.id,
            name: c.name.clone(),
        })
        .collect();
    Json(courses)
}

/// Create a course.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Course created", body = CourseDto),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<NameRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    let course = state
        .registry
        .write()
        .unwrap()
        .add_course(&req.name)
        .map_err(core_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(CourseDto {
            id: course.id,
            name: course.name,
        }),
    ))
}

/// Delete a course. Rejected with 409 while units or enrolled students
/// still reference it.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Course not found"),
        (status = 409, description = "Course is still referenced")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    state
        .registry
        .write()
        .unwrap()
        .delete_course(id)
        .map_err(core_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all units.
#[utoipa::path(
    get,
    path = "/units",
    responses((status = 200, description = "All units", body = [UnitDto]))
)]
pub async fn list_units_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.registry.read().unwrap();
    let units: Vec<UnitDto> = registry
        .units()
        .map(|u| UnitDto {
            id: u.id,
            name: u.name.clone(),
            course_id: u.course_id,
        })
        .collect();
    Json(units)
}

/// Create a unit under a course.
#[utoipa::path(
    post,
    path = "/units",
    request_body = CreateUnitRequest,
    responses(
        (status = 201, description = "Unit created", body = UnitDto),
        (status = 404, description = "Course not found")
    )
)]
pub async fn create_unit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateUnitRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    let unit = state
        .registry
        .write()
        .unwrap()
        .add_unit(&req.name, req.course_id)
        .map_err(core_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(UnitDto {
            id: unit.id,
            name: unit.name,
            course_id: unit.course_id,
        }),
    ))
}

/// Delete a unit. Rejected with 409 while attendance records reference it.
#[utoipa::path(
    delete,
    path = "/units/{id}",
    params(("id" = Uuid, Path, description = "Unit ID")),
    responses(
        (status = 204, description = "Unit deleted"),
        (status = 404, description = "Unit not found"),
        (status = 409, description = "Unit is still referenced")
    )
)]
pub async fn delete_unit_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    state
        .registry
        .write()
        .unwrap()
        .delete_unit(id)
        .map_err(core_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all venues.
#[utoipa::path(
    get,
    path = "/venues",
    responses((status = 200, description = "All venues", body = [VenueDto]))
)]
pub async fn list_venues_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.registry.read().unwrap();
    let venues: Vec<VenueDto> = registry
        .venues()
        .map(|v| VenueDto {
            id: v.id,
            name: v.name.clone(),
            latitude: v.latitude,
            longitude: v.longitude,
        })
        .collect();
    Json(venues)
}

/// Create a venue, optionally with coordinates.
#[utoipa::path(
    post,
    path = "/venues",
    request_body = CreateVenueRequest,
    responses(
        (status = 201, description = "Venue created", body = VenueDto),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_venue_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateVenueRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    let venue = state
        .registry
        .write()
        .unwrap()
        .add_venue(&req.name, req.latitude, req.longitude)
        .map_err(core_error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(VenueDto {
            id: venue.id,
            name: venue.name,
            latitude: venue.latitude,
            longitude: venue.longitude,
        }),
    ))
}

/// Delete a venue. Rejected with 409 while attendance records reference it.
#[utoipa::path(
    delete,
    path = "/venues/{id}",
    params(("id" = Uuid, Path, description = "Venue ID")),
    responses(
        (status = 204, description = "Venue deleted"),
        (status = 404, description = "Venue not found"),
        (status = 409, description = "Venue is still referenced")
    )
)]
pub async fn delete_venue_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    state
        .registry
        .write()
        .unwrap()
        .delete_venue(id)
        .map_err(core_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Users
//=========================================================================================

/// List all users.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "All users", body = [UserDto]))
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;
    let registry = state.registry.read().unwrap();
    let users: Vec<UserDto> = registry.users().map(user_dto).collect();
    Ok(Json(users))
}

/// Provision a user account with a reference photo.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserDto),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id)?;

    let role = parse_role(&req.role)?;
    let reference_photo = BASE64.decode(&req.reference_photo).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("reference_photo is not valid base64: {e}"),
        )
    })?;

    let hashed_password = crate::web::hash_password(&req.password).map_err(|e| {
        error!("Failed to hash password: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to hash password".to_string(),
        )
    })?;

    let user = state
        .registry
        .write()
        .unwrap()
        .add_user(
            &req.name,
            &req.email,
            &hashed_password,
            role,
            reference_photo,
            req.course_id,
        )
        .map_err(core_error_response)?;

    info!(user = %user.id, role = req.role, "provisioned user account");
    Ok((StatusCode::CREATED, Json(user_dto(&user))))
}

//=========================================================================================
// Device Location and Geofence Draft
//=========================================================================================

/// Receive a browser geolocation report (a fix or a failure reason).
#[utoipa::path(
    post,
    path = "/location/report",
    request_body = ReportLocationRequest,
    responses(
        (status = 202, description = "Report accepted"),
        (status = 400, description = "Neither a fix nor an error was supplied")
    )
)]
pub async fn report_location_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReportLocationRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let fix = match (req.latitude, req.longitude, req.error) {
        (Some(latitude), Some(longitude), None) => {
            let point = match req.altitude {
                Some(altitude) => GeoPoint::with_altitude(latitude, longitude, altitude),
                None => GeoPoint::new(latitude, longitude),
            };
            ReportedFix::Position(point)
        }
        (None, None, Some(reason)) => ReportedFix::Failed(reason),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "Report either latitude+longitude or an error".to_string(),
            ))
        }
    };
    let _ = state.location_tx.send(Some(fix));
    Ok(StatusCode::ACCEPTED)
}

/// Center the draft geofence on the device's current position.
///
/// Waits for the browser to report a fix. A superseded acquisition (a newer
/// request arrived while this one was in flight) returns 204 and changes
/// nothing; a failed acquisition is noted on the draft and keeps any
/// previously set center.
#[utoipa::path(
    post,
    path = "/geofence/center/device",
    responses(
        (status = 200, description = "Center updated", body = GeofenceDraftDto),
        (status = 204, description = "Superseded by a newer acquisition"),
        (status = 503, description = "Device position unavailable")
    )
)]
pub async fn acquire_center_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.tracker.acquire().await {
        Ok(Some(point)) => {
            let map = state.map_for(user_id);
            let dto = state.with_draft(user_id, |draft| {
                draft.set_center_from_device(point, &map);
                draft_dto(draft)
            });
            Ok((StatusCode::OK, Json(dto)).into_response())
        }
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(err) => {
            state.with_draft(user_id, |draft| {
                draft.note_location_error(&err.to_string());
            });
            Err(core_error_response(err))
        }
    }
}

/// Center the draft geofence from a map click or marker drag.
#[utoipa::path(
    post,
    path = "/geofence/center/map",
    request_body = CoordinatesRequest,
    responses((status = 200, description = "Center updated", body = GeofenceDraftDto))
)]
pub async fn set_center_from_map_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CoordinatesRequest>,
) -> impl IntoResponse {
    let map = state.map_for(user_id);
    let dto = state.with_draft(user_id, |draft| {
        draft.set_center_from_map(req.latitude, req.longitude, &map);
        draft_dto(draft)
    });
    Json(dto)
}

/// Center the draft geofence on a selected search result.
#[utoipa::path(
    post,
    path = "/geofence/center/search",
    request_body = PlaceCandidateDto,
    responses(
        (status = 200, description = "Center updated", body = GeofenceDraftDto),
        (status = 400, description = "Candidate coordinates are malformed")
    )
)]
pub async fn set_center_from_search_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PlaceCandidateDto>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let candidate = PlaceCandidate {
        id: req.id,
        display_name: req.display_name,
        latitude: req.latitude,
        longitude: req.longitude,
    };
    let map = state.map_for(user_id);
    let dto = state
        .with_draft(user_id, |draft| {
            draft
                .set_center_from_search(&candidate, &map)
                .map(|()| draft_dto(draft))
        })
        .map_err(core_error_response)?;
    Ok(Json(dto))
}

/// Set the draft geofence radius, clamped to [10, 1000] meters.
#[utoipa::path(
    post,
    path = "/geofence/radius",
    request_body = RadiusRequest,
    responses((status = 200, description = "Radius updated", body = GeofenceDraftDto))
)]
pub async fn set_radius_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<RadiusRequest>,
) -> impl IntoResponse {
    let map = state.map_for(user_id);
    let dto = state.with_draft(user_id, |draft| {
        draft.set_radius(req.meters, &map);
        draft_dto(draft)
    });
    Json(dto)
}

/// Inspect the calling operator's draft geofence.
#[utoipa::path(
    get,
    path = "/geofence",
    responses((status = 200, description = "The draft geofence", body = GeofenceDraftDto))
)]
pub async fn get_geofence_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> impl IntoResponse {
    let dto = state.with_draft(user_id, draft_dto);
    Json(dto)
}

fn draft_dto(draft: &mut geoattend_core::GeofenceManager) -> GeofenceDraftDto {
    match draft.current_fence() {
        Ok(fence) => GeofenceDraftDto {
            latitude: Some(fence.center.latitude),
            longitude: Some(fence.center.longitude),
            radius_meters: fence.radius_meters,
            location_error: draft.location_error().map(str::to_string),
        },
        Err(_) => GeofenceDraftDto {
            latitude: None,
            longitude: None,
            radius_meters: draft.radius_meters(),
            location_error: draft.location_error().map(str::to_string),
        },
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchQuery {
    pub q: String,
}

/// Free-text place search against the geocoder.
///
/// Returns 204 when a newer search superseded this one while it was in
/// flight; an empty list is a successful "no matches".
#[utoipa::path(
    get,
    path = "/places/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Candidates", body = [PlaceCandidateDto]),
        (status = 204, description = "Superseded by a newer search"),
        (status = 502, description = "Geocoder unavailable")
    )
)]
pub async fn search_places_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.tracker.search(&query.q).await {
        Ok(Some(candidates)) => {
            let dtos: Vec<PlaceCandidateDto> = candidates
                .into_iter()
                .map(|c| PlaceCandidateDto {
                    id: c.id,
                    display_name: c.display_name,
                    latitude: c.latitude,
                    longitude: c.longitude,
                })
                .collect();
            Ok((StatusCode::OK, Json(dtos)).into_response())
        }
        Ok(None) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(err) => Err(core_error_response(err)),
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

/// List all sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "All sessions", body = [SessionDto]))
)]
pub async fn list_sessions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.registry.read().unwrap();
    let sessions: Vec<SessionDto> = registry.sessions().map(session_dto).collect();
    Json(sessions)
}

/// Start a session from the calling operator's draft geofence.
///
/// Fails with 409 while the draft has no center; the fence is frozen into
/// the session and the draft is discarded on success.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionDto),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Unit or venue not found"),
        (status = 409, description = "No geofence center has been set")
    )
)]
pub async fn start_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let scope = match (req.unit_id, req.venue_id) {
        (Some(unit_id), Some(venue_id)) => SessionScope::Class { unit_id, venue_id },
        (None, None) => SessionScope::Faculty,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "A class session needs both unit_id and venue_id".to_string(),
            ))
        }
    };

    let fence = state
        .with_draft(user_id, |draft| draft.current_fence())
        .map_err(core_error_response)?;

    let session = state
        .registry
        .write()
        .unwrap()
        .start_session(&req.name, fence, scope, user_id, Utc::now())
        .map_err(core_error_response)?;

    // The draft served its purpose; the next session starts from scratch.
    state.drafts.lock().unwrap().remove(&user_id);

    info!(session = %session.id, name = %session.name, "session started");
    Ok((StatusCode::CREATED, Json(session_dto(&session))))
}

/// End a session. The Active to Ended transition happens exactly once;
/// ending an already-ended session is a 409.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session ended", body = SessionDto),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session is not active")
    )
)]
pub async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = state
        .registry
        .write()
        .unwrap()
        .end_session(id)
        .map_err(core_error_response)?;

    let _ = state
        .events
        .send(ServerMessage::SessionEnded { session_id: id });

    info!(session = %id, "session ended");
    Ok(Json(session_dto(&session)))
}

/// The session's live presence partition.
///
/// The roster is derived from the session scope: lecturers for a faculty
/// session, the unit's course's students for a class session. Recomputed
/// on every query.
#[utoipa::path(
    get,
    path = "/sessions/{id}/presence",
    params(("id" = Uuid, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Present and absent users", body = PresenceDto),
        (status = 404, description = "Session not found")
    )
)]
pub async fn presence_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let registry = state.registry.read().unwrap();
    let session = registry.session(id).map_err(core_error_response)?;

    let roster: Vec<User> = match &session.scope {
        SessionScope::Faculty => registry.users_with_role(Role::Lecturer),
        SessionScope::Class { unit_id, .. } => {
            let unit = registry.unit(*unit_id).map_err(core_error_response)?;
            registry
                .users_with_role(Role::Student)
                .into_iter()
                .filter(|u| u.course_id == Some(unit.course_id))
                .collect()
        }
    };

    let partition = presence(&roster, session, registry.attendance());
    Ok(Json(PresenceDto {
        present: partition.present.iter().map(user_dto).collect(),
        absent: partition.absent.iter().map(user_dto).collect(),
    }))
}

/// Submit an attendance check-in: a device position plus a fresh camera
/// capture.
///
/// The geofence check runs strictly before the face comparison, so an
/// out-of-fence submission never costs a verification round trip. A repeat
/// submission the same day is idempotent success.
#[utoipa::path(
    post,
    path = "/sessions/{id}/checkin",
    params(("id" = Uuid, Path, description = "Session ID")),
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Attendance recorded (or already marked)", body = CheckInResponse),
        (status = 404, description = "Session or user not found"),
        (status = 409, description = "Session is not active"),
        (status = 422, description = "Outside the geofence or face mismatch"),
        (status = 502, description = "Verification service unavailable")
    )
)]
pub async fn check_in_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<CheckInRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let photo = BASE64.decode(&req.photo).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("photo is not valid base64: {e}"),
        )
    })?;
    let location = match req.altitude {
        Some(altitude) => GeoPoint::with_altitude(req.latitude, req.longitude, altitude),
        None => GeoPoint::new(req.latitude, req.longitude),
    };

    let outcome = state
        .workflow
        .check_in(&state.registry, id, user_id, &location, &photo, Utc::now())
        .await
        .map_err(core_error_response)?;

    match outcome {
        CheckInOutcome::Recorded(record) => {
            let user_name = {
                let registry = state.registry.read().unwrap();
                registry
                    .user(user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default()
            };
            let _ = state.events.send(ServerMessage::AttendanceMarked {
                session_id: id,
                user_id,
                user_name,
                taken_at: record.taken_at,
            });
            info!(session = %id, user = %user_id, "attendance recorded");
            Ok(Json(CheckInResponse {
                status: "recorded".to_string(),
                taken_at: Some(record.taken_at),
            }))
        }
        CheckInOutcome::AlreadyMarked => Ok(Json(CheckInResponse {
            status: "already_marked".to_string(),
            taken_at: None,
        })),
    }
}
