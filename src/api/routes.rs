//! API Routes
//!
//! HTTP endpoint definitions: maps the routes of §6 onto the Registration
//! Engine / Event Service / Stats Service, translating their typed outcomes
//! into the `{success, message, data}` envelope at the edge — the only
//! place in this crate that does so — grounded on the teacher's router
//! wiring (`State<PgPool>` + `Extension<OperationContext>` + typed
//! `Json<Req>` -> `Result<(StatusCode, Json<Resp>), AppError>`) and its
//! dynamic-update-query handler shape (`update_event` mirrors
//! `update_api_key`).

use axum::{
    extract::{DefaultBodyLimit, Extension, Path, Query, State},
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::middleware::{
    identify_middleware, logging_middleware, rate_limit_middleware, require_auth, AuthenticatedPrincipal,
};
use super::state::AppState;
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::events::{EventDraft, EventFilter, EventUpdate, PageRequest};
use crate::registration::{CancelOutcome, RegisterOutcome};

// =========================================================================
// Envelope
// =========================================================================

/// The `{success, message, data}` envelope of §6. `message` and `data` are
/// both optional so a handler renders only what it has.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data: Some(data),
    })
}

fn ok_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data: Some(data),
    })
}

// =========================================================================
// Router
// =========================================================================

/// Build the fully wired router: identity resolution runs on every `/api`
/// route (anonymous if no credential resolves), `require_auth` is layered
/// only onto the routes §6 marks "required", matching the teacher's layer
/// order (innermost to outermost: rate-limit, auth, logging).
pub fn create_router(state: AppState) -> Router {
    let optional_auth_routes = Router::new()
        .route("/events/:id", get(get_event))
        .route("/events/:id/stats", get(get_event_stats))
        .route("/events/upcoming", get(list_upcoming));

    let required_auth_routes = Router::new()
        .route("/events", post(create_event))
        .route("/events/:id/register", post(register))
        .route("/events/:id/register/:user_id", delete(cancel))
        .route("/events/:id", put(update_event))
        .route("/events/:id", delete(delete_event))
        .layer(middleware::from_fn(require_auth));

    let api_routes = optional_auth_routes
        .merge(required_auth_routes)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), identify_middleware))
        .layer(middleware::from_fn(logging_middleware));

    let payload_limit = state.config.payload_size_limit_bytes;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(cors_layer(&state.config.allowed_origins))
        .layer(DefaultBodyLimit::max(payload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the CORS layer from the configured origin list. `"*"` allows any
/// origin (the teacher's `tower-http` dependency carries the `cors` feature
/// but never wires it; this crate's §6 config surface names
/// `allowed_origins`, so it is wired here).
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    if allowed_origins.trim() == "*" {
        return layer.allow_origin(tower_http::cors::Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "success",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    }))
}

// =========================================================================
// Create event
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    pub capacity: i32,
}

async fn create_event(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let owner_id = require_principal(&principal)?;

    let event = state
        .events
        .create_event(
            owner_id,
            EventDraft {
                title: req.title,
                description: req.description,
                date_time: req.date_time,
                location: req.location,
                capacity: req.capacity,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, ok(event_row_json(&event))))
}

// =========================================================================
// Get event
// =========================================================================

async fn get_event(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let view = state.events.get_event(event_id, principal.principal_id()).await?;
    Ok(ok(serde_json::to_value(view).expect("EventView serializes")))
}

// =========================================================================
// Stats
// =========================================================================

async fn get_event_stats(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let snapshot = state.stats.get_stats(event_id).await?;
    Ok(ok(serde_json::to_value(snapshot).expect("StatsSnapshot serializes")))
}

// =========================================================================
// List upcoming
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct ListUpcomingQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort_by: crate::events::SortBy,
    #[serde(default)]
    pub sort_order: crate::events::SortOrder,
    pub search: Option<String>,
    pub location: Option<String>,
    pub min_capacity: Option<i32>,
    pub max_capacity: Option<i32>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

async fn list_upcoming(
    State(state): State<AppState>,
    Query(q): Query<ListUpcomingQuery>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let filter = EventFilter {
        search: q.search,
        location: q.location,
        min_capacity: q.min_capacity,
        max_capacity: q.max_capacity,
        date_from: q.date_from,
        date_to: q.date_to,
        sort_by: q.sort_by,
        sort_order: q.sort_order,
    };
    let page_request = PageRequest::new(q.page, q.limit);

    let page = state.events.list_upcoming(filter, page_request).await?;
    Ok(ok(serde_json::to_value(page).expect("Page serializes")))
}

// =========================================================================
// Register
// =========================================================================

#[derive(Debug, Deserialize, Default)]
pub struct RegisterRequest {
    /// Only honored when the caller holds the elevated capability;
    /// otherwise the caller always registers themselves (§6).
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

async fn register(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(event_id): Path<Uuid>,
    body: Option<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let caller_id = require_principal(&principal)?;
    let requested_user = body.and_then(|Json(r)| r.user_id);

    let target_user_id = match requested_user {
        Some(uid) if uid != caller_id => {
            if !principal.is_elevated() {
                return Err(DomainError::ForbiddenEventEdit.into());
            }
            uid
        }
        Some(uid) => uid,
        None => caller_id,
    };

    let outcome = state.engine.register(target_user_id, event_id).await?;
    register_outcome_response(outcome)
}

fn register_outcome_response(
    outcome: RegisterOutcome,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    match outcome {
        RegisterOutcome::Created(id) => Ok((
            StatusCode::CREATED,
            ok_with_message("registered", json!({ "registration_id": id, "status": "confirmed" })),
        )),
        RegisterOutcome::Reactivated(id) => Ok((
            StatusCode::OK,
            ok_with_message("reactivated", json!({ "registration_id": id, "status": "confirmed" })),
        )),
        RegisterOutcome::AlreadyRegistered => {
            Err(AppError::Conflict("already registered for this event".to_string()))
        }
        RegisterOutcome::EventFull => Err(AppError::BusinessRule("event has reached maximum capacity".to_string())),
        RegisterOutcome::EventPast => Err(DomainError::EventPast.into()),
        RegisterOutcome::EventNotFound => Err(DomainError::EventNotFound(String::new()).into()),
        RegisterOutcome::UserNotFound => Err(DomainError::UserNotFound(String::new()).into()),
    }
}

// =========================================================================
// Cancel
// =========================================================================

async fn cancel(
    State(state): State<AppState>,
    Extension(_principal): Extension<AuthenticatedPrincipal>,
    Extension(context): Extension<OperationContext>,
    Path((event_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let outcome = state.engine.cancel(&context, user_id, event_id).await?;
    cancel_outcome_response(outcome)
}

fn cancel_outcome_response(outcome: CancelOutcome) -> Result<Json<Envelope<Value>>, AppError> {
    match outcome {
        CancelOutcome::Cancelled => Ok(ok_with_message("cancelled", json!({}))),
        CancelOutcome::NotRegistered => Err(DomainError::RegistrationNotFound.into()),
        CancelOutcome::EventPast => Err(DomainError::EventPast.into()),
        CancelOutcome::Forbidden => Err(DomainError::ForbiddenCancel.into()),
        CancelOutcome::EventNotFound => Err(DomainError::EventNotFound(String::new()).into()),
    }
}

// =========================================================================
// Update event
// =========================================================================

#[derive(Debug, Deserialize, Default)]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub location: Option<Option<String>>,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capacity: Option<i32>,
}

async fn update_event(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let actor_id = require_principal(&principal)?;

    let event = state
        .events
        .update_event(
            actor_id,
            event_id,
            EventUpdate {
                title: req.title,
                description: req.description,
                location: req.location,
                date_time: req.date_time,
                capacity: req.capacity,
            },
        )
        .await?;

    Ok(ok(event_row_json(&event)))
}

// =========================================================================
// Delete event
// =========================================================================

async fn delete_event(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Envelope<Value>>, AppError> {
    let actor_id = require_principal(&principal)?;
    state.events.delete_event(actor_id, event_id).await?;
    Ok(ok_with_message("deleted", json!({})))
}

// =========================================================================
// Shared helpers
// =========================================================================

fn require_principal(principal: &AuthenticatedPrincipal) -> Result<Uuid, AppError> {
    principal.principal_id().ok_or(AppError::Unauthenticated)
}

fn event_row_json(event: &crate::store::EventRow) -> Value {
    json!({
        "id": event.id,
        "title": event.title,
        "description": event.description,
        "date_time": event.date_time,
        "location": event.location,
        "capacity": event.capacity,
        "current_registrations": event.current_registrations,
        "created_by": event.created_by,
        "is_active": event.is_active,
        "created_at": event.created_at,
        "updated_at": event.updated_at,
    })
}
