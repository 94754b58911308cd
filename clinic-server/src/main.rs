use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, patch},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use clinic_core::{
    Appointment, AppointmentStatus, AppointmentView, BookingRequest, BookingService,
    ClinicError, Doctor, Principal, Role,
};
use clinic_postgres::PgClinicStore;

// Application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
}

// API types
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

#[derive(Deserialize)]
pub struct CreateAppointmentBody {
    /// Defaults to the acting identity; a mismatching value is rejected by
    /// the core's access rules.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub concern: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: AppointmentStatus,
}

/// Core errors rendered as the JSON envelope with the taxonomy's status code.
pub struct ApiError(ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.0.to_string()),
        });
        (status, body).into_response()
    }
}

/// The identity-provider boundary: the upstream proxy authenticates the
/// caller and forwards a stable identity and role in trusted headers. Core
/// logic never sees raw credentials, only the resolved `Principal`.
pub struct AuthPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or_else(|| {
                ApiError(ClinicError::Unauthorized("missing or invalid x-actor-id".into()))
            })?;

        let role: Role = parts
            .headers
            .get("x-actor-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(ClinicError::Unauthorized("missing x-actor-role".into())))?
            .parse()
            .map_err(ApiError)?;

        Ok(Self(Principal::new(actor_id, role)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "clinic_server=info,tower_http=debug".to_string()),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Database connection
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost:5432/clinic".to_string());

    info!("Connecting to database: {}", database_url);
    let pool = sqlx::PgPool::connect(&database_url).await?;

    let store = Arc::new(PgClinicStore::new(pool));
    let service = Arc::new(BookingService::new(store));

    let app_state = AppState { service };
    let app = create_router(app_state);

    // Determine port
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/doctors", get(list_doctors))
        .route("/api/appointments", get(list_appointments).post(create_appointment))
        .route("/api/appointments/:id/status", patch(update_appointment_status))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn health_check() -> Json<ApiResponse<String>> {
    ApiResponse::ok("OK".to_string())
}

async fn list_doctors(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Doctor>>>, ApiError> {
    let doctors = state.service.list_doctors().await?;
    Ok(ApiResponse::ok(doctors))
}

async fn list_appointments(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AppointmentView>>>, ApiError> {
    let appointments = state.service.list_for(&principal).await?;
    Ok(ApiResponse::ok(appointments))
}

async fn create_appointment(
    AuthPrincipal(principal): AuthPrincipal,
    State(state): State<AppState>,
    Json(body): Json<CreateAppointmentBody>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let request = BookingRequest {
        patient_id: body.patient_id.unwrap_or(principal.actor_id),
        doctor_id: body.doctor_id,
        date: body.date,
        time: body.time,
        concern: body.concern,
    };
    let appointment = state.service.book(&principal, request).await?;
    Ok(ApiResponse::ok(appointment))
}

async fn update_appointment_status(
    AuthPrincipal(principal): AuthPrincipal,
    Path(appointment_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let appointment = state
        .service
        .transition(&principal, appointment_id, body.status)
        .await?;
    Ok(ApiResponse::ok(appointment))
}
