use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppError, routers::payments::PostgresPayments},
    usecases::payments::{PaymentsUseCase, StripeGateway},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use crates::domain::{
    repositories::entitlements::EntitlementRepository,
    value_objects::entitlements::AdminGrantRequest,
};
use std::sync::Arc;

pub fn routes(payments_usecase: Arc<PostgresPayments>) -> Router {
    Router::new()
        .route("/entitlements", post(grant_entitlement))
        .with_state(payments_usecase)
}

pub async fn grant_entitlement<E, G>(
    State(payments_usecase): State<Arc<PaymentsUseCase<E, G>>>,
    auth: Option<AuthUser>,
    Json(request): Json<AdminGrantRequest>,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let Some(auth) = auth else {
        return AppError::Unauthorized.into_response();
    };

    match payments_usecase.grant_admin(&auth, request).await {
        Ok(grant) => (StatusCode::CREATED, Json(grant)).into_response(),
        Err(err) => err.into_response(),
    }
}
