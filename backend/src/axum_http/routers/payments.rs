use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    config::config_model::Stripe,
    usecases::payments::{PaymentsUseCase, StripeGateway},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::entitlements::EntitlementRepository,
        value_objects::enums::plan_types::PlanType,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::entitlements::EntitlementPostgres,
    },
    payments::stripe_client::StripeClient,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type PostgresPayments = PaymentsUseCase<EntitlementPostgres, StripeClient>;

pub fn payments_usecase(db_pool: Arc<PgPoolSquad>, stripe: &Stripe) -> Arc<PostgresPayments> {
    let entitlement_repository = EntitlementPostgres::new(Arc::clone(&db_pool));
    let stripe_client = StripeClient::new(
        stripe.secret_key.clone(),
        stripe.webhook_secret.clone(),
        stripe.success_url.clone(),
        stripe.cancel_url.clone(),
    );

    Arc::new(PaymentsUseCase::new(
        Arc::new(entitlement_repository),
        Arc::new(stripe_client),
        stripe.prices.clone(),
    ))
}

pub fn routes(payments_usecase: Arc<PostgresPayments>) -> Router {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/webhook", post(stripe_webhook))
        .route("/verify-session", get(verify_session))
        .with_state(payments_usecase)
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub plan_type: PlanType,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifySessionQuery {
    pub session_id: String,
}

pub async fn create_checkout<E, G>(
    State(payments_usecase): State<Arc<PaymentsUseCase<E, G>>>,
    auth: Option<AuthUser>,
    Json(request): Json<CheckoutRequest>,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let Some(auth) = auth else {
        return AppError::Unauthorized.into_response();
    };

    match payments_usecase
        .create_checkout(&auth.session(), request.plan_type)
        .await
    {
        Ok(checkout_url) => (StatusCode::OK, Json(CheckoutResponse { checkout_url })).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn stripe_webhook<E, G>(
    State(payments_usecase): State<Arc<PaymentsUseCase<E, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        return AppError::BadRequest("missing stripe-signature header".into()).into_response();
    };

    match payments_usecase
        .handle_stripe_webhook(&body, signature)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "received": true }))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn verify_session<E, G>(
    State(payments_usecase): State<Arc<PaymentsUseCase<E, G>>>,
    auth: Option<AuthUser>,
    Query(query): Query<VerifySessionQuery>,
) -> impl IntoResponse
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    let Some(auth) = auth else {
        return AppError::Unauthorized.into_response();
    };

    match payments_usecase
        .verify_checkout_session(&auth.session(), &query.session_id)
        .await
    {
        Ok(grant) => (StatusCode::OK, Json(grant)).into_response(),
        Err(err) => err.into_response(),
    }
}
