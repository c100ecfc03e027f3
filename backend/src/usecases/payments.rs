use std::{collections::HashMap, sync::Arc};

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crates::{
    domain::{
        entities::entitlements::EntitlementEntity,
        repositories::entitlements::EntitlementRepository,
        value_objects::{
            entitlements::{
                AdminGrantRequest, EntitlementDto, EntitlementMetadata, GrantSource,
                PaymentCompletion,
            },
            enums::{features::Feature, plan_types::PlanType},
            iam::SessionIdentity,
        },
    },
    payments::stripe_client::{
        StripeCheckoutSession, StripeClient, StripeEvent, StripeSubscription,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{auth::AuthUser, config::config_model::StripePrices};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        customer_email: Option<String>,
        client_reference_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String>;

    async fn retrieve_checkout_session(&self, session_id: &str)
    -> AnyResult<StripeCheckoutSession>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        customer_email: Option<String>,
        client_reference_id: &str,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String> {
        self.create_checkout_session(price_id, mode, customer_email, client_reference_id, metadata)
            .await
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment verification failed: {0}")]
    PaymentVerificationFailure(String),
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("missing price for plan: {0}")]
    MissingPrice(&'static str),
    #[error("not allowed")]
    Forbidden,
    #[error("storage unavailable")]
    StorageFault(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::PaymentVerificationFailure(_) => StatusCode::PAYMENT_REQUIRED,
            PaymentError::InvalidWebhook(_) | PaymentError::MissingPrice(_) => {
                StatusCode::BAD_REQUEST
            }
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::StorageFault(_) => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

const META_USER_ID: &str = "user_id";
const META_FEATURE: &str = "feature";
const META_PLAN_TYPE: &str = "plan_type";

/// Producers of entitlement grants: Stripe webhooks, the verify-session fallback and
/// administrative grants. All of them end in one idempotent upsert.
pub struct PaymentsUseCase<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    entitlement_repo: Arc<E>,
    stripe_client: Arc<G>,
    prices: StripePrices,
}

impl<E, G> PaymentsUseCase<E, G>
where
    E: EntitlementRepository + Send + Sync + 'static,
    G: StripeGateway + Send + Sync + 'static,
{
    pub fn new(entitlement_repo: Arc<E>, stripe_client: Arc<G>, prices: StripePrices) -> Self {
        Self {
            entitlement_repo,
            stripe_client,
            prices,
        }
    }

    pub async fn create_checkout(
        &self,
        session: &SessionIdentity,
        plan_type: PlanType,
    ) -> PaymentResult<String> {
        let user_id = session.user_id;
        let price_id = match plan_type {
            PlanType::Lifetime => self.prices.lifetime.as_str(),
            PlanType::Monthly => self.prices.monthly.as_str(),
        };
        if price_id.trim().is_empty() {
            warn!(%user_id, %plan_type, "payments: no price configured for plan");
            return Err(PaymentError::MissingPrice(plan_type.as_str()));
        }

        let metadata = HashMap::from([
            (META_USER_ID.to_string(), user_id.to_string()),
            (
                META_FEATURE.to_string(),
                Feature::RecipeAccess.to_string(),
            ),
            (META_PLAN_TYPE.to_string(), plan_type.to_string()),
        ]);

        info!(%user_id, %plan_type, "payments: creating checkout session");

        let checkout_url = self
            .stripe_client
            .create_checkout_session(
                price_id,
                plan_type.checkout_mode(),
                session.email.clone(),
                &user_id.to_string(),
                metadata,
            )
            .await
            .map_err(|err| {
                error!(%user_id, error = ?err, "payments: failed to create checkout session");
                PaymentError::Internal(err)
            })?;

        Ok(checkout_url)
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<()> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "payments: stripe webhook verification failed");
                PaymentError::InvalidWebhook("signature verification failed".into())
            })?;

        info!(
            event_id = ?event.id,
            event_type = %event.type_,
            "payments: stripe webhook verified"
        );

        match event.type_.as_str() {
            "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
                self.handle_checkout_completed(&event).await
            }
            "customer.subscription.updated" => {
                self.handle_subscription_changed(&event, false).await
            }
            "customer.subscription.deleted" => {
                self.handle_subscription_changed(&event, true).await
            }
            _ => {
                debug!(event_type = %event.type_, "payments: unhandled stripe event type");
                Ok(())
            }
        }
    }

    /// Synchronous fallback for when the webhook has not arrived yet.
    pub async fn verify_checkout_session(
        &self,
        caller: &SessionIdentity,
        session_id: &str,
    ) -> PaymentResult<EntitlementDto> {
        let user_id = caller.user_id;
        if session_id.trim().is_empty() {
            return Err(PaymentError::PaymentVerificationFailure(
                "session_id is required".into(),
            ));
        }

        let checkout = self
            .stripe_client
            .retrieve_checkout_session(session_id)
            .await
            .map_err(|err| {
                warn!(%user_id, session_id, error = %err, "payments: checkout session lookup failed");
                PaymentError::PaymentVerificationFailure("checkout session not found".into())
            })?;

        if !checkout.is_paid() {
            info!(
                %user_id,
                session_id,
                payment_status = ?checkout.payment_status,
                "payments: checkout session not paid"
            );
            return Err(PaymentError::PaymentVerificationFailure(
                "payment not completed".into(),
            ));
        }

        if Self::session_user_id(&checkout) != Some(user_id) {
            warn!(%user_id, session_id, "payments: checkout session belongs to another user");
            return Err(PaymentError::Forbidden);
        }

        let completion = self
            .completion_from_session(&checkout, user_id, GrantSource::VerifySession)
            .await?;
        let grant = self.record_completion(completion, Utc::now()).await?;

        Ok(EntitlementDto::from(grant))
    }

    /// Explicit override; replaces whatever grant exists for the pair.
    pub async fn grant_admin(
        &self,
        actor: &AuthUser,
        request: AdminGrantRequest,
    ) -> PaymentResult<EntitlementDto> {
        if !actor.is_admin() {
            warn!(actor_id = %actor.user_id, role = %actor.role, "payments: admin grant rejected");
            return Err(PaymentError::Forbidden);
        }

        let completion = PaymentCompletion {
            user_id: request.user_id,
            feature: request.feature,
            customer_email: request.customer_email,
            expires_at: request.expires_at,
            metadata: EntitlementMetadata {
                source: Some(GrantSource::Admin),
                ..Default::default()
            },
        };

        info!(
            actor_id = %actor.user_id,
            user_id = %completion.user_id,
            feature = %completion.feature,
            expires_at = ?completion.expires_at,
            "payments: admin grant"
        );

        let grant = self.upsert(&completion, Utc::now()).await?;
        Ok(EntitlementDto::from(grant))
    }

    async fn handle_checkout_completed(&self, event: &StripeEvent) -> PaymentResult<()> {
        let checkout = StripeClient::extract_checkout_session(event).ok_or_else(|| {
            warn!("payments: invalid checkout session payload in webhook");
            PaymentError::InvalidWebhook("invalid checkout session payload".into())
        })?;

        if !checkout.is_paid() {
            info!(
                session_id = ?checkout.id,
                payment_status = ?checkout.payment_status,
                "payments: checkout completed without payment, waiting for async confirmation"
            );
            return Ok(());
        }

        let user_id = Self::session_user_id(&checkout).ok_or_else(|| {
            warn!(session_id = ?checkout.id, "payments: checkout session has no user reference");
            PaymentError::InvalidWebhook("checkout session missing user reference".into())
        })?;

        let completion = match self
            .completion_from_session(&checkout, user_id, GrantSource::Webhook)
            .await
        {
            Ok(completion) => completion,
            Err(PaymentError::PaymentVerificationFailure(reason)) => {
                info!(
                    %user_id,
                    session_id = ?checkout.id,
                    reason = %reason,
                    "payments: checkout no longer grants access, skipping"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        self.record_completion(completion, Utc::now()).await?;

        Ok(())
    }

    async fn handle_subscription_changed(
        &self,
        event: &StripeEvent,
        deleted: bool,
    ) -> PaymentResult<()> {
        let subscription = StripeClient::extract_subscription(event).ok_or_else(|| {
            warn!("payments: invalid subscription payload in webhook");
            PaymentError::InvalidWebhook("invalid subscription payload".into())
        })?;

        let Some(user_id) = subscription
            .metadata
            .get(META_USER_ID)
            .and_then(|value| Uuid::parse_str(value).ok())
        else {
            info!(
                subscription_id = ?subscription.id,
                "payments: subscription without user reference, ignoring"
            );
            return Ok(());
        };

        let subscription_id = subscription.id.clone().ok_or_else(|| {
            warn!(%user_id, "payments: subscription id missing in webhook payload");
            PaymentError::InvalidWebhook("missing subscription id".into())
        })?;

        // Events arrive out of order, so an update is applied from the current state only.
        let live_state = if deleted {
            None
        } else {
            Some(
                self.stripe_client
                    .retrieve_subscription(&subscription_id)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            %subscription_id,
                            error = ?err,
                            "payments: failed to retrieve subscription"
                        );
                        PaymentError::Internal(err)
                    })?,
            )
        };

        let now = Utc::now();
        let expires_at = match &live_state {
            Some(current) if current.is_live() => current
                .period_end()
                .and_then(ts_to_datetime)
                .ok_or_else(|| {
                    warn!(%subscription_id, "payments: subscription period end missing");
                    PaymentError::InvalidWebhook("subscription period end missing".into())
                })?,
            _ => now,
        };

        let feature = subscription
            .metadata
            .get(META_FEATURE)
            .and_then(|value| Feature::from_str(value))
            .unwrap_or(Feature::RecipeAccess);

        info!(
            %user_id,
            %subscription_id,
            status = ?live_state.as_ref().and_then(|current| current.status.as_deref()),
            %expires_at,
            "payments: refreshing subscription grant"
        );

        let completion = PaymentCompletion {
            user_id,
            feature,
            customer_email: None,
            expires_at: Some(expires_at),
            metadata: EntitlementMetadata {
                plan_type: Some(PlanType::Monthly),
                provider_subscription_id: Some(subscription_id),
                source: Some(GrantSource::Webhook),
                ..Default::default()
            },
        };
        self.record_completion(completion, now).await?;

        Ok(())
    }

    async fn completion_from_session(
        &self,
        checkout: &StripeCheckoutSession,
        user_id: Uuid,
        source: GrantSource,
    ) -> PaymentResult<PaymentCompletion> {
        let feature = checkout
            .metadata_value(META_FEATURE)
            .and_then(Feature::from_str)
            .unwrap_or(Feature::RecipeAccess);
        let plan_type = checkout
            .metadata_value(META_PLAN_TYPE)
            .and_then(PlanType::from_str)
            .unwrap_or(match checkout.mode.as_deref() {
                Some("subscription") => PlanType::Monthly,
                _ => PlanType::Lifetime,
            });

        let expires_at = match plan_type {
            PlanType::Lifetime => None,
            PlanType::Monthly => {
                let subscription_id = checkout.subscription.as_deref().ok_or_else(|| {
                    PaymentError::PaymentVerificationFailure(
                        "subscription missing on checkout session".into(),
                    )
                })?;
                let subscription = self
                    .stripe_client
                    .retrieve_subscription(subscription_id)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            subscription_id,
                            error = ?err,
                            "payments: failed to retrieve subscription"
                        );
                        PaymentError::Internal(err)
                    })?;
                if !subscription.is_live() {
                    info!(
                        %user_id,
                        subscription_id,
                        status = ?subscription.status,
                        "payments: subscription behind checkout is no longer live"
                    );
                    return Err(PaymentError::PaymentVerificationFailure(
                        "subscription is not active".into(),
                    ));
                }
                let period_end = subscription
                    .period_end()
                    .and_then(ts_to_datetime)
                    .ok_or_else(|| {
                        PaymentError::Internal(anyhow!(
                            "subscription {subscription_id} has no current period end"
                        ))
                    })?;
                Some(period_end)
            }
        };

        Ok(PaymentCompletion {
            user_id,
            feature,
            customer_email: checkout.buyer_email(),
            expires_at,
            metadata: EntitlementMetadata {
                session_id: checkout.id.clone(),
                amount_paid: checkout.amount_total,
                currency: checkout.currency.clone(),
                plan_type: Some(plan_type),
                provider_subscription_id: checkout.subscription.clone(),
                source: Some(source),
            },
        })
    }

    /// Writes a payment grant. A standing lifetime grant is never replaced by an expiring one,
    /// and a known purchaser email survives events that do not carry it.
    async fn record_completion(
        &self,
        mut completion: PaymentCompletion,
        now: DateTime<Utc>,
    ) -> PaymentResult<EntitlementEntity> {
        let user_id = completion.user_id;

        if completion.expires_at.is_some() || completion.customer_email.is_none() {
            let existing = self
                .entitlement_repo
                .find_entitlement(user_id, completion.feature)
                .await
                .map_err(|err| {
                    error!(%user_id, db_error = ?err, "payments: failed to load existing grant");
                    PaymentError::StorageFault(err)
                })?;

            if let Some(existing) = existing {
                if existing.expires_at.is_none() && completion.expires_at.is_some() {
                    info!(%user_id, "payments: lifetime grant kept over expiring grant");
                    return Ok(existing);
                }
                if completion.customer_email.is_none() {
                    completion.customer_email = existing.customer_email;
                }
            }
        }

        self.upsert(&completion, now).await
    }

    async fn upsert(
        &self,
        completion: &PaymentCompletion,
        now: DateTime<Utc>,
    ) -> PaymentResult<EntitlementEntity> {
        let user_id = completion.user_id;
        let grant = self
            .entitlement_repo
            .upsert_entitlement(completion.to_entity(now))
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "payments: failed to upsert grant");
                PaymentError::StorageFault(err)
            })?;

        info!(
            %user_id,
            feature = %completion.feature,
            expires_at = ?grant.expires_at,
            session_id = ?completion.metadata.session_id,
            "payments: grant recorded"
        );

        Ok(grant)
    }

    fn session_user_id(checkout: &StripeCheckoutSession) -> Option<Uuid> {
        checkout
            .metadata_value(META_USER_ID)
            .or(checkout.client_reference_id.as_deref())
            .and_then(|value| Uuid::parse_str(value).ok())
    }
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
