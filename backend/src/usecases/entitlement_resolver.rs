use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::entitlements::EntitlementRepository,
    value_objects::enums::features::Feature,
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Answers whether a user holds a live standing grant for unlimited recipe access.
pub struct EntitlementResolver<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    entitlement_repo: Arc<E>,
}

impl<E> EntitlementResolver<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    pub fn new(entitlement_repo: Arc<E>) -> Self {
        Self { entitlement_repo }
    }

    /// Looks up the grant by user id, then by `email` when one is given. Expired grants count
    /// as absent. Storage failures are returned as errors, never as `false`.
    pub async fn has_unlimited_access(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let grant = self
            .entitlement_repo
            .find_entitlement(user_id, Feature::RecipeAccess)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "entitlements: failed to load grant by user"
                );
                err
            })?;

        if let Some(grant) = grant {
            if grant.is_active_at(now) {
                debug!(%user_id, "entitlements: active grant found");
                return Ok(true);
            }
            debug!(
                %user_id,
                expires_at = ?grant.expires_at,
                "entitlements: grant expired"
            );
        }

        let Some(email) = email else {
            return Ok(false);
        };

        let grant = self
            .entitlement_repo
            .find_entitlement_by_email(email, Feature::RecipeAccess)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "entitlements: failed to load grant by email"
                );
                err
            })?;

        let active = grant.is_some_and(|grant| grant.is_active_at(now));
        if active {
            debug!(%user_id, "entitlements: active grant found by email");
        }

        Ok(active)
    }
}
