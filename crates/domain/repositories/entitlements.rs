use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::entitlements::{EntitlementEntity, UpsertEntitlementEntity},
    value_objects::enums::features::Feature,
};

#[automock]
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn find_entitlement(
        &self,
        user_id: Uuid,
        feature: Feature,
    ) -> Result<Option<EntitlementEntity>>;

    /// Fallback lookup for grants written before the buyer's account id was known.
    /// Matches the email case-insensitively and skips expired grants.
    async fn find_entitlement_by_email(
        &self,
        email: &str,
        feature: Feature,
    ) -> Result<Option<EntitlementEntity>>;

    /// Insert-or-overwrite keyed by `(user_id, feature)`. Safe to replay.
    async fn upsert_entitlement(&self, grant: UpsertEntitlementEntity) -> Result<EntitlementEntity>;
}
