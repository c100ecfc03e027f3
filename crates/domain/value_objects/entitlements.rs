use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::entitlements::{EntitlementEntity, UpsertEntitlementEntity},
    value_objects::enums::{features::Feature, plan_types::PlanType},
};

/// Which producer wrote a grant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GrantSource {
    Webhook,
    VerifySession,
    Admin,
}

/// Opaque bag stored in `entitlements.metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitlementMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<PlanType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_subscription_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<GrantSource>,
}

/// A confirmed payment (or administrative grant) to be written as an entitlement.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCompletion {
    pub user_id: Uuid,
    pub feature: Feature,
    pub customer_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: EntitlementMetadata,
}

impl PaymentCompletion {
    pub fn to_entity(&self, granted_at: DateTime<Utc>) -> UpsertEntitlementEntity {
        UpsertEntitlementEntity {
            user_id: self.user_id,
            feature: self.feature.to_string(),
            customer_email: self.customer_email.clone(),
            granted_at,
            expires_at: self.expires_at,
            metadata: serde_json::to_value(&self.metadata).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminGrantRequest {
    pub user_id: Uuid,
    pub feature: Feature,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EntitlementDto {
    pub user_id: Uuid,
    pub feature: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: EntitlementMetadata,
}

impl From<EntitlementEntity> for EntitlementDto {
    fn from(value: EntitlementEntity) -> Self {
        let metadata = serde_json::from_value(value.metadata).unwrap_or_default();

        Self {
            user_id: value.user_id,
            feature: value.feature,
            granted_at: value.granted_at,
            expires_at: value.expires_at,
            metadata,
        }
    }
}
