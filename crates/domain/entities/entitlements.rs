use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::entitlements;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = entitlements)]
pub struct EntitlementEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feature: String,
    pub customer_email: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementEntity {
    /// A grant without `expires_at` is lifetime.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}

/// Row written by the `(user_id, feature)` upsert. Conflicting rows are overwritten in place.
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = entitlements)]
pub struct UpsertEntitlementEntity {
    pub user_id: Uuid,
    pub feature: String,
    pub customer_email: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}
