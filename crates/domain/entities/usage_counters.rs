use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::usage_counters;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_counters)]
#[diesel(primary_key(user_id, counter_name, period_key))]
pub struct UsageCounterEntity {
    pub user_id: Uuid,
    pub counter_name: String,
    pub period_key: String,
    pub value: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = usage_counters)]
pub struct InsertUsageCounterEntity {
    pub user_id: Uuid,
    pub counter_name: String,
    pub period_key: String,
    pub value: i32,
}
