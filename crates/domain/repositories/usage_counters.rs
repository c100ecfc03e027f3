use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::counter_names::CounterName;

/// Per-user counters. Every mutation is a single statement at the store; callers never
/// read-modify-write in application code.
#[automock]
#[async_trait]
pub trait UsageCounterRepository: Send + Sync {
    /// Missing rows read as zero.
    async fn get_usage(&self, user_id: Uuid, counter: CounterName, period_key: &str)
    -> Result<i32>;

    /// Adds one and returns the new value.
    async fn atomic_increment(
        &self,
        user_id: Uuid,
        counter: CounterName,
        period_key: &str,
    ) -> Result<i32>;

    /// Adds one only while the stored value is below `limit`. Returns the new value, or
    /// `None` when the limit had already been reached.
    async fn increment_if_below(
        &self,
        user_id: Uuid,
        counter: CounterName,
        period_key: &str,
        limit: i32,
    ) -> Result<Option<i32>>;
}
