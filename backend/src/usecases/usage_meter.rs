use anyhow::Result;
use chrono::{DateTime, Utc};
use crates::domain::{
    repositories::usage_counters::UsageCounterRepository,
    value_objects::{
        enums::counter_names::CounterName,
        usage::{FreeTierPolicy, UsageSummary},
    },
};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Reads and advances per-user free-tier counters. Never retries a failed write.
pub struct UsageMeter<U>
where
    U: UsageCounterRepository + Send + Sync + 'static,
{
    usage_repo: Arc<U>,
    policy: FreeTierPolicy,
}

impl<U> UsageMeter<U>
where
    U: UsageCounterRepository + Send + Sync + 'static,
{
    pub fn new(usage_repo: Arc<U>, policy: FreeTierPolicy) -> Self {
        Self { usage_repo, policy }
    }

    pub fn policy(&self) -> FreeTierPolicy {
        self.policy
    }

    pub async fn get_usage(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<UsageSummary> {
        let period_key = self.policy.period.period_key(now);

        let recipe_views = self
            .usage_repo
            .get_usage(user_id, CounterName::RecipeViews, &period_key)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %period_key,
                    db_error = ?err,
                    "usage_meter: failed to read usage"
                );
                err
            })?;

        Ok(UsageSummary::new(recipe_views, self.policy.limit))
    }

    /// Unconditional atomic increment; returns the new value.
    pub async fn increment(
        &self,
        user_id: Uuid,
        counter: CounterName,
        now: DateTime<Utc>,
    ) -> Result<i32> {
        let period_key = self.policy.period.period_key(now);

        let value = self
            .usage_repo
            .atomic_increment(user_id, counter, &period_key)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %counter,
                    %period_key,
                    db_error = ?err,
                    "usage_meter: failed to increment counter"
                );
                err
            })?;

        debug!(%user_id, %counter, %period_key, value, "usage_meter: counter incremented");
        Ok(value)
    }

    /// Counts one recipe view if the allowance is not exhausted. `None` means the view was
    /// not counted because the limit had been reached, possibly by a concurrent request.
    pub async fn try_consume_view(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageSummary>> {
        let period_key = self.policy.period.period_key(now);

        let value = self
            .usage_repo
            .increment_if_below(
                user_id,
                CounterName::RecipeViews,
                &period_key,
                self.policy.limit,
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %period_key,
                    db_error = ?err,
                    "usage_meter: failed to count recipe view"
                );
                err
            })?;

        Ok(value.map(|recipe_views| UsageSummary::new(recipe_views, self.policy.limit)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use crates::domain::{
        repositories::usage_counters::MockUsageCounterRepository,
        value_objects::enums::metering_periods::MeteringPeriod,
    };
    use std::{collections::HashMap, sync::Mutex};
    use tokio::task::JoinSet;

    /// Store stand-in whose increments are atomic under one lock, like a single SQL statement.
    #[derive(Default)]
    pub(crate) struct InMemoryUsageCounters {
        values: Mutex<HashMap<(Uuid, CounterName, String), i32>>,
    }

    impl InMemoryUsageCounters {
        pub(crate) fn value(&self, user_id: Uuid, period_key: &str) -> i32 {
            self.values
                .lock()
                .unwrap()
                .get(&(user_id, CounterName::RecipeViews, period_key.to_string()))
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl UsageCounterRepository for InMemoryUsageCounters {
        async fn get_usage(
            &self,
            user_id: Uuid,
            counter: CounterName,
            period_key: &str,
        ) -> Result<i32> {
            let values = self.values.lock().unwrap();
            Ok(values
                .get(&(user_id, counter, period_key.to_string()))
                .copied()
                .unwrap_or(0))
        }

        async fn atomic_increment(
            &self,
            user_id: Uuid,
            counter: CounterName,
            period_key: &str,
        ) -> Result<i32> {
            let mut values = self.values.lock().unwrap();
            let value = values
                .entry((user_id, counter, period_key.to_string()))
                .or_insert(0);
            *value += 1;
            Ok(*value)
        }

        async fn increment_if_below(
            &self,
            user_id: Uuid,
            counter: CounterName,
            period_key: &str,
            limit: i32,
        ) -> Result<Option<i32>> {
            let mut values = self.values.lock().unwrap();
            let value = values
                .entry((user_id, counter, period_key.to_string()))
                .or_insert(0);
            if *value >= limit {
                return Ok(None);
            }
            *value += 1;
            Ok(Some(*value))
        }
    }

    fn october() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_counter_reads_as_zero() {
        let user_id = Uuid::new_v4();
        let mut usage_repo = MockUsageCounterRepository::new();
        usage_repo
            .expect_get_usage()
            .withf(move |id, counter, period_key| {
                *id == user_id
                    && *counter == CounterName::RecipeViews
                    && period_key.to_string() == "2026-10"
            })
            .times(1)
            .returning(|_, _, _| Ok(0));

        let meter = UsageMeter::new(Arc::new(usage_repo), FreeTierPolicy::default());
        let usage = meter.get_usage(user_id, october()).await.unwrap();

        assert_eq!(usage, UsageSummary::new(0, 3));
        assert_eq!(usage.remaining, 3);
    }

    #[tokio::test]
    async fn storage_fault_is_not_coerced_to_zero() {
        let mut usage_repo = MockUsageCounterRepository::new();
        usage_repo
            .expect_get_usage()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection refused")));

        let meter = UsageMeter::new(Arc::new(usage_repo), FreeTierPolicy::default());

        assert!(meter.get_usage(Uuid::new_v4(), october()).await.is_err());
    }

    #[tokio::test]
    async fn failed_increment_is_not_retried() {
        let mut usage_repo = MockUsageCounterRepository::new();
        usage_repo
            .expect_increment_if_below()
            .times(1)
            .returning(|_, _, _, _| Err(anyhow::anyhow!("statement timeout")));

        let meter = UsageMeter::new(Arc::new(usage_repo), FreeTierPolicy::default());

        assert!(
            meter
                .try_consume_view(Uuid::new_v4(), october())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn consume_passes_policy_limit_and_lifetime_key() {
        let user_id = Uuid::new_v4();
        let mut usage_repo = MockUsageCounterRepository::new();
        usage_repo
            .expect_increment_if_below()
            .withf(|_, _, period_key, limit| period_key.to_string() == "lifetime" && *limit == 5)
            .times(1)
            .returning(|_, _, _, _| Ok(Some(4)));

        let policy = FreeTierPolicy::new(5, MeteringPeriod::Lifetime);
        let meter = UsageMeter::new(Arc::new(usage_repo), policy);
        let usage = meter.try_consume_view(user_id, october()).await.unwrap();

        assert_eq!(usage, Some(UsageSummary::new(4, 5)));
    }

    #[tokio::test]
    async fn increment_returns_store_value() {
        let user_id = Uuid::new_v4();
        let mut usage_repo = MockUsageCounterRepository::new();
        usage_repo
            .expect_atomic_increment()
            .withf(move |id, counter, _| *id == user_id && *counter == CounterName::RecipeViews)
            .times(1)
            .returning(|_, _, _| Ok(7));

        let meter = UsageMeter::new(Arc::new(usage_repo), FreeTierPolicy::default());

        assert_eq!(
            meter
                .increment(user_id, CounterName::RecipeViews, october())
                .await
                .unwrap(),
            7
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_advance_by_exactly_ten() {
        let store = Arc::new(InMemoryUsageCounters::default());
        let meter = Arc::new(UsageMeter::new(Arc::clone(&store), FreeTierPolicy::default()));
        let user_id = Uuid::new_v4();
        let now = october();

        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let meter = Arc::clone(&meter);
            tasks.spawn(async move {
                meter
                    .increment(user_id, CounterName::RecipeViews, now)
                    .await
                    .unwrap()
            });
        }

        let mut returned = Vec::new();
        while let Some(result) = tasks.join_next().await {
            returned.push(result.unwrap());
        }
        returned.sort_unstable();

        assert_eq!(store.value(user_id, "2026-10"), 10);
        assert_eq!(returned, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn new_month_starts_from_zero() {
        let store = Arc::new(InMemoryUsageCounters::default());
        let meter = UsageMeter::new(Arc::clone(&store), FreeTierPolicy::default());
        let user_id = Uuid::new_v4();

        for _ in 0..3 {
            meter.try_consume_view(user_id, october()).await.unwrap();
        }
        let november = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();

        assert!(meter.get_usage(user_id, october()).await.unwrap().is_exhausted());
        assert_eq!(meter.get_usage(user_id, november).await.unwrap().recipe_views, 0);
    }
}
