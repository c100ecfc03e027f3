use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, insert_into, prelude::*, sql_query,
    sql_types::{Int4, Text, Uuid as SqlUuid},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::usage_counters},
};
use domain::{
    entities::usage_counters::{InsertUsageCounterEntity, UsageCounterEntity},
    repositories::usage_counters::UsageCounterRepository,
    value_objects::enums::counter_names::CounterName,
};

// The WHERE on the conflict branch makes the limit check and the increment one statement.
const INCREMENT_IF_BELOW_SQL: &str = "\
    INSERT INTO usage_counters (user_id, counter_name, period_key, value) \
    VALUES ($1, $2, $3, 1) \
    ON CONFLICT (user_id, counter_name, period_key) \
    DO UPDATE SET value = usage_counters.value + 1, updated_at = now() \
    WHERE usage_counters.value < $4 \
    RETURNING value";

#[derive(Debug, QueryableByName)]
struct CounterValue {
    #[diesel(sql_type = Int4)]
    value: i32,
}

pub struct UsageCounterPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsageCounterPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UsageCounterRepository for UsageCounterPostgres {
    async fn get_usage(
        &self,
        user_id: Uuid,
        counter: CounterName,
        period_key: &str,
    ) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = usage_counters::table
            .filter(usage_counters::user_id.eq(user_id))
            .filter(usage_counters::counter_name.eq(counter.as_str()))
            .filter(usage_counters::period_key.eq(period_key))
            .select(UsageCounterEntity::as_select())
            .first::<UsageCounterEntity>(&mut conn)
            .optional()?;

        Ok(row.map_or(0, |row| row.value))
    }

    async fn atomic_increment(
        &self,
        user_id: Uuid,
        counter: CounterName,
        period_key: &str,
    ) -> Result<i32> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let insert_entity = InsertUsageCounterEntity {
            user_id,
            counter_name: counter.to_string(),
            period_key: period_key.to_string(),
            value: 1,
        };

        let value = insert_into(usage_counters::table)
            .values(&insert_entity)
            .on_conflict((
                usage_counters::user_id,
                usage_counters::counter_name,
                usage_counters::period_key,
            ))
            .do_update()
            .set((
                usage_counters::value.eq(usage_counters::value + 1),
                usage_counters::updated_at.eq(Utc::now()),
            ))
            .returning(usage_counters::value)
            .get_result::<i32>(&mut conn)?;

        Ok(value)
    }

    async fn increment_if_below(
        &self,
        user_id: Uuid,
        counter: CounterName,
        period_key: &str,
        limit: i32,
    ) -> Result<Option<i32>> {
        // The insert branch would otherwise create a row at 1 for a zero limit.
        if limit <= 0 {
            return Ok(None);
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = sql_query(INCREMENT_IF_BELOW_SQL)
            .bind::<SqlUuid, _>(user_id)
            .bind::<Text, _>(counter.as_str())
            .bind::<Text, _>(period_key)
            .bind::<Int4, _>(limit)
            .get_result::<CounterValue>(&mut conn)
            .optional()?;

        Ok(row.map(|row| row.value))
    }
}
