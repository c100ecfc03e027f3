use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    OptionalExtension, RunQueryDsl, define_sql_function, insert_into, prelude::*,
    sql_types::{Nullable, Text},
    upsert::excluded,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::entitlements},
};
use domain::{
    entities::entitlements::{EntitlementEntity, UpsertEntitlementEntity},
    repositories::entitlements::EntitlementRepository,
    value_objects::enums::features::Feature,
};

define_sql_function!(fn lower(x: Nullable<Text>) -> Nullable<Text>);

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_entitlement(
        &self,
        user_id: Uuid,
        feature: Feature,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(entitlements::user_id.eq(user_id))
            .filter(entitlements::feature.eq(feature.as_str()))
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_entitlement_by_email(
        &self,
        email: &str,
        feature: Feature,
    ) -> Result<Option<EntitlementEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = entitlements::table
            .filter(lower(entitlements::customer_email).eq(email.to_lowercase()))
            .filter(entitlements::feature.eq(feature.as_str()))
            .filter(
                entitlements::expires_at
                    .is_null()
                    .or(entitlements::expires_at.gt(Utc::now())),
            )
            .order(entitlements::granted_at.desc())
            .select(EntitlementEntity::as_select())
            .first::<EntitlementEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_entitlement(&self, grant: UpsertEntitlementEntity) -> Result<EntitlementEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(entitlements::table)
            .values(&grant)
            .on_conflict((entitlements::user_id, entitlements::feature))
            .do_update()
            .set((
                entitlements::customer_email.eq(excluded(entitlements::customer_email)),
                entitlements::granted_at.eq(excluded(entitlements::granted_at)),
                entitlements::expires_at.eq(excluded(entitlements::expires_at)),
                entitlements::metadata.eq(excluded(entitlements::metadata)),
                entitlements::updated_at.eq(Utc::now()),
            ))
            .returning(EntitlementEntity::as_returning())
            .get_result::<EntitlementEntity>(&mut conn)?;

        Ok(result)
    }
}
