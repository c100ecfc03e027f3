use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::recipes},
};
use domain::{entities::recipes::RecipeEntity, repositories::recipes::RecipeRepository};

pub struct RecipePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RecipePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RecipeRepository for RecipePostgres {
    async fn find_recipe_by_title_or_id(&self, key: &str) -> Result<Option<RecipeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = match Uuid::parse_str(key) {
            Ok(recipe_id) => recipes::table
                .filter(recipes::id.eq(recipe_id))
                .select(RecipeEntity::as_select())
                .first::<RecipeEntity>(&mut conn)
                .optional()?,
            Err(_) => recipes::table
                .filter(recipes::title.eq(key))
                .select(RecipeEntity::as_select())
                .first::<RecipeEntity>(&mut conn)
                .optional()?,
        };

        Ok(result)
    }
}
