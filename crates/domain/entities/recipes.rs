use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::recipes;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = recipes)]
pub struct RecipeEntity {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
