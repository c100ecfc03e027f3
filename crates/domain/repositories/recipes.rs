use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::recipes::RecipeEntity;

#[automock]
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Keys that parse as a UUID match `id`, anything else matches the exact `title`.
    async fn find_recipe_by_title_or_id(&self, key: &str) -> Result<Option<RecipeEntity>>;
}
