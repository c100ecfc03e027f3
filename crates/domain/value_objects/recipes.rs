use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::recipes::RecipeEntity,
    value_objects::{
        access::{AccessDecision, AccessKind},
        usage::UsageSummary,
    },
};

/// Fields visible on the page shell regardless of access.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipePreviewDto {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeAccessDto {
    pub recipe: RecipePreviewDto,
    /// Withheld behind the paywall overlay.
    pub content: Option<String>,
    pub access: AccessKind,
    pub usage: Option<UsageSummary>,
}

impl RecipeAccessDto {
    pub fn from_decision(recipe: RecipeEntity, decision: AccessDecision) -> Self {
        let content = decision.allows_content().then_some(recipe.content);
        Self {
            recipe: RecipePreviewDto {
                id: recipe.id,
                title: recipe.title,
                description: recipe.description,
                image_url: recipe.image_url,
            },
            content,
            access: decision.kind(),
            usage: decision.usage(),
        }
    }
}
