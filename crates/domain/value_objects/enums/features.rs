use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Feature tag an entitlement grant is scoped to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    RecipeAccess,
    PdfDownloads,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::RecipeAccess => "recipe_access",
            Feature::PdfDownloads => "pdf_downloads",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "recipe_access" => Some(Feature::RecipeAccess),
            "pdf_downloads" => Some(Feature::PdfDownloads),
            _ => None,
        }
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags_only() {
        assert_eq!(Feature::from_str("recipe_access"), Some(Feature::RecipeAccess));
        assert_eq!(Feature::from_str("pdf_downloads"), Some(Feature::PdfDownloads));
        assert_eq!(Feature::from_str("RECIPE_ACCESS"), None);
    }

    #[test]
    fn serializes_as_snake_case_tag() {
        let json = serde_json::to_string(&Feature::RecipeAccess).unwrap();
        assert_eq!(json, "\"recipe_access\"");
    }
}
