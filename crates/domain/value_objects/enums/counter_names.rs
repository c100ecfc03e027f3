use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Metered actions tracked in `usage_counters`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CounterName {
    RecipeViews,
}

impl CounterName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterName::RecipeViews => "recipe_views",
        }
    }
}

impl Display for CounterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
