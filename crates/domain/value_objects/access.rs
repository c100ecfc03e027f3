use serde::Serialize;

use crate::domain::value_objects::usage::UsageSummary;

/// Outcome of a single recipe-view request for an authenticated user and an existing recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Standing grant; usage was neither read nor written.
    AllowUnlimited,
    /// Free-tier view, counted. `usage` is post-increment.
    AllowAndCount { usage: UsageSummary },
    /// Free allowance exhausted; page shell only. `usage` is unchanged.
    ShowPaywall { usage: UsageSummary },
}

impl AccessDecision {
    pub fn allows_content(&self) -> bool {
        !matches!(self, AccessDecision::ShowPaywall { .. })
    }

    pub fn kind(&self) -> AccessKind {
        match self {
            AccessDecision::AllowUnlimited => AccessKind::Unlimited,
            AccessDecision::AllowAndCount { .. } => AccessKind::Metered,
            AccessDecision::ShowPaywall { .. } => AccessKind::Paywall,
        }
    }

    pub fn usage(&self) -> Option<UsageSummary> {
        match self {
            AccessDecision::AllowUnlimited => None,
            AccessDecision::AllowAndCount { usage } | AccessDecision::ShowPaywall { usage } => {
                Some(*usage)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Unlimited,
    Metered,
    Paywall,
}
