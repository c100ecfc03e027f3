use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// One-time payment, grant never expires.
    Lifetime,
    /// Recurring subscription, grant expires at the end of the paid period.
    Monthly,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Lifetime => "lifetime",
            PlanType::Monthly => "monthly",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "lifetime" => Some(PlanType::Lifetime),
            "monthly" => Some(PlanType::Monthly),
            _ => None,
        }
    }

    /// Stripe Checkout `mode` for this plan.
    pub fn checkout_mode(&self) -> &'static str {
        match self {
            PlanType::Lifetime => "payment",
            PlanType::Monthly => "subscription",
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
