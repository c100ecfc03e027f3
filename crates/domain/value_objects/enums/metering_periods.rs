use std::fmt::Display;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

const LIFETIME_PERIOD_KEY: &str = "lifetime";

/// Window a usage counter accumulates over before a fresh counter row takes over.
///
/// Rollover is lazy: a new period maps to a new `period_key`, and a missing row reads as zero,
/// so no scheduled reset job exists.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeteringPeriod {
    /// Calendar month in UTC.
    #[default]
    Monthly,
    /// Never resets.
    Lifetime,
}

impl MeteringPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeteringPeriod::Monthly => "monthly",
            MeteringPeriod::Lifetime => "lifetime",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(MeteringPeriod::Monthly),
            "lifetime" => Some(MeteringPeriod::Lifetime),
            _ => None,
        }
    }

    pub fn period_key(&self, at: DateTime<Utc>) -> String {
        match self {
            MeteringPeriod::Monthly => format!("{:04}-{:02}", at.year(), at.month()),
            MeteringPeriod::Lifetime => LIFETIME_PERIOD_KEY.to_string(),
        }
    }
}

impl Display for MeteringPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
