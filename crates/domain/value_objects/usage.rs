use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::metering_periods::MeteringPeriod;

/// Free recipe views per metering period for users without a standing grant.
pub const FREE_PLAN_LIMIT: i32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeTierPolicy {
    pub limit: i32,
    pub period: MeteringPeriod,
}

impl FreeTierPolicy {
    pub fn new(limit: i32, period: MeteringPeriod) -> Self {
        Self {
            limit: limit.max(0),
            period,
        }
    }
}

impl Default for FreeTierPolicy {
    fn default() -> Self {
        Self::new(FREE_PLAN_LIMIT, MeteringPeriod::default())
    }
}

/// Banner data: "X of Y views used".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSummary {
    pub recipe_views: i32,
    pub limit: i32,
    pub remaining: i32,
    pub is_last_free_view: bool,
}

impl UsageSummary {
    pub fn new(recipe_views: i32, limit: i32) -> Self {
        let remaining = (limit - recipe_views).max(0);
        Self {
            recipe_views,
            limit,
            remaining,
            is_last_free_view: remaining <= 1,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.recipe_views >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_allows_three_monthly_views() {
        let policy = FreeTierPolicy::default();
        assert_eq!(policy.limit, 3);
        assert_eq!(policy.period, MeteringPeriod::Monthly);
    }

    #[test]
    fn negative_limit_is_clamped() {
        assert_eq!(FreeTierPolicy::new(-5, MeteringPeriod::Lifetime).limit, 0);
    }

    #[test]
    fn summary_flags_last_free_view() {
        let first = UsageSummary::new(1, 3);
        assert_eq!(first.remaining, 2);
        assert!(!first.is_last_free_view);

        let second = UsageSummary::new(2, 3);
        assert_eq!(second.remaining, 1);
        assert!(second.is_last_free_view);

        let third = UsageSummary::new(3, 3);
        assert_eq!(third.remaining, 0);
        assert!(third.is_last_free_view);
        assert!(third.is_exhausted());
    }

    #[test]
    fn remaining_never_goes_negative() {
        let over = UsageSummary::new(5, 3);
        assert_eq!(over.remaining, 0);
        assert!(over.is_exhausted());
    }
}
