pub mod entitlements;
pub mod recipes;
pub mod usage_counters;
