pub mod entitlement_resolver;
pub mod payments;
pub mod recipe_access;
pub mod usage_meter;
