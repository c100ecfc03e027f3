pub mod access;
pub mod entitlements;
pub mod enums;
pub mod iam;
pub mod recipes;
pub mod usage;
