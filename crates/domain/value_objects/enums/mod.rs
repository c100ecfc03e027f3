pub mod counter_names;
pub mod features;
pub mod metering_periods;
pub mod plan_types;
