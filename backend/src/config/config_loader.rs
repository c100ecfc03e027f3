use anyhow::{Context, Result, anyhow};
use crates::domain::value_objects::{
    enums::metering_periods::MeteringPeriod,
    usage::{FREE_PLAN_LIMIT, FreeTierPolicy},
};

use super::config_model::{
    Auth, BackendServer, Database, DotEnvyConfig, Stripe, StripePrices,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        prices: StripePrices {
            lifetime: required("STRIPE_PRICE_LIFETIME")?,
            monthly: required("STRIPE_PRICE_MONTHLY")?,
        },
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth: get_auth_config()?,
        stripe,
        free_tier: get_free_tier_policy()?,
    })
}

/// Read on every authenticated request, so kept separate from the full load.
pub fn get_auth_config() -> Result<Auth> {
    dotenvy::dotenv().ok();

    Ok(Auth {
        jwt_secret: required("AUTH_JWT_SECRET")?,
        audience: optional("AUTH_JWT_AUDIENCE"),
    })
}

pub fn get_free_tier_policy() -> Result<FreeTierPolicy> {
    let limit = match optional("FREE_PLAN_LIMIT") {
        Some(raw) => raw
            .parse::<i32>()
            .context("FREE_PLAN_LIMIT is invalid")?,
        None => FREE_PLAN_LIMIT,
    };
    if limit < 0 {
        return Err(anyhow!("FREE_PLAN_LIMIT must not be negative"));
    }

    let period = match optional("METERING_PERIOD") {
        Some(raw) => MeteringPeriod::from_str(&raw)
            .ok_or_else(|| anyhow!("METERING_PERIOD is invalid: {raw}"))?,
        None => MeteringPeriod::default(),
    };

    Ok(FreeTierPolicy::new(limit, period))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
