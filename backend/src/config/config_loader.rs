use std::{env, str::FromStr};

use anyhow::{Context, Result, anyhow};
use camino::{
    domain::value_objects::installments::PlanIntervals,
    payments::{stripe_client::STRIPE_API_BASE, webhook_signature::DEFAULT_TOLERANCE_SECS},
};

use crate::config::stage::Stage;

use super::config_model::{
    BackendServer, Database, DotEnvyConfig, Installments, Stripe, Supabase,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: parse_required("SERVER_PORT_BACKEND")?,
        body_limit: parse_required("SERVER_BODY_LIMIT")?,
        timeout: parse_required("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
    };

    let supabase = Supabase {
        jwt_secret: required("SUPABASE_JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        webhook_tolerance_secs: parse_or("STRIPE_WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS)?,
        api_base: optional("STRIPE_API_BASE").unwrap_or_else(|| STRIPE_API_BASE.to_string()),
        http_timeout_secs: parse_or("STRIPE_HTTP_TIMEOUT_SECS", 30)?,
    };

    let plan_intervals = match optional("INSTALLMENT_PLAN_INTERVALS") {
        Some(raw) => PlanIntervals::from_str(&raw)
            .map_err(|err| anyhow!("INSTALLMENT_PLAN_INTERVALS is invalid: {err}"))?,
        None => PlanIntervals::default(),
    };

    Ok(DotEnvyConfig {
        stage: get_stage(),
        backend_server,
        database,
        supabase,
        stripe,
        installments: Installments { plan_intervals },
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = env::var("STAGE").unwrap_or_default();
    Stage::try_from(&stage_str).unwrap_or_default()
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn parse_required<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
