//! Validation of Telegram WebApp init data.
//!
//! Telegram signs the init data with HMAC-SHA256. The HMAC key is itself
//! `HMAC_SHA256(key = "WebAppData", message = bot_token)`, and the signed
//! message is every `key=value` pair except `hash`, sorted by key and joined
//! with `\n`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::config;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum InitDataError {
    #[error("missing hash parameter")]
    MissingHash,
    #[error("invalid hash, data may be tampered")]
    InvalidHash,
    #[error("missing or invalid auth_date parameter")]
    MissingAuthDate,
    #[error("init data is too old ({0} seconds)")]
    Expired(i64),
    #[error("auth_date is {0} seconds in the future")]
    FromFuture(i64),
    #[error("missing user parameter")]
    MissingUser,
    #[error("failed to parse user JSON: {0}")]
    InvalidUser(#[from] serde_json::Error),
}

/// The `user` object Telegram embeds in init data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Parse a query string into decoded key/value pairs, sorted by key.
fn parse_query(init_data: &str) -> BTreeMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let decoded_value = urlencoding::decode(value).ok()?;
            Some((key.to_string(), decoded_value.into_owned()))
        })
        .collect()
}

fn data_check_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn signing_mac(bot_token: &str) -> HmacSha256 {
    let mut secret_key_mac = <HmacSha256 as Mac>::new_from_slice(b"WebAppData")
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"));
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    <HmacSha256 as Mac>::new_from_slice(&secret_key).unwrap_or_else(|_| unreachable!("HMAC accepts keys of any size"))
}

/// Hex-encoded signature of `data_check_string` for `bot_token`.
pub fn compute_hash(data_check_string: &str, bot_token: &str) -> String {
    let mut mac = signing_mac(bot_token);
    mac.update(data_check_string.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a signed init data query string from raw (unencoded) pairs.
///
/// Useful for driving the game API locally without a Telegram client.
pub fn sign_init_data(pairs: &[(&str, &str)], bot_token: &str) -> String {
    let params: BTreeMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let hash = compute_hash(&data_check_string(&params), bot_token);

    let mut query: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect();
    query.push(format!("hash={}", hash));
    query.join("&")
}

/// Validate init data against `bot_token` at time `now` (unix seconds).
///
/// Returns the signed-in user on success.
pub fn validate_init_data_at(init_data: &str, bot_token: &str, now: i64) -> Result<WebAppUser, InitDataError> {
    let params = parse_query(init_data);

    let received_hash = params.get("hash").ok_or(InitDataError::MissingHash)?;
    let received = hex::decode(received_hash).map_err(|_| InitDataError::InvalidHash)?;

    let mut mac = signing_mac(bot_token);
    mac.update(data_check_string(&params).as_bytes());
    mac.verify_slice(&received).map_err(|_| InitDataError::InvalidHash)?;

    let auth_date = params
        .get("auth_date")
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(InitDataError::MissingAuthDate)?;
    let age_seconds = now.saturating_sub(auth_date);
    if age_seconds < 0 {
        return Err(InitDataError::FromFuture(-age_seconds));
    }
    if age_seconds > config::auth::INIT_DATA_MAX_AGE_SECS {
        return Err(InitDataError::Expired(age_seconds));
    }

    let user_json = params.get("user").ok_or(InitDataError::MissingUser)?;
    Ok(serde_json::from_str(user_json)?)
}

/// Validate init data against `bot_token` using the current time.
pub fn validate_telegram_webapp_data(init_data: &str, bot_token: &str) -> Result<WebAppUser, InitDataError> {
    validate_init_data_at(init_data, bot_token, chrono::Utc::now().timestamp())
}
