use chrono::NaiveDate;
use rusqlite::Connection;

use super::error::{ok, HandlerError};
use super::types::{AppState, Request};

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerError::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank strings all read as `None`.
pub fn optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerError> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerError::bad_params(format!(
                    "{} must be string or null",
                    key
                )));
            };
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
    }
}

pub fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerError::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerError> {
    parse_date(&required_str(params, key)?, key)
}

pub fn optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerError> {
    optional_str(params, key)?
        .map(|s| parse_date(&s, key))
        .transpose()
}

/// `today` may be pinned by the caller; otherwise the local calendar date.
pub fn today(params: &serde_json::Value) -> Result<NaiveDate, HandlerError> {
    Ok(optional_date(params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive()))
}

pub fn entries<'a>(
    params: &'a serde_json::Value,
) -> Result<&'a Vec<serde_json::Value>, HandlerError> {
    params
        .get("entries")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerError::bad_params("missing entries"))
}

/// Runs a handler body against the open workspace and wraps the outcome in
/// the response envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerError>,
{
    let result = match state.db.as_ref() {
        Some(conn) => f(conn, &req.params),
        None => Err(HandlerError::NoWorkspace),
    };
    match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => {
            tracing::warn!(method = %req.method, code = e.code(), error = %e, "request failed");
            e.response(&req.id)
        }
    }
}
