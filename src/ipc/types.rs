use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One request line: `{"id", "method", "params"}`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The selected workspace, if any. Reference data is reloaded from `db`
/// per request so reports always see the current snapshot.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
