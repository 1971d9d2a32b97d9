use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadParams(String),
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0:#}")]
    DbOpen(anyhow::Error),
    #[error("{0:#}")]
    DbQuery(anyhow::Error),
    #[error("{error:#}")]
    DbUpdate {
        table: &'static str,
        error: anyhow::Error,
    },
}

impl HandlerError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn update(table: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self::DbUpdate { table, error }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::NoWorkspace => "no_workspace",
            Self::NotFound(_) => "not_found",
            Self::DbOpen(_) => "db_open_failed",
            Self::DbQuery(_) => "db_query_failed",
            Self::DbUpdate { .. } => "db_update_failed",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::DbUpdate { table, .. } => Some(json!({ "table": table })),
            _ => None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code(), self.to_string(), self.details())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(e: anyhow::Error) -> Self {
        Self::DbQuery(e)
    }
}

impl From<rusqlite::Error> for HandlerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::DbQuery(e.into())
    }
}
