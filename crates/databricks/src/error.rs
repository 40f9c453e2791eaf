use reqwest::StatusCode;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{}: {message} ({status})", code_or_status(.error_code, .status))]
    Status { status: StatusCode, error_code: Option<String>, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

fn code_or_status(error_code: &Option<String>, status: &StatusCode) -> String {
    match error_code {
        Some(code) => code.clone(),
        None => status.as_u16().to_string(),
    }
}

/// Error body of the REST API (`error_code`/`message`) and of SCIM (`detail`).
#[derive(Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(body).ok();
        let (error_code, message) = match parsed {
            Some(ErrorBody { error_code, message, detail }) => (error_code, message.or(detail)),
            None => (None, None),
        };
        let message = message
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
        Self::Status { status, error_code, message }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, error_code, .. } => {
                *status == StatusCode::NOT_FOUND
                    || error_code.as_deref() == Some("RESOURCE_DOES_NOT_EXIST")
            }
            Self::Http(e) => e.status() == Some(StatusCode::NOT_FOUND),
        }
    }
}
