use serde::{Deserialize, Serialize};

// Fields default to empty strings so that an absent field gets the same
// "required" failure as an explicitly empty one.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputEmail {
    #[serde(default)]
    pub email: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputResetConfirmation {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(default, rename = "newPassword")]
    pub new_password: String,
}

/// Response envelope shared by every endpoint. Failures are reported here
/// rather than through the HTTP status code, so callers must check `ok`.
#[derive(Debug, Deserialize, Serialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            ok: false,
            error: Some(String::from(message)),
        }
    }
}
