pub mod admin_api;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Account record as reported by the identity directory. Never persisted
/// locally.
#[derive(Clone, Debug, Deserialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug)]
pub enum DirectoryError {
    RequestFailure(String),
    UnexpectedStatus(u16),
}

impl std::error::Error for DirectoryError {}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::RequestFailure(e) => {
                write!(f, "DirectoryError: Request failed: {e}")
            }
            DirectoryError::UnexpectedStatus(status) => {
                write!(f, "DirectoryError: Directory responded with status {status}")
            }
        }
    }
}

impl From<reqwest::Error> for DirectoryError {
    fn from(error: reqwest::Error) -> Self {
        DirectoryError::RequestFailure(error.to_string())
    }
}

/// Result of a bounded directory scan. `CapExceeded` means the search was
/// truncated before the directory was exhausted, so the account may still
/// exist; callers decide how to report that.
#[derive(Debug)]
pub enum LookupOutcome {
    Found(DirectoryUser),
    NotFound,
    CapExceeded,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Lists one page of accounts. Pages are numbered from 1. A page shorter
    /// than `per_page` marks the end of the directory.
    async fn list_users(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<DirectoryUser>, DirectoryError>;

    /// Overwrites the account's authentication secret through the directory's
    /// administrative API.
    async fn update_password(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<(), DirectoryError>;

    /// Pages through the directory for a case-insensitive email match,
    /// scanning at most `max_pages` pages.
    async fn find_by_email(
        &self,
        email: &str,
        per_page: u32,
        max_pages: u32,
    ) -> Result<LookupOutcome, DirectoryError> {
        let mut page = 1;

        loop {
            let users = self.list_users(page, per_page).await?;

            for user in &users {
                let matches = user
                    .email
                    .as_deref()
                    .is_some_and(|user_email| user_email.eq_ignore_ascii_case(email));

                if matches {
                    return Ok(LookupOutcome::Found(user.clone()));
                }
            }

            if (users.len() as u32) < per_page {
                return Ok(LookupOutcome::NotFound);
            }

            page += 1;

            if page > max_pages {
                return Ok(LookupOutcome::CapExceeded);
            }
        }
    }
}

pub type DirectoryClient = Arc<Box<dyn UserDirectory>>;
