use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use crate::directory::{DirectoryError, DirectoryUser, UserDirectory};

#[derive(Debug, Deserialize)]
struct ListUsersResponse {
    #[serde(default)]
    users: Vec<DirectoryUser>,
}

/// Client for the identity provider's administrative REST API. Authenticates
/// with the service-role key, which must never be exposed to end users.
pub struct AdminApiDirectory {
    client: Client,
    base_url: String,
    service_key: String,
}

impl AdminApiDirectory {
    pub fn new(
        base_url: &str,
        service_key: &str,
        request_timeout: Duration,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            base_url: String::from(base_url.trim_end_matches('/')),
            service_key: String::from(service_key),
        })
    }
}

#[async_trait]
impl UserDirectory for AdminApiDirectory {
    async fn list_users(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/admin/users", self.base_url))
            .query(&[("page", page), ("per_page", per_page)])
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::UnexpectedStatus(response.status().as_u16()));
        }

        let body: ListUsersResponse = response.json().await?;
        Ok(body.users)
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<(), DirectoryError> {
        let response = self
            .client
            .put(format!("{}/admin/users/{}", self.base_url, user_id))
            .bearer_auth(&self.service_key)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(())
    }
}
