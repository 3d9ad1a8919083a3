//! Supabase REST API client

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

/// Supabase client for PostgREST table access
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Get the REST API URL for a table
    fn rest_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{}", self.base_url, table)
        } else {
            format!("{}/rest/v1/{}?{}", self.base_url, table, query)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    /// Select rows matching a PostgREST query string
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let response = self
            .authorized(self.client.get(self.rest_url(table, query)))
            .send()
            .await?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// Select exactly one row; `None` when nothing matches
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let response = self
            .authorized(self.client.get(self.rest_url(table, query)))
            .header("Accept", "application/vnd.pgrst.object+json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_ACCEPTABLE {
            // No rows found
            return Ok(None);
        }

        check_status(response)
            .await?
            .json()
            .await
            .map(Some)
            .map_err(SupabaseError::Parse)
    }

    /// Insert one row and return it as stored
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, SupabaseError> {
        let response = self
            .authorized(self.client.post(self.rest_url(table, "")))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await?;

        // PostgREST returns an array, get first element
        let rows: Vec<R> = check_status(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)?;
        rows.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    /// Update matching rows and return them; an empty result means no match
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<Vec<R>, SupabaseError> {
        let response = self
            .authorized(self.client.patch(self.rest_url(table, query)))
            .header("Prefer", "return=representation")
            .json(data)
            .send()
            .await?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }

    /// Delete matching rows and return what was removed
    pub async fn delete<R: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<R>, SupabaseError> {
        let response = self
            .authorized(self.client.delete(self.rest_url(table, query)))
            .header("Prefer", "return=representation")
            .send()
            .await?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(SupabaseError::Parse)
    }
}

async fn check_status(response: Response) -> Result<Response, SupabaseError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api { status, body })
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}

impl SupabaseError {
    /// PostgREST reports unique/primary key violations as 409
    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Api { status: 409, .. })
    }
}
