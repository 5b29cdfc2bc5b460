//! Cloud Secret-Manager Backend
//!
//! Stores all credentials as a single JSON blob in one versioned secret,
//! fetched over HTTPS. The access token comes from the ambient environment,
//! mirroring the standard workload-identity flow. Values never appear in
//! logs; errors carry only status and key names.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::VaultBackend;
use crate::constants;
use crate::types::{ErrorClassifier, PressError, Result};

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

#[derive(Deserialize)]
struct SecretVersionResponse {
    payload: SecretPayload,
}

pub struct CloudSecretBackend {
    project_id: String,
    secret_name: String,
    api_base: String,
    client: reqwest::Client,
}

impl CloudSecretBackend {
    pub fn new(project_id: String, secret_name: String, region: Option<String>) -> Result<Self> {
        let api_base = match region {
            Some(region) => format!("https://secretmanager.{region}.rep.googleapis.com/v1"),
            None => "https://secretmanager.googleapis.com/v1".to_string(),
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(
                constants::vault::CLOUD_FETCH_BUDGET_MS,
            ))
            .build()
            .map_err(|e| PressError::VaultUnavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            project_id,
            secret_name,
            api_base,
            client,
        })
    }

    fn access_token(&self) -> Result<String> {
        std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .map_err(|_| PressError::CredentialMissing("GOOGLE_OAUTH_ACCESS_TOKEN".to_string()))
    }

    /// Fetch and decode the whole JSON blob
    async fn fetch_blob(&self) -> Result<BTreeMap<String, String>> {
        let url = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.api_base, self.project_id, self.secret_name
        );
        let token = self.access_token()?;

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PressError::VaultUnavailable(format!("secret fetch failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(
                ErrorClassifier::classify_http_status(status, &body, "secret_manager").into(),
            );
        }

        let version: SecretVersionResponse = response.json().await.map_err(|e| {
            PressError::VaultUnavailable(format!("malformed secret response: {e}"))
        })?;

        let raw = BASE64.decode(&version.payload.data).map_err(|e| {
            PressError::VaultUnavailable(format!("secret payload is not valid base64: {e}"))
        })?;

        let blob: BTreeMap<String, String> = serde_json::from_slice(&raw)
            .map_err(|e| PressError::VaultUnavailable(format!("secret blob is not JSON: {e}")))?;
        Ok(blob)
    }

    /// Publish the blob as a new secret version
    async fn push_blob(&self, blob: &BTreeMap<String, String>) -> Result<()> {
        let url = format!(
            "{}/projects/{}/secrets/{}:addVersion",
            self.api_base, self.project_id, self.secret_name
        );
        let token = self.access_token()?;
        let payload = serde_json::to_vec(blob)?;
        let body = serde_json::json!({
            "payload": { "data": BASE64.encode(&payload) }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PressError::VaultUnavailable(format!("secret update failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(
                ErrorClassifier::classify_http_status(status, &text, "secret_manager").into(),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl VaultBackend for CloudSecretBackend {
    async fn get(&self, key: &str) -> Result<Option<SecretString>> {
        let blob = self.fetch_blob().await?;
        Ok(blob.get(key).map(|v| SecretString::from(v.clone())))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let blob = self.fetch_blob().await?;
        Ok(blob.into_keys().collect())
    }

    async fn set(&self, key: &str, value: SecretString) -> Result<()> {
        let mut blob = match self.fetch_blob().await {
            Ok(blob) => blob,
            Err(PressError::External(_)) => BTreeMap::new(),
            Err(other) => return Err(other),
        };
        blob.insert(key.to_string(), value.expose_secret().to_string());
        self.push_blob(&blob).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut blob = self.fetch_blob().await?;
        if blob.remove(key).is_some() {
            self.push_blob(&blob).await?;
        }
        Ok(())
    }

    fn source(&self) -> &'static str {
        "cloud_secret_manager"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regional_api_base() {
        let backend =
            CloudSecretBackend::new("proj".into(), "secrets".into(), Some("us-east1".into()))
                .unwrap();
        assert!(backend.api_base.contains("us-east1"));
    }

    #[test]
    fn test_global_api_base() {
        let backend = CloudSecretBackend::new("proj".into(), "secrets".into(), None).unwrap();
        assert_eq!(backend.api_base, "https://secretmanager.googleapis.com/v1");
    }

    #[test]
    fn test_blob_shape() {
        let raw = br#"{"cms_user":"editor","cms_password":"s3cret"}"#;
        let encoded = BASE64.encode(raw);
        let decoded = BASE64.decode(&encoded).unwrap();
        let blob: BTreeMap<String, String> = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(blob["cms_user"], "editor");
    }
}
