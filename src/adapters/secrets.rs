use crate::domain::ports::CredentialSource;
use crate::utils::error::{Result, SyncError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";
pub const ENV_SECRET_PREFIX: &str = "PORTFOLIO_SYNC_SECRET_";

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Google Secret Manager, authenticated as the runtime's default service account.
#[derive(Debug, Clone)]
pub struct GcpSecretManager {
    client: Client,
    project_id: String,
    api_base_url: String,
    metadata_base_url: String,
}

impl GcpSecretManager {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            api_base_url: DEFAULT_SECRET_MANAGER_URL.to_string(),
            metadata_base_url: DEFAULT_METADATA_URL.to_string(),
        }
    }

    pub fn with_endpoints(
        mut self,
        api_base_url: impl Into<String>,
        metadata_base_url: impl Into<String>,
    ) -> Self {
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        self.metadata_base_url = metadata_base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<String> {
        let url = format!("{}{}", self.metadata_base_url, METADATA_TOKEN_PATH);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SecretStoreError {
                message: format!("metadata server returned HTTP {}", status.as_u16()),
            });
        }

        let token: MetadataToken = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait::async_trait]
impl CredentialSource for GcpSecretManager {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.api_base_url, self.project_id, name
        );
        tracing::debug!("Accessing secret '{}' in project {}", name, self.project_id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(SyncError::SecretNotFound {
                    name: name.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SyncError::AccessDenied {
                    name: name.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(SyncError::SecretStoreError {
                    message: format!("HTTP {} while reading secret '{}'", status.as_u16(), name),
                })
            }
            _ => {}
        }

        let body: AccessSecretVersionResponse = response.json().await?;
        let bytes = STANDARD
            .decode(body.payload.data.trim())
            .map_err(|e| SyncError::SecretStoreError {
                message: format!("secret '{}' payload is not base64: {}", name, e),
            })?;

        String::from_utf8(bytes).map_err(|_| SyncError::SecretStoreError {
            message: format!("secret '{}' payload is not UTF-8", name),
        })
    }
}

/// Secrets from environment variables, for running outside Google Cloud.
/// `credentials-google-sheet` is read from `PORTFOLIO_SYNC_SECRET_CREDENTIALS_GOOGLE_SHEET`.
#[derive(Debug, Clone)]
pub struct EnvCredentialSource {
    prefix: String,
}

impl Default for EnvCredentialSource {
    fn default() -> Self {
        Self::with_prefix(ENV_SECRET_PREFIX)
    }
}

impl EnvCredentialSource {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_name(&self, secret_name: &str) -> String {
        format!(
            "{}{}",
            self.prefix,
            secret_name.to_ascii_uppercase().replace(['-', '.'], "_")
        )
    }
}

#[async_trait::async_trait]
impl CredentialSource for EnvCredentialSource {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let variable = self.variable_name(name);
        match std::env::var(&variable) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(SyncError::SecretNotFound {
                name: name.to_string(),
            }),
        }
    }
}
