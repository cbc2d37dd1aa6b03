use crate::domain::model::SheetCellRef;
use crate::domain::ports::{CredentialSource, SheetWriter};
use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_CREDENTIALS_SECRET: &str = "credentials-google-sheet";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";
const UNREADABLE_BODY: &str = "<unreadable body>";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a Google service-account JSON key needed for the JWT bearer grant.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateValuesResponse {
    updated_range: Option<String>,
    updated_cells: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::TokenError {
            message: format!("service account key is not valid JSON: {}", e),
        })
    }

    /// RS256-signed JWT asserting this account's identity for `scope`.
    pub fn signed_assertion(&self, scope: &str, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes()).map_err(|e| {
            SyncError::TokenError {
                message: format!("invalid private key: {}", e),
            }
        })?;

        jsonwebtoken::encode(&header, &claims, &key).map_err(|e| SyncError::TokenError {
            message: format!("failed to sign assertion: {}", e),
        })
    }
}

async fn response_text(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => text,
        Err(e) => format!("{} ({})", UNREADABLE_BODY, e),
    }
}

/// Writes single values into one spreadsheet through the Sheets v4 REST API.
pub struct SheetSync<C: CredentialSource> {
    client: Client,
    credentials: C,
    credentials_secret: String,
    spreadsheet_id: String,
    api_base_url: String,
}

impl<C: CredentialSource> SheetSync<C> {
    pub fn new(credentials: C, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            credentials,
            credentials_secret: DEFAULT_CREDENTIALS_SECRET.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            api_base_url: DEFAULT_SHEETS_API_URL.to_string(),
        }
    }

    pub fn with_credentials_secret(mut self, secret_name: impl Into<String>) -> Self {
        self.credentials_secret = secret_name.into();
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    fn values_url(&self, cell: &SheetCellRef) -> Result<Url> {
        let mut url = Url::parse(&self.api_base_url).map_err(|e| SyncError::ConfigError {
            message: format!("invalid Sheets API URL '{}': {}", self.api_base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| SyncError::ConfigError {
                message: format!("Sheets API URL '{}' cannot be a base", self.api_base_url),
            })?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                cell.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        Ok(url)
    }

    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String> {
        let assertion = key.signed_assertion(SPREADSHEETS_SCOPE, Utc::now())?;
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response_text(response).await;
            return Err(SyncError::TokenError {
                message: format!("token endpoint returned HTTP {}: {}", status.as_u16(), body),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn write(&self, value: i64, cell: &SheetCellRef) -> Result<()> {
        let key_json = self.credentials.get_secret(&self.credentials_secret).await?;
        let key = ServiceAccountKey::from_json(&key_json)?;
        let token = self.access_token(&key).await?;

        let url = self.values_url(cell)?;
        let body = serde_json::json!({
            "range": cell.as_str(),
            "majorDimension": "ROWS",
            "values": [[value]],
        });

        tracing::debug!("PUT {}", url);
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response_text(response).await;
            let reason = serde_json::from_str::<GoogleErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(SyncError::sheet(
                cell.as_str(),
                format!("Sheets API returned HTTP {}: {}", status.as_u16(), reason),
            ));
        }

        // 2xx means the cell is written; the body only feeds the debug log.
        let text = response_text(response).await;
        match serde_json::from_str::<UpdateValuesResponse>(&text) {
            Ok(updated) => tracing::debug!(
                "Sheets API updated {:?} ({:?} cells)",
                updated.updated_range,
                updated.updated_cells
            ),
            Err(_) => tracing::debug!("Sheets API accepted update: {}", text),
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<C: CredentialSource> SheetWriter for SheetSync<C> {
    async fn update(&self, value: i64, cell: &SheetCellRef) -> Result<()> {
        match self.write(value, cell).await {
            Ok(()) => {
                tracing::info!("Value successfully updated on Google Sheet at {}", cell);
                Ok(())
            }
            Err(e @ SyncError::SheetError { .. }) => Err(e),
            Err(e) => Err(SyncError::sheet(cell.as_str(), e)),
        }
    }
}
