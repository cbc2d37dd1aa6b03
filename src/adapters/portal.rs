use crate::domain::model::{Credentials, RawPage, Session};
use crate::domain::ports::PortalClient;
use crate::utils::error::{Result, SyncError};
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://investbux.themfbox.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";

const LOGIN_PATH: &str = "/validateLoginNew";
const INVESTOR_PATH: &str = "/investor";
const LOGIN_SUCCESS_STATUS: i64 = 200;
const X_REQUESTED_WITH: &str = "X-Requested-With";
const XML_HTTP_REQUEST: &str = "XMLHttpRequest";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: Option<serde_json::Value>,
    status_msg: Option<String>,
}

impl LoginResponse {
    fn is_success(&self) -> bool {
        match &self.status {
            Some(serde_json::Value::Number(n)) => {
                n.as_i64() == Some(LOGIN_SUCCESS_STATUS)
                    || n.as_f64() == Some(LOGIN_SUCCESS_STATUS as f64)
            }
            _ => false,
        }
    }
}

/// HTTP session with the portal. Holds the login cookies for the rest of the run.
pub struct SessionClient {
    client: Client,
    base_url: String,
    user_agent: String,
    session: Option<Session>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl PortalClient for SessionClient {
    async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.session = None;
        let url = self.url(LOGIN_PATH);

        tracing::info!("Attempting to log in");
        tracing::debug!("POST {}", url);

        let form = [
            ("enc_userid", credentials.user_id_token.as_str()),
            ("enc_pass", credentials.pass_token.as_str()),
            ("authcode", ""),
            ("amc", ""),
            ("scheme", ""),
            ("amount", ""),
            ("type", ""),
            ("risk_profile", ""),
        ];

        let response = self
            .client
            .post(&url)
            .header(USER_AGENT, &self.user_agent)
            .header(X_REQUESTED_WITH, XML_HTTP_REQUEST)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Login response status: {}", status);
        if !status.is_success() {
            return Err(SyncError::HttpStatusError {
                url,
                status: status.as_u16(),
            });
        }

        let mut session = Session::default();
        for cookie in response.cookies() {
            session.insert(cookie.name(), cookie.value());
        }

        let body = response.text().await?;
        let parsed: LoginResponse =
            serde_json::from_str(&body).map_err(|e| SyncError::AuthenticationError {
                message: format!("unexpected login response: {}", e),
            })?;

        if !parsed.is_success() {
            let message = parsed
                .status_msg
                .unwrap_or_else(|| format!("status {:?}", parsed.status));
            tracing::error!("Login failed. Status message: {}", message);
            return Err(SyncError::AuthenticationError { message });
        }

        if session.is_empty() {
            tracing::warn!("Login succeeded but the portal set no cookies");
        }
        tracing::info!("Login successful. {} session cookie(s) saved", session.len());
        self.session = Some(session);
        Ok(())
    }

    async fn fetch_investor_data(&self) -> Result<RawPage> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| SyncError::AuthenticationError {
                message: "investor data requested before a successful login".to_string(),
            })?;
        let url = self.url(INVESTOR_PATH);

        tracing::info!("Attempting to fetch investor data");
        tracing::debug!("GET {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .header(X_REQUESTED_WITH, XML_HTTP_REQUEST);
        if !session.is_empty() {
            request = request.header(COOKIE, session.cookie_header());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatusError {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        tracing::info!("Data fetched successfully ({} bytes)", body.len());
        Ok(RawPage::new(body))
    }
}
