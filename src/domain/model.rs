use crate::utils::error::{Result, SyncError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The two encrypted login tokens expected by the portal. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id_token: String,
    pub pass_token: String,
}

impl Credentials {
    pub fn new(user_id_token: impl Into<String>, pass_token: impl Into<String>) -> Self {
        Self {
            user_id_token: user_id_token.into(),
            pass_token: pass_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id_token", &"<redacted>")
            .field("pass_token", &"<redacted>")
            .finish()
    }
}

/// Cookies captured from a successful login.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header, e.g. `JSESSIONID=abc; lang=en`.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Response body of the investor page, consumed by extraction.
#[derive(Debug, Clone)]
pub struct RawPage(String);

impl RawPage {
    pub fn new(body: impl Into<String>) -> Self {
        Self(body.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortfolioMetrics {
    pub total_portfolio_value: i64,
    pub mf_current_cost: i64,
}

/// A sheet range such as `Sheet1!B4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetCellRef(String);

impl SheetCellRef {
    pub fn new(range: impl Into<String>) -> Result<Self> {
        let range = range.into();
        if range.trim().is_empty() {
            return Err(SyncError::InvalidConfigValueError {
                field: "sheet cell".to_string(),
                value: range,
                reason: "Cell reference cannot be empty".to_string(),
            });
        }
        Ok(Self(range))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetCellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
