use crate::adapters::portal::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::adapters::secrets::{DEFAULT_METADATA_URL, DEFAULT_SECRET_MANAGER_URL};
use crate::adapters::sheets::{DEFAULT_CREDENTIALS_SECRET, DEFAULT_SHEETS_API_URL};
use crate::core::extractor::DEFAULT_OFFSET;
use crate::core::job::JobSettings;
use crate::domain::model::SheetCellRef;
use crate::utils::error::{Result, SyncError};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_zero, validate_resolved, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    pub sheet: SheetConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    #[default]
    Gcp,
    Env,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub backend: SecretBackend,
    pub project_id: String,
    pub user_id_secret: String,
    pub password_secret: String,
    pub sheet_credentials_secret: String,
    pub api_base_url: String,
    pub metadata_base_url: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretBackend::Gcp,
            project_id: "investbux-script".to_string(),
            user_id_secret: "investbux-enc-userid".to_string(),
            password_secret: "investbux-enc-pass".to_string(),
            sheet_credentials_secret: DEFAULT_CREDENTIALS_SECRET.to_string(),
            api_base_url: DEFAULT_SECRET_MANAGER_URL.to_string(),
            metadata_base_url: DEFAULT_METADATA_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    /// Receives the MF current cost.
    pub mf_cost_cell: String,
    /// Receives the total portfolio value.
    pub total_value_cell: String,
    #[serde(default = "default_sheets_api_url")]
    pub api_base_url: String,
}

fn default_sheets_api_url() -> String {
    DEFAULT_SHEETS_API_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub offset: i64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            offset: DEFAULT_OFFSET,
        }
    }
}

impl JobConfig {
    /// Loads and parses a TOML file; see [`JobConfig::from_toml_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(SyncError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| SyncError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn mf_cost_cell(&self) -> Result<SheetCellRef> {
        SheetCellRef::new(self.sheet.mf_cost_cell.clone())
    }

    pub fn total_value_cell(&self) -> Result<SheetCellRef> {
        SheetCellRef::new(self.sheet.total_value_cell.clone())
    }

    pub fn job_settings(&self, dry_run: bool) -> Result<JobSettings> {
        Ok(JobSettings {
            user_id_secret: self.secrets.user_id_secret.clone(),
            password_secret: self.secrets.password_secret.clone(),
            mf_cost_cell: self.mf_cost_cell()?,
            total_value_cell: self.total_value_cell()?,
            dry_run,
        })
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_url("portal.base_url", &self.portal.base_url)?;
        validate_non_empty_string("portal.user_agent", &self.portal.user_agent)?;

        let secret_names = [
            ("secrets.user_id_secret", &self.secrets.user_id_secret),
            ("secrets.password_secret", &self.secrets.password_secret),
            (
                "secrets.sheet_credentials_secret",
                &self.secrets.sheet_credentials_secret,
            ),
        ];
        for (field, value) in secret_names {
            validate_resolved(field, value)?;
            validate_non_empty_string(field, value)?;
        }
        if self.secrets.backend == SecretBackend::Gcp {
            validate_resolved("secrets.project_id", &self.secrets.project_id)?;
            validate_non_empty_string("secrets.project_id", &self.secrets.project_id)?;
            validate_url("secrets.api_base_url", &self.secrets.api_base_url)?;
            validate_url("secrets.metadata_base_url", &self.secrets.metadata_base_url)?;
        }

        let sheet_fields = [
            ("sheet.spreadsheet_id", &self.sheet.spreadsheet_id),
            ("sheet.mf_cost_cell", &self.sheet.mf_cost_cell),
            ("sheet.total_value_cell", &self.sheet.total_value_cell),
        ];
        for (field, value) in sheet_fields {
            validate_resolved(field, value)?;
            validate_non_empty_string(field, value)?;
        }
        validate_url("sheet.api_base_url", &self.sheet.api_base_url)?;

        validate_non_zero("extract.offset", self.extract.offset)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
