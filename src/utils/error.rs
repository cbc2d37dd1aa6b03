use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Login rejected by portal: {message}")]
    AuthenticationError { message: String },

    #[error("HTTP request failed: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("{url} responded with HTTP {status}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Could not extract {field}: {message}")]
    ExtractionError { field: String, message: String },

    #[error("Failed to update sheet cell {cell}: {message}")]
    SheetError { cell: String, message: String },

    #[error("OAuth token error: {message}")]
    TokenError { message: String },

    #[error("Secret '{name}' not found")]
    SecretNotFound { name: String },

    #[error("Access to secret '{name}' denied")]
    AccessDenied { name: String },

    #[error("Secret store error: {message}")]
    SecretStoreError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Transport,
    Extraction,
    Sync,
    Credentials,
    Configuration,
}

impl SyncError {
    pub fn extraction(field: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::ExtractionError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn sheet(cell: impl Into<String>, message: impl ToString) -> Self {
        SyncError::SheetError {
            cell: cell.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::AuthenticationError { .. } => ErrorCategory::Authentication,
            SyncError::TransportError(_) | SyncError::HttpStatusError { .. } => {
                ErrorCategory::Transport
            }
            SyncError::ExtractionError { .. } => ErrorCategory::Extraction,
            SyncError::SheetError { .. } | SyncError::TokenError { .. } => ErrorCategory::Sync,
            SyncError::SecretNotFound { .. }
            | SyncError::AccessDenied { .. }
            | SyncError::SecretStoreError { .. } => ErrorCategory::Credentials,
            SyncError::IoError(_)
            | SyncError::ConfigError { .. }
            | SyncError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 1,
            ErrorCategory::Authentication => 2,
            ErrorCategory::Transport => 3,
            ErrorCategory::Extraction => 4,
            ErrorCategory::Sync => 5,
            ErrorCategory::Credentials => 6,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            SyncError::AuthenticationError { .. } => {
                "Check that the encrypted user id and password secrets are current"
            }
            SyncError::TransportError(_) => "Check network connectivity and try again later",
            SyncError::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "The session was refused; log in again on the next run"
            }
            SyncError::HttpStatusError { .. } => "The remote service may be down; try again later",
            SyncError::ExtractionError { .. } => {
                "The portal page layout probably changed; update the extraction rules"
            }
            SyncError::SheetError { .. } => {
                "Check that the service account has edit access to the spreadsheet"
            }
            SyncError::TokenError { .. } => {
                "Check the service account key stored in the secret store"
            }
            SyncError::SecretNotFound { .. } => "Create the secret or fix its name in the config",
            SyncError::AccessDenied { .. } => {
                "Grant the runtime identity the Secret Manager accessor role"
            }
            SyncError::SecretStoreError { .. } => "Check the secret store backend settings",
            SyncError::IoError(_) => "Check that the file exists and is readable",
            SyncError::ConfigError { .. } | SyncError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and run again"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
