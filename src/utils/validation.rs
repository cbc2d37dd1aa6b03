use crate::utils::error::{Result, SyncError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(SyncError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Rejects values still carrying a `${VAR}` placeholder after env substitution.
pub fn validate_resolved(field_name: &str, value: &str) -> Result<()> {
    if let Some(start) = value.find("${") {
        let name = value[start + 2..].split('}').next().unwrap_or_default();
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Environment variable {} is not set", name),
        });
    }
    Ok(())
}

pub fn validate_non_zero(field_name: &str, value: i64) -> Result<()> {
    if value == 0 {
        return Err(SyncError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be non-zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("portal.base_url", "https://example.com").is_ok());
        assert!(validate_url("portal.base_url", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("portal.base_url", "").is_err());
        assert!(validate_url("portal.base_url", "invalid-url").is_err());
        assert!(validate_url("portal.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("sheet.mf_cost_cell", "Sheet1!B4").is_ok());
        assert!(validate_non_empty_string("sheet.mf_cost_cell", "   ").is_err());
    }

    #[test]
    fn test_validate_resolved_names_missing_variable() {
        assert!(validate_resolved("sheet.spreadsheet_id", "1AbC").is_ok());

        let err = validate_resolved("sheet.spreadsheet_id", "${SHEET_ID}").unwrap_err();
        assert!(err.to_string().contains("SHEET_ID"));
    }

    #[test]
    fn test_validate_non_zero() {
        assert!(validate_non_zero("extract.offset", 5000).is_ok());
        assert!(validate_non_zero("extract.offset", -10).is_ok());
        assert!(validate_non_zero("extract.offset", 0).is_err());
    }
}
