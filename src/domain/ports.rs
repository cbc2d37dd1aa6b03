use crate::domain::model::{Credentials, PortfolioMetrics, RawPage, SheetCellRef};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Named secrets, latest version only.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Login plus the one authenticated page fetch it enables.
#[async_trait]
pub trait PortalClient: Send + Sync {
    async fn login(&mut self, credentials: &Credentials) -> Result<()>;
    async fn fetch_investor_data(&self) -> Result<RawPage>;
}

#[async_trait]
pub trait SheetWriter: Send + Sync {
    async fn update(&self, value: i64, cell: &SheetCellRef) -> Result<()>;
}

pub trait MetricsExtractor: Send + Sync {
    fn extract(&self, page: RawPage) -> Result<PortfolioMetrics>;
}

#[async_trait]
impl<T: CredentialSource + ?Sized> CredentialSource for std::sync::Arc<T> {
    async fn get_secret(&self, name: &str) -> Result<String> {
        (**self).get_secret(name).await
    }
}
