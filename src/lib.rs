pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{EnvCredentialSource, GcpSecretManager, SessionClient, SheetSync};
pub use config::{JobConfig, SecretBackend};
pub use core::{JobSettings, PortfolioExtractor, RunReport, RunState, Stage, SyncJob};
pub use domain::model::PortfolioMetrics;
pub use utils::error::{Result, SyncError};
