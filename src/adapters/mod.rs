// Adapters layer: concrete implementations of the domain ports for the
// brokerage portal, Google Secret Manager and Google Sheets.

pub mod portal;
pub mod secrets;
pub mod sheets;

pub use portal::SessionClient;
pub use secrets::{EnvCredentialSource, GcpSecretManager};
pub use sheets::{ServiceAccountKey, SheetSync};
