pub mod extractor;
pub mod job;

pub use extractor::{ExtractionRule, PortfolioExtractor};
pub use job::{JobSettings, RunReport, RunState, Stage, SyncJob};
