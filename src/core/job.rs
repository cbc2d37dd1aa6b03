use crate::domain::model::{Credentials, PortfolioMetrics, SheetCellRef};
use crate::domain::ports::{CredentialSource, MetricsExtractor, PortalClient, SheetWriter};
use crate::utils::error::{Result, SyncError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Init,
    CredentialsResolved,
    LoggedIn,
    DataFetched,
    MetricsExtracted,
    Cell1Updated,
    Cell2Updated,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::CredentialsResolved => "credentials_resolved",
            Stage::LoggedIn => "logged_in",
            Stage::DataFetched => "data_fetched",
            Stage::MetricsExtracted => "metrics_extracted",
            Stage::Cell1Updated => "cell1_updated",
            Stage::Cell2Updated => "cell2_updated",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Done,
    Failed(Stage),
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: SyncError,
}

#[derive(Debug)]
pub struct RunReport {
    pub completed: Vec<Stage>,
    pub failures: Vec<StageFailure>,
    pub metrics: Option<PortfolioMetrics>,
    pub dry_run: bool,
}

impl RunReport {
    fn new(dry_run: bool) -> Self {
        Self {
            completed: Vec::new(),
            failures: Vec::new(),
            metrics: None,
            dry_run,
        }
    }

    fn complete(&mut self, stage: Stage) {
        tracing::info!(stage = %stage, "Stage complete");
        self.completed.push(stage);
    }

    fn record_failure(&mut self, stage: Stage, error: SyncError) {
        tracing::error!(
            stage = %stage,
            category = ?error.category(),
            "❌ Stage failed: {}",
            error
        );
        self.failures.push(StageFailure { stage, error });
    }

    fn fail(mut self, stage: Stage, error: SyncError) -> Self {
        self.record_failure(stage, error);
        self
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Last stage reached in pipeline order.
    pub fn reached(&self) -> Stage {
        self.completed.iter().copied().max().unwrap_or(Stage::Init)
    }

    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    pub fn state(&self) -> RunState {
        match self.failures.first() {
            Some(failure) => RunState::Failed(failure.stage),
            None => RunState::Done,
        }
    }

    pub fn first_error(&self) -> Option<&SyncError> {
        self.failures.first().map(|f| &f.error)
    }

    pub fn exit_code(&self) -> i32 {
        self.first_error().map(SyncError::exit_code).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub user_id_secret: String,
    pub password_secret: String,
    /// Cell 1, receives the MF current cost.
    pub mf_cost_cell: SheetCellRef,
    /// Cell 2, receives the total portfolio value.
    pub total_value_cell: SheetCellRef,
    pub dry_run: bool,
}

/// One authenticate → fetch → extract → sync run.
///
/// Stages run strictly in order and none is retried. A failure before the
/// sheet updates ends the run. The two cell updates are independent: a failed
/// first write does not stop the second, and a successful write is never
/// rolled back.
pub struct SyncJob<C, P, E, W>
where
    C: CredentialSource,
    P: PortalClient,
    E: MetricsExtractor,
    W: SheetWriter,
{
    credentials: C,
    portal: P,
    extractor: E,
    writer: W,
    settings: JobSettings,
}

impl<C, P, E, W> SyncJob<C, P, E, W>
where
    C: CredentialSource,
    P: PortalClient,
    E: MetricsExtractor,
    W: SheetWriter,
{
    pub fn new(credentials: C, portal: P, extractor: E, writer: W, settings: JobSettings) -> Self {
        Self {
            credentials,
            portal,
            extractor,
            writer,
            settings,
        }
    }

    async fn resolve_credentials(&self) -> Result<Credentials> {
        let user_id = self
            .credentials
            .get_secret(&self.settings.user_id_secret)
            .await?;
        let password = self
            .credentials
            .get_secret(&self.settings.password_secret)
            .await?;
        Ok(Credentials::new(user_id.trim(), password.trim()))
    }

    pub async fn run(mut self) -> RunReport {
        let mut report = RunReport::new(self.settings.dry_run);
        tracing::info!("Starting portfolio sync");

        let credentials = match self.resolve_credentials().await {
            Ok(credentials) => credentials,
            Err(e) => return report.fail(Stage::CredentialsResolved, e),
        };
        report.complete(Stage::CredentialsResolved);

        let login = self.portal.login(&credentials).await;
        drop(credentials);
        if let Err(e) = login {
            return report.fail(Stage::LoggedIn, e);
        }
        report.complete(Stage::LoggedIn);

        let page = match self.portal.fetch_investor_data().await {
            Ok(page) => page,
            Err(e) => return report.fail(Stage::DataFetched, e),
        };
        report.complete(Stage::DataFetched);

        tracing::info!("Parsing fetched data");
        let metrics = match self.extractor.extract(page) {
            Ok(metrics) => metrics,
            Err(e) => return report.fail(Stage::MetricsExtracted, e),
        };
        tracing::info!(
            "Extracted Amounts: Total Portfolio Value = {}, MF Current Cost = {}",
            metrics.total_portfolio_value,
            metrics.mf_current_cost
        );
        report.metrics = Some(metrics);
        report.complete(Stage::MetricsExtracted);

        if self.settings.dry_run {
            tracing::info!("🔍 Dry run: skipping sheet updates");
            report.complete(Stage::Done);
            return report;
        }

        let updates = [
            (
                Stage::Cell1Updated,
                metrics.mf_current_cost,
                &self.settings.mf_cost_cell,
            ),
            (
                Stage::Cell2Updated,
                metrics.total_portfolio_value,
                &self.settings.total_value_cell,
            ),
        ];
        for (stage, value, cell) in updates {
            match self.writer.update(value, cell).await {
                Ok(()) => report.complete(stage),
                Err(e) => report.record_failure(stage, e),
            }
        }

        if report.is_success() {
            report.complete(Stage::Done);
        }
        report
    }
}
