use anyhow::Context;
use clap::Parser;
use portfolio_sync::domain::ports::CredentialSource;
use portfolio_sync::utils::{logger, validation::Validate};
use portfolio_sync::{
    CliArgs, EnvCredentialSource, GcpSecretManager, JobConfig, PortfolioExtractor, RunReport,
    SecretBackend, SessionClient, SheetSync, SyncError, SyncJob,
};
use std::sync::Arc;

fn load_config(path: &str) -> Result<JobConfig, SyncError> {
    let config = JobConfig::from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn credential_source(config: &JobConfig) -> Arc<dyn CredentialSource> {
    match config.secrets.backend {
        SecretBackend::Gcp => Arc::new(
            GcpSecretManager::new(config.secrets.project_id.clone()).with_endpoints(
                config.secrets.api_base_url.clone(),
                config.secrets.metadata_base_url.clone(),
            ),
        ),
        SecretBackend::Env => Arc::new(EnvCredentialSource::default()),
    }
}

fn report_outcome(report: &RunReport) {
    match report.first_error() {
        None => {
            if report.dry_run {
                tracing::info!("✅ Dry run completed, sheet left untouched");
            } else {
                tracing::info!("✅ Portfolio sync completed successfully");
            }
            if let Some(metrics) = report.metrics {
                if let Ok(json) = serde_json::to_string(&metrics) {
                    println!("{}", json);
                }
            }
        }
        Some(e) => {
            tracing::error!(
                reached = %report.reached(),
                failures = report.failures.len(),
                "❌ Portfolio sync failed: {} (Category: {:?})",
                e,
                e.category()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            for failure in &report.failures {
                eprintln!("❌ {}: {}", failure.stage, failure.error);
            }
            eprintln!("💡 {}", e.recovery_suggestion());
        }
    }
}

async fn run(args: &CliArgs, config: JobConfig) -> anyhow::Result<RunReport> {
    let settings = config
        .job_settings(args.dry_run)
        .context("invalid sheet cell reference")?;

    let secrets = credential_source(&config);
    let portal = SessionClient::new(config.portal.base_url.clone(), config.portal.user_agent.clone());
    let extractor = PortfolioExtractor::new(config.extract.offset);
    let writer = SheetSync::new(secrets.clone(), config.sheet.spreadsheet_id.clone())
        .with_credentials_secret(config.secrets.sheet_credentials_secret.clone())
        .with_api_base_url(config.sheet.api_base_url.clone());

    let job = SyncJob::new(secrets, portal, extractor, writer, settings);
    Ok(job.run().await)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting portfolio-sync");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e);
            std::process::exit(e.exit_code());
        }
    };

    match run(&args, config).await {
        Ok(report) => {
            report_outcome(&report);
            std::process::exit(report.exit_code());
        }
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}
