use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "portfolio-sync")]
#[command(about = "Copies InvestBux portfolio figures into a Google Sheet")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "portfolio-sync.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    pub json_logs: bool,

    /// Log in, fetch and extract, but do not write to the sheet
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["portfolio-sync"]);

        assert_eq!(args.config, "portfolio-sync.toml");
        assert!(!args.verbose);
        assert!(!args.json_logs);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_flags() {
        let args = CliArgs::parse_from([
            "portfolio-sync",
            "-c",
            "/etc/portfolio-sync.toml",
            "-v",
            "--json-logs",
            "--dry-run",
        ]);

        assert_eq!(args.config, "/etc/portfolio-sync.toml");
        assert!(args.verbose);
        assert!(args.json_logs);
        assert!(args.dry_run);
    }
}
