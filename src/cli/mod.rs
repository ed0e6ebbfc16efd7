//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// MedSync - HIS dispensing record reconciliation
#[derive(Parser, Debug)]
#[command(name = "medsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "medsync.toml", env = "MEDSYNC_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MEDSYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a parent record and its children
    Sync(commands::sync::SyncArgs),

    /// Upsert line items independently
    SyncItems(commands::sync_items::SyncItemsArgs),

    /// Re-derive a parent's working state
    Evaluate(commands::evaluate::EvaluateArgs),

    /// Show a parent's working state and line-item groups
    Summarize(commands::summarize::SummarizeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Hierarchy;

    #[test]
    fn test_cli_parse_sync() {
        let cli = Cli::parse_from([
            "medsync",
            "sync",
            "--hierarchy",
            "inpatient",
            "--file",
            "payload.json",
        ]);
        assert_eq!(cli.config, "medsync.toml");
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.hierarchy, Hierarchy::Inpatient);
                assert_eq!(args.file, "payload.json");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_hierarchy() {
        let result = Cli::try_parse_from([
            "medsync",
            "evaluate",
            "--hierarchy",
            "outpatient",
            "--external-id",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_summarize_with_order() {
        let cli = Cli::parse_from([
            "medsync",
            "--config",
            "custom.toml",
            "summarize",
            "--hierarchy",
            "cabinet",
            "--external-id",
            "1001",
            "--order-by",
            "-totalAmount",
        ]);
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Commands::Summarize(args) => {
                assert_eq!(args.external_id, 1001);
                assert_eq!(args.order_by.as_deref(), Some("-totalAmount"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["medsync", "--log-level", "debug", "validate-config"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_sync_items() {
        let cli = Cli::parse_from([
            "medsync",
            "sync-items",
            "--hierarchy",
            "other",
            "--file",
            "items.json",
        ]);
        assert!(matches!(cli.command, Commands::SyncItems(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["medsync", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
