//! Summarize command implementation

use super::{connect, exit_code_for, parse_hierarchy, print_json};
use crate::domain::Hierarchy;
use clap::Args;

/// Arguments for the summarize command
#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// cabinet, other or inpatient
    #[arg(long, value_parser = parse_hierarchy)]
    pub hierarchy: Hierarchy,

    /// External id of the parent record
    #[arg(long)]
    pub external_id: i64,

    /// Group field to sort by; prefix with '-' for descending
    #[arg(long, allow_hyphen_values = true)]
    pub order_by: Option<String>,
}

impl SummarizeArgs {
    /// Execute the summarize command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let wiring = match connect(config_path).await {
            Ok(w) => w,
            Err(code) => return Ok(code),
        };

        match wiring
            .service
            .summarize(self.hierarchy, self.external_id, self.order_by.as_deref())
            .await
        {
            Ok(summary) => {
                print_json(&summary)?;
                Ok(0)
            }
            Err(e) => {
                crate::log_error_with_context!(e, "working-state summary");
                println!("❌ Summary failed");
                println!("   Error: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::EXIT_FATAL;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_missing_parent_exits_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"database_target = \"memory\"\n[logging]\nlocal_enabled = false\n")
            .unwrap();

        let args = SummarizeArgs {
            hierarchy: Hierarchy::Cabinet,
            external_id: 404,
            order_by: None,
        };
        let code = args.execute(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(code, EXIT_FATAL);
    }
}
