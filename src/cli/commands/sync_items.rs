//! Sync-items command implementation
//!
//! Upserts a JSON array of line items independently; one bad item never
//! blocks the others.

use super::{connect, parse_hierarchy, print_json, read_json, to_payloads, EXIT_PARTIAL_FAILURE};
use crate::domain::{ActorId, Hierarchy};
use clap::Args;
use serde_json::Value;

/// Arguments for the sync-items command
#[derive(Args, Debug)]
pub struct SyncItemsArgs {
    /// cabinet, other or inpatient
    #[arg(long, value_parser = parse_hierarchy)]
    pub hierarchy: Hierarchy,

    /// JSON file holding an array of line items
    #[arg(short, long)]
    pub file: String,

    /// Actor recorded on created and updated rows
    #[arg(long, default_value = "his-sync", env = "MEDSYNC_ACTOR")]
    pub actor: String,
}

impl SyncItemsArgs {
    /// Execute the sync-items command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let actor = ActorId::new(self.actor.clone()).map_err(|e| anyhow::anyhow!(e))?;
        let items: Vec<Value> = read_json(&self.file)?;
        let payloads = to_payloads(items)?;

        tracing::info!(
            hierarchy = %self.hierarchy,
            count = payloads.len(),
            "Starting line item sync"
        );

        let wiring = match connect(config_path).await {
            Ok(w) => w,
            Err(code) => return Ok(code),
        };

        let report = wiring
            .service
            .sync_line_items(self.hierarchy, &payloads, &actor)
            .await;

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Line item sync finished"
        );
        print_json(&report)?;

        if report.is_complete_success() {
            Ok(0)
        } else {
            Ok(EXIT_PARTIAL_FAILURE)
        }
    }
}
