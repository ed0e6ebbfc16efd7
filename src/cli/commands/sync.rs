//! Sync command implementation
//!
//! Reconciles one parent and its children from a JSON file of the form
//! `{"parent": {...}, "children": [...]}`.

use super::{connect, exit_code_for, parse_hierarchy, print_json, read_json, to_payloads};
use crate::domain::{ActorId, Hierarchy, HisPayload};
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// cabinet, other or inpatient
    #[arg(long, value_parser = parse_hierarchy)]
    pub hierarchy: Hierarchy,

    /// JSON file holding the parent and its children
    #[arg(short, long)]
    pub file: String,

    /// Actor recorded on created and updated rows
    #[arg(long, default_value = "his-sync", env = "MEDSYNC_ACTOR")]
    pub actor: String,
}

#[derive(Debug, Deserialize)]
struct SyncFile {
    parent: Value,
    #[serde(default)]
    children: Vec<Value>,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(hierarchy = %self.hierarchy, file = %self.file, "Starting sync");

        let actor = ActorId::new(self.actor.clone()).map_err(|e| anyhow::anyhow!(e))?;
        let input: SyncFile = read_json(&self.file)?;
        let parent = HisPayload::from_value(input.parent)?;
        let children = to_payloads(input.children)?;

        let wiring = match connect(config_path).await {
            Ok(w) => w,
            Err(code) => return Ok(code),
        };

        match wiring
            .service
            .reconcile(self.hierarchy, &parent, &children, &actor)
            .await
        {
            Ok(outcome) => {
                print_json(&outcome)?;
                Ok(0)
            }
            Err(e) => {
                crate::log_error_with_context!(e, "parent sync");
                println!("❌ Sync failed; no changes were applied");
                println!("   Error: {e}");
                Ok(exit_code_for(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_file_children_default_to_empty() {
        let file: SyncFile = serde_json::from_str(r#"{"parent": {"ID": 1}}"#).unwrap();
        assert!(file.children.is_empty());
    }
}
