//! Evaluate command implementation

use super::{connect, exit_code_for, parse_hierarchy, print_json};
use crate::domain::Hierarchy;
use clap::Args;

/// Arguments for the evaluate command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// cabinet, other or inpatient
    #[arg(long, value_parser = parse_hierarchy)]
    pub hierarchy: Hierarchy,

    /// External id of the parent record
    #[arg(long)]
    pub external_id: i64,
}

impl EvaluateArgs {
    /// Execute the evaluate command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let wiring = match connect(config_path).await {
            Ok(w) => w,
            Err(code) => return Ok(code),
        };
        let mut events = wiring.notifier.subscribe();

        let evaluation = match wiring
            .service
            .evaluate_working_state(self.hierarchy, self.external_id)
            .await
        {
            Ok(evaluation) => evaluation,
            Err(e) => {
                crate::log_error_with_context!(e, "working-state evaluation");
                println!("❌ Evaluation failed");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        print_json(&evaluation)?;
        while let Ok(published) = events.try_recv() {
            tracing::info!(topic = %published.topic, "Published state change");
        }

        Ok(0)
    }
}
