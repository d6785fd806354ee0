//! Tasks command implementation.
//!
//! Prints the gate decision for every pipeline task without running any.

use anyhow::Result;
use clap::Args;
use otlp_bindings_core::{TaskDecision, TaskGate};
use serde_json::json;

use super::args::{OutputFormat, TaskArgs};
use crate::pipeline::Plan;

/// Arguments for the tasks command.
#[derive(Args)]
pub struct TasksArgs {
    #[command(flatten)]
    pub tasks: TaskArgs,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Runs the tasks command.
pub fn run(args: &TasksArgs) -> Result<()> {
    let plan = Plan::new(&TaskGate::new(args.tasks.policy()));

    match args.format {
        OutputFormat::Json => {
            let tasks: Vec<_> = plan
                .decisions()
                .iter()
                .map(|(task, decision)| {
                    json!({
                        "task": task.path,
                        "category": task.category,
                        "execute": *decision == TaskDecision::Execute,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        OutputFormat::Text => {
            for (task, decision) in plan.decisions() {
                let mark = match decision {
                    TaskDecision::Execute => "run ",
                    TaskDecision::Skip => "skip",
                };
                let category = task.category.map_or("core", |c| c.as_str());
                println!("  {mark}  {:<22} {category}", task.path);
            }
        }
    }
    Ok(())
}
