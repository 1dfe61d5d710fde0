//! Agent definition command handler.

use super::print_json;
use clap::{Args, Subcommand};
use kbfilter_core::AppResult;
use kbfilter_knowledge::AgentDefinition;
use std::path::PathBuf;

/// Inspect agent definition files
#[derive(Args, Debug)]
pub struct AgentCommand {
    #[command(subcommand)]
    pub action: AgentAction,
}

#[derive(Subcommand, Debug)]
pub enum AgentAction {
    /// Check that a definition file is well-formed
    Validate {
        /// Path to the agent definition JSON
        path: PathBuf,
    },

    /// Print a summary of a definition file
    Show {
        /// Path to the agent definition JSON
        path: PathBuf,

        /// Output the normalized definition as JSON
        #[arg(long)]
        json: bool,
    },
}

impl AgentCommand {
    pub fn execute(&self) -> AppResult<()> {
        match &self.action {
            AgentAction::Validate { path } => {
                let definition = AgentDefinition::load(path)?;
                println!("{} is a valid definition for agent '{}'", path.display(), definition.agent_name);
                Ok(())
            }
            AgentAction::Show { path, json } => {
                let definition = AgentDefinition::load(path)?;
                if *json {
                    return print_json(&serde_json::to_value(&definition)?);
                }
                print_summary(&definition);
                Ok(())
            }
        }
    }
}

fn print_summary(definition: &AgentDefinition) {
    println!("Agent: {}", definition.agent_name);
    if !definition.description.is_empty() {
        println!("  {}", definition.description);
    }
    if let Some(model) = &definition.foundation_model {
        println!("Model: {}", model);
    }
    println!("Idle session TTL: {}s", definition.idle_session_ttl_in_seconds);

    println!("Knowledge bases:");
    for kb in &definition.knowledge_bases {
        println!("- {} ({} results)", kb.knowledge_base_id, kb.number_of_results);
        for attribute in &kb.metadata_attributes {
            println!(
                "    {} [{}]: {}",
                attribute.key,
                attribute.attribute_type.as_str(),
                attribute.description
            );
        }
    }

    if !definition.action_groups.is_empty() {
        println!("Action groups:");
        for group in &definition.action_groups {
            println!("- {}", group.action_group_name);
            for function in &group.functions {
                let params: Vec<String> = function
                    .parameters
                    .iter()
                    .map(|(name, p)| {
                        let marker = if p.required { "" } else { "?" };
                        format!("{}{}: {}", name, marker, p.parameter_type)
                    })
                    .collect();
                println!("    {}({})", function.name, params.join(", "));
            }
        }
    }
}
