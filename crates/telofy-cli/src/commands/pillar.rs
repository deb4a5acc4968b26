//! Pillar commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::NewPillar;

use super::{open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum PillarAction {
    /// Add a weighted pillar to an objective
    Add {
        /// Objective ID
        objective_id: String,
        /// Pillar name
        name: String,
        /// Weight in [0, 1]; sibling weights may not exceed 1
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        description: Option<String>,
    },
    /// List an objective's pillars
    List {
        /// Objective ID
        objective_id: String,
    },
    /// Change a pillar's weight
    SetWeight {
        /// Pillar ID
        id: String,
        weight: f64,
    },
    /// Delete a pillar, detaching its tasks, metrics and rituals
    Delete {
        /// Pillar ID
        id: String,
    },
    /// Recompute a pillar's progress and its objective's overall progress
    Recompute {
        /// Pillar ID
        id: String,
    },
}

pub fn run(action: PillarAction) -> CmdResult {
    let db = open_db()?;
    let now = Utc::now();

    match action {
        PillarAction::Add {
            objective_id,
            name,
            weight,
            description,
        } => {
            let mut input = NewPillar::new(objective_id, name, weight);
            input.description = description;
            print_json(&db.add_pillar(&input, now)?)?;
        }
        PillarAction::List { objective_id } => {
            print_json(&db.list_pillars(&objective_id)?)?;
        }
        PillarAction::SetWeight { id, weight } => {
            print_json(&db.set_pillar_weight(&id, weight, now)?)?;
        }
        PillarAction::Delete { id } => {
            db.delete_pillar(&id, now)?;
            println!("Pillar deleted: {id}");
        }
        PillarAction::Recompute { id } => {
            print_json(&db.recompute_pillar_progress(&id, now)?)?;
        }
    }
    Ok(())
}
