//! Metric commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use telofy_core::{MetricType, NewMetric, TargetDirection};

use super::{instant_or_now, open_db, print_json, CmdResult};

#[derive(Subcommand)]
pub enum MetricAction {
    /// Add a metric to an objective
    Add {
        /// Objective ID
        objective_id: String,
        /// Metric name
        name: String,
        /// Unit label, e.g. "kg"
        #[arg(long, default_value = "")]
        unit: String,
        /// number, boolean, duration or rating
        #[arg(long, default_value = "number")]
        metric_type: String,
        #[arg(long)]
        target: Option<f64>,
        /// increase, decrease or maintain
        #[arg(long)]
        direction: Option<String>,
        /// Pillar ID to attach to
        #[arg(long)]
        pillar_id: Option<String>,
        /// Where readings come from (default: manual)
        #[arg(long)]
        source: Option<String>,
    },
    /// List an objective's metrics
    List {
        /// Objective ID
        objective_id: String,
    },
    /// Record a reading
    Record {
        /// Metric ID
        id: String,
        value: f64,
        #[arg(long)]
        note: Option<String>,
        /// RFC 3339 time of the reading (default: now)
        #[arg(long)]
        at: Option<String>,
    },
    /// List a metric's entries, oldest first
    Entries {
        /// Metric ID
        id: String,
    },
    /// Rebuild the metric's current value from its entries
    Replay {
        /// Metric ID
        id: String,
    },
}

pub fn run(action: MetricAction) -> CmdResult {
    let db = open_db()?;
    let now = Utc::now();

    match action {
        MetricAction::Add {
            objective_id,
            name,
            unit,
            metric_type,
            target,
            direction,
            pillar_id,
            source,
        } => {
            let mut input = NewMetric::new(objective_id, name, unit);
            input.metric_type = metric_type.parse::<MetricType>()?;
            input.target = target;
            input.target_direction = direction
                .as_deref()
                .map(str::parse::<TargetDirection>)
                .transpose()?;
            input.pillar_id = pillar_id;
            input.source = source;
            print_json(&db.add_metric(&input, now)?)?;
        }
        MetricAction::List { objective_id } => {
            print_json(&db.list_metrics(&objective_id)?)?;
        }
        MetricAction::Record { id, value, note, at } => {
            let recorded_at = instant_or_now(at.as_deref())?;
            let entry = db.record_metric_entry(&id, value, note.as_deref(), recorded_at, now)?;
            print_json(&entry)?;
        }
        MetricAction::Entries { id } => {
            print_json(&db.list_metric_entries(&id)?)?;
        }
        MetricAction::Replay { id } => {
            print_json(&db.replay_metric(&id, now)?)?;
        }
    }
    Ok(())
}
