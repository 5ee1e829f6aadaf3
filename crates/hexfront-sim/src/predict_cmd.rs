//! Predict command - expected outcome of every contact, nothing resolved

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hexfront_core::{BattlePrediction, BattleRegistry, HexCoord};

use crate::scenario::Scenario;

#[derive(Args)]
pub struct PredictArgs {
    /// Scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Output predictions as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ContactPrediction {
    hex: HexCoord,
    attackers: usize,
    defenders: usize,
    prediction: BattlePrediction,
}

pub fn run(args: PredictArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let mut registry = BattleRegistry::new(scenario.config.clone());
    registry.engage_contacts(&scenario.units, 0);

    let predictions: Vec<ContactPrediction> = registry
        .active_battles()
        .into_iter()
        .filter_map(|battle| {
            let prediction = registry.predict_at(battle.hex(), &scenario.units, &scenario.terrain)?;
            Some(ContactPrediction {
                hex: battle.hex(),
                attackers: battle.attackers().len(),
                defenders: battle.defenders().len(),
                prediction,
            })
        })
        .collect();

    if args.json {
        let text =
            serde_json::to_string_pretty(&predictions).context("Failed to encode predictions")?;
        println!("{}", text);
        return Ok(());
    }

    if predictions.is_empty() {
        println!("No contacts");
    }
    for contact in &predictions {
        let p = &contact.prediction;
        println!(
            "{}: {} vs {} | attackers {:.0}% ({:.1}) defenders {:.0}% ({:.1}) | ~{} rounds",
            contact.hex,
            contact.attackers,
            contact.defenders,
            p.attacker_win_chance * 100.0,
            p.attacker_strength,
            p.defender_win_chance * 100.0,
            p.defender_strength,
            p.estimated_rounds,
        );
    }
    Ok(())
}
