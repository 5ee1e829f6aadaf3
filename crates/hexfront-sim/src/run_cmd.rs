//! Run command - play a scenario until every battle has ended
//!
//! ## Architecture
//!
//! - run(): orchestration
//! - simulate(): the tick loop
//! - report(): human or JSON output

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hexfront_core::{BattleEnd, BattleRegistry, BattleSnapshot, Tick, TickReport};

use crate::scenario::Scenario;

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct RunArgs {
    /// Scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Override the scenario's random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stop after this many ticks even if battles remain
    #[arg(long, default_value = "1000")]
    pub max_ticks: Tick,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of a whole run
#[derive(Debug, Serialize)]
struct RunSummary {
    /// Last tick simulated
    ticks: Tick,
    ended: Vec<BattleEnd>,
    /// Battles still open when the tick cap was hit
    unresolved: Vec<BattleSnapshot>,
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

pub fn run(args: RunArgs) -> Result<()> {
    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(seed) = args.seed {
        scenario.config.seed = seed;
    }

    tracing::info!(
        units = scenario.units.len(),
        seed = scenario.config.seed,
        "Loaded scenario {}",
        args.scenario.display()
    );

    let summary = simulate(&mut scenario, args.max_ticks);
    report(&summary, args.json)
}

// ============================================================================
// PHASES
// ============================================================================

fn simulate(scenario: &mut Scenario, max_ticks: Tick) -> RunSummary {
    let mut registry = BattleRegistry::new(scenario.config.clone());
    let mut ended = Vec::new();
    let mut ticks = 0;

    for tick in 0..=max_ticks {
        ticks = tick;
        for hex in registry.engage_contacts(&scenario.units, tick) {
            tracing::info!(tick, %hex, "Contact");
        }

        let report = registry.tick(tick, &mut scenario.units, &scenario.terrain);
        log_report(&report);
        ended.extend(report.ended);

        if registry.battle_count() == 0 {
            break;
        }
    }

    if registry.battle_count() > 0 {
        tracing::warn!(
            open = registry.battle_count(),
            "Tick cap reached with battles still open"
        );
    }

    RunSummary {
        ticks,
        ended,
        unresolved: registry.snapshots(&scenario.units),
    }
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(summary).context("Failed to encode results")?;
        println!("{}", text);
        return Ok(());
    }

    println!("Simulated {} ticks", summary.ticks);
    for end in &summary.ended {
        println!(
            "  {}: {} on turn {} ({}), losses {} / {}",
            end.hex,
            end.resolution.winner,
            end.resolution.end_turn,
            end.resolution.details,
            end.statistics.attacker_losses,
            end.statistics.defender_losses,
        );
    }
    if !summary.unresolved.is_empty() {
        println!("  {} battle(s) unresolved", summary.unresolved.len());
    }
    Ok(())
}

// ============================================================================
// FORMATTING
// ============================================================================

fn log_report(report: &TickReport) {
    for round in &report.rounds {
        for entry in &round.entries {
            tracing::debug!(
                tick = report.tick,
                battle = %round.battle_id,
                turn = round.turn,
                attacker = entry.attacker,
                target = entry.target,
                damage = entry.outcome.damage,
                result = ?entry.outcome.result,
                "Strike"
            );
        }
    }
    for end in &report.ended {
        tracing::info!(
            tick = report.tick,
            battle = %end.battle_id,
            winner = %end.resolution.winner,
            "{}",
            end.resolution.details
        );
    }
}
