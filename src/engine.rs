// ⚙️ Rewards Engine - mode switch, orchestration, output assembly
//
// Stateless per request: gather() materializes the bundle, the mode switch
// fires exactly once, aggregation runs pure, and the result is assembled
// with deterministic ordering throughout. Nothing is cached across calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::calculators::{
    apply_ability_panels, apply_base, apply_guild_bonus, apply_healer_awards,
    apply_performance_penalties, apply_rankings, apply_streaks, apply_sunders,
    seed_confirmed_players, Rosters,
};
use crate::datasets::{gather, DatasetBundle};
use crate::db::Db;
use crate::errors::EngineError;
use crate::gold::{compute_meta, player_gold, GoldMeta};
use crate::manual::{apply_manual_entries, ManualGoldRow, ManualOverlay};
use crate::panels::{PanelBoard, PanelKey, Player, PlayerDirectory};
use crate::snapshot::materialize;

// ============================================================================
// RESULT SHAPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Auto,
    Manual,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Auto => "auto",
            EngineMode::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTotal {
    pub name: String,
    pub class: String,
    pub points: f64,
    pub gold: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelRowOut {
    pub name: String,
    pub class: String,
    pub points: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelOut {
    pub key: PanelKey,
    pub label: String,
    pub rows: Vec<PanelRowOut>,
}

/// The full per-event report both endpoints are built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    pub mode: EngineMode,
    pub meta: GoldMeta,
    pub players: Vec<Player>,
    pub totals: Vec<PlayerTotal>,
    pub panels: Vec<PanelOut>,
    pub manual_gold: Vec<ManualGoldRow>,
    pub calc_digest: String,
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Everything one mode's aggregation produced, before assembly
struct Computation {
    mode: EngineMode,
    board: PanelBoard,
    directory: PlayerDirectory,
    overlay: ManualOverlay,
}

fn evaluate_auto(bundle: &DatasetBundle) -> Computation {
    let rosters = Rosters::build(bundle);
    let mut directory = PlayerDirectory::new();
    let mut board = PanelBoard::new();

    seed_confirmed_players(bundle, &rosters, &mut directory);
    apply_base(&directory, &mut board);
    apply_rankings(bundle, &rosters, &mut board);
    apply_healer_awards(bundle, &rosters, &mut board);
    apply_sunders(bundle, &rosters, &mut board);
    apply_performance_penalties(bundle, &rosters, &mut board);
    apply_ability_panels(bundle, &rosters, &mut directory, &mut board);
    apply_streaks(bundle, &directory, &mut board);
    apply_guild_bonus(bundle, &directory, &mut board);

    let overlay = apply_manual_entries(
        &bundle.manual_entries,
        &rosters.confirmed,
        &BTreeSet::new(),
        &mut directory,
        &mut board,
    );

    Computation {
        mode: EngineMode::Auto,
        board,
        directory,
        overlay,
    }
}

fn evaluate_manual(bundle: &DatasetBundle) -> Computation {
    let materialized = materialize(bundle);
    let mut directory = materialized.directory;
    let mut board = materialized.board;

    // In manual mode "confirmed" means "present in the frozen record"
    let points_allowed: BTreeSet<String> = directory.iter().map(|(k, _)| k.clone()).collect();

    let overlay = apply_manual_entries(
        &bundle.manual_entries,
        &points_allowed,
        &materialized.manual_points_present,
        &mut directory,
        &mut board,
    );

    Computation {
        mode: EngineMode::Manual,
        board,
        directory,
        overlay,
    }
}

/// Pure aggregation over one gathered bundle.
pub fn evaluate(bundle: &DatasetBundle) -> EngineResult {
    let computation = if bundle.manual_mode() {
        evaluate_manual(bundle)
    } else {
        evaluate_auto(bundle)
    };

    assemble(bundle, computation)
}

/// Gather + evaluate: the whole effective-rewards request.
pub async fn compute_effective(db: &Db, event_id: i64) -> Result<EngineResult, EngineError> {
    let bundle = gather(db, event_id).await?;
    Ok(evaluate(&bundle))
}

// ============================================================================
// ASSEMBLY
// ============================================================================

fn assemble(bundle: &DatasetBundle, computation: Computation) -> EngineResult {
    let Computation {
        mode,
        board,
        directory,
        overlay,
    } = computation;

    let total_points_all: f64 = directory
        .iter()
        .map(|(key, _)| board.player_total(key).max(0.0))
        .sum();

    let meta = compute_meta(bundle.loot_total, overlay.manual_gold_total, total_points_all);

    let mut totals: Vec<PlayerTotal> = directory
        .iter()
        .map(|(key, player)| {
            let points = board.player_total(key);
            let direct = overlay.gold_by_player.get(key).copied().unwrap_or(0.0);

            PlayerTotal {
                name: player.name.clone(),
                class: player.class.clone(),
                points,
                gold: player_gold(points, meta.gold_per_point, direct),
            }
        })
        .collect();

    totals.sort_by(|a, b| {
        b.points
            .partial_cmp(&a.points)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let panels: Vec<PanelOut> = board
        .iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(key, rows)| {
            let mut out_rows: Vec<PanelRowOut> = rows
                .iter()
                .map(|(player_key, cell)| {
                    let (name, class) = directory
                        .get(player_key)
                        .map(|p| (p.name.clone(), p.class.clone()))
                        .unwrap_or_else(|| (player_key.clone(), "Unknown".to_string()));

                    PanelRowOut {
                        name,
                        class,
                        points: cell.points,
                        detail: cell.detail.clone(),
                    }
                })
                .collect();

            out_rows.sort_by(|a, b| {
                b.points
                    .partial_cmp(&a.points)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.name.cmp(&b.name))
            });

            PanelOut {
                key: *key,
                label: key.label().to_string(),
                rows: out_rows,
            }
        })
        .collect();

    let players: Vec<Player> = directory.iter().map(|(_, p)| p.clone()).collect();

    let calc_digest = format!(
        "{}|players={}|panels={}|rows={}|adjusted_pot={:.0}|total_points={:.2}",
        mode.as_str(),
        players.len(),
        board.panel_count(),
        board.row_count(),
        meta.shared_gold_pot_adjusted,
        meta.total_points_all,
    );

    EngineResult {
        mode,
        meta,
        players,
        totals,
        panels,
        manual_gold: overlay.gold_rows,
        calc_digest,
    }
}

// ============================================================================
// DEBUG REPORT
// ============================================================================

/// One panel compared across modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSumRow {
    pub key: PanelKey,
    pub label: String,
    pub auto_sum: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_sum: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

/// A manual-points contributor whose value differs between modes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPointsDrift {
    pub name: String,
    pub auto_points: f64,
    pub manual_points: f64,
    pub delta: f64,
}

/// Side-by-side auto vs manual comparison for one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugReport {
    pub event_id: i64,
    pub active_mode: EngineMode,
    pub panel_sums: Vec<PanelSumRow>,
    pub manual_points_drift: Vec<ManualPointsDrift>,
    pub auto_digest: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_digest: Option<String>,
}

/// Recompute both modes and diff them. The manual side is present only
/// when frozen rows exist.
pub fn debug_report(bundle: &DatasetBundle) -> DebugReport {
    let auto = evaluate_auto(bundle);
    let manual = if bundle.snapshot.is_empty() {
        None
    } else {
        Some(evaluate_manual(bundle))
    };

    let panel_sums = PanelKey::ALL
        .iter()
        .filter_map(|key| {
            let auto_has = auto.board.has_panel(*key);
            let manual_has = manual
                .as_ref()
                .map(|m| m.board.has_panel(*key))
                .unwrap_or(false);

            if !auto_has && !manual_has {
                return None;
            }

            let auto_sum = auto.board.panel_sum(*key);
            let manual_sum = manual.as_ref().map(|m| m.board.panel_sum(*key));

            Some(PanelSumRow {
                key: *key,
                label: key.label().to_string(),
                auto_sum,
                manual_sum,
                delta: manual_sum.map(|m| m - auto_sum),
            })
        })
        .collect();

    let manual_points_drift = match &manual {
        Some(manual_side) => {
            let mut keys: BTreeSet<String> = BTreeSet::new();
            for side in [&auto, manual_side] {
                if let Some(rows) = side.board.panel(PanelKey::ManualPoints) {
                    keys.extend(rows.keys().cloned());
                }
            }

            keys.into_iter()
                .filter_map(|key| {
                    let auto_points = auto
                        .board
                        .panel(PanelKey::ManualPoints)
                        .and_then(|rows| rows.get(&key))
                        .map(|c| c.points)
                        .unwrap_or(0.0);
                    let manual_points = manual_side
                        .board
                        .panel(PanelKey::ManualPoints)
                        .and_then(|rows| rows.get(&key))
                        .map(|c| c.points)
                        .unwrap_or(0.0);

                    if auto_points == manual_points {
                        return None;
                    }

                    let name = manual_side
                        .directory
                        .get(&key)
                        .or_else(|| auto.directory.get(&key))
                        .map(|p| p.name.clone())
                        .unwrap_or(key);

                    Some(ManualPointsDrift {
                        name,
                        auto_points,
                        manual_points,
                        delta: manual_points - auto_points,
                    })
                })
                .collect()
        }
        None => Vec::new(),
    };

    let active_mode = if bundle.manual_mode() {
        EngineMode::Manual
    } else {
        EngineMode::Auto
    };

    let auto_digest = assemble(bundle, auto).calc_digest;
    let manual_digest = manual.map(|m| assemble(bundle, m).calc_digest);

    DebugReport {
        event_id: bundle.event_id,
        active_mode,
        panel_sums,
        manual_points_drift,
        auto_digest,
        manual_digest,
    }
}

/// Gather + debug diff: the whole debug request.
pub async fn compute_debug(db: &Db, event_id: i64) -> Result<DebugReport, EngineError> {
    let bundle = gather(db, event_id).await?;
    Ok(debug_report(&bundle))
}

// ============================================================================
// TESTS
// ============================================================================
