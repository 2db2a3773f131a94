// 💰 Gold Converter - pot math and point→gold exchange

use serde::{Deserialize, Serialize};

/// Management's cut stays out of the shared pot
const SHARED_POT_RATIO: f64 = 0.85;

/// The meta block of every engine result.
///
/// Wire names are camelCase to match the admin frontend's contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldMeta {
    pub total_gold_pot: i64,
    pub shared_gold_pot: i64,
    pub manual_gold_payout_total: f64,
    pub shared_gold_pot_adjusted: f64,
    pub total_points_all: f64,
    pub gold_per_point: f64,
}

/// Derive the full meta block from the three inputs.
///
/// sharedGoldPot = ⌊totalGoldPot · 0.85⌋
/// sharedGoldPotAdjusted = max(0, sharedGoldPot − manualGoldPayoutTotal)
/// goldPerPoint = adjusted/totalPointsAll when both > 0, else 0
pub fn compute_meta(total_gold_pot: i64, manual_gold_total: f64, total_points_all: f64) -> GoldMeta {
    let shared_gold_pot = (total_gold_pot as f64 * SHARED_POT_RATIO).floor() as i64;
    let shared_gold_pot_adjusted = (shared_gold_pot as f64 - manual_gold_total).max(0.0);

    let gold_per_point = if shared_gold_pot_adjusted > 0.0 && total_points_all > 0.0 {
        shared_gold_pot_adjusted / total_points_all
    } else {
        0.0
    };

    GoldMeta {
        total_gold_pot,
        shared_gold_pot,
        manual_gold_payout_total: manual_gold_total,
        shared_gold_pot_adjusted,
        total_points_all,
        gold_per_point,
    }
}

/// One player's payout: floored share of the pot plus direct manual gold,
/// clamped so nobody owes the guild.
pub fn player_gold(points: f64, gold_per_point: f64, direct_gold: f64) -> i64 {
    let share = (points.max(0.0) * gold_per_point).floor();
    (share + direct_gold).max(0.0) as i64
}

// ============================================================================
// TESTS
// ============================================================================
