// ✍️ Manual Overlay - management rewards and deductions
//
// Gold entries never touch points; point entries never touch gold.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::db::ManualEntry;
use crate::eligibility::{name_key, should_ignore};
use crate::panels::{PanelBoard, PanelKey, PlayerDirectory};

/// Description tag that marks an entry as gold even without the flag
const GOLD_TAG: &str = "[GOLD]";

/// Gold entry: the explicit flag or the `[GOLD]` description tag
pub fn is_gold_entry(entry: &ManualEntry) -> bool {
    entry.is_gold || entry.description.to_uppercase().contains(GOLD_TAG)
}

/// One direct gold payout, kept for downstream export/reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualGoldRow {
    pub name: String,
    pub description: String,
    pub gold: f64,
}

/// Result of classifying every manual entry
#[derive(Debug, Default)]
pub struct ManualOverlay {
    /// Direct gold per player (canonical key), applied after point→gold
    /// conversion; may be negative for deductions
    pub gold_by_player: BTreeMap<String, f64>,

    /// Positive payouts only - what the shared pot is reduced by
    pub manual_gold_total: f64,

    /// Export list of gold entries in input order
    pub gold_rows: Vec<ManualGoldRow>,
}

/// Classify and apply manual entries.
///
/// - gold entries: accumulate per player and into the payout total
///   (positives only); the recipient is registered so pure-gold recipients
///   still appear in the output
/// - point entries: added to the manual-points panel only when the player
///   is in `points_allowed` (confirmed via some non-manual panel) and not
///   in `skip_points_for` (already baked into a snapshot); silently
///   dropped otherwise
pub fn apply_manual_entries(
    entries: &[ManualEntry],
    points_allowed: &BTreeSet<String>,
    skip_points_for: &BTreeSet<String>,
    dir: &mut PlayerDirectory,
    board: &mut PanelBoard,
) -> ManualOverlay {
    let mut overlay = ManualOverlay::default();

    for entry in entries {
        if should_ignore(&entry.player_name) {
            continue;
        }

        let key = name_key(&entry.player_name);

        if is_gold_entry(entry) {
            dir.register(&entry.player_name);

            *overlay.gold_by_player.entry(key).or_insert(0.0) += entry.points;
            if entry.points > 0.0 {
                overlay.manual_gold_total += entry.points;
            }

            overlay.gold_rows.push(ManualGoldRow {
                name: entry.player_name.trim().to_string(),
                description: entry.description.clone(),
                gold: entry.points,
            });
        } else {
            if !points_allowed.contains(&key) || skip_points_for.contains(&key) {
                continue;
            }

            board.add_row(PanelKey::ManualPoints, &key, entry.points);
        }
    }

    overlay
}

// ============================================================================
// TESTS
// ============================================================================
