// 🧊 Snapshot Materializer - manual mode
//
// Once management locks an event, the frozen rows ARE the truth: panels are
// rebuilt from them instead of recomputed, and hand edits win over the
// originally computed values.

use std::collections::BTreeSet;

use crate::calculators::BASE_POINTS;
use crate::datasets::DatasetBundle;
use crate::eligibility::{name_key, should_ignore};
use crate::panels::{PanelBoard, PanelKey, PlayerDirectory};

/// Panels and players rebuilt from frozen rows
#[derive(Debug, Default)]
pub struct MaterializedSnapshot {
    pub board: PanelBoard,
    pub directory: PlayerDirectory,

    /// Stored panel keys the engine no longer recognizes (skipped rows)
    pub skipped_keys: Vec<String>,

    /// Players whose manual points are already frozen - the overlay must
    /// not re-add theirs
    pub manual_points_present: BTreeSet<String>,
}

/// Rebuild the panel board from the event's snapshot rows.
///
/// - edited value wins over the original
/// - the +100 base panel is synthesized only when the snapshot carries no
///   base rows (re-materializing an already-complete snapshot must not
///   double count)
/// - missing/"Unknown" classes are filled from the guild roster
pub fn materialize(bundle: &DatasetBundle) -> MaterializedSnapshot {
    let mut result = MaterializedSnapshot::default();
    let mut seen_unknown_keys = BTreeSet::new();

    for row in &bundle.snapshot {
        if should_ignore(&row.character_name) {
            continue;
        }

        let panel = match PanelKey::from_key(&row.panel_key) {
            Some(panel) => panel,
            None => {
                if seen_unknown_keys.insert(row.panel_key.clone()) {
                    result.skipped_keys.push(row.panel_key.clone());
                }
                continue;
            }
        };

        let key = result.directory.register(&row.character_name);
        result.directory.set_class(&key, &row.character_class);

        if let Some(player) = result.directory.get_mut(&key) {
            // Snapshot players were confirmed when the event froze
            player.confirmed = true;
        }

        if panel == PanelKey::ManualPoints {
            result.manual_points_present.insert(key.clone());
        }

        result.board.add_row(panel, &key, row.effective_value());
    }

    // Base synthesis: only when the frozen rows carry none
    if !result.board.has_panel(PanelKey::Base) {
        let keys: Vec<String> = result.directory.iter().map(|(k, _)| k.clone()).collect();
        for key in keys {
            result.board.add_row(PanelKey::Base, &key, BASE_POINTS);
        }
    }

    // Class fill from the guild roster for rows frozen without one
    for member in &bundle.guild_roster {
        let key = name_key(&member.name);
        result.directory.set_class(&key, &member.class);
    }

    // Tank flags still come from the live assignment dataset
    for assignment in &bundle.assignments {
        if assignment.is_tank_slot() {
            let key = name_key(&assignment.player);
            if let Some(player) = result.directory.get_mut(&key) {
                player.is_tank = true;
            }
        }
    }

    result
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SnapshotEntry;

    fn row(panel_key: &str, name: &str, class: &str, original: f64, edited: Option<f64>) -> SnapshotEntry {
        SnapshotEntry {
            panel_key: panel_key.to_string(),
            character_name: name.to_string(),
            character_class: class.to_string(),
            point_value_original: original,
            point_value_edited: edited,
        }
    }

    fn bundle_with_snapshot(rows: Vec<SnapshotEntry>) -> DatasetBundle {
        DatasetBundle {
            snapshot: rows,
            ..DatasetBundle::default()
        }
    }

    #[test]
    fn test_edited_value_wins() {
        let bundle = bundle_with_snapshot(vec![
            row("damage_rank", "Foo", "Mage", 30.0, Some(22.0)),
            row("damage_rank", "Bar", "Rogue", 25.0, None),
        ]);

        let snapshot = materialize(&bundle);
        let rows = snapshot.board.panel(PanelKey::DamageRank).unwrap();

        assert_eq!(rows["foo"].points, 22.0);
        assert_eq!(rows["bar"].points, 25.0);
    }

    #[test]
    fn test_base_synthesized_when_absent() {
        let bundle = bundle_with_snapshot(vec![
            row("damage_rank", "Foo", "Mage", 30.0, None),
            row("potions", "Bar", "Rogue", 5.0, None),
        ]);

        let snapshot = materialize(&bundle);
        let base = snapshot.board.panel(PanelKey::Base).unwrap();

        assert_eq!(base["foo"].points, BASE_POINTS);
        assert_eq!(base["bar"].points, BASE_POINTS);
    }

    #[test]
    fn test_base_not_doubled_when_present() {
        let bundle = bundle_with_snapshot(vec![
            row("base", "Foo", "Mage", 100.0, None),
            row("damage_rank", "Foo", "Mage", 30.0, None),
            row("damage_rank", "Bar", "Rogue", 25.0, None),
        ]);

        let snapshot = materialize(&bundle);
        let base = snapshot.board.panel(PanelKey::Base).unwrap();

        assert_eq!(base["foo"].points, 100.0);
        // Bar has no frozen base row and none is synthesized for him:
        // the snapshot, edits included, is the complete record
        assert!(!base.contains_key("bar"));
    }

    #[test]
    fn test_unknown_panel_keys_skipped() {
        let bundle = bundle_with_snapshot(vec![
            row("damage_rank", "Foo", "Mage", 30.0, None),
            row("retired_panel", "Foo", "Mage", 99.0, None),
            row("retired_panel", "Bar", "Rogue", 99.0, None),
        ]);

        let snapshot = materialize(&bundle);

        assert_eq!(snapshot.skipped_keys, vec!["retired_panel".to_string()]);
        assert_eq!(snapshot.board.player_total("foo"), 30.0 + BASE_POINTS);
    }

    #[test]
    fn test_class_filled_from_roster() {
        let mut bundle = bundle_with_snapshot(vec![
            row("damage_rank", "Foo", "Unknown", 30.0, None),
        ]);
        bundle.guild_roster = vec![crate::datasets::RosterMember {
            name: "Foo".to_string(),
            class: "Mage".to_string(),
        }];

        let snapshot = materialize(&bundle);
        assert_eq!(snapshot.directory.get("foo").unwrap().class, "Mage");
    }

    #[test]
    fn test_manual_points_rows_tracked_for_guard() {
        let bundle = bundle_with_snapshot(vec![
            row("manual_points", "Foo", "Mage", 25.0, None),
            row("damage_rank", "Bar", "Rogue", 20.0, None),
        ]);

        let snapshot = materialize(&bundle);

        assert!(snapshot.manual_points_present.contains("foo"));
        assert!(!snapshot.manual_points_present.contains("bar"));
    }

    #[test]
    fn test_ignored_names_never_materialize() {
        let bundle = bundle_with_snapshot(vec![
            row("damage_rank", "Dummy Totem", "Unknown", 30.0, None),
            row("damage_rank", "Foo", "Mage", 25.0, None),
        ]);

        let snapshot = materialize(&bundle);

        assert!(!snapshot.directory.contains("dummy totem"));
        assert_eq!(snapshot.directory.len(), 1);
    }

    #[test]
    fn test_identical_snapshot_materializes_identically() {
        let bundle = bundle_with_snapshot(vec![
            row("base", "Foo", "Mage", 100.0, None),
            row("damage_rank", "Foo", "Mage", 30.0, Some(28.0)),
            row("manual_points", "Foo", "Mage", 25.0, None),
        ]);

        let first = materialize(&bundle);
        let second = materialize(&bundle);

        assert_eq!(
            first.board.player_total("foo"),
            second.board.player_total("foo")
        );
        assert_eq!(first.board.row_count(), second.board.row_count());
        assert_eq!(first.manual_points_present, second.manual_points_present);
    }
}
