// 🏆 Ranking & Award Calculators - auto mode scoring rules
//
// Every function here is pure over the DatasetBundle: it reads the bundle,
// writes panel rows, and nothing else. Computation order matters only for
// the three legacy loose-filter panels (scorch, streaks, guild bonus),
// which admit any player an earlier panel already registered.

use std::collections::{BTreeSet, HashMap};

use crate::datasets::{DatasetBundle, GapTiers, PrimaryRole};
use crate::eligibility::{fold_group_suffix, name_key, should_ignore};
use crate::panels::{PanelBoard, PanelFilter, PanelKey, PlayerDirectory, ABILITY_PANELS};

// ============================================================================
// SCORING CONSTANTS
// ============================================================================

/// Flat participation points for every confirmed raider
pub const BASE_POINTS: f64 = 100.0;

/// Flat bonus for guild members
pub const GUILD_BONUS_POINTS: f64 = 10.0;

/// Fixed descending healer-class awards (by healing done)
const SHAMAN_AWARDS: &[f64] = &[15.0, 10.0, 5.0];
const PRIEST_AWARDS: &[f64] = &[12.0, 6.0];
const DRUID_AWARDS: &[f64] = &[10.0];

/// Too-low rate penalties: first step whose threshold the rate stays under
/// wins. Tanks are exempt.
const DPS_PENALTY_STEPS: &[(f64, f64)] = &[(60.0, -20.0), (90.0, -10.0), (120.0, -5.0)];
const HPS_PENALTY_STEPS: &[(f64, f64)] = &[(25.0, -20.0), (40.0, -10.0), (55.0, -5.0)];

// ============================================================================
// ROSTERS
// ============================================================================

/// Derived per-computation rosters: who is confirmed, who tanks, who plays
/// which primary role. All keys canonical.
pub struct Rosters {
    pub confirmed: BTreeSet<String>,
    pub tanks: BTreeSet<String>,
    pub roles: HashMap<String, PrimaryRole>,
}

impl Rosters {
    pub fn build(bundle: &DatasetBundle) -> Self {
        let confirmed =
            crate::eligibility::confirmed_set(bundle.participation.iter().map(|p| p.name.as_str()));

        let tanks = bundle
            .assignments
            .iter()
            .filter(|a| a.is_tank_slot())
            .map(|a| name_key(&a.player))
            .collect();

        let roles = bundle
            .roles
            .iter()
            .map(|(name, role)| (name_key(name), *role))
            .collect();

        Rosters {
            confirmed,
            tanks,
            roles,
        }
    }

    pub fn role_of(&self, key: &str) -> Option<PrimaryRole> {
        self.roles.get(key).copied()
    }

    /// Healers are whoever the role map says heals; everyone else (tanks,
    /// damage, unmapped hybrids) counts as a damage dealer for ranking.
    pub fn is_healer(&self, key: &str) -> bool {
        self.role_of(key) == Some(PrimaryRole::Healer)
    }

    pub fn is_tank(&self, key: &str) -> bool {
        self.tanks.contains(key) || self.role_of(key) == Some(PrimaryRole::Tank)
    }
}

// ============================================================================
// ROSTER SEEDING + BASE PANEL
// ============================================================================

/// Register every confirmed participant into the directory.
pub fn seed_confirmed_players(
    bundle: &DatasetBundle,
    rosters: &Rosters,
    dir: &mut PlayerDirectory,
) {
    for participant in &bundle.participation {
        if should_ignore(&participant.name) {
            continue;
        }

        let key = dir.register(&participant.name);
        dir.set_class(&key, &participant.class);

        if let Some(player) = dir.get_mut(&key) {
            player.confirmed = true;
            if rosters.tanks.contains(&key) {
                player.is_tank = true;
            }
        }
    }
}

/// Every confirmed player starts from the same base row.
pub fn apply_base(dir: &PlayerDirectory, board: &mut PanelBoard) {
    let confirmed: Vec<String> = dir
        .iter()
        .filter(|(_, p)| p.confirmed)
        .map(|(k, _)| k.clone())
        .collect();

    for key in confirmed {
        board.add_row(PanelKey::Base, &key, BASE_POINTS);
    }
}

// ============================================================================
// RANKINGS
// ============================================================================

/// (player key, amount) pairs sorted descending; ties keep input order.
fn ranked_eligible<F>(bundle: &DatasetBundle, rosters: &Rosters, select: F) -> Vec<(String, f64)>
where
    F: Fn(&str, f64, f64) -> Option<f64>,
{
    let mut eligible: Vec<(String, f64)> = bundle
        .participation
        .iter()
        .filter(|p| !should_ignore(&p.name))
        .filter_map(|p| {
            let key = name_key(&p.name);
            if !rosters.confirmed.contains(&key) {
                return None;
            }
            select(&key, p.damage, p.healing).map(|amount| (key, amount))
        })
        .filter(|(_, amount)| *amount > 0.0)
        .collect();

    // Stable sort: equal amounts keep the log's input order
    eligible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    eligible
}

fn position_points(config: &[f64], position: usize) -> f64 {
    config.get(position).copied().unwrap_or(0.0)
}

/// God-gamer tier for the top spot: the gap to #2 picks the bonus.
fn god_gamer_bonus(ranked: &[(String, f64)], tiers: &GapTiers) -> Option<(String, f64)> {
    if ranked.len() < 2 {
        return None;
    }

    let gap = ranked[0].1 - ranked[1].1;
    let bonus = if gap >= tiers.high_gap {
        tiers.high_bonus
    } else if gap >= tiers.low_gap {
        tiers.low_bonus
    } else {
        return None;
    };

    Some((ranked[0].0.clone(), bonus))
}

/// Damage and healing rank panels + the god-gamer bonus for each.
pub fn apply_rankings(bundle: &DatasetBundle, rosters: &Rosters, board: &mut PanelBoard) {
    let damage_ranked = ranked_eligible(bundle, rosters, |key, damage, _| {
        if rosters.is_healer(key) {
            None
        } else {
            Some(damage)
        }
    });

    for (position, (key, _)) in damage_ranked.iter().enumerate() {
        board.add_row(
            PanelKey::DamageRank,
            key,
            position_points(&bundle.rank_points.damage, position),
        );
    }

    if let Some((key, bonus)) =
        god_gamer_bonus(&damage_ranked, &bundle.rank_points.god_gamer.damage)
    {
        board.add_row_detail(PanelKey::GodGamer, &key, bonus, Some("damage".to_string()));
    }

    let healing_ranked = ranked_eligible(bundle, rosters, |key, _, healing| {
        if rosters.is_healer(key) {
            Some(healing)
        } else {
            None
        }
    });

    for (position, (key, _)) in healing_ranked.iter().enumerate() {
        board.add_row(
            PanelKey::HealingRank,
            key,
            position_points(&bundle.rank_points.healing, position),
        );
    }

    if let Some((key, bonus)) =
        god_gamer_bonus(&healing_ranked, &bundle.rank_points.god_gamer.healing)
    {
        board.add_row_detail(PanelKey::GodGamer, &key, bonus, Some("healing".to_string()));
    }
}

/// Top-N awards per healer class, by healing done.
pub fn apply_healer_awards(bundle: &DatasetBundle, rosters: &Rosters, board: &mut PanelBoard) {
    let healers = ranked_eligible(bundle, rosters, |key, _, healing| {
        if rosters.is_healer(key) {
            Some(healing)
        } else {
            None
        }
    });

    let class_of: HashMap<String, String> = bundle
        .participation
        .iter()
        .map(|p| (name_key(&p.name), p.class.to_lowercase()))
        .collect();

    for (class, awards) in [
        ("shaman", SHAMAN_AWARDS),
        ("priest", PRIEST_AWARDS),
        ("druid", DRUID_AWARDS),
    ] {
        let mut taken = 0;
        for (key, _) in &healers {
            if taken >= awards.len() {
                break;
            }
            if class_of.get(key).map(String::as_str) == Some(class) {
                board.add_row(PanelKey::HealerAwards, key, awards[taken]);
                taken += 1;
            }
        }
    }
}

// ============================================================================
// SUNDERS
// ============================================================================

/// Percent-of-average step table
fn sunder_points(pct: f64) -> f64 {
    if pct < 25.0 {
        -20.0
    } else if pct < 50.0 {
        -15.0
    } else if pct < 75.0 {
        -10.0
    } else if pct < 90.0 {
        -5.0
    } else if pct <= 109.0 {
        0.0
    } else if pct <= 124.0 {
        5.0
    } else {
        10.0
    }
}

/// Sunder contribution relative to the raid average. Assigned tanks are
/// excluded both from the average and from scoring; avg of zero makes the
/// whole panel a no-op.
pub fn apply_sunders(bundle: &DatasetBundle, rosters: &Rosters, board: &mut PanelBoard) {
    let eligible: Vec<(String, f64)> = bundle
        .sunders
        .iter()
        .filter(|row| !should_ignore(&row.name))
        .map(|row| (name_key(&row.name), row.count))
        .filter(|(key, _)| rosters.confirmed.contains(key) && !rosters.is_tank(key))
        .collect();

    if eligible.is_empty() {
        return;
    }

    let avg: f64 = eligible.iter().map(|(_, c)| c).sum::<f64>() / eligible.len() as f64;
    if avg == 0.0 {
        return;
    }

    for (key, count) in eligible {
        let pct = count / avg * 100.0;
        board.add_row_detail(
            PanelKey::Sunders,
            &key,
            sunder_points(pct),
            Some(format!("{:.0}% of raid avg", pct)),
        );
    }
}

// ============================================================================
// PERFORMANCE PENALTIES
// ============================================================================

fn step_penalty(steps: &[(f64, f64)], rate: f64) -> f64 {
    for (threshold, points) in steps {
        if rate < *threshold {
            return *points;
        }
    }
    0.0
}

/// Too-low DPS/HPS penalties. Skipped entirely when the raid has no
/// active-time stats; players without a mapped role are skipped too, and
/// tanks are exempt.
pub fn apply_performance_penalties(
    bundle: &DatasetBundle,
    rosters: &Rosters,
    board: &mut PanelBoard,
) {
    let active_seconds = match &bundle.raid_stats {
        Some(stats) if stats.active_seconds > 0.0 => stats.active_seconds,
        _ => return,
    };

    for participant in &bundle.participation {
        if should_ignore(&participant.name) {
            continue;
        }

        let key = name_key(&participant.name);
        if !rosters.confirmed.contains(&key) || rosters.is_tank(&key) {
            continue;
        }

        let (points, detail) = match rosters.role_of(&key) {
            Some(PrimaryRole::Damage) => {
                let rate = participant.damage / active_seconds;
                (
                    step_penalty(DPS_PENALTY_STEPS, rate),
                    format!("{:.1} dps", rate),
                )
            }
            Some(PrimaryRole::Healer) => {
                let rate = participant.healing / active_seconds;
                (
                    step_penalty(HPS_PENALTY_STEPS, rate),
                    format!("{:.1} hps", rate),
                )
            }
            _ => continue,
        };

        board.add_row_detail(PanelKey::Performance, &key, points, Some(detail));
    }
}

// ============================================================================
// PRECOMPUTED ABILITY PANELS
// ============================================================================

/// Sum each precomputed point table into its panel, applying the per-panel
/// filter and grouped-name folding.
pub fn apply_ability_panels(
    bundle: &DatasetBundle,
    rosters: &Rosters,
    dir: &mut PlayerDirectory,
    board: &mut PanelBoard,
) {
    for spec in ABILITY_PANELS {
        let rows = match bundle.ability_tables.get(&spec.key) {
            Some(rows) => rows,
            None => continue,
        };

        for row in rows {
            let display = if spec.grouped {
                fold_group_suffix(&row.name)
            } else {
                row.name.clone()
            };

            if should_ignore(&display) {
                continue;
            }

            let key = name_key(&display);

            let admitted = match spec.filter {
                PanelFilter::Confirmed => rosters.confirmed.contains(&key),
                PanelFilter::EngineRoster => {
                    rosters.confirmed.contains(&key) || dir.contains(&key)
                }
                PanelFilter::ConfirmedDps => {
                    rosters.confirmed.contains(&key)
                        && !rosters.is_healer(&key)
                        && !rosters.is_tank(&key)
                }
            };

            if !admitted {
                continue;
            }

            dir.register(&display);
            board.add_row_detail(spec.key, &key, row.points, row.detail.clone());
        }
    }
}

// ============================================================================
// STREAKS + GUILD BONUS
// ============================================================================

/// Attendance streak tiers
pub fn streak_points(count: u32) -> f64 {
    match count {
        c if c >= 8 => 15.0,
        7 => 12.0,
        6 => 9.0,
        5 => 6.0,
        4 => 3.0,
        _ => 0.0,
    }
}

/// Streak panel - legacy loose filter: any already-registered player.
pub fn apply_streaks(bundle: &DatasetBundle, dir: &PlayerDirectory, board: &mut PanelBoard) {
    for row in &bundle.streaks {
        if should_ignore(&row.name) {
            continue;
        }

        let key = name_key(&row.name);
        if !dir.contains(&key) {
            continue;
        }

        board.add_row(PanelKey::Streaks, &key, streak_points(row.count));
    }
}

/// Guild membership bonus - legacy loose filter, same as streaks.
pub fn apply_guild_bonus(bundle: &DatasetBundle, dir: &PlayerDirectory, board: &mut PanelBoard) {
    for member in &bundle.guild_roster {
        if should_ignore(&member.name) {
            continue;
        }

        let key = name_key(&member.name);
        if !dir.contains(&key) {
            continue;
        }

        board.add_row(PanelKey::GuildBonus, &key, GUILD_BONUS_POINTS);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{AbilityRow, BossAssignment, LogParticipant, SunderRow};

    fn participant(name: &str, class: &str, damage: f64, healing: f64) -> LogParticipant {
        LogParticipant {
            name: name.to_string(),
            class: class.to_string(),
            damage,
            healing,
        }
    }

    fn bundle_with_participants(participants: Vec<LogParticipant>) -> DatasetBundle {
        DatasetBundle {
            participation: participants,
            ..DatasetBundle::default()
        }
    }

    fn seeded(bundle: &DatasetBundle) -> (Rosters, PlayerDirectory, PanelBoard) {
        let rosters = Rosters::build(bundle);
        let mut dir = PlayerDirectory::new();
        seed_confirmed_players(bundle, &rosters, &mut dir);
        (rosters, dir, PanelBoard::new())
    }

    #[test]
    fn test_damage_rank_positions_and_overflow() {
        let mut bundle = bundle_with_participants(vec![
            participant("Low", "Rogue", 100.0, 0.0),
            participant("High", "Mage", 900.0, 0.0),
            participant("Mid", "Warlock", 500.0, 0.0),
        ]);
        bundle.rank_points.damage = vec![30.0, 20.0];
        bundle.rank_points.healing = vec![];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);

        let rows = board.panel(PanelKey::DamageRank).unwrap();
        assert_eq!(rows["high"].points, 30.0);
        assert_eq!(rows["mid"].points, 20.0);
        // Third place is beyond the array: zero points, row never stored
        assert!(!rows.contains_key("low"));
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let mut bundle = bundle_with_participants(vec![
            participant("First", "Mage", 500.0, 0.0),
            participant("Second", "Rogue", 500.0, 0.0),
        ]);
        bundle.rank_points.damage = vec![30.0, 20.0];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);

        let rows = board.panel(PanelKey::DamageRank).unwrap();
        assert_eq!(rows["first"].points, 30.0);
        assert_eq!(rows["second"].points, 20.0);
    }

    #[test]
    fn test_healers_excluded_from_damage_rank() {
        let mut bundle = bundle_with_participants(vec![
            participant("Dps", "Mage", 400.0, 0.0),
            participant("Medic", "Priest", 600.0, 900.0),
        ]);
        bundle
            .roles
            .insert("Medic".to_string(), PrimaryRole::Healer);

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);

        let damage = board.panel(PanelKey::DamageRank).unwrap();
        assert!(damage.contains_key("dps"));
        assert!(!damage.contains_key("medic"));

        let healing = board.panel(PanelKey::HealingRank).unwrap();
        assert!(healing.contains_key("medic"));
    }

    #[test]
    fn test_god_gamer_two_tiers() {
        let mut bundle = bundle_with_participants(vec![
            participant("Top", "Mage", 200_000.0, 0.0),
            participant("Second", "Rogue", 40_000.0, 0.0),
        ]);
        bundle.rank_points.damage = vec![30.0, 20.0];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);

        // Gap 160k ≥ high gap 150k → high bonus
        assert_eq!(
            board.panel(PanelKey::GodGamer).unwrap()["top"].points,
            20.0
        );

        // Shrink the gap into the low tier
        let mut bundle = bundle_with_participants(vec![
            participant("Top", "Mage", 100_000.0, 0.0),
            participant("Second", "Rogue", 40_000.0, 0.0),
        ]);
        bundle.rank_points.damage = vec![30.0, 20.0];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);
        assert_eq!(
            board.panel(PanelKey::GodGamer).unwrap()["top"].points,
            10.0
        );
    }

    #[test]
    fn test_god_gamer_needs_a_runner_up() {
        let bundle = bundle_with_participants(vec![participant("Solo", "Mage", 500_000.0, 0.0)]);

        let (rosters, _, mut board) = seeded(&bundle);
        apply_rankings(&bundle, &rosters, &mut board);

        assert!(!board.has_panel(PanelKey::GodGamer));
    }

    #[test]
    fn test_healer_class_awards() {
        let mut bundle = bundle_with_participants(vec![
            participant("Sham1", "Shaman", 0.0, 900.0),
            participant("Sham2", "Shaman", 0.0, 800.0),
            participant("Sham3", "Shaman", 0.0, 700.0),
            participant("Sham4", "Shaman", 0.0, 600.0),
            participant("Pri1", "Priest", 0.0, 850.0),
            participant("Pri2", "Priest", 0.0, 650.0),
            participant("Dru1", "Druid", 0.0, 500.0),
            participant("Dru2", "Druid", 0.0, 400.0),
        ]);
        for name in [
            "Sham1", "Sham2", "Sham3", "Sham4", "Pri1", "Pri2", "Dru1", "Dru2",
        ] {
            bundle.roles.insert(name.to_string(), PrimaryRole::Healer);
        }

        let (rosters, _, mut board) = seeded(&bundle);
        apply_healer_awards(&bundle, &rosters, &mut board);

        let rows = board.panel(PanelKey::HealerAwards).unwrap();
        // Top-3 shamans, descending awards
        assert_eq!(rows["sham1"].points, 15.0);
        assert_eq!(rows["sham2"].points, 10.0);
        assert_eq!(rows["sham3"].points, 5.0);
        assert!(!rows.contains_key("sham4"));
        // Top-2 priests
        assert_eq!(rows["pri1"].points, 12.0);
        assert_eq!(rows["pri2"].points, 6.0);
        // Top-1 druid
        assert_eq!(rows["dru1"].points, 10.0);
        assert!(!rows.contains_key("dru2"));
    }

    #[test]
    fn test_sunder_all_at_average_scores_zero() {
        let mut bundle = bundle_with_participants(vec![
            participant("A", "Warrior", 1.0, 0.0),
            participant("B", "Warrior", 1.0, 0.0),
            participant("C", "Rogue", 1.0, 0.0),
            participant("D", "Rogue", 1.0, 0.0),
        ]);
        bundle.sunders = ["A", "B", "C", "D"]
            .iter()
            .map(|n| SunderRow {
                name: n.to_string(),
                count: 10.0,
            })
            .collect();

        let (rosters, _, mut board) = seeded(&bundle);
        apply_sunders(&bundle, &rosters, &mut board);

        // avg 10, everyone at 100% → 0 points each → no rows stored
        assert!(!board.has_panel(PanelKey::Sunders));
    }

    #[test]
    fn test_sunder_steps_and_tank_exclusion() {
        let mut bundle = bundle_with_participants(vec![
            participant("Tank", "Warrior", 1.0, 0.0),
            participant("Slacker", "Rogue", 1.0, 0.0),
            participant("Carrier", "Warrior", 1.0, 0.0),
        ]);
        bundle.assignments = vec![BossAssignment {
            boss: "Ragnaros".to_string(),
            slot: "Main Tank".to_string(),
            player: "Tank".to_string(),
        }];
        // Tank's huge count must not inflate the average
        bundle.sunders = vec![
            SunderRow { name: "Tank".to_string(), count: 100.0 },
            SunderRow { name: "Slacker".to_string(), count: 2.0 },
            SunderRow { name: "Carrier".to_string(), count: 18.0 },
        ];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_sunders(&bundle, &rosters, &mut board);

        let rows = board.panel(PanelKey::Sunders).unwrap();
        assert!(!rows.contains_key("tank"));
        // avg = (2+18)/2 = 10; slacker at 20% → −20, carrier at 180% → +10
        assert_eq!(rows["slacker"].points, -20.0);
        assert_eq!(rows["carrier"].points, 10.0);
    }

    #[test]
    fn test_sunder_zero_average_is_noop() {
        let mut bundle = bundle_with_participants(vec![
            participant("A", "Warrior", 1.0, 0.0),
            participant("B", "Rogue", 1.0, 0.0),
        ]);
        bundle.sunders = vec![
            SunderRow { name: "A".to_string(), count: 0.0 },
            SunderRow { name: "B".to_string(), count: 0.0 },
        ];

        let (rosters, _, mut board) = seeded(&bundle);
        apply_sunders(&bundle, &rosters, &mut board);

        assert!(!board.has_panel(PanelKey::Sunders));
    }

    #[test]
    fn test_performance_penalty_skipped_without_stats() {
        let mut bundle = bundle_with_participants(vec![participant("Slow", "Mage", 100.0, 0.0)]);
        bundle.roles.insert("Slow".to_string(), PrimaryRole::Damage);

        let (rosters, _, mut board) = seeded(&bundle);
        apply_performance_penalties(&bundle, &rosters, &mut board);
        assert!(!board.has_panel(PanelKey::Performance));
    }

    #[test]
    fn test_performance_penalty_steps() {
        let mut bundle = bundle_with_participants(vec![
            participant("Slow", "Mage", 50_000.0, 0.0),
            participant("Fine", "Rogue", 200_000.0, 0.0),
            participant("Weakheal", "Priest", 0.0, 20_000.0),
        ]);
        bundle.raid_stats = Some(crate::datasets::RaidStats {
            active_seconds: 1000.0,
        });
        bundle.roles.insert("Slow".to_string(), PrimaryRole::Damage);
        bundle.roles.insert("Fine".to_string(), PrimaryRole::Damage);
        bundle
            .roles
            .insert("Weakheal".to_string(), PrimaryRole::Healer);

        let (rosters, _, mut board) = seeded(&bundle);
        apply_performance_penalties(&bundle, &rosters, &mut board);

        let rows = board.panel(PanelKey::Performance).unwrap();
        // 50 dps < 60 → −20
        assert_eq!(rows["slow"].points, -20.0);
        // 200 dps clears every threshold → no row
        assert!(!rows.contains_key("fine"));
        // 20 hps < 25 → −20
        assert_eq!(rows["weakheal"].points, -20.0);
    }

    #[test]
    fn test_ability_panel_confirmed_filter() {
        let mut bundle = bundle_with_participants(vec![participant("In", "Mage", 1.0, 0.0)]);
        bundle.ability_tables.insert(
            PanelKey::Potions,
            vec![
                AbilityRow { name: "In".to_string(), points: 5.0, detail: None },
                AbilityRow { name: "Outsider".to_string(), points: 5.0, detail: None },
                AbilityRow { name: "Dummy Totem".to_string(), points: 5.0, detail: None },
            ],
        );

        let (rosters, mut dir, mut board) = seeded(&bundle);
        apply_ability_panels(&bundle, &rosters, &mut dir, &mut board);

        let rows = board.panel(PanelKey::Potions).unwrap();
        assert!(rows.contains_key("in"));
        assert!(!rows.contains_key("outsider"));
        assert!(!rows.contains_key("dummy totem"));
    }

    #[test]
    fn test_scorch_fallback_admits_registered_unconfirmed() {
        let mut bundle = bundle_with_participants(vec![participant("In", "Mage", 1.0, 0.0)]);
        bundle.ability_tables.insert(
            PanelKey::Scorch,
            vec![
                AbilityRow { name: "Helper".to_string(), points: 3.0, detail: None },
                AbilityRow { name: "Stranger".to_string(), points: 3.0, detail: None },
            ],
        );

        let (rosters, mut dir, mut board) = seeded(&bundle);
        // Helper got registered by an earlier computation step (e.g. a
        // manual gold payout) without being in the raid log
        dir.register("Helper");

        apply_ability_panels(&bundle, &rosters, &mut dir, &mut board);

        let rows = board.panel(PanelKey::Scorch).unwrap();
        assert!(rows.contains_key("helper"));
        assert!(!rows.contains_key("stranger"));
    }

    #[test]
    fn test_totem_grouped_names_fold() {
        let mut bundle = bundle_with_participants(vec![participant("Sham", "Shaman", 1.0, 0.0)]);
        bundle.ability_tables.insert(
            PanelKey::Totems,
            vec![
                AbilityRow { name: "Sham (Group 1)".to_string(), points: 4.0, detail: None },
                AbilityRow { name: "Sham (Group 5)".to_string(), points: 4.0, detail: None },
            ],
        );

        let (rosters, mut dir, mut board) = seeded(&bundle);
        apply_ability_panels(&bundle, &rosters, &mut dir, &mut board);

        let rows = board.panel(PanelKey::Totems).unwrap();
        assert_eq!(rows["sham"].points, 8.0);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_frost_resistance_dps_only() {
        let mut bundle = bundle_with_participants(vec![
            participant("Dps", "Mage", 1.0, 0.0),
            participant("Medic", "Priest", 0.0, 1.0),
            participant("Wall", "Warrior", 1.0, 0.0),
        ]);
        bundle.roles.insert("Medic".to_string(), PrimaryRole::Healer);
        bundle.roles.insert("Wall".to_string(), PrimaryRole::Tank);
        bundle.ability_tables.insert(
            PanelKey::FrostResistance,
            vec![
                AbilityRow { name: "Dps".to_string(), points: 10.0, detail: None },
                AbilityRow { name: "Medic".to_string(), points: 10.0, detail: None },
                AbilityRow { name: "Wall".to_string(), points: 10.0, detail: None },
            ],
        );

        let (rosters, mut dir, mut board) = seeded(&bundle);
        apply_ability_panels(&bundle, &rosters, &mut dir, &mut board);

        let rows = board.panel(PanelKey::FrostResistance).unwrap();
        assert!(rows.contains_key("dps"));
        assert!(!rows.contains_key("medic"));
        assert!(!rows.contains_key("wall"));
    }

    #[test]
    fn test_streak_tiers() {
        assert_eq!(streak_points(12), 15.0);
        assert_eq!(streak_points(8), 15.0);
        assert_eq!(streak_points(7), 12.0);
        assert_eq!(streak_points(6), 9.0);
        assert_eq!(streak_points(5), 6.0);
        assert_eq!(streak_points(4), 3.0);
        assert_eq!(streak_points(3), 0.0);
        assert_eq!(streak_points(0), 0.0);
    }

    #[test]
    fn test_guild_bonus_only_for_registered() {
        let mut bundle = bundle_with_participants(vec![participant("Member", "Mage", 1.0, 0.0)]);
        bundle.guild_roster = vec![
            crate::datasets::RosterMember { name: "Member".to_string(), class: "Mage".to_string() },
            crate::datasets::RosterMember { name: "Benched".to_string(), class: "Rogue".to_string() },
        ];

        let (_rosters, dir, mut board) = seeded(&bundle);
        apply_guild_bonus(&bundle, &dir, &mut board);

        let rows = board.panel(PanelKey::GuildBonus).unwrap();
        assert_eq!(rows["member"].points, GUILD_BONUS_POINTS);
        assert!(!rows.contains_key("benched"));
    }
}
