// 📋 Panel Accumulator
// Enumerated scoring categories + additive player→points maps
//
// Panel keys are a closed enum on purpose: the legacy habit of free-form
// string keys let a typo silently open an orphan panel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::eligibility::name_key;

// ============================================================================
// PANEL KEYS
// ============================================================================

/// Every scoring category the engine can produce, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKey {
    Base,
    DamageRank,
    HealingRank,
    GodGamer,
    HealerAwards,
    Sunders,
    Performance,
    Potions,
    Runes,
    Totems,
    Interrupts,
    Disarms,
    CurseRecklessness,
    CurseElements,
    CurseShadow,
    FaerieFire,
    Scorch,
    DemoShout,
    Polymorph,
    PowerInfusion,
    Decurses,
    FrostResistance,
    WorldBuffs,
    VoidDamage,
    BigBuyer,
    GearBonus,
    Streaks,
    GuildBonus,
    ManualPoints,
}

impl PanelKey {
    pub const ALL: &'static [PanelKey] = &[
        PanelKey::Base,
        PanelKey::DamageRank,
        PanelKey::HealingRank,
        PanelKey::GodGamer,
        PanelKey::HealerAwards,
        PanelKey::Sunders,
        PanelKey::Performance,
        PanelKey::Potions,
        PanelKey::Runes,
        PanelKey::Totems,
        PanelKey::Interrupts,
        PanelKey::Disarms,
        PanelKey::CurseRecklessness,
        PanelKey::CurseElements,
        PanelKey::CurseShadow,
        PanelKey::FaerieFire,
        PanelKey::Scorch,
        PanelKey::DemoShout,
        PanelKey::Polymorph,
        PanelKey::PowerInfusion,
        PanelKey::Decurses,
        PanelKey::FrostResistance,
        PanelKey::WorldBuffs,
        PanelKey::VoidDamage,
        PanelKey::BigBuyer,
        PanelKey::GearBonus,
        PanelKey::Streaks,
        PanelKey::GuildBonus,
        PanelKey::ManualPoints,
    ];

    /// Wire/storage key (matches the serde snake_case form)
    pub fn key(&self) -> &'static str {
        match self {
            PanelKey::Base => "base",
            PanelKey::DamageRank => "damage_rank",
            PanelKey::HealingRank => "healing_rank",
            PanelKey::GodGamer => "god_gamer",
            PanelKey::HealerAwards => "healer_awards",
            PanelKey::Sunders => "sunders",
            PanelKey::Performance => "performance",
            PanelKey::Potions => "potions",
            PanelKey::Runes => "runes",
            PanelKey::Totems => "totems",
            PanelKey::Interrupts => "interrupts",
            PanelKey::Disarms => "disarms",
            PanelKey::CurseRecklessness => "curse_recklessness",
            PanelKey::CurseElements => "curse_elements",
            PanelKey::CurseShadow => "curse_shadow",
            PanelKey::FaerieFire => "faerie_fire",
            PanelKey::Scorch => "scorch",
            PanelKey::DemoShout => "demo_shout",
            PanelKey::Polymorph => "polymorph",
            PanelKey::PowerInfusion => "power_infusion",
            PanelKey::Decurses => "decurses",
            PanelKey::FrostResistance => "frost_resistance",
            PanelKey::WorldBuffs => "world_buffs",
            PanelKey::VoidDamage => "void_damage",
            PanelKey::BigBuyer => "big_buyer",
            PanelKey::GearBonus => "gear_bonus",
            PanelKey::Streaks => "streaks",
            PanelKey::GuildBonus => "guild_bonus",
            PanelKey::ManualPoints => "manual_points",
        }
    }

    /// Display label for admin views
    pub fn label(&self) -> &'static str {
        match self {
            PanelKey::Base => "Base",
            PanelKey::DamageRank => "Damage Rank",
            PanelKey::HealingRank => "Healing Rank",
            PanelKey::GodGamer => "God Gamer",
            PanelKey::HealerAwards => "Healer Awards",
            PanelKey::Sunders => "Sunders",
            PanelKey::Performance => "Performance",
            PanelKey::Potions => "Potions",
            PanelKey::Runes => "Runes",
            PanelKey::Totems => "Totem Assignments",
            PanelKey::Interrupts => "Interrupts",
            PanelKey::Disarms => "Disarms",
            PanelKey::CurseRecklessness => "Curse of Recklessness",
            PanelKey::CurseElements => "Curse of the Elements",
            PanelKey::CurseShadow => "Curse of Shadow",
            PanelKey::FaerieFire => "Faerie Fire",
            PanelKey::Scorch => "Scorch",
            PanelKey::DemoShout => "Demoralizing Shout",
            PanelKey::Polymorph => "Polymorph",
            PanelKey::PowerInfusion => "Power Infusion",
            PanelKey::Decurses => "Decurses",
            PanelKey::FrostResistance => "Frost Resistance",
            PanelKey::WorldBuffs => "World Buffs",
            PanelKey::VoidDamage => "Void Damage",
            PanelKey::BigBuyer => "Big Buyer",
            PanelKey::GearBonus => "Gear Bonus",
            PanelKey::Streaks => "Attendance Streak",
            PanelKey::GuildBonus => "Guild Bonus",
            PanelKey::ManualPoints => "Manual Points",
        }
    }

    /// Parse a stored panel key. Unknown keys return None; snapshot rows
    /// with keys the engine no longer knows are skipped, not fatal.
    pub fn from_key(key: &str) -> Option<PanelKey> {
        PanelKey::ALL.iter().copied().find(|k| k.key() == key)
    }
}

// ============================================================================
// PANEL FILTERS
// ============================================================================

/// Which roster a panel admits.
///
/// `EngineRoster` is the legacy loose filter: any player the engine has
/// already registered via an earlier panel passes, confirmed or not. Only
/// scorch, streaks and the guild bonus use it (see DESIGN.md - preserved
/// asymmetry, computation order matters for these three).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelFilter {
    /// Player must be in the confirmed raid-log roster
    Confirmed,
    /// Player must already be registered in the engine's player directory
    EngineRoster,
    /// Confirmed AND primary role is damage
    ConfirmedDps,
}

/// Table-driven description of one precomputed per-ability panel.
pub struct AbilityPanelSpec {
    pub key: PanelKey,
    pub dataset: &'static str,
    pub filter: PanelFilter,
    /// Fold trailing "(...)" group markers before keying
    pub grouped: bool,
}

pub const ABILITY_PANELS: &[AbilityPanelSpec] = &[
    AbilityPanelSpec { key: PanelKey::Potions, dataset: "potions", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Runes, dataset: "runes", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Totems, dataset: "totems", filter: PanelFilter::Confirmed, grouped: true },
    AbilityPanelSpec { key: PanelKey::Interrupts, dataset: "interrupts", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Disarms, dataset: "disarms", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::CurseRecklessness, dataset: "curse_recklessness", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::CurseElements, dataset: "curse_elements", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::CurseShadow, dataset: "curse_shadow", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::FaerieFire, dataset: "faerie_fire", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Scorch, dataset: "scorch", filter: PanelFilter::EngineRoster, grouped: false },
    AbilityPanelSpec { key: PanelKey::DemoShout, dataset: "demo_shout", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Polymorph, dataset: "polymorph", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::PowerInfusion, dataset: "power_infusion", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::Decurses, dataset: "decurses", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::FrostResistance, dataset: "frost_resistance", filter: PanelFilter::ConfirmedDps, grouped: false },
    AbilityPanelSpec { key: PanelKey::WorldBuffs, dataset: "world_buffs", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::VoidDamage, dataset: "void_damage", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::BigBuyer, dataset: "big_buyer", filter: PanelFilter::Confirmed, grouped: false },
    AbilityPanelSpec { key: PanelKey::GearBonus, dataset: "gear_bonus", filter: PanelFilter::Confirmed, grouped: false },
];

// ============================================================================
// PLAYER DIRECTORY
// ============================================================================

/// One participant as the engine sees them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub class: String,
    pub confirmed: bool,
    pub is_tank: bool,
}

/// Canonical-key → player map. Registration keeps the first-seen display
/// casing; later sources may only fill in class/flags.
#[derive(Debug, Default, Clone)]
pub struct PlayerDirectory {
    players: BTreeMap<String, Player>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        PlayerDirectory::default()
    }

    /// Create-or-get by display name, returning the canonical key
    pub fn register(&mut self, display_name: &str) -> String {
        let key = name_key(display_name);

        self.players.entry(key.clone()).or_insert_with(|| Player {
            name: display_name.trim().to_string(),
            class: "Unknown".to_string(),
            confirmed: false,
            is_tank: false,
        });

        key
    }

    pub fn contains(&self, key: &str) -> bool {
        self.players.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Player> {
        self.players.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Player> {
        self.players.get_mut(key)
    }

    pub fn set_class(&mut self, key: &str, class: &str) {
        if let Some(player) = self.players.get_mut(key) {
            if player.class == "Unknown" && !class.trim().is_empty() && class != "Unknown" {
                player.class = class.trim().to_string();
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Player)> {
        self.players.iter()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

// ============================================================================
// PANEL BOARD
// ============================================================================

/// One accumulated cell of a panel
#[derive(Debug, Clone, Default)]
pub struct PanelCell {
    pub points: f64,
    pub detail: Option<String>,
}

/// All panels of one computation. Rows are additive; zero contributions
/// are dropped before they are ever stored, so "absent" and "zero" stay
/// distinguishable at the map level.
#[derive(Debug, Default, Clone)]
pub struct PanelBoard {
    panels: BTreeMap<PanelKey, BTreeMap<String, PanelCell>>,
}

impl PanelBoard {
    pub fn new() -> Self {
        PanelBoard::default()
    }

    /// Add points for a player. No-op when `pts` is exactly zero.
    pub fn add_row(&mut self, key: PanelKey, player_key: &str, pts: f64) {
        self.add_row_detail(key, player_key, pts, None);
    }

    /// Add points with an optional display detail ("92% uptime").
    /// A later detail replaces an earlier one; points accumulate.
    pub fn add_row_detail(
        &mut self,
        key: PanelKey,
        player_key: &str,
        pts: f64,
        detail: Option<String>,
    ) {
        if pts == 0.0 {
            return;
        }

        let cell = self
            .panels
            .entry(key)
            .or_default()
            .entry(player_key.to_string())
            .or_default();

        cell.points += pts;
        if detail.is_some() {
            cell.detail = detail;
        }
    }

    pub fn panel(&self, key: PanelKey) -> Option<&BTreeMap<String, PanelCell>> {
        self.panels.get(&key)
    }

    /// True when the panel has at least one row
    pub fn has_panel(&self, key: PanelKey) -> bool {
        self.panels.get(&key).map_or(false, |rows| !rows.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PanelKey, &BTreeMap<String, PanelCell>)> {
        self.panels.iter()
    }

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn row_count(&self) -> usize {
        self.panels.values().map(|rows| rows.len()).sum()
    }

    /// Sum of every panel contribution for one player (negatives included)
    pub fn player_total(&self, player_key: &str) -> f64 {
        self.panels
            .values()
            .filter_map(|rows| rows.get(player_key))
            .map(|cell| cell.points)
            .sum()
    }

    /// Sum of all rows in one panel
    pub fn panel_sum(&self, key: PanelKey) -> f64 {
        self.panels
            .get(&key)
            .map(|rows| rows.values().map(|c| c.points).sum())
            .unwrap_or(0.0)
    }
}

// ============================================================================
// TESTS
// ============================================================================
