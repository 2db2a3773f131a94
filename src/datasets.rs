// 📦 Dataset Gateway
// Typed shapes for every upstream dataset + the per-request immutable bundle
//
// Two-phase pipeline: gather() materializes everything the engine will look
// at into one DatasetBundle, then aggregation runs pure over it. Missing
// datasets are never errors - they deserialize to their empty default and
// the panel they feed simply contributes nothing.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::db::{self, Db, ManualEntry, SnapshotEntry};
use crate::errors::EngineError;
use crate::panels::{PanelKey, ABILITY_PANELS};

// ============================================================================
// DATASET NAMES
// ============================================================================

pub const DS_PARTICIPATION: &str = "participation";
pub const DS_RANK_POINTS: &str = "rank_points";
pub const DS_ASSIGNMENTS: &str = "assignments";
pub const DS_ROLES: &str = "roles";
pub const DS_SUNDERS: &str = "sunders";
pub const DS_STREAKS: &str = "streaks";
pub const DS_GUILD_ROSTER: &str = "guild_roster";
pub const DS_RAID_STATS: &str = "raid_stats";
pub const DS_LOOT_TOTAL: &str = "loot_total";

// ============================================================================
// DATASET SHAPES
// ============================================================================

/// One row of the raid-log participation dataset. Field renames follow the
/// log exporter's CSV headers; lowercase aliases accept the JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogParticipant {
    #[serde(rename = "Name", alias = "name")]
    pub name: String,

    #[serde(rename = "Class", alias = "class", default = "unknown_class")]
    pub class: String,

    #[serde(rename = "Damage", alias = "damage", default)]
    pub damage: f64,

    #[serde(rename = "Healing", alias = "healing", default)]
    pub healing: f64,
}

fn unknown_class() -> String {
    "Unknown".to_string()
}

/// Position-indexed rank point arrays plus the god-gamer gap tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankPointsConfig {
    #[serde(default = "default_damage_rank_points")]
    pub damage: Vec<f64>,

    #[serde(default = "default_healing_rank_points")]
    pub healing: Vec<f64>,

    #[serde(default)]
    pub god_gamer: GodGamerConfig,
}

fn default_damage_rank_points() -> Vec<f64> {
    vec![
        30.0, 25.0, 22.0, 20.0, 18.0, 16.0, 14.0, 12.0, 10.0, 8.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0,
    ]
}

fn default_healing_rank_points() -> Vec<f64> {
    vec![30.0, 25.0, 20.0, 16.0, 12.0, 10.0, 8.0, 6.0, 4.0, 2.0]
}

impl Default for RankPointsConfig {
    fn default() -> Self {
        RankPointsConfig {
            damage: default_damage_rank_points(),
            healing: default_healing_rank_points(),
            god_gamer: GodGamerConfig::default(),
        }
    }
}

/// Two-tier top-1 bonus: the gap to #2 decides the tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapTiers {
    pub low_gap: f64,
    pub high_gap: f64,
    pub low_bonus: f64,
    pub high_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GodGamerConfig {
    pub damage: GapTiers,
    pub healing: GapTiers,
}

impl Default for GodGamerConfig {
    fn default() -> Self {
        GodGamerConfig {
            damage: GapTiers {
                low_gap: 50_000.0,
                high_gap: 150_000.0,
                low_bonus: 10.0,
                high_bonus: 20.0,
            },
            healing: GapTiers {
                low_gap: 25_000.0,
                high_gap: 75_000.0,
                low_bonus: 10.0,
                high_bonus: 20.0,
            },
        }
    }
}

/// One boss-position assignment row; slots containing "tank" mark tanks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossAssignment {
    pub boss: String,
    pub slot: String,
    pub player: String,
}

impl BossAssignment {
    pub fn is_tank_slot(&self) -> bool {
        self.slot.to_lowercase().contains("tank")
    }
}

/// Primary role per player, from the role-map dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryRole {
    #[serde(alias = "dps", alias = "dmg")]
    Damage,
    #[serde(alias = "heal")]
    Healer,
    Tank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SunderRow {
    pub name: String,
    pub count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakRow {
    pub name: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,

    #[serde(default = "unknown_class")]
    pub class: String,
}

/// Aggregate timing for the raid night
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaidStats {
    #[serde(default)]
    pub active_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LootTotal {
    #[serde(default)]
    pub total_gold: i64,
}

/// One row of a precomputed per-ability point table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityRow {
    pub name: String,
    pub points: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ============================================================================
// BUNDLE
// ============================================================================

/// Everything one computation reads, gathered up-front and immutable after.
#[derive(Debug, Clone, Default)]
pub struct DatasetBundle {
    pub event_id: i64,
    pub locked: bool,
    pub participation: Vec<LogParticipant>,
    pub rank_points: RankPointsConfig,
    pub assignments: Vec<BossAssignment>,
    pub roles: HashMap<String, PrimaryRole>,
    pub sunders: Vec<SunderRow>,
    pub streaks: Vec<StreakRow>,
    pub guild_roster: Vec<RosterMember>,
    pub raid_stats: Option<RaidStats>,
    pub loot_total: i64,
    pub ability_tables: BTreeMap<PanelKey, Vec<AbilityRow>>,
    pub manual_entries: Vec<ManualEntry>,
    pub snapshot: Vec<SnapshotEntry>,
}

impl DatasetBundle {
    /// Manual mode is active once the event is locked or frozen rows exist
    pub fn manual_mode(&self) -> bool {
        self.locked || !self.snapshot.is_empty()
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// Read a dataset document and deserialize it; absent → empty default.
fn load_or_default<T>(conn: &Connection, event_id: i64, name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match db::get_dataset_payload(conn, event_id, name)? {
        Some(payload) => serde_json::from_str(&payload)
            .with_context(|| format!("Stored dataset '{}' has an unexpected shape", name)),
        None => Ok(T::default()),
    }
}

/// Same, but keeps "absent" distinguishable from "present and empty"
fn load_optional<T>(conn: &Connection, event_id: i64, name: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match db::get_dataset_payload(conn, event_id, name)? {
        Some(payload) => serde_json::from_str(&payload)
            .map(Some)
            .with_context(|| format!("Stored dataset '{}' has an unexpected shape", name)),
        None => Ok(None),
    }
}

/// Load participation rows from the log exporter's CSV
pub fn load_participation_csv(path: &Path) -> Result<Vec<LogParticipant>> {
    let mut rdr = csv::Reader::from_path(path).context("Failed to open participation CSV")?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: LogParticipant = result.context("Failed to deserialize participation row")?;
        rows.push(row);
    }

    Ok(rows)
}

// ============================================================================
// GATHER (fan-out)
// ============================================================================

struct CoreDatasets {
    participation: Vec<LogParticipant>,
    rank_points: RankPointsConfig,
    assignments: Vec<BossAssignment>,
    roles: HashMap<String, PrimaryRole>,
    sunders: Vec<SunderRow>,
}

struct MiscDatasets {
    streaks: Vec<StreakRow>,
    guild_roster: Vec<RosterMember>,
    raid_stats: Option<RaidStats>,
    loot_total: i64,
}

struct OverlayDatasets {
    locked: bool,
    manual_entries: Vec<ManualEntry>,
    snapshot: Vec<SnapshotEntry>,
}

async fn fetch_blocking<T, F>(db: &Db, read: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    let conn = db.acquire().await?;

    // The guard moves into the blocking task; if the request future is
    // dropped at the timeout boundary the task still finishes detached and
    // the guard returns the connection.
    tokio::task::spawn_blocking(move || read(&conn))
        .await
        .map_err(|e| EngineError::Computation(anyhow::anyhow!("dataset fetch task failed: {e}")))?
        .map_err(EngineError::Computation)
}

/// Gather every dataset for one event into an immutable bundle.
///
/// Fetches fan out as four concurrent groups, each on its own pooled
/// connection, and join before aggregation starts.
pub async fn gather(db: &Db, event_id: i64) -> Result<DatasetBundle, EngineError> {
    let core = fetch_blocking(db, move |conn| {
        Ok(CoreDatasets {
            participation: load_or_default(conn, event_id, DS_PARTICIPATION)?,
            rank_points: load_or_default(conn, event_id, DS_RANK_POINTS)?,
            assignments: load_or_default(conn, event_id, DS_ASSIGNMENTS)?,
            roles: load_or_default(conn, event_id, DS_ROLES)?,
            sunders: load_or_default(conn, event_id, DS_SUNDERS)?,
        })
    });

    let abilities = fetch_blocking(db, move |conn| {
        let mut tables = BTreeMap::new();
        for spec in ABILITY_PANELS {
            let rows: Vec<AbilityRow> = load_or_default(conn, event_id, spec.dataset)?;
            if !rows.is_empty() {
                tables.insert(spec.key, rows);
            }
        }
        Ok(tables)
    });

    let misc = fetch_blocking(db, move |conn| {
        Ok(MiscDatasets {
            streaks: load_or_default(conn, event_id, DS_STREAKS)?,
            guild_roster: load_or_default(conn, event_id, DS_GUILD_ROSTER)?,
            raid_stats: load_optional(conn, event_id, DS_RAID_STATS)?,
            loot_total: load_or_default::<LootTotal>(conn, event_id, DS_LOOT_TOTAL)?.total_gold,
        })
    });

    let overlay = fetch_blocking(db, move |conn| {
        Ok(OverlayDatasets {
            locked: db::is_event_locked(conn, event_id)?,
            manual_entries: db::get_manual_entries(conn, event_id)?,
            snapshot: db::get_snapshot_entries(conn, event_id)?,
        })
    });

    let (core, ability_tables, misc, overlay) =
        tokio::try_join!(core, abilities, misc, overlay)?;

    Ok(DatasetBundle {
        event_id,
        locked: overlay.locked,
        participation: core.participation,
        rank_points: core.rank_points,
        assignments: core.assignments,
        roles: core.roles,
        sunders: core.sunders,
        streaks: misc.streaks,
        guild_roster: misc.guild_roster,
        raid_stats: misc.raid_stats,
        loot_total: misc.loot_total,
        ability_tables,
        manual_entries: overlay.manual_entries,
        snapshot: overlay.snapshot,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn temp_db_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "raid_ledger_gateway_{}_{}.db",
            std::process::id(),
            tag
        ))
    }

    #[test]
    fn test_participant_accepts_json_aliases() {
        let row: LogParticipant =
            serde_json::from_str(r#"{"name":"Foo","class":"Mage","damage":123.0}"#).unwrap();
        assert_eq!(row.name, "Foo");
        assert_eq!(row.class, "Mage");
        assert_eq!(row.damage, 123.0);
        assert_eq!(row.healing, 0.0);
    }

    #[test]
    fn test_participant_defaults_class() {
        let row: LogParticipant = serde_json::from_str(r#"{"name":"Foo"}"#).unwrap();
        assert_eq!(row.class, "Unknown");
    }

    #[test]
    fn test_role_aliases() {
        let roles: HashMap<String, PrimaryRole> =
            serde_json::from_str(r#"{"a":"dps","b":"healer","c":"tank","d":"damage"}"#).unwrap();
        assert_eq!(roles["a"], PrimaryRole::Damage);
        assert_eq!(roles["b"], PrimaryRole::Healer);
        assert_eq!(roles["c"], PrimaryRole::Tank);
        assert_eq!(roles["d"], PrimaryRole::Damage);
    }

    #[test]
    fn test_rank_points_partial_config_fills_defaults() {
        let config: RankPointsConfig = serde_json::from_str(r#"{"damage":[50,40,30]}"#).unwrap();
        assert_eq!(config.damage, vec![50.0, 40.0, 30.0]);
        assert_eq!(config.healing, default_healing_rank_points());
        assert_eq!(config.god_gamer.damage.high_bonus, 20.0);
    }

    #[test]
    fn test_tank_slot_detection() {
        let mt = BossAssignment {
            boss: "Ragnaros".to_string(),
            slot: "Main Tank".to_string(),
            player: "Foo".to_string(),
        };
        let healer = BossAssignment {
            boss: "Ragnaros".to_string(),
            slot: "Raid Heal 1".to_string(),
            player: "Bar".to_string(),
        };
        assert!(mt.is_tank_slot());
        assert!(!healer.is_tank_slot());
    }

    #[tokio::test]
    async fn test_gather_degrades_missing_datasets_to_empty() {
        let path = temp_db_path("empty");
        let _ = std::fs::remove_file(&path);
        let db = Db::open(&path, 4, Duration::from_millis(500)).unwrap();

        let bundle = gather(&db, 99).await.unwrap();

        assert_eq!(bundle.event_id, 99);
        assert!(!bundle.manual_mode());
        assert!(bundle.participation.is_empty());
        assert!(bundle.ability_tables.is_empty());
        assert!(bundle.raid_stats.is_none());
        assert_eq!(bundle.loot_total, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_gather_reads_stored_datasets() {
        let path = temp_db_path("stored");
        let _ = std::fs::remove_file(&path);
        let db = Db::open(&path, 4, Duration::from_millis(500)).unwrap();

        {
            let conn = db.acquire().await.unwrap();
            db::upsert_dataset(
                &conn,
                5,
                DS_PARTICIPATION,
                r#"[{"name":"Foo","class":"Mage","damage":1000}]"#,
            )
            .unwrap();
            db::upsert_dataset(&conn, 5, DS_LOOT_TOTAL, r#"{"total_gold":10000}"#).unwrap();
            db::upsert_dataset(
                &conn,
                5,
                "potions",
                r#"[{"name":"Foo","points":5}]"#,
            )
            .unwrap();
        }

        let bundle = gather(&db, 5).await.unwrap();

        assert_eq!(bundle.participation.len(), 1);
        assert_eq!(bundle.loot_total, 10000);
        assert_eq!(bundle.ability_tables[&PanelKey::Potions].len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_gather_malformed_dataset_is_computation_error() {
        let path = temp_db_path("malformed");
        let _ = std::fs::remove_file(&path);
        let db = Db::open(&path, 4, Duration::from_millis(500)).unwrap();

        {
            let conn = db.acquire().await.unwrap();
            // Valid JSON, wrong shape: participation must be an array
            db::upsert_dataset(&conn, 6, DS_PARTICIPATION, r#"{"oops":true}"#).unwrap();
        }

        match gather(&db, 6).await {
            Err(EngineError::Computation(_)) => {}
            other => panic!("expected Computation error, got {:?}", other.map(|_| ())),
        }

        let _ = std::fs::remove_file(&path);
    }
}
