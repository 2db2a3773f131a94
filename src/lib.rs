// Raid Ledger - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod errors;
pub mod db;
pub mod eligibility;
pub mod panels;
pub mod datasets;
pub mod calculators;
pub mod manual;
pub mod snapshot;
pub mod gold;
pub mod engine;

// Re-export commonly used types
pub use errors::EngineError;
pub use db::{
    Db, PooledConn, ManualEntry, SnapshotEntry,
    setup_schema, ensure_event, set_event_locked, is_event_locked,
    upsert_dataset, get_dataset_payload,
    insert_manual_entries, get_manual_entries, load_manual_entries_csv,
    insert_snapshot_entries, get_snapshot_entries, clear_snapshot,
};
pub use datasets::{
    gather, load_participation_csv,
    DatasetBundle, LogParticipant, RankPointsConfig, GodGamerConfig, GapTiers,
    BossAssignment, PrimaryRole, SunderRow, StreakRow, RosterMember,
    RaidStats, LootTotal, AbilityRow,
};
pub use eligibility::{should_ignore, name_key, fold_group_suffix, confirmed_set};
pub use panels::{
    PanelKey, PanelFilter, PanelBoard, PanelCell, Player, PlayerDirectory,
    AbilityPanelSpec, ABILITY_PANELS,
};
pub use manual::{is_gold_entry, apply_manual_entries, ManualGoldRow, ManualOverlay};
pub use snapshot::{materialize, MaterializedSnapshot};
pub use gold::{compute_meta, player_gold, GoldMeta};
pub use engine::{
    evaluate, compute_effective, compute_debug, debug_report,
    EngineMode, EngineResult, PlayerTotal, PanelOut, PanelRowOut,
    DebugReport, PanelSumRow, ManualPointsDrift,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
