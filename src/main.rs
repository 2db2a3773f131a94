// Raid Ledger - Operator CLI
// Imports datasets, locks events, and freezes snapshots. This binary is the
// "external collaborator" of the engine: the engine itself never writes.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::time::Duration;

use raid_ledger::panels::ABILITY_PANELS;
use raid_ledger::{datasets, db, engine, Db, SnapshotEntry};

const USAGE: &str = "Usage:
  raid-ledger import <event-id> <dir>   Import datasets from a directory
  raid-ledger lock <event-id>           Lock an event (manual mode)
  raid-ledger unlock <event-id>         Unlock an event (auto mode)
  raid-ledger snapshot <event-id>       Freeze current auto panels + lock
  raid-ledger report <event-id>         Print the effective EngineResult";

fn db_path() -> String {
    env::var("RAID_LEDGER_DB").unwrap_or_else(|_| "raid_ledger.db".to_string())
}

fn open_db() -> Result<Db> {
    Db::open(db_path(), 4, Duration::from_secs(2))
}

fn parse_event_id(args: &[String]) -> Result<i64> {
    args.get(2)
        .and_then(|s| s.parse().ok())
        .context("Expected a numeric event id")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => run_import(&args).await,
        Some("lock") => run_set_lock(&args, true).await,
        Some("unlock") => run_set_lock(&args, false).await,
        Some("snapshot") => run_snapshot(&args).await,
        Some("report") => run_report(&args).await,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

/// Dataset names the engine actually reads
fn known_dataset(name: &str) -> bool {
    let fixed = [
        datasets::DS_PARTICIPATION,
        datasets::DS_RANK_POINTS,
        datasets::DS_ASSIGNMENTS,
        datasets::DS_ROLES,
        datasets::DS_SUNDERS,
        datasets::DS_STREAKS,
        datasets::DS_GUILD_ROSTER,
        datasets::DS_RAID_STATS,
        datasets::DS_LOOT_TOTAL,
    ];

    fixed.contains(&name) || ABILITY_PANELS.iter().any(|spec| spec.dataset == name)
}

async fn run_import(args: &[String]) -> Result<()> {
    let event_id = parse_event_id(args)?;
    let dir = args.get(3).context("Expected a directory to import from")?;
    let dir = Path::new(dir);

    if !dir.is_dir() {
        bail!("Not a directory: {:?}", dir);
    }

    println!("🗄️  Importing event {} from {:?}", event_id, dir);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let pool = open_db()?;
    let conn = pool.acquire().await?;
    db::ensure_event(&conn, event_id, "")?;

    // 1. Participation CSV (the raid-log roster export)
    let participation_csv = dir.join("participation.csv");
    if participation_csv.is_file() {
        let rows = datasets::load_participation_csv(&participation_csv)?;
        let payload = serde_json::to_string(&rows)?;
        db::upsert_dataset(&conn, event_id, datasets::DS_PARTICIPATION, &payload)?;
        println!("✓ participation: {} rows", rows.len());
    }

    // 2. Manual entries CSV (management's reward/deduction sheet)
    let manual_csv = dir.join("manual_entries.csv");
    if manual_csv.is_file() {
        let entries = db::load_manual_entries_csv(&manual_csv)?;
        let inserted = db::insert_manual_entries(&conn, event_id, &entries)?;
        println!(
            "✓ manual entries: {} rows ({} new, {} duplicates)",
            entries.len(),
            inserted,
            entries.len() - inserted
        );
    }

    // 3. Every *.json file becomes a dataset named after its stem
    let mut imported = 0;
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {:?}", dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    entries.sort();

    for path in entries {
        let name = match path.file_stem().and_then(|s| s.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let payload = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        db::upsert_dataset(&conn, event_id, &name, &payload)?;

        if known_dataset(&name) {
            println!("✓ {}", name);
        } else {
            println!("⚠️  {} (stored, but no panel reads it)", name);
        }
        imported += 1;
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete: {} JSON datasets", imported);

    Ok(())
}

async fn run_set_lock(args: &[String], locked: bool) -> Result<()> {
    let event_id = parse_event_id(args)?;

    let pool = open_db()?;
    let conn = pool.acquire().await?;
    db::set_event_locked(&conn, event_id, locked)?;

    if locked {
        println!("🔒 Event {} locked (manual mode)", event_id);
    } else {
        println!("🔓 Event {} unlocked (auto mode)", event_id);
    }

    Ok(())
}

/// Freeze the current auto computation into snapshot rows, then lock.
async fn run_snapshot(args: &[String]) -> Result<()> {
    let event_id = parse_event_id(args)?;
    let pool = open_db()?;

    println!("🧊 Freezing event {}...", event_id);

    // Compute from live datasets regardless of any existing snapshot
    let bundle = {
        let mut bundle = datasets::gather(&pool, event_id).await?;
        bundle.snapshot.clear();
        bundle.locked = false;
        bundle
    };
    let result = engine::evaluate(&bundle);

    let mut rows = Vec::new();
    for panel in &result.panels {
        for row in &panel.rows {
            rows.push(SnapshotEntry {
                panel_key: panel.key.key().to_string(),
                character_name: row.name.clone(),
                character_class: row.class.clone(),
                point_value_original: row.points,
                point_value_edited: None,
            });
        }
    }

    let conn = pool.acquire().await?;
    let replaced = db::clear_snapshot(&conn, event_id)?;
    let inserted = db::insert_snapshot_entries(&conn, event_id, &rows)?;
    db::set_event_locked(&conn, event_id, true)?;

    if replaced > 0 {
        println!("✓ Replaced {} previously frozen rows", replaced);
    }
    println!("✓ Froze {} rows across {} panels", inserted, result.panels.len());
    println!("✅ Event {} snapshotted and locked", event_id);

    Ok(())
}

async fn run_report(args: &[String]) -> Result<()> {
    let event_id = parse_event_id(args)?;
    let pool = open_db()?;

    let result = engine::compute_effective(&pool, event_id).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
