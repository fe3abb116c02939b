//! Scan table commands.

use anyhow::Result;
use chrono::{Local, TimeZone};

use scan::{BatchOutcome, ScanEntry};

use super::Session;

pub fn device_id(session: &Session, reset: bool) -> Result<()> {
    if reset {
        session.store.identity().clear_device_id();
        println!("Device id cleared.");
        return Ok(());
    }
    println!("{}", session.store.device_id());
    Ok(())
}

pub fn add(session: &Session, text: &str, dry_run: bool) -> Result<()> {
    let mut bench = session.workbench();
    bench.raw_mut().set(text);

    if dry_run {
        let preview = bench.preview();
        println!(
            "{} valid, {} invalid of {} lines",
            preview.valid.len(),
            preview.invalid,
            preview.total
        );
        return Ok(());
    }

    let outcome = bench.add_parsed_to_table()?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome) {
    println!(
        "Batch {}: added {}, skipped {} duplicate(s), {} invalid of {} lines",
        outcome.batch, outcome.added, outcome.skipped, outcome.invalid, outcome.total
    );
}

pub fn list(session: &Session, json: bool) -> Result<()> {
    if json {
        let records = session.store.get_all_scans();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let bench = session.workbench();
    if bench.is_empty() {
        println!("No scans.");
        return Ok(());
    }
    println!(
        "{:<32}  {:<12}  {:<10}  {:<19}  NOTES",
        "ID", "SERIAL", "IUC", "TIME"
    );
    for entry in bench.entries() {
        println!("{}", format_row(entry));
    }
    println!("{} scan(s) on device {}", bench.len(), bench.device_id());
    Ok(())
}

fn format_row(entry: &ScanEntry) -> String {
    let time = Local
        .timestamp_millis_opt(entry.timestamp)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "{:<32}  {:<12}  {:<10}  {:<19}  {}",
        entry.id,
        entry.serial,
        entry.iuc,
        time,
        entry.notes.as_deref().unwrap_or("")
    )
}

pub fn delete(session: &Session, id: &str) -> Result<()> {
    session.store.delete_scan(id)?;
    println!("Deleted {}.", id);
    Ok(())
}

pub fn notes(session: &Session, id: &str, notes: &str) -> Result<()> {
    session.store.update_scan_notes(id, notes)?;
    println!("Updated {}.", id);
    Ok(())
}

pub fn clear(session: &Session) -> Result<()> {
    let removed = session.workbench().clear_all()?;
    println!("Removed {} scan(s).", removed);
    Ok(())
}

pub fn undo(session: &Session) -> Result<()> {
    let outcome = session.workbench().undo_last_batch()?;
    if outcome.removed == 0 {
        println!("Nothing to undo.");
        return Ok(());
    }
    match outcome.next_batch {
        Some(tag) => println!("Removed {} scan(s). Previous batch: {}", outcome.removed, tag),
        None => println!("Removed {} scan(s).", outcome.removed),
    }
    Ok(())
}

pub fn migrate(session: &Session) -> Result<()> {
    let migrated = session.store.migrate_legacy_blob()?;
    println!("Migrated {} scan(s).", migrated);
    Ok(())
}
