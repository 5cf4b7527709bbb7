use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::Connection;

use crate::db::{run_migrations, to_u64};

/// Outcome of relocating a legacy store.
#[derive(Debug)]
pub struct MigrationReport {
    pub rows: u64,
    pub distribution: Vec<(String, u64)>,
    pub backup: Option<PathBuf>,
}

/// Copies a legacy store into the served location and upgrades its schema.
/// A pre-existing target is first copied aside to a timestamped backup, so
/// a bad run never costs the current data. Returns `None` when there is
/// nothing to migrate.
pub fn migrate_legacy_store(from: &Path, to: &Path) -> Result<Option<MigrationReport>> {
    if !from.exists() {
        info!("No legacy store at {}, nothing to migrate", from.display());
        return Ok(None);
    }

    verify_legacy_store(from)?;

    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    let backup = if to.exists() {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let file_name = to
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("emotions.db");
        let backup_path = to.with_file_name(format!("{file_name}.backup_{stamp}"));

        std::fs::copy(to, &backup_path).with_context(|| {
            format!("failed to back up existing store to {}", backup_path.display())
        })?;
        info!("Backed up existing store to {}", backup_path.display());
        Some(backup_path)
    } else {
        None
    };

    std::fs::copy(from, to).with_context(|| {
        format!(
            "failed to copy legacy store {} to {}",
            from.display(),
            to.display()
        )
    })?;

    let mut conn = Connection::open(to).context("failed to open relocated store")?;
    run_migrations(&mut conn).context("failed to upgrade relocated store")?;

    let rows: i64 = conn.query_row("SELECT COUNT(*) FROM emotions", [], |row| row.get(0))?;
    let mut distribution = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT emotion, COUNT(*) AS count
             FROM emotions
             GROUP BY emotion
             ORDER BY count DESC, emotion ASC",
        )?;
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            distribution.push((row.get::<_, String>(0)?, to_u64(row.get::<_, i64>(1)?)?));
        }
    }

    info!("Migrated {} rows into {}", rows, to.display());
    for (emotion, count) in &distribution {
        info!("  {emotion}: {count}");
    }

    Ok(Some(MigrationReport {
        rows: to_u64(rows)?,
        distribution,
        backup,
    }))
}

fn verify_legacy_store(path: &Path) -> Result<()> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open legacy store {}", path.display()))?;

    let has_table: bool = conn.query_row(
        "SELECT EXISTS (
             SELECT 1 FROM sqlite_master
             WHERE type = 'table' AND name = 'emotions'
         )",
        [],
        |row| row.get(0),
    )?;

    if !has_table {
        bail!("no emotions table found in {}", path.display());
    }

    Ok(())
}
