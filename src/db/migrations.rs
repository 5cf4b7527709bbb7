use anyhow::{bail, Context, Result};
use rusqlite::{Connection, Transaction};

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "store version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => {
            // Stores created before schema versioning carry an emotions
            // table without the id/created_at columns. Rebuild those in
            // place so their rows survive the upgrade.
            if has_legacy_emotions_table(tx)? {
                rebuild_legacy_emotions_table(tx)?;
            }
            tx.execute_batch(include_str!("schemas/schema_v1.sql"))
                .context("failed to execute schema_v1.sql")?;
            Ok(())
        }
        _ => bail!("unknown migration target version: {version}"),
    }
}

fn has_legacy_emotions_table(tx: &Transaction<'_>) -> Result<bool> {
    let exists: bool = tx
        .query_row(
            "SELECT EXISTS (
                 SELECT 1 FROM sqlite_master
                 WHERE type = 'table' AND name = 'emotions'
             )",
            [],
            |row| row.get(0),
        )
        .context("failed to look up emotions table")?;

    if !exists {
        return Ok(false);
    }

    Ok(!table_has_column(tx, "emotions", "id")?)
}

fn table_has_column(tx: &Transaction<'_>, table: &str, column: &str) -> Result<bool> {
    let mut stmt = tx
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("failed to read table info for {table}"))?;

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

fn rebuild_legacy_emotions_table(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        "CREATE TABLE emotions_new (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             timestamp REAL NOT NULL,
             emotion TEXT NOT NULL,
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
         );
         INSERT INTO emotions_new (timestamp, emotion)
             SELECT timestamp, emotion FROM emotions ORDER BY timestamp;
         DROP TABLE emotions;
         ALTER TABLE emotions_new RENAME TO emotions;",
    )
    .context("failed to rebuild legacy emotions table")?;

    let migrated: i64 = tx.query_row("SELECT COUNT(*) FROM emotions", [], |row| row.get(0))?;
    log::info!("Rebuilt legacy emotions table ({migrated} rows carried over)");

    Ok(())
}
