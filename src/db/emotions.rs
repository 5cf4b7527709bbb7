use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::params;

use super::models::{
    DateRange, DistributionEntry, EmotionCount, EmotionRecord, EmotionStat, EmotionSummary,
    MostRecent, StoredEmotion,
};
use super::{to_u64, unix_now, Database};

impl Database {
    /// Persists a batch of classified samples in a single transaction.
    /// Either every record lands or none do; arrival order is preserved
    /// through the autoincrement rowid.
    pub async fn insert_emotions(&self, records: Vec<EmotionRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to begin emotion insert transaction")?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO emotions (timestamp, emotion) VALUES (?1, ?2)")?;
                for record in &records {
                    stmt.execute(params![record.timestamp, record.emotion])
                        .with_context(|| {
                            format!("failed to insert emotion '{}'", record.emotion)
                        })?;
                }
            }
            tx.commit().context("failed to commit emotion batch")?;
            Ok(records.len())
        })
        .await
    }

    pub async fn count_emotions(&self) -> Result<u64> {
        self.execute(|conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM emotions", [], |row| row.get(0))
                .context("failed to count emotions")?;
            to_u64(total)
        })
        .await
    }

    /// Most frequent label among samples captured on the given UTC day.
    /// Ties resolve to the lexicographically smallest label.
    pub async fn most_common_on(&self, date: NaiveDate) -> Result<Option<EmotionCount>> {
        let day = date.format("%Y-%m-%d").to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT emotion, COUNT(*) AS count
                 FROM emotions
                 WHERE DATE(timestamp, 'unixepoch') = ?1
                 GROUP BY emotion
                 ORDER BY count DESC, emotion ASC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query(params![day])?;
            if let Some(row) = rows.next()? {
                Ok(Some(EmotionCount {
                    emotion: row.get(0)?,
                    count: to_u64(row.get::<_, i64>(1)?)?,
                }))
            } else {
                Ok(None)
            }
        })
        .await
    }

    /// Per-(day, emotion) counts over the trailing `days` window, with each
    /// count's share of its day. Days are UTC buckets; a non-positive window
    /// puts the cutoff in the future and yields nothing.
    pub async fn daily_stats(&self, days: i64) -> Result<Vec<EmotionStat>> {
        let cutoff = unix_now() - (days as f64) * 86_400.0;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "WITH date_emotions AS (
                     SELECT DATE(timestamp, 'unixepoch') AS day,
                            emotion,
                            COUNT(*) AS emotion_count
                     FROM emotions
                     WHERE timestamp >= ?1
                     GROUP BY day, emotion
                 ),
                 date_totals AS (
                     SELECT day, SUM(emotion_count) AS total_count
                     FROM date_emotions
                     GROUP BY day
                 )
                 SELECT de.day,
                        de.emotion,
                        de.emotion_count,
                        ROUND(CAST(de.emotion_count AS REAL) * 100.0 / dt.total_count, 2)
                 FROM date_emotions de
                 JOIN date_totals dt ON dt.day = de.day
                 ORDER BY de.day DESC, de.emotion_count DESC, de.emotion ASC",
            )?;

            let mut rows = stmt.query(params![cutoff])?;
            let mut stats = Vec::new();
            while let Some(row) = rows.next()? {
                stats.push(EmotionStat {
                    date: row.get(0)?,
                    emotion: row.get(1)?,
                    count: to_u64(row.get::<_, i64>(2)?)?,
                    percentage: row.get(3)?,
                });
            }

            Ok(stats)
        })
        .await
    }

    /// Dashboard rollup: total count, per-label distribution, most recent
    /// sample by capture time, and the span of days covered.
    pub async fn summary(&self) -> Result<EmotionSummary> {
        self.execute(|conn| {
            let total: i64 = conn
                .query_row("SELECT COUNT(*) FROM emotions", [], |row| row.get(0))
                .context("failed to count emotions")?;

            let mut summary = EmotionSummary {
                total_emotions_recorded: to_u64(total)?,
                emotion_distribution: Default::default(),
                most_recent: MostRecent::default(),
                date_range: DateRange::default(),
            };

            if total == 0 {
                return Ok(summary);
            }

            let mut stmt = conn.prepare(
                "SELECT emotion,
                        COUNT(*) AS count,
                        ROUND(CAST(COUNT(*) AS REAL) * 100.0 / ?1, 2) AS percentage
                 FROM emotions
                 GROUP BY emotion
                 ORDER BY count DESC",
            )?;
            let mut rows = stmt.query(params![total])?;
            while let Some(row) = rows.next()? {
                summary.emotion_distribution.insert(
                    row.get(0)?,
                    DistributionEntry {
                        count: to_u64(row.get::<_, i64>(1)?)?,
                        percentage: row.get(2)?,
                    },
                );
            }

            let (emotion, timestamp) = conn.query_row(
                "SELECT emotion, timestamp FROM emotions ORDER BY timestamp DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?;
            summary.most_recent = MostRecent {
                emotion: Some(emotion),
                timestamp: Some(timestamp),
            };

            let (start, end) = conn.query_row(
                "SELECT DATE(MIN(timestamp), 'unixepoch'),
                        DATE(MAX(timestamp), 'unixepoch')
                 FROM emotions",
                [],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                    ))
                },
            )?;
            summary.date_range = DateRange { start, end };

            Ok(summary)
        })
        .await
    }

    /// Every persisted row, newest capture first.
    pub async fn export_all(&self) -> Result<Vec<StoredEmotion>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, emotion, created_at
                 FROM emotions
                 ORDER BY timestamp DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(StoredEmotion {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    emotion: row.get(2)?,
                    created_at: row.get(3)?,
                });
            }

            Ok(records)
        })
        .await
    }

    /// Deletes every record. Refuses without the confirmation flag so a
    /// stray call cannot wipe the store.
    pub async fn clear_all(&self, confirm: bool) -> Result<u64> {
        if !confirm {
            bail!("confirmation required to clear the emotion store");
        }

        self.execute(|conn| {
            let deleted = conn
                .execute("DELETE FROM emotions", [])
                .context("failed to clear emotions")?;
            Ok(deleted as u64)
        })
        .await
    }

    /// Connectivity check backing the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.execute(|conn| {
            conn.query_row("SELECT 1", [], |_row| Ok(()))
                .context("store ping failed")
        })
        .await
    }
}
