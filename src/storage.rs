//! SQLite persistence for samples and session exports.

use rusqlite::{params, Connection, OptionalExtension};

use crate::engine::events::Timestamp;
use crate::error::{EngineError, Result};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::metrics::export::{fingerprint_of, SessionExport};
use crate::metrics::MetricSnapshot;

pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn new(path: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS samples (
                ts INTEGER NOT NULL,
                viewer_count INTEGER NOT NULL,
                peak_viewers INTEGER NOT NULL,
                total_likes INTEGER NOT NULL,
                total_gifts INTEGER NOT NULL,
                total_comments INTEGER NOT NULL,
                engagement_rate REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS exports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                session_start INTEGER NOT NULL,
                fingerprint TEXT NOT NULL,
                body TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn persist_sample(&mut self, ts: Timestamp, m: &MetricSnapshot) -> Result<()> {
        self.conn.execute(
            "INSERT INTO samples (ts, viewer_count, peak_viewers, total_likes, total_gifts, total_comments, engagement_rate)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ts as i64,
                m.viewer_count as i64,
                m.peak_viewers as i64,
                m.total_likes as i64,
                m.total_gifts as i64,
                m.total_comments as i64,
                m.engagement_rate
            ],
        )?;
        Ok(())
    }

    pub fn sample_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Store a full export; returns its fingerprint.
    pub fn persist_export(&mut self, ts: Timestamp, export: &SessionExport) -> Result<String> {
        let body = serde_json::to_string(export)?;
        let fingerprint = fingerprint_of(body.as_bytes());
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO exports (ts, session_start, fingerprint, body) VALUES (?1, ?2, ?3, ?4)",
            params![ts as i64, export.session.start as i64, fingerprint, body],
        )?;
        tx.commit()?;
        log(
            Level::Debug,
            Domain::Storage,
            "export_persisted",
            obj(&[("fingerprint", v_str(&fingerprint)), ("ts", serde_json::json!(ts))]),
        );
        Ok(fingerprint)
    }

    /// Most recent export. The stored body is checked against its fingerprint
    /// before it is parsed.
    pub fn load_latest_export(&self) -> Result<Option<SessionExport>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT fingerprint, body FROM exports ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((stored, body)) = row else {
            return Ok(None);
        };
        let actual = fingerprint_of(body.as_bytes());
        if actual != stored {
            return Err(EngineError::invalid(
                "export",
                format!("fingerprint mismatch: stored {} computed {}", stored, actual),
            ));
        }
        Ok(Some(SessionExport::from_json(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::export::{History, SessionBounds};
    use tempfile::tempdir;

    fn export(start: Timestamp, likes: u64) -> SessionExport {
        SessionExport {
            session: SessionBounds {
                start,
                end: start + 10,
                duration_ms: 10,
            },
            metrics: MetricSnapshot {
                total_likes: likes,
                ..Default::default()
            },
            events: Vec::new(),
            milestones: Vec::new(),
            history: History::default(),
        }
    }

    #[test]
    fn test_latest_export_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let mut store = StateStore::new(path.to_str().unwrap()).unwrap();
        store.init().unwrap();
        assert!(store.load_latest_export().unwrap().is_none());

        store.persist_export(1, &export(0, 5)).unwrap();
        let fp = store.persist_export(2, &export(0, 9)).unwrap();
        assert_eq!(fp.len(), 64);

        // reopen to make sure it hit disk
        drop(store);
        let store = StateStore::new(path.to_str().unwrap()).unwrap();
        let latest = store.load_latest_export().unwrap().unwrap();
        assert_eq!(latest.metrics.total_likes, 9);
    }

    #[test]
    fn test_samples() {
        let mut store = StateStore::in_memory().unwrap();
        store.init().unwrap();
        store.init().unwrap();
        let m = MetricSnapshot {
            viewer_count: 3,
            ..Default::default()
        };
        store.persist_sample(1_000, &m).unwrap();
        store.persist_sample(2_000, &m).unwrap();
        assert_eq!(store.sample_count().unwrap(), 2);
    }

    #[test]
    fn test_tampered_export_rejected() {
        let mut store = StateStore::in_memory().unwrap();
        store.init().unwrap();
        store.persist_export(1, &export(0, 5)).unwrap();
        store
            .conn
            .execute("UPDATE exports SET body = replace(body, '\"totalLikes\":5', '\"totalLikes\":6')", [])
            .unwrap();
        let err = store.load_latest_export().unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}
