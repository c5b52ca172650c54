//! SQLite-backed event store.
//! The connection sits behind a mutex scoped to one statement, so neither
//! background loop ever holds storage across an await or a sleep.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{EventStore, LiveEvent};

pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) the event database at the given path.
    pub fn open(db_path: &Path) -> Result<Self, String> {
        let conn = Connection::open(db_path)
            .map_err(|e| format!("failed to open event store: {e}"))?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| format!("PRAGMA failed: {e}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                organizer_email TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                likes INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_events_end
                ON events(end_date, end_time);",
        )
        .map_err(|e| format!("create events table failed: {e}"))?;

        info!(path = %db_path.display(), "event store opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl EventStore for SqliteEventStore {
    fn list_live_events(&self) -> Result<Vec<LiveEvent>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, organizer_email, location, category, description,
                        start_date, end_date, start_time, end_time, likes
                 FROM events ORDER BY id ASC",
            )
            .map_err(|e| format!("event list prepare failed: {e}"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(LiveEvent {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    organizer_email: row.get(2)?,
                    location: row.get(3)?,
                    category: row.get(4)?,
                    description: row.get(5)?,
                    start_date: row.get(6)?,
                    end_date: row.get(7)?,
                    start_time: row.get(8)?,
                    end_time: row.get(9)?,
                    likes: row.get(10)?,
                })
            })
            .map_err(|e| format!("event list query failed: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("event row decode failed: {e}"))
    }

    fn delete_event(&self, id: i64) -> Result<(), String> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])
            .map_err(|e| format!("event delete failed: {e}"))?;
        if count == 0 {
            warn!(event_id = id, "delete matched no event row");
        }
        Ok(())
    }
}
