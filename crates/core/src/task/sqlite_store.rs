//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    Comic, CreateTaskRequest, Phase, PhaseDurations, Task, TaskError, TaskFilter, TaskStatus,
    TaskStore,
};

const TASK_COLUMNS: &str = "id, created_at, updated_at, status, input_text, attachment_count, \
     attachment_urls, is_valid, reject_reason, messages, error_message, character_sheet_url, \
     scenario_secs, sheet_secs, episode_secs, total_secs";

/// SQLite-backed task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl ToString) -> TaskError {
    TaskError::Database(e.to_string())
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl SqliteTaskStore {
    /// Open (or create) the task database at `path`.
    pub fn new(path: &Path) -> Result<Self, TaskError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                status TEXT NOT NULL,
                input_text TEXT NOT NULL,
                attachment_count INTEGER NOT NULL DEFAULT 0,
                attachment_urls TEXT NOT NULL DEFAULT '[]',
                is_valid INTEGER,
                reject_reason TEXT,
                messages TEXT NOT NULL DEFAULT '[]',
                error_message TEXT,
                character_sheet_url TEXT,
                scenario_secs REAL,
                sheet_secs REAL,
                episode_secs REAL,
                total_secs REAL
            );

            CREATE TABLE IF NOT EXISTS comics (
                task_id TEXT PRIMARY KEY REFERENCES tasks(id) ON DELETE CASCADE,
                episodes TEXT NOT NULL,
                image_urls TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
            CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
            "#,
        )
        .map_err(db_err)
    }

    fn build_where_clause(filter: &TaskFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if filter.statuses.is_empty() {
            return (String::new(), params);
        }

        let placeholders = vec!["?"; filter.statuses.len()].join(", ");
        for status in &filter.statuses {
            params.push(Box::new(status.as_str()));
        }

        (format!("WHERE status IN ({})", placeholders), params)
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let created_at: String = row.get(1)?;
        let updated_at: String = row.get(2)?;
        let status: String = row.get(3)?;
        let attachment_count: i64 = row.get(5)?;
        let attachment_urls: String = row.get(6)?;
        let messages: String = row.get(9)?;

        Ok(Task {
            id: row.get(0)?,
            created_at: parse_timestamp(1, &created_at)?,
            updated_at: parse_timestamp(2, &updated_at)?,
            status: status
                .parse()
                .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?,
            input_text: row.get(4)?,
            attachment_count: attachment_count.max(0) as usize,
            attachment_urls: parse_json(6, &attachment_urls)?,
            is_valid: row.get(7)?,
            reject_reason: row.get(8)?,
            messages: parse_json(9, &messages)?,
            error_message: row.get(10)?,
            character_sheet_url: row.get(11)?,
            durations: PhaseDurations {
                scenario_secs: row.get(12)?,
                sheet_secs: row.get(13)?,
                episode_secs: row.get(14)?,
                total_secs: row.get(15)?,
            },
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Task>, TaskError> {
        conn.query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
            params![id],
            Self::row_to_task,
        )
        .optional()
        .map_err(db_err)
    }

    fn fetch_existing(conn: &Connection, id: &str) -> Result<Task, TaskError> {
        Self::fetch(conn, id)?.ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    fn current_status(conn: &Connection, id: &str) -> Result<TaskStatus, TaskError> {
        Ok(Self::fetch_existing(conn, id)?.status)
    }

    /// Build the error for a CAS that did not match.
    fn transition_error(
        conn: &Connection,
        id: &str,
        from: TaskStatus,
        to: TaskStatus,
    ) -> TaskError {
        match Self::current_status(conn, id) {
            Ok(current) => TaskError::InvalidTransition {
                task_id: id.to_string(),
                from,
                to,
                current,
            },
            Err(e) => e,
        }
    }

    fn compare_and_set(
        conn: &Connection,
        id: &str,
        from: TaskStatus,
        to: TaskStatus,
        error_message: Option<&str>,
    ) -> Result<(), TaskError> {
        if !from.can_transition_to(to) {
            return Err(Self::transition_error(conn, id, from, to));
        }

        let updated = conn
            .execute(
                "UPDATE tasks SET status = ?1, error_message = COALESCE(?2, error_message), updated_at = ?3 WHERE id = ?4 AND status = ?5",
                params![to.as_str(), error_message, timestamp(Utc::now()), id, from.as_str()],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(Self::transition_error(conn, id, from, to));
        }
        Ok(())
    }

    /// Run a single-row field update, mapping "no row" to `NotFound`.
    fn update_fields(
        conn: &Connection,
        id: &str,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<(), TaskError> {
        match conn.execute(sql, params).map_err(db_err)? {
            0 => Err(TaskError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }
}

impl TaskStore for SqliteTaskStore {
    fn create(&self, request: CreateTaskRequest) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tasks (id, created_at, updated_at, status, input_text, attachment_count) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                timestamp(now),
                timestamp(now),
                TaskStatus::Pending.as_str(),
                request.input_text,
                request.attachment_count as i64,
            ],
        )
        .map_err(db_err)?;

        Self::fetch_existing(&conn, &id)
    }

    fn get(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM tasks {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            TASK_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_task)
            .map_err(db_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn count(&self, filter: &TaskFilter) -> Result<i64, TaskError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tasks {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn transition(&self, id: &str, from: TaskStatus, to: TaskStatus) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::compare_and_set(&conn, id, from, to, None)?;
        Self::fetch_existing(&conn, id)
    }

    fn mark_failed(&self, id: &str, from: TaskStatus, message: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::compare_and_set(&conn, id, from, TaskStatus::Failed, Some(message))?;
        Self::fetch_existing(&conn, id)
    }

    fn record_validation(
        &self,
        id: &str,
        is_valid: bool,
        reject_reason: Option<&str>,
        messages: &[String],
    ) -> Result<(), TaskError> {
        let conn = self.conn.lock().unwrap();

        let messages_json = serde_json::to_string(messages).map_err(db_err)?;
        let updated = conn
            .execute(
                "UPDATE tasks SET is_valid = ?1, reject_reason = ?2, messages = ?3, updated_at = ?4 WHERE id = ?5 AND is_valid IS NULL",
                params![is_valid, reject_reason, messages_json, timestamp(Utc::now()), id],
            )
            .map_err(db_err)?;

        if updated == 0 {
            // Distinguish a missing task from a second write.
            Self::fetch_existing(&conn, id)?;
            return Err(TaskError::AlreadySet {
                task_id: id.to_string(),
                field: "is_valid",
            });
        }
        Ok(())
    }

    fn record_duration(&self, id: &str, phase: Phase, secs: f64) -> Result<(), TaskError> {
        let conn = self.conn.lock().unwrap();
        let column = phase.column();
        let sql = format!(
            "UPDATE tasks SET {column} = COALESCE({column}, ?1) WHERE id = ?2",
            column = column
        );
        Self::update_fields(&conn, id, &sql, params![secs, id])
    }

    fn set_character_sheet_url(&self, id: &str, url: &str) -> Result<(), TaskError> {
        let conn = self.conn.lock().unwrap();
        Self::update_fields(
            &conn,
            id,
            "UPDATE tasks SET character_sheet_url = ?1, updated_at = ?2 WHERE id = ?3",
            params![url, timestamp(Utc::now()), id],
        )
    }

    fn set_attachment_urls(&self, id: &str, urls: &[String]) -> Result<(), TaskError> {
        let conn = self.conn.lock().unwrap();
        let urls_json = serde_json::to_string(urls).map_err(db_err)?;
        Self::update_fields(
            &conn,
            id,
            "UPDATE tasks SET attachment_urls = ?1 WHERE id = ?2",
            params![urls_json, id],
        )
    }

    fn complete(&self, comic: &Comic) -> Result<Task, TaskError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        Self::compare_and_set(
            &tx,
            &comic.task_id,
            TaskStatus::Processing,
            TaskStatus::Completed,
            None,
        )?;

        let episodes_json = serde_json::to_string(&comic.episodes).map_err(db_err)?;
        let urls_json = serde_json::to_string(&comic.image_urls).map_err(db_err)?;
        tx.execute(
            "INSERT INTO comics (task_id, episodes, image_urls, created_at) VALUES (?, ?, ?, ?)",
            params![
                comic.task_id,
                episodes_json,
                urls_json,
                timestamp(comic.created_at)
            ],
        )
        .map_err(db_err)?;

        let task = Self::fetch_existing(&tx, &comic.task_id)?;
        tx.commit().map_err(db_err)?;
        Ok(task)
    }

    fn get_comic(&self, task_id: &str) -> Result<Option<Comic>, TaskError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT task_id, episodes, image_urls, created_at FROM comics WHERE task_id = ?",
            params![task_id],
            |row| {
                let episodes: String = row.get(1)?;
                let image_urls: String = row.get(2)?;
                let created_at: String = row.get(3)?;
                Ok(Comic {
                    task_id: row.get(0)?,
                    episodes: parse_json(1, &episodes)?,
                    image_urls: parse_json(2, &image_urls)?,
                    created_at: parse_timestamp(3, &created_at)?,
                })
            },
        )
        .optional()
        .map_err(db_err)
    }

    fn fail_unfinished(&self, message: &str) -> Result<Vec<(String, TaskStatus)>, TaskError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let stranded = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, status FROM tasks WHERE status = ?1 OR (status = ?2 AND is_valid = 1) ORDER BY rowid",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(
                    params![TaskStatus::Processing.as_str(), TaskStatus::Pending.as_str()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(db_err)?;
            rows.collect::<rusqlite::Result<Vec<(String, String)>>>()
                .map_err(db_err)?
        };

        let mut failed = Vec::with_capacity(stranded.len());
        for (id, status) in stranded {
            let status: TaskStatus = status.parse().map_err(TaskError::Database)?;
            failed.push((id, status));
        }

        tx.execute(
            "UPDATE tasks SET status = ?1, error_message = ?2, updated_at = ?3 WHERE status = ?4 OR (status = ?5 AND is_valid = 1)",
            params![
                TaskStatus::Failed.as_str(),
                message,
                timestamp(Utc::now()),
                TaskStatus::Processing.as_str(),
                TaskStatus::Pending.as_str()
            ],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(failed)
    }

    fn delete(&self, id: &str) -> Result<Task, TaskError> {
        let conn = self.conn.lock().unwrap();

        let task = Self::fetch_existing(&conn, id)?;
        conn.execute("DELETE FROM tasks WHERE id = ?", params![id])
            .map_err(db_err)?;

        Ok(task)
    }
}
