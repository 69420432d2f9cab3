use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use studybot_common::{Error, Result, Session, SessionId, Turn, TurnRole, User, UserId};
use tracing::{info, warn};

/// Persistent storage for users, sessions, and conversation turns.
///
/// Turns are stored one row per turn: a tool-invocation turn keeps its
/// calls and results in the same row, so a bounded read can never split a
/// call from its result. Reads and writes for one session are serialized
/// by SQLite; multi-turn commits run in a single transaction.
pub struct ContextStore {
    conn: Connection,
}

impl ContextStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening context store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    display_name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    turn_count INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user
                    ON sessions(user_id, updated_at);

                CREATE TABLE IF NOT EXISTS turns (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                    seq INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    tool_calls TEXT NOT NULL DEFAULT '[]',
                    tool_results TEXT NOT NULL DEFAULT '[]',
                    assistant_content TEXT,
                    timestamp TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_turns_session_seq
                    ON turns(session_id, seq);",
            )
            .map_err(|e| Error::Database(format!("migration failed: {e}")))?;

        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------

    pub fn create_user(&self, display_name: &str) -> Result<User> {
        let user = User {
            user_id: UserId::new(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        self.conn
            .execute(
                "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)",
                params![
                    user.user_id.as_str(),
                    user.display_name,
                    user.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to create user: {e}")))?;
        Ok(user)
    }

    pub fn get_user(&self, user_id: &UserId) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, display_name, created_at FROM users WHERE id = ?1",
                params![user_id.as_str()],
                |row| {
                    let created_raw: String = row.get(2)?;
                    Ok(User {
                        user_id: UserId::from_string(row.get::<_, String>(0)?),
                        display_name: row.get(1)?,
                        created_at: parse_timestamp(&created_raw),
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::NotFound(format!("user {user_id}"))
                }
                other => Error::Database(format!("failed to load user: {other}")),
            })
    }

    /// Rename is the only permitted mutation of a user record.
    pub fn rename_user(&self, user_id: &UserId, display_name: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE users SET display_name = ?1 WHERE id = ?2",
                params![display_name, user_id.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to rename user: {e}")))?;
        if rows == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------

    pub fn create_session(&self, user_id: &UserId, name: Option<&str>) -> Result<Session> {
        // FK errors on a missing user are indistinguishable from other
        // constraint failures, so check explicitly first.
        self.get_user(user_id)?;

        let now = Utc::now();
        let session = Session {
            session_id: SessionId::new(),
            owner_user_id: user_id.clone(),
            display_name: name.unwrap_or("New chat").to_string(),
            created_at: now,
            updated_at: now,
            turn_count: 0,
        };
        self.conn
            .execute(
                "INSERT INTO sessions (id, user_id, display_name, created_at, updated_at, turn_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![
                    session.session_id.as_str(),
                    user_id.as_str(),
                    session.display_name,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to create session: {e}")))?;
        Ok(session)
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<Session> {
        self.conn
            .query_row(
                "SELECT id, user_id, display_name, created_at, updated_at, turn_count
                 FROM sessions WHERE id = ?1",
                params![session_id.as_str()],
                |row| {
                    let created_raw: String = row.get(3)?;
                    let updated_raw: String = row.get(4)?;
                    Ok(Session {
                        session_id: SessionId::from_string(row.get::<_, String>(0)?),
                        owner_user_id: UserId::from_string(row.get::<_, String>(1)?),
                        display_name: row.get(2)?,
                        created_at: parse_timestamp(&created_raw),
                        updated_at: parse_timestamp(&updated_raw),
                        turn_count: row.get::<_, i64>(5)? as u64,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::NotFound(format!("session {session_id}"))
                }
                other => Error::Database(format!("failed to load session: {other}")),
            })
    }

    pub fn rename_session(&self, session_id: &SessionId, name: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sessions SET display_name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, Utc::now().to_rfc3339(), session_id.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to rename session: {e}")))?;
        if rows == 0 {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    /// Delete a session and, via cascade, all of its turns.
    pub fn delete_session(&self, session_id: &SessionId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE id = ?1",
                params![session_id.as_str()],
            )
            .map_err(|e| Error::Database(format!("failed to delete session: {e}")))?;
        if rows == 0 {
            return Err(Error::NotFound(format!("session {session_id}")));
        }
        Ok(())
    }

    /// List a user's sessions, most recently active first.
    pub fn list_sessions(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, display_name, created_at, updated_at, turn_count
                 FROM sessions
                 WHERE user_id = ?1
                 ORDER BY updated_at DESC, id",
            )
            .map_err(|e| Error::Database(format!("failed to prepare session query: {e}")))?;

        let rows = stmt
            .query_map(params![user_id.as_str()], |row| {
                let created_raw: String = row.get(3)?;
                let updated_raw: String = row.get(4)?;
                Ok(Session {
                    session_id: SessionId::from_string(row.get::<_, String>(0)?),
                    owner_user_id: UserId::from_string(row.get::<_, String>(1)?),
                    display_name: row.get(2)?,
                    created_at: parse_timestamp(&created_raw),
                    updated_at: parse_timestamp(&updated_raw),
                    turn_count: row.get::<_, i64>(5)? as u64,
                })
            })
            .map_err(|e| Error::Database(format!("failed to list sessions: {e}")))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(
                row.map_err(|e| Error::Database(format!("failed to read session row: {e}")))?,
            );
        }
        Ok(sessions)
    }

    // -----------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------

    /// Atomically append a single turn.
    pub fn append_turn(&mut self, session_id: &SessionId, turn: &Turn) -> Result<()> {
        self.append_turns(session_id, std::slice::from_ref(turn))
    }

    /// Append a batch of turns in one transaction, bumping the owning
    /// session's `updated_at` and `turn_count`. The batch commits whole or
    /// not at all; a user turn and its response cannot be split by a crash
    /// or a concurrent writer.
    pub fn append_turns(&mut self, session_id: &SessionId, turns: &[Turn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        // Bump the session first: a missing session surfaces as NotFound
        // here, before any turn row could trip the foreign key.
        let rows = tx
            .execute(
                "UPDATE sessions
                 SET updated_at = ?1, turn_count = turn_count + ?2
                 WHERE id = ?3",
                params![
                    Utc::now().to_rfc3339(),
                    turns.len() as i64,
                    session_id.as_str()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to update session: {e}")))?;
        if rows == 0 {
            return Err(Error::NotFound(format!("session {session_id}")));
        }

        let next_seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM turns WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to read turn sequence: {e}")))?;

        for (offset, turn) in turns.iter().enumerate() {
            let tool_calls = serde_json::to_string(&turn.tool_calls)
                .map_err(|e| Error::Database(format!("failed to encode tool calls: {e}")))?;
            let tool_results = serde_json::to_string(&turn.tool_results)
                .map_err(|e| Error::Database(format!("failed to encode tool results: {e}")))?;

            tx.execute(
                "INSERT INTO turns (id, session_id, seq, role, content, tool_calls,
                                    tool_results, assistant_content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    turn.id,
                    session_id.as_str(),
                    next_seq + offset as i64,
                    turn.role.to_string(),
                    turn.content,
                    tool_calls,
                    tool_results,
                    turn.assistant_content,
                    turn.timestamp.to_rfc3339()
                ],
            )
            .map_err(|e| Error::Database(format!("failed to append turn: {e}")))?;
        }

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit turns: {e}")))
    }

    /// Load the most recent `max_turns` turns in chronological order.
    ///
    /// Each tool-invocation turn is one row carrying its full call/result
    /// pairing, so the window boundary falls between turns, never inside
    /// one.
    pub fn read_window(&self, session_id: &SessionId, max_turns: usize) -> Result<Vec<Turn>> {
        self.get_session(session_id)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, role, content, tool_calls, tool_results, assistant_content, timestamp
                 FROM turns
                 WHERE session_id = ?1
                 ORDER BY seq DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(format!("failed to prepare turn query: {e}")))?;

        let rows = stmt
            .query_map(params![session_id.as_str(), max_turns as i64], turn_from_row)
            .map_err(|e| Error::Database(format!("failed to load turns: {e}")))?;

        let mut turns = Vec::new();
        for row in rows {
            turns
                .push(row.map_err(|e| Error::Database(format!("failed to read turn row: {e}")))?);
        }

        // Query is DESC for efficient tail fetch; return in chronological order.
        turns.reverse();
        Ok(turns)
    }

    /// Delete all but the most recent `keep` turns for a session.
    /// Returns the number of deleted rows.
    pub fn prune_turns(&self, session_id: &SessionId, keep: usize) -> Result<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM turns WHERE session_id = ?1 AND seq NOT IN (
                    SELECT seq FROM turns WHERE session_id = ?1
                    ORDER BY seq DESC LIMIT ?2
                )",
                params![session_id.as_str(), keep as i64],
            )
            .map_err(|e| Error::Database(format!("failed to prune turns: {e}")))?;
        Ok(deleted)
    }
}

fn turn_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let role_raw: String = row.get(1)?;
    let tool_calls_raw: String = row.get(3)?;
    let tool_results_raw: String = row.get(4)?;
    let timestamp_raw: String = row.get(6)?;

    Ok(Turn {
        id: row.get(0)?,
        role: parse_role(&role_raw),
        content: row.get(2)?,
        tool_calls: serde_json::from_str(&tool_calls_raw).unwrap_or_default(),
        tool_results: serde_json::from_str(&tool_results_raw).unwrap_or_default(),
        assistant_content: row.get(5)?,
        timestamp: parse_timestamp(&timestamp_raw),
    })
}

fn parse_role(value: &str) -> TurnRole {
    match value {
        "user" => TurnRole::User,
        "assistant" => TurnRole::Assistant,
        "tool_invocation" => TurnRole::ToolInvocation,
        other => {
            warn!("unknown turn role '{}' in store, treating as assistant", other);
            TurnRole::Assistant
        }
    }
}

fn parse_timestamp(value: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(
                "failed to parse timestamp '{}': {e}, falling back to now",
                value
            );
            Utc::now()
        })
}
