use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use uuid::Uuid;

use super::Store;
use super::policy::{
    CLOCK_VISIBLE, GEAR_VISIBLE, LOG_VISIBLE, PILOT_VISIBLE, USER_VISIBLE, denied,
};
use super::schema::MIGRATIONS;
use crate::error::{Error, Result};
use crate::types::*;
use crate::validation::{
    validate_clock, validate_corporation_name, validate_display_name, validate_gear_name,
    validate_new_log_entry, validate_pilot,
};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

macro_rules! user_columns {
    () => {
        "id, discord_id, discord_username, discord_avatar, display_name, is_gm, created_at, updated_at"
    };
}

macro_rules! pilot_columns {
    () => {
        "id, user_id, name, callsign, license_level, ll_clock_progress, background, notes, manna, downtime, avatar_url, created_at, updated_at"
    };
}

macro_rules! corporation_columns {
    () => {
        "id, name, description, created_at, updated_at"
    };
}

macro_rules! clock_columns {
    () => {
        "id, pilot_id, name, description, segments, filled, tick_amount, completed, created_at, updated_at"
    };
}

macro_rules! log_columns {
    () => {
        "id, pilot_id, type, description, manna_change, downtime_change, ll_clock_change, created_at, updated_at"
    };
}

macro_rules! gear_columns {
    () => {
        "id, pilot_id, name, description, notes, acquired_date, acquired_log_id, lost_log_id, created_at, updated_at"
    };
}

macro_rules! progress_columns {
    () => {
        "id, log_entry_id, clock_id, ticks, applied, created_at"
    };
}

macro_rules! reputation_columns {
    () => {
        "id, log_entry_id, pilot_id, corporation_id, change_value, notes, created_at"
    };
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_busy_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout<P: AsRef<Path>>(db_path: P, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(busy_timeout)?;

        conn.create_scalar_function(
            "get_ll_clock_segments",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let level: i64 = ctx.get(0)?;
                let level = i32::try_from(level).unwrap_or(i32::MAX);
                Ok(get_ll_clock_segments(level))
            },
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        discord_id: row.get(1)?,
        discord_username: row.get(2)?,
        discord_avatar: row.get(3)?,
        display_name: row.get(4)?,
        is_gm: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn pilot_from_row(row: &Row<'_>) -> rusqlite::Result<Pilot> {
    Ok(Pilot {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        callsign: row.get(3)?,
        license_level: row.get(4)?,
        ll_clock_progress: row.get(5)?,
        background: row.get(6)?,
        notes: row.get(7)?,
        manna: row.get(8)?,
        downtime: row.get(9)?,
        avatar_url: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?),
        updated_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

fn corporation_from_row(row: &Row<'_>) -> rusqlite::Result<Corporation> {
    Ok(Corporation {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn clock_from_row(row: &Row<'_>) -> rusqlite::Result<Clock> {
    Ok(Clock {
        id: row.get(0)?,
        pilot_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        segments: row.get(4)?,
        filled: row.get(5)?,
        tick_amount: row.get(6)?,
        completed: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        pilot_id: row.get(1)?,
        log_type: row.get(2)?,
        description: row.get(3)?,
        manna_change: row.get(4)?,
        downtime_change: row.get(5)?,
        ll_clock_change: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

fn gear_from_row(row: &Row<'_>) -> rusqlite::Result<ExoticGear> {
    Ok(ExoticGear {
        id: row.get(0)?,
        pilot_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        acquired_date: parse_datetime(&row.get::<_, String>(5)?),
        acquired_log_id: row.get(6)?,
        lost_log_id: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ClockProgress> {
    Ok(ClockProgress {
        id: row.get(0)?,
        log_entry_id: row.get(1)?,
        clock_id: row.get(2)?,
        ticks: row.get(3)?,
        applied: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn reputation_from_row(row: &Row<'_>) -> rusqlite::Result<ReputationChange> {
    Ok(ReputationChange {
        id: row.get(0)?,
        log_entry_id: row.get(1)?,
        pilot_id: row.get(2)?,
        corporation_id: row.get(3)?,
        change_value: row.get(4)?,
        notes: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn query_log_entry(conn: &Connection, caller: &Caller, id: &str) -> Result<Option<LogEntry>> {
    conn.query_row(
        concat!(
            "SELECT ",
            log_columns!(),
            " FROM log_entries WHERE id = ?3 AND ",
            via_pilot_readable!("pilot_id")
        ),
        params![caller.user_id(), caller.is_gm(), id],
        log_from_row,
    )
    .optional()
    .map_err(Error::from)
}

fn progress_for_log(conn: &Connection, log_id: &str) -> Result<Vec<ClockProgress>> {
    let mut stmt = conn.prepare(concat!(
        "SELECT ",
        progress_columns!(),
        " FROM clock_progress WHERE log_entry_id = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt.query_map(params![log_id], progress_from_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn reputation_for_log(conn: &Connection, log_id: &str) -> Result<Vec<ReputationChange>> {
    let mut stmt = conn.prepare(concat!(
        "SELECT ",
        reputation_columns!(),
        " FROM reputation_changes WHERE log_entry_id = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt.query_map(params![log_id], reputation_from_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn gear_acquired_by(conn: &Connection, log_id: &str) -> Result<Vec<ExoticGear>> {
    let mut stmt = conn.prepare(concat!(
        "SELECT ",
        gear_columns!(),
        " FROM exotic_gear WHERE acquired_log_id = ?1 ORDER BY rowid"
    ))?;
    let rows = stmt.query_map(params![log_id], gear_from_row)?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

fn gear_lost_by(conn: &Connection, log_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM exotic_gear WHERE lost_log_id = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map(params![log_id], |row| row.get(0))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}

/// Adds (`sign` = 1) or removes (`sign` = -1) a log's deltas from its pilot.
/// Runs inside the caller's write transaction.
fn apply_pilot_deltas(conn: &Connection, log: &LogEntry, sign: i64, stamp: &str) -> Result<()> {
    let (manna, downtime, ll_progress): (i64, i64, i64) = conn.query_row(
        "SELECT manna, downtime, ll_clock_progress FROM pilots WHERE id = ?1",
        params![log.pilot_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let shift = |current: i64, delta: i64, counter: &str| {
        delta
            .checked_mul(sign)
            .and_then(|delta| current.checked_add(delta))
            .ok_or_else(|| Error::BadRequest(format!("{counter} change is out of range")))
    };
    let manna = shift(manna, log.manna_change, "manna")?;
    let downtime = shift(downtime, log.downtime_change, "downtime")?;
    let ll_progress = i32::try_from(shift(
        ll_progress,
        i64::from(log.ll_clock_change),
        "license clock",
    )?)
    .map_err(|_| Error::BadRequest("license clock change is out of range".to_string()))?;

    conn.execute(
        "UPDATE pilots SET manna = ?1, downtime = ?2, ll_clock_progress = ?3, updated_at = ?4
         WHERE id = ?5",
        params![manna, downtime, ll_progress, stamp, log.pilot_id],
    )
    .map_err(Error::from_sqlite)?;
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let mut conn = self.conn();
        let current: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        for (version, name, sql) in MIGRATIONS {
            if *version <= current {
                continue;
            }
            let tx = conn.transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
            tracing::info!(version, name, "applied schema migration");
        }

        Ok(())
    }

    // Identity linkage

    fn handle_identity_created(&self, event: &IdentityCreated) -> Result<User> {
        let metadata = serde_json::to_string(&event.metadata)?;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The signup trigger only fires when the identity row is new.
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO identities (id, raw_user_meta_data, created_at)
             VALUES (?1, ?2, ?3)",
            params![event.id, metadata, format_datetime(&Utc::now())],
        )?;

        let user = tx
            .query_row(
                concat!("SELECT ", user_columns!(), " FROM users WHERE id = ?1"),
                params![event.id],
                user_from_row,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        tx.commit()?;

        if inserted > 0 {
            tracing::info!(user_id = %user.id, display_name = %user.display_name, "linked new identity");
        } else {
            tracing::debug!(user_id = %user.id, "identity already linked");
        }

        Ok(user)
    }

    fn handle_identity_deleted(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM identities WHERE id = ?1", params![id])?;
        if rows > 0 {
            tracing::info!(user_id = id, "removed identity and owned rows");
        }
        Ok(rows > 0)
    }

    fn lookup_is_gm(&self, user_id: &str) -> Result<Option<bool>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT is_gm FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_user_gm(&self, user_id: &str, is_gm: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET is_gm = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_gm, format_datetime(&Utc::now()), user_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        tracing::info!(user_id, is_gm, "updated GM flag");
        Ok(())
    }

    // User operations

    fn get_user(&self, caller: &Caller, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            concat!(
                "SELECT ",
                user_columns!(),
                " FROM users WHERE id = ?3 AND (id = ?1 OR ?2)"
            ),
            params![caller.user_id(), caller.is_gm(), id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self, caller: &Caller) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE (id = ?1 OR ?2) ORDER BY display_name, id"
        ))?;

        let rows = stmt.query_map(params![caller.user_id(), caller.is_gm()], user_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user_profile(&self, caller: &Caller, user: &User) -> Result<()> {
        validate_display_name(&user.display_name)?;

        let conn = self.conn();
        let rows = conn.execute(
            "UPDATE users SET display_name = ?3, discord_avatar = ?4, updated_at = ?5
             WHERE id = ?6 AND id = ?1",
            params![
                caller.user_id(),
                caller.is_gm(),
                user.display_name,
                user.discord_avatar,
                format_datetime(&Utc::now()),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(denied(&conn, USER_VISIBLE, caller, &user.id));
        }
        Ok(())
    }

    // Pilot operations

    fn create_pilot(&self, caller: &Caller, pilot: &Pilot) -> Result<()> {
        validate_pilot(pilot)?;
        if pilot.user_id != caller.user_id() {
            return Err(Error::Forbidden);
        }

        self.conn()
            .execute(
                concat!(
                    "INSERT INTO pilots (",
                    pilot_columns!(),
                    ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    pilot.id,
                    pilot.user_id,
                    pilot.name,
                    pilot.callsign,
                    pilot.license_level,
                    pilot.ll_clock_progress,
                    pilot.background,
                    pilot.notes,
                    pilot.manna,
                    pilot.downtime,
                    pilot.avatar_url,
                    format_datetime(&pilot.created_at),
                    format_datetime(&pilot.updated_at),
                ],
            )
            .map_err(Error::from_sqlite)?;
        Ok(())
    }

    fn get_pilot(&self, caller: &Caller, id: &str) -> Result<Option<Pilot>> {
        let conn = self.conn();
        conn.query_row(
            concat!(
                "SELECT ",
                pilot_columns!(),
                " FROM pilots WHERE id = ?3 AND (user_id = ?1 OR ?2)"
            ),
            params![caller.user_id(), caller.is_gm(), id],
            pilot_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_pilots(&self, caller: &Caller) -> Result<Vec<Pilot>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            pilot_columns!(),
            " FROM pilots WHERE (user_id = ?1 OR ?2) ORDER BY name, id"
        ))?;

        let rows = stmt.query_map(params![caller.user_id(), caller.is_gm()], pilot_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_pilot(&self, caller: &Caller, pilot: &Pilot) -> Result<()> {
        validate_pilot(pilot)?;

        let conn = self.conn();
        let rows = conn
            .execute(
                "UPDATE pilots SET name = ?3, callsign = ?4, license_level = ?5,
                     ll_clock_progress = ?6, background = ?7, notes = ?8, manna = ?9,
                     downtime = ?10, avatar_url = ?11, updated_at = ?12
                 WHERE id = ?13 AND user_id = ?1",
                params![
                    caller.user_id(),
                    caller.is_gm(),
                    pilot.name,
                    pilot.callsign,
                    pilot.license_level,
                    pilot.ll_clock_progress,
                    pilot.background,
                    pilot.notes,
                    pilot.manna,
                    pilot.downtime,
                    pilot.avatar_url,
                    format_datetime(&Utc::now()),
                    pilot.id,
                ],
            )
            .map_err(Error::from_sqlite)?;

        if rows == 0 {
            return Err(denied(&conn, PILOT_VISIBLE, caller, &pilot.id));
        }
        Ok(())
    }

    fn delete_pilot(&self, caller: &Caller, id: &str) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute(
            "DELETE FROM pilots WHERE id = ?3 AND user_id = ?1",
            params![caller.user_id(), caller.is_gm(), id],
        )?;

        if rows == 0 {
            return match denied(&conn, PILOT_VISIBLE, caller, id) {
                Error::NotFound => Ok(false),
                e => Err(e),
            };
        }
        Ok(true)
    }

    // Corporation operations

    fn create_corporation(&self, caller: &Caller, corp: &Corporation) -> Result<()> {
        caller.require_gm()?;
        validate_corporation_name(&corp.name)?;

        self.conn()
            .execute(
                concat!(
                    "INSERT INTO corporations (",
                    corporation_columns!(),
                    ") VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    corp.id,
                    corp.name,
                    corp.description,
                    format_datetime(&corp.created_at),
                    format_datetime(&corp.updated_at),
                ],
            )
            .map_err(Error::from_sqlite)?;
        Ok(())
    }

    fn get_corporation(&self, _caller: &Caller, id: &str) -> Result<Option<Corporation>> {
        let conn = self.conn();
        conn.query_row(
            concat!(
                "SELECT ",
                corporation_columns!(),
                " FROM corporations WHERE id = ?1"
            ),
            params![id],
            corporation_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_corporations(&self, _caller: &Caller) -> Result<Vec<Corporation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            corporation_columns!(),
            " FROM corporations ORDER BY name"
        ))?;

        let rows = stmt.query_map([], corporation_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_corporation(&self, caller: &Caller, corp: &Corporation) -> Result<()> {
        caller.require_gm()?;
        validate_corporation_name(&corp.name)?;

        let rows = self
            .conn()
            .execute(
                "UPDATE corporations SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    corp.name,
                    corp.description,
                    format_datetime(&Utc::now()),
                    corp.id
                ],
            )
            .map_err(Error::from_sqlite)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_corporation(&self, caller: &Caller, id: &str) -> Result<bool> {
        caller.require_gm()?;

        let rows = self
            .conn()
            .execute("DELETE FROM corporations WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Clock operations

    fn create_clock(&self, caller: &Caller, clock: &Clock) -> Result<()> {
        validate_clock(clock)?;

        let conn = self.conn();
        match &clock.pilot_id {
            Some(pilot_id) => {
                let owns: bool = conn.query_row(
                    concat!("SELECT ?3 IN (", owned_pilots!(), ")"),
                    params![caller.user_id(), caller.is_gm(), pilot_id],
                    |row| row.get(0),
                )?;
                if !owns {
                    return Err(denied(&conn, PILOT_VISIBLE, caller, pilot_id));
                }
            }
            None => caller.require_gm()?,
        }

        conn.execute(
            concat!(
                "INSERT INTO clocks (",
                clock_columns!(),
                ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                clock.id,
                clock.pilot_id,
                clock.name,
                clock.description,
                clock.segments,
                clock.filled,
                clock.tick_amount,
                clock.filled >= clock.segments,
                format_datetime(&clock.created_at),
                format_datetime(&clock.updated_at),
            ],
        )
        .map_err(Error::from_sqlite)?;
        Ok(())
    }

    fn get_clock(&self, caller: &Caller, id: &str) -> Result<Option<Clock>> {
        let conn = self.conn();
        conn.query_row(
            concat!(
                "SELECT ",
                clock_columns!(),
                " FROM clocks WHERE id = ?3 AND ",
                clock_readable!()
            ),
            params![caller.user_id(), caller.is_gm(), id],
            clock_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_clocks(&self, caller: &Caller, pilot_id: Option<&str>) -> Result<Vec<Clock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            clock_columns!(),
            " FROM clocks WHERE (?3 IS NULL OR pilot_id = ?3) AND ",
            clock_readable!(),
            " ORDER BY created_at, rowid"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id],
            clock_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_clock(&self, caller: &Caller, clock: &Clock) -> Result<()> {
        validate_clock(clock)?;

        // filled only moves through clock progress; completion follows the new size.
        let conn = self.conn();
        let rows = conn
            .execute(
                concat!(
                    "UPDATE clocks SET name = ?3, description = ?4, segments = ?5,
                         tick_amount = ?6, completed = (filled >= ?5), updated_at = ?7
                     WHERE id = ?8 AND ",
                    clock_writable!()
                ),
                params![
                    caller.user_id(),
                    caller.is_gm(),
                    clock.name,
                    clock.description,
                    clock.segments,
                    clock.tick_amount,
                    format_datetime(&Utc::now()),
                    clock.id,
                ],
            )
            .map_err(Error::from_sqlite)?;

        if rows == 0 {
            return Err(denied(&conn, CLOCK_VISIBLE, caller, &clock.id));
        }
        Ok(())
    }

    fn delete_clock(&self, caller: &Caller, id: &str) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute(
            concat!("DELETE FROM clocks WHERE id = ?3 AND ", clock_writable!()),
            params![caller.user_id(), caller.is_gm(), id],
        )?;

        if rows == 0 {
            return match denied(&conn, CLOCK_VISIBLE, caller, id) {
                Error::NotFound => Ok(false),
                e => Err(e),
            };
        }
        Ok(true)
    }

    fn list_clock_progress(&self, caller: &Caller, clock_id: &str) -> Result<Vec<ClockProgress>> {
        let conn = self.conn();

        let visible = conn
            .query_row(
                CLOCK_VISIBLE,
                params![caller.user_id(), caller.is_gm(), clock_id],
                |_| Ok(()),
            )
            .optional()?;
        if visible.is_none() {
            return Err(Error::NotFound);
        }

        let mut stmt = conn.prepare(concat!(
            "SELECT cp.id, cp.log_entry_id, cp.clock_id, cp.ticks, cp.applied, cp.created_at
             FROM clock_progress cp
             JOIN log_entries l ON l.id = cp.log_entry_id
             WHERE cp.clock_id = ?3 AND ",
            via_pilot_readable!("l.pilot_id"),
            " ORDER BY cp.created_at, cp.rowid"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), clock_id],
            progress_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Log ledger operations

    fn record_log_entry(&self, caller: &Caller, entry: &NewLogEntry) -> Result<LogEntryRecord> {
        validate_new_log_entry(entry)?;

        let mut conn = self.conn();
        // Take the write lock before touching counters.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let owns: bool = tx.query_row(
            concat!("SELECT ?3 IN (", owned_pilots!(), ")"),
            params![caller.user_id(), caller.is_gm(), entry.pilot_id],
            |row| row.get(0),
        )?;
        if !owns {
            return Err(denied(&tx, PILOT_VISIBLE, caller, &entry.pilot_id));
        }

        let now = Utc::now();
        let stamp = format_datetime(&now);
        let log = LogEntry {
            id: new_id(),
            pilot_id: entry.pilot_id.clone(),
            log_type: entry.log_type,
            description: entry.description.clone(),
            manna_change: entry.manna_change,
            downtime_change: entry.downtime_change,
            ll_clock_change: entry.ll_clock_change,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            concat!(
                "INSERT INTO log_entries (",
                log_columns!(),
                ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)"
            ),
            params![
                log.id,
                log.pilot_id,
                log.log_type,
                log.description,
                log.manna_change,
                log.downtime_change,
                log.ll_clock_change,
                stamp,
            ],
        )
        .map_err(Error::from_sqlite)?;

        apply_pilot_deltas(&tx, &log, 1, &stamp)?;

        let mut clock_progress = Vec::with_capacity(entry.clock_ticks.len());
        for tick in &entry.clock_ticks {
            let tickable: bool = tx.query_row(
                concat!(
                    "SELECT EXISTS(SELECT 1 FROM clocks WHERE id = ?3 AND (pilot_id IS NULL OR pilot_id IN (",
                    owned_pilots!(),
                    ")))"
                ),
                params![caller.user_id(), caller.is_gm(), tick.clock_id],
                |row| row.get(0),
            )?;
            if !tickable {
                return Err(denied(&tx, CLOCK_VISIBLE, caller, &tick.clock_id));
            }

            let room: i32 = tx.query_row(
                "SELECT segments - filled FROM clocks WHERE id = ?1",
                params![tick.clock_id],
                |row| row.get(0),
            )?;
            let progress = ClockProgress {
                id: new_id(),
                log_entry_id: log.id.clone(),
                clock_id: tick.clock_id.clone(),
                ticks: tick.ticks,
                applied: tick.ticks.min(room.max(0)),
                created_at: now,
            };
            tx.execute(
                concat!(
                    "INSERT INTO clock_progress (",
                    progress_columns!(),
                    ") VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
                ),
                params![
                    progress.id,
                    progress.log_entry_id,
                    progress.clock_id,
                    progress.ticks,
                    progress.applied,
                    stamp,
                ],
            )
            .map_err(Error::from_sqlite)?;

            tx.execute(
                "UPDATE clocks SET filled = filled + ?1,
                     completed = (filled + ?1 >= segments), updated_at = ?2
                 WHERE id = ?3",
                params![progress.applied, stamp, progress.clock_id],
            )
            .map_err(Error::from_sqlite)?;
            clock_progress.push(progress);
        }

        let mut reputation_changes = Vec::with_capacity(entry.reputation_changes.len());
        for change in &entry.reputation_changes {
            let change = ReputationChange {
                id: new_id(),
                log_entry_id: log.id.clone(),
                pilot_id: log.pilot_id.clone(),
                corporation_id: change.corporation_id.clone(),
                change_value: change.change_value,
                notes: change.notes.clone(),
                created_at: now,
            };
            tx.execute(
                concat!(
                    "INSERT INTO reputation_changes (",
                    reputation_columns!(),
                    ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    change.id,
                    change.log_entry_id,
                    change.pilot_id,
                    change.corporation_id,
                    change.change_value,
                    change.notes,
                    stamp,
                ],
            )
            .map_err(Error::from_sqlite)?;
            reputation_changes.push(change);
        }

        let mut gear_acquired = Vec::with_capacity(entry.gear_acquired.len());
        for new_gear in &entry.gear_acquired {
            let gear = ExoticGear {
                id: new_id(),
                pilot_id: log.pilot_id.clone(),
                name: new_gear.name.clone(),
                description: new_gear.description.clone(),
                notes: new_gear.notes.clone(),
                acquired_date: now,
                acquired_log_id: Some(log.id.clone()),
                lost_log_id: None,
                created_at: now,
                updated_at: now,
            };
            tx.execute(
                concat!(
                    "INSERT INTO exotic_gear (",
                    gear_columns!(),
                    ") VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?6, ?6)"
                ),
                params![
                    gear.id,
                    gear.pilot_id,
                    gear.name,
                    gear.description,
                    gear.notes,
                    stamp,
                    gear.acquired_log_id,
                ],
            )
            .map_err(Error::from_sqlite)?;
            gear_acquired.push(gear);
        }

        for gear_id in &entry.gear_lost {
            let rows = tx.execute(
                "UPDATE exotic_gear SET lost_log_id = ?1, updated_at = ?2
                 WHERE id = ?3 AND pilot_id = ?4 AND lost_log_id IS NULL",
                params![log.id, stamp, gear_id, log.pilot_id],
            )?;
            if rows == 0 {
                return Err(Error::BadRequest(format!(
                    "gear {gear_id} is not held by this pilot"
                )));
            }
        }

        tx.commit()?;

        tracing::debug!(
            log_id = %log.id,
            pilot_id = %log.pilot_id,
            log_type = %log.log_type,
            clocks = clock_progress.len(),
            reputation = reputation_changes.len(),
            "recorded log entry"
        );

        Ok(LogEntryRecord {
            log,
            clock_progress,
            reputation_changes,
            gear_acquired,
            gear_lost: entry.gear_lost.clone(),
        })
    }

    fn get_log_entry(&self, caller: &Caller, id: &str) -> Result<Option<LogEntry>> {
        query_log_entry(&self.conn(), caller, id)
    }

    fn get_log_entry_record(&self, caller: &Caller, id: &str) -> Result<Option<LogEntryRecord>> {
        let conn = self.conn();
        let Some(log) = query_log_entry(&conn, caller, id)? else {
            return Ok(None);
        };

        Ok(Some(LogEntryRecord {
            clock_progress: progress_for_log(&conn, &log.id)?,
            reputation_changes: reputation_for_log(&conn, &log.id)?,
            gear_acquired: gear_acquired_by(&conn, &log.id)?,
            gear_lost: gear_lost_by(&conn, &log.id)?,
            log,
        }))
    }

    fn list_log_entries(&self, caller: &Caller, pilot_id: &str) -> Result<Vec<LogEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            log_columns!(),
            " FROM log_entries WHERE pilot_id = ?3 AND ",
            via_pilot_readable!("pilot_id"),
            " ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id],
            log_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_log_entry(&self, caller: &Caller, log: &LogEntry) -> Result<()> {
        // Deltas were already applied to the pilot; only the narrative is editable.
        let conn = self.conn();
        let rows = conn.execute(
            concat!(
                "UPDATE log_entries SET description = ?3, updated_at = ?4
                 WHERE id = ?5 AND ",
                via_pilot_writable!("pilot_id")
            ),
            params![
                caller.user_id(),
                caller.is_gm(),
                log.description,
                format_datetime(&Utc::now()),
                log.id,
            ],
        )?;

        if rows == 0 {
            return Err(denied(&conn, LOG_VISIBLE, caller, &log.id));
        }
        Ok(())
    }

    fn delete_log_entry(&self, caller: &Caller, id: &str) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute(
            concat!(
                "DELETE FROM log_entries WHERE id = ?3 AND ",
                via_pilot_writable!("pilot_id")
            ),
            params![caller.user_id(), caller.is_gm(), id],
        )?;

        if rows == 0 {
            return match denied(&conn, LOG_VISIBLE, caller, id) {
                Error::NotFound => Ok(false),
                e => Err(e),
            };
        }
        Ok(true)
    }

    fn revert_log_entry(&self, caller: &Caller, id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let log = tx
            .query_row(
                concat!(
                    "SELECT ",
                    log_columns!(),
                    " FROM log_entries WHERE id = ?3 AND ",
                    via_pilot_writable!("pilot_id")
                ),
                params![caller.user_id(), caller.is_gm(), id],
                log_from_row,
            )
            .optional()?;
        let Some(log) = log else {
            return Err(denied(&tx, LOG_VISIBLE, caller, id));
        };

        let stamp = format_datetime(&Utc::now());

        apply_pilot_deltas(&tx, &log, -1, &stamp)?;

        for progress in progress_for_log(&tx, &log.id)? {
            tx.execute(
                "UPDATE clocks SET filled = MAX(0, filled - ?1),
                     completed = (MAX(0, filled - ?1) >= segments), updated_at = ?2
                 WHERE id = ?3",
                params![progress.applied, stamp, progress.clock_id],
            )?;
        }

        // The cascade drops progress and reputation rows. Gear keeps its row
        // with the log reference nulled, so anything this log took is active again.
        tx.execute("DELETE FROM log_entries WHERE id = ?1", params![log.id])?;

        tx.commit()?;

        tracing::warn!(log_id = %log.id, pilot_id = %log.pilot_id, "reverted log entry");
        Ok(())
    }

    // Exotic gear operations

    fn get_gear(&self, caller: &Caller, id: &str) -> Result<Option<ExoticGear>> {
        let conn = self.conn();
        conn.query_row(
            concat!(
                "SELECT ",
                gear_columns!(),
                " FROM exotic_gear WHERE id = ?3 AND ",
                via_pilot_readable!("pilot_id")
            ),
            params![caller.user_id(), caller.is_gm(), id],
            gear_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_gear(
        &self,
        caller: &Caller,
        pilot_id: &str,
        include_lost: bool,
    ) -> Result<Vec<ExoticGear>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            gear_columns!(),
            " FROM exotic_gear WHERE pilot_id = ?3 AND (?4 OR lost_log_id IS NULL) AND ",
            via_pilot_readable!("pilot_id"),
            " ORDER BY acquired_date, rowid"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id, include_lost],
            gear_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_active_gear(&self, caller: &Caller, pilot_id: &str) -> Result<Vec<ExoticGear>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT ",
            gear_columns!(),
            " FROM active_exotic_gear WHERE pilot_id = ?3 AND ",
            via_pilot_readable!("pilot_id"),
            " ORDER BY acquired_date, created_at, id"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id],
            gear_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_gear(&self, caller: &Caller, gear: &ExoticGear) -> Result<()> {
        validate_gear_name(&gear.name)?;

        let conn = self.conn();
        let rows = conn.execute(
            concat!(
                "UPDATE exotic_gear SET name = ?3, description = ?4, notes = ?5, updated_at = ?6
                 WHERE id = ?7 AND ",
                via_pilot_writable!("pilot_id")
            ),
            params![
                caller.user_id(),
                caller.is_gm(),
                gear.name,
                gear.description,
                gear.notes,
                format_datetime(&Utc::now()),
                gear.id,
            ],
        )?;

        if rows == 0 {
            return Err(denied(&conn, GEAR_VISIBLE, caller, &gear.id));
        }
        Ok(())
    }

    fn delete_gear(&self, caller: &Caller, id: &str) -> Result<bool> {
        let conn = self.conn();
        let rows = conn.execute(
            concat!(
                "DELETE FROM exotic_gear WHERE id = ?3 AND ",
                via_pilot_writable!("pilot_id")
            ),
            params![caller.user_id(), caller.is_gm(), id],
        )?;

        if rows == 0 {
            return match denied(&conn, GEAR_VISIBLE, caller, id) {
                Error::NotFound => Ok(false),
                e => Err(e),
            };
        }
        Ok(true)
    }

    // Reputation operations

    fn list_pilot_reputation(
        &self,
        caller: &Caller,
        pilot_id: &str,
    ) -> Result<Vec<PilotReputation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT pilot_id, corporation_id, corporation_name, reputation_value
             FROM pilot_reputation WHERE pilot_id = ?3 AND ",
            via_pilot_readable!("pilot_id"),
            " ORDER BY corporation_name"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id],
            |row| {
                Ok(PilotReputation {
                    pilot_id: row.get(0)?,
                    corporation_id: row.get(1)?,
                    corporation_name: row.get(2)?,
                    reputation_value: row.get(3)?,
                })
            },
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_reputation_history(
        &self,
        caller: &Caller,
        pilot_id: &str,
    ) -> Result<Vec<ReputationChangeWithCorp>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(concat!(
            "SELECT rc.id, rc.log_entry_id, rc.pilot_id, rc.corporation_id, rc.change_value,
                    rc.notes, rc.created_at, c.name
             FROM reputation_changes rc
             JOIN corporations c ON c.id = rc.corporation_id
             WHERE rc.pilot_id = ?3 AND ",
            via_pilot_readable!("rc.pilot_id"),
            " ORDER BY rc.created_at DESC, rc.rowid DESC"
        ))?;

        let rows = stmt.query_map(
            params![caller.user_id(), caller.is_gm(), pilot_id],
            |row| {
                Ok(ReputationChangeWithCorp {
                    change: reputation_from_row(row)?,
                    corporation_name: row.get(7)?,
                })
            },
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
