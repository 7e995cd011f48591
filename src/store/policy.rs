//! Row-level policy predicates.
//!
//! Every scoped statement binds the caller's user id as `?1` and the GM flag
//! as `?2`; statement-specific parameters start at `?3`. The predicates are
//! spliced into the SQL with `concat!` so each one is evaluated per row.

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Error;
use crate::types::Caller;

/// Pilot ids owned by the caller.
macro_rules! owned_pilots {
    () => {
        "SELECT id FROM pilots WHERE user_id = ?1"
    };
}

/// Read access for rows owned through a pilot column: owner or GM.
macro_rules! via_pilot_readable {
    ($col:literal) => {
        concat!("(", $col, " IN (", owned_pilots!(), ") OR ?2)")
    };
}

/// Write access for rows owned through a pilot column: owner only.
macro_rules! via_pilot_writable {
    ($col:literal) => {
        concat!($col, " IN (", owned_pilots!(), ")")
    };
}

/// Clocks without a pilot are visible to everyone.
macro_rules! clock_readable {
    () => {
        concat!(
            "(pilot_id IS NULL OR pilot_id IN (",
            owned_pilots!(),
            ") OR ?2)"
        )
    };
}

/// Global clocks are GM-managed; pilot clocks belong to the pilot's owner.
macro_rules! clock_writable {
    () => {
        concat!(
            "((pilot_id IS NULL AND ?2) OR pilot_id IN (",
            owned_pilots!(),
            "))"
        )
    };
}

pub(super) const USER_VISIBLE: &str = "SELECT 1 FROM users WHERE id = ?3 AND (id = ?1 OR ?2)";
pub(super) const PILOT_VISIBLE: &str =
    "SELECT 1 FROM pilots WHERE id = ?3 AND (user_id = ?1 OR ?2)";
pub(super) const CLOCK_VISIBLE: &str =
    concat!("SELECT 1 FROM clocks WHERE id = ?3 AND ", clock_readable!());
pub(super) const LOG_VISIBLE: &str = concat!(
    "SELECT 1 FROM log_entries WHERE id = ?3 AND ",
    via_pilot_readable!("pilot_id")
);
pub(super) const GEAR_VISIBLE: &str = concat!(
    "SELECT 1 FROM exotic_gear WHERE id = ?3 AND ",
    via_pilot_readable!("pilot_id")
);

/// Classifies a scoped write that matched nothing. Rows the caller can read
/// are reported as `Forbidden`; everything else is indistinguishable from a
/// missing row.
pub(super) fn denied(conn: &Connection, visible_sql: &str, caller: &Caller, id: &str) -> Error {
    let visible = conn
        .query_row(
            visible_sql,
            params![caller.user_id(), caller.is_gm(), id],
            |_| Ok(()),
        )
        .optional();

    match visible {
        Ok(Some(())) => {
            tracing::warn!(user_id = caller.user_id(), row_id = id, "write denied by row policy");
            Error::Forbidden
        }
        Ok(None) => Error::NotFound,
        Err(e) => Error::from(e),
    }
}
