use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The kind of event a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Game,
    Trade,
}

impl LogType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogType::Game => "game",
            LogType::Trade => "trade",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game" => Ok(LogType::Game),
            "trade" => Ok(LogType::Trade),
            other => Err(Error::BadRequest(format!(
                "log type must be 'game' or 'trade', got '{other}'"
            ))),
        }
    }
}

impl ToSql for LogType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LogType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}
