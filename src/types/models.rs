use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LogType;

/// Payload of the auth provider's "user created" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityCreated {
    pub id: String,
    #[serde(default)]
    pub metadata: IdentityMetadata,
}

/// Provider metadata copied onto the user row at signup. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_avatar: Option<String>,
    pub display_name: String,
    pub is_gm: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pilot {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    pub license_level: i32,
    pub ll_clock_progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub manna: i64,
    pub downtime: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corporation {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    pub id: String,
    /// None for GM-wide clocks, which every caller can read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pilot_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub segments: i32,
    pub filled: i32,
    pub tick_amount: i32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub pilot_id: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub manna_change: i64,
    pub downtime_change: i64,
    pub ll_clock_change: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExoticGear {
    pub id: String,
    pub pilot_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub acquired_date: DateTime<Utc>,
    pub acquired_log_id: Option<String>,
    /// Set once the gear is lost; None means the pilot still holds it.
    pub lost_log_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExoticGear {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lost_log_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockProgress {
    pub id: String,
    pub log_entry_id: String,
    pub clock_id: String,
    pub ticks: i32,
    /// Ticks that moved the clock; less than `ticks` when the clock filled up.
    pub applied: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationChange {
    pub id: String,
    pub log_entry_id: String,
    pub pilot_id: String,
    pub corporation_id: String,
    pub change_value: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationChangeWithCorp {
    #[serde(flatten)]
    pub change: ReputationChange,
    pub corporation_name: String,
}

/// One row of the `pilot_reputation` view: the summed standing for a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotReputation {
    pub pilot_id: String,
    pub corporation_id: String,
    pub corporation_name: String,
    pub reputation_value: i64,
}

/// Everything a single game or trade event changes, applied as one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub pilot_id: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub manna_change: i64,
    #[serde(default)]
    pub downtime_change: i64,
    #[serde(default)]
    pub ll_clock_change: i32,
    #[serde(default)]
    pub clock_ticks: Vec<ClockTick>,
    #[serde(default)]
    pub reputation_changes: Vec<NewReputationChange>,
    #[serde(default)]
    pub gear_acquired: Vec<NewGear>,
    /// Ids of active gear the pilot loses in this event.
    #[serde(default)]
    pub gear_lost: Vec<String>,
}

impl NewLogEntry {
    #[must_use]
    pub fn new(pilot_id: impl Into<String>, log_type: LogType) -> Self {
        Self {
            pilot_id: pilot_id.into(),
            log_type,
            description: None,
            manna_change: 0,
            downtime_change: 0,
            ll_clock_change: 0,
            clock_ticks: Vec::new(),
            reputation_changes: Vec::new(),
            gear_acquired: Vec::new(),
            gear_lost: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockTick {
    pub clock_id: String,
    pub ticks: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReputationChange {
    pub corporation_id: String,
    pub change_value: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGear {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A log entry together with every junction row it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryRecord {
    #[serde(flatten)]
    pub log: LogEntry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clock_progress: Vec<ClockProgress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reputation_changes: Vec<ReputationChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gear_acquired: Vec<ExoticGear>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gear_lost: Vec<String>,
}
