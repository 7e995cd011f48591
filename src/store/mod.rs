#[macro_use]
mod policy;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Entity operations take the [`Caller`] and apply the row-level policy in the
/// query itself. Rows the caller cannot read surface as `NotFound`; rows it can
/// read but not write surface as `Forbidden`.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Identity linkage (service role)
    fn handle_identity_created(&self, event: &IdentityCreated) -> Result<User>;
    fn handle_identity_deleted(&self, id: &str) -> Result<bool>;
    fn lookup_is_gm(&self, user_id: &str) -> Result<Option<bool>>;
    fn set_user_gm(&self, user_id: &str, is_gm: bool) -> Result<()>;

    // User operations
    fn get_user(&self, caller: &Caller, id: &str) -> Result<Option<User>>;
    fn list_users(&self, caller: &Caller) -> Result<Vec<User>>;
    fn update_user_profile(&self, caller: &Caller, user: &User) -> Result<()>;

    // Pilot operations
    fn create_pilot(&self, caller: &Caller, pilot: &Pilot) -> Result<()>;
    fn get_pilot(&self, caller: &Caller, id: &str) -> Result<Option<Pilot>>;
    fn list_pilots(&self, caller: &Caller) -> Result<Vec<Pilot>>;
    fn update_pilot(&self, caller: &Caller, pilot: &Pilot) -> Result<()>;
    fn delete_pilot(&self, caller: &Caller, id: &str) -> Result<bool>;

    // Corporation operations
    fn create_corporation(&self, caller: &Caller, corp: &Corporation) -> Result<()>;
    fn get_corporation(&self, caller: &Caller, id: &str) -> Result<Option<Corporation>>;
    fn list_corporations(&self, caller: &Caller) -> Result<Vec<Corporation>>;
    fn update_corporation(&self, caller: &Caller, corp: &Corporation) -> Result<()>;
    fn delete_corporation(&self, caller: &Caller, id: &str) -> Result<bool>;

    // Clock operations
    fn create_clock(&self, caller: &Caller, clock: &Clock) -> Result<()>;
    fn get_clock(&self, caller: &Caller, id: &str) -> Result<Option<Clock>>;
    fn list_clocks(&self, caller: &Caller, pilot_id: Option<&str>) -> Result<Vec<Clock>>;
    fn update_clock(&self, caller: &Caller, clock: &Clock) -> Result<()>;
    fn delete_clock(&self, caller: &Caller, id: &str) -> Result<bool>;
    fn list_clock_progress(&self, caller: &Caller, clock_id: &str) -> Result<Vec<ClockProgress>>;

    // Log ledger operations
    fn record_log_entry(&self, caller: &Caller, entry: &NewLogEntry) -> Result<LogEntryRecord>;
    fn get_log_entry(&self, caller: &Caller, id: &str) -> Result<Option<LogEntry>>;
    fn get_log_entry_record(&self, caller: &Caller, id: &str) -> Result<Option<LogEntryRecord>>;
    fn list_log_entries(&self, caller: &Caller, pilot_id: &str) -> Result<Vec<LogEntry>>;
    fn update_log_entry(&self, caller: &Caller, log: &LogEntry) -> Result<()>;
    fn delete_log_entry(&self, caller: &Caller, id: &str) -> Result<bool>;
    fn revert_log_entry(&self, caller: &Caller, id: &str) -> Result<()>;

    // Exotic gear operations
    fn get_gear(&self, caller: &Caller, id: &str) -> Result<Option<ExoticGear>>;
    fn list_gear(&self, caller: &Caller, pilot_id: &str, include_lost: bool)
    -> Result<Vec<ExoticGear>>;
    fn list_active_gear(&self, caller: &Caller, pilot_id: &str) -> Result<Vec<ExoticGear>>;
    fn update_gear(&self, caller: &Caller, gear: &ExoticGear) -> Result<()>;
    fn delete_gear(&self, caller: &Caller, id: &str) -> Result<bool>;

    // Reputation operations
    fn list_pilot_reputation(&self, caller: &Caller, pilot_id: &str)
    -> Result<Vec<PilotReputation>>;
    fn list_reputation_history(
        &self,
        caller: &Caller,
        pilot_id: &str,
    ) -> Result<Vec<ReputationChangeWithCorp>>;
}
