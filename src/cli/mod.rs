mod commands;
mod identity;
mod ledger;
mod roster;

pub use commands::{
    ClockCommands, CorporationCommands, IdentityCommands, LogCommands, PilotCommands,
};
pub use identity::{run_gm, run_identity_create, run_identity_delete};
pub use ledger::{
    run_gear, run_log_list, run_log_record, run_log_revert, run_log_show, run_reputation,
};
pub use roster::{
    run_clock_add, run_clock_list, run_corporation_add, run_corporation_list, run_pilot_add,
    run_pilot_list,
};

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use crate::config::LedgerConfig;
use crate::store::{SqliteStore, Store};
use crate::types::{Caller, get_ll_clock_segments};

/// Opens the ledger database, checking that `init` has been run.
pub fn init_store(config: &LedgerConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'campaign-ledger init' first.",
            db_path.display()
        );
    }

    let store =
        SqliteStore::with_busy_timeout(&db_path, Duration::from_millis(config.busy_timeout_ms))?;
    store.initialize()?;
    Ok(store)
}

pub fn run_init(config: &LedgerConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    let db_path = config.db_path();
    let store =
        SqliteStore::with_busy_timeout(&db_path, Duration::from_millis(config.busy_timeout_ms))?;
    store.initialize()?;

    print_json(&serde_json::json!({ "database": db_path }))
}

pub fn run_ll_segments(level: i32) -> anyhow::Result<()> {
    print_json(&serde_json::json!({
        "license_level": level,
        "segments": get_ll_clock_segments(level),
    }))
}

pub(crate) fn resolve_caller(store: &SqliteStore, user_id: &str) -> anyhow::Result<Caller> {
    Caller::resolve(store, user_id).with_context(|| format!("unknown user '{user_id}'"))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
