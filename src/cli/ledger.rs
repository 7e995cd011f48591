use std::path::Path;

use anyhow::Context;

use crate::config::LedgerConfig;
use crate::store::Store;
use crate::types::NewLogEntry;

use super::{init_store, print_json, resolve_caller};

pub fn run_log_record(config: &LedgerConfig, as_user: &str, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let entry: NewLogEntry = serde_json::from_str(&raw)
        .with_context(|| format!("invalid log entry in {}", file.display()))?;

    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    let record = store.record_log_entry(&caller, &entry)?;
    print_json(&record)
}

pub fn run_log_show(config: &LedgerConfig, as_user: &str, id: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    let record = store
        .get_log_entry_record(&caller, id)?
        .ok_or_else(|| anyhow::anyhow!("Log entry not found: {}", id))?;
    print_json(&record)
}

pub fn run_log_list(config: &LedgerConfig, as_user: &str, pilot: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    print_json(&store.list_log_entries(&caller, pilot)?)
}

pub fn run_log_revert(config: &LedgerConfig, as_user: &str, id: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    store.revert_log_entry(&caller, id)?;
    print_json(&serde_json::json!({ "reverted": id }))
}

pub fn run_reputation(
    config: &LedgerConfig,
    as_user: &str,
    pilot: &str,
    history: bool,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    if history {
        print_json(&store.list_reputation_history(&caller, pilot)?)
    } else {
        print_json(&store.list_pilot_reputation(&caller, pilot)?)
    }
}

pub fn run_gear(config: &LedgerConfig, as_user: &str, pilot: &str, all: bool) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    let gear = if all {
        store.list_gear(&caller, pilot, true)?
    } else {
        store.list_active_gear(&caller, pilot)?
    };
    print_json(&gear)
}
