use chrono::Utc;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::store::Store;
use crate::types::{Clock, Corporation, Pilot};

use super::{init_store, print_json, resolve_caller};

pub fn run_pilot_list(config: &LedgerConfig, as_user: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    print_json(&store.list_pilots(&caller)?)
}

pub fn run_pilot_add(
    config: &LedgerConfig,
    as_user: &str,
    name: String,
    callsign: Option<String>,
    license_level: i32,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    let now = Utc::now();
    let pilot = Pilot {
        id: Uuid::new_v4().to_string(),
        user_id: caller.user_id().to_string(),
        name,
        callsign,
        license_level,
        ll_clock_progress: 0,
        background: None,
        notes: None,
        manna: 0,
        downtime: 0,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };
    store.create_pilot(&caller, &pilot)?;
    print_json(&pilot)
}

pub fn run_corporation_list(config: &LedgerConfig, as_user: &str) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    print_json(&store.list_corporations(&caller)?)
}

pub fn run_corporation_add(
    config: &LedgerConfig,
    as_user: &str,
    name: String,
    description: Option<String>,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    let now = Utc::now();
    let corp = Corporation {
        id: Uuid::new_v4().to_string(),
        name,
        description,
        created_at: now,
        updated_at: now,
    };
    store.create_corporation(&caller, &corp)?;
    print_json(&corp)
}

pub fn run_clock_list(
    config: &LedgerConfig,
    as_user: &str,
    pilot: Option<&str>,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;
    print_json(&store.list_clocks(&caller, pilot)?)
}

pub fn run_clock_add(
    config: &LedgerConfig,
    as_user: &str,
    name: String,
    segments: i32,
    pilot: Option<String>,
    tick_amount: i32,
    description: Option<String>,
) -> anyhow::Result<()> {
    let store = init_store(config)?;
    let caller = resolve_caller(&store, as_user)?;

    let now = Utc::now();
    let clock = Clock {
        id: Uuid::new_v4().to_string(),
        pilot_id: pilot,
        name,
        description,
        segments,
        filled: 0,
        tick_amount,
        completed: false,
        created_at: now,
        updated_at: now,
    };
    store.create_clock(&caller, &clock)?;
    print_json(&clock)
}
