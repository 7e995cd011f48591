//! Library-level scenarios: ledger conventions, row policies across
//! entities, cascades, and concurrent writers against one database file.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use campaign_ledger::error::Error;
use campaign_ledger::store::{SqliteStore, Store};
use campaign_ledger::types::{
    Caller, Clock, ClockTick, Corporation, IdentityCreated, IdentityMetadata, LogType,
    NewLogEntry, NewReputationChange, Pilot,
};

struct Ledger {
    temp: TempDir,
    store: SqliteStore,
}

impl Ledger {
    fn new() -> Self {
        let temp = TempDir::new().expect("failed to create temp dir");
        let store = open(temp.path());
        Self { temp, store }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn signup(&self, id: &str, is_gm: bool) -> Caller {
        self.store
            .handle_identity_created(&IdentityCreated {
                id: id.to_string(),
                metadata: IdentityMetadata::default(),
            })
            .unwrap();
        if is_gm {
            self.store.set_user_gm(id, true).unwrap();
        }
        Caller::resolve(&self.store, id).unwrap()
    }

    fn pilot(&self, owner: &Caller, name: &str) -> Pilot {
        let now = Utc::now();
        let pilot = Pilot {
            id: Uuid::new_v4().to_string(),
            user_id: owner.user_id().to_string(),
            name: name.to_string(),
            callsign: None,
            license_level: 0,
            ll_clock_progress: 0,
            background: None,
            notes: None,
            manna: 0,
            downtime: 0,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_pilot(owner, &pilot).unwrap();
        pilot
    }

    fn corporation(&self, gm: &Caller, name: &str) -> Corporation {
        let now = Utc::now();
        let corp = Corporation {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_corporation(gm, &corp).unwrap();
        corp
    }

    fn clock(&self, caller: &Caller, pilot_id: Option<&str>, segments: i32) -> Clock {
        let now = Utc::now();
        let clock = Clock {
            id: Uuid::new_v4().to_string(),
            pilot_id: pilot_id.map(str::to_string),
            name: "Downtime project".to_string(),
            description: None,
            segments,
            filled: 0,
            tick_amount: 1,
            completed: false,
            created_at: now,
            updated_at: now,
        };
        self.store.create_clock(caller, &clock).unwrap();
        clock
    }
}

fn open(dir: &Path) -> SqliteStore {
    let store = SqliteStore::new(dir.join("ledger.db")).expect("failed to open store");
    store.initialize().expect("failed to migrate");
    store
}

#[test]
fn test_reputation_follows_its_log() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let gm = ledger.signup("gm", true);
    let p1 = ledger.pilot(&user, "P1");
    let corp = ledger.corporation(&gm, "Harrison Armory");

    let mut entry = NewLogEntry::new(&p1.id, LogType::Game);
    entry.manna_change = 5;
    entry.reputation_changes.push(NewReputationChange {
        corporation_id: corp.id.clone(),
        change_value: 2,
        notes: None,
    });
    let l1 = ledger.store.record_log_entry(&user, &entry).unwrap();

    let pilot = ledger.store.get_pilot(&user, &p1.id).unwrap().unwrap();
    assert_eq!(pilot.manna, 5);

    let reputation = ledger.store.list_pilot_reputation(&user, &p1.id).unwrap();
    assert_eq!(reputation.len(), 1);
    assert_eq!(reputation[0].pilot_id, p1.id);
    assert_eq!(reputation[0].corporation_id, corp.id);
    assert_eq!(reputation[0].corporation_name, "Harrison Armory");
    assert_eq!(reputation[0].reputation_value, 2);

    assert!(ledger.store.delete_log_entry(&user, &l1.log.id).unwrap());
    assert!(ledger.store.list_pilot_reputation(&user, &p1.id).unwrap().is_empty());
    assert!(ledger.store.list_reputation_history(&user, &p1.id).unwrap().is_empty());
}

#[test]
fn test_counters_match_log_deltas() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let gm = ledger.signup("gm", true);
    let pilot = ledger.pilot(&user, "Ilse");
    let own = ledger.clock(&user, Some(&pilot.id), 6);
    let global = ledger.clock(&gm, None, 10);

    let deltas: [(i64, i64, i32, i32); 4] = [(100, 1, 1, 2), (-40, 0, 2, 1), (15, -1, 0, 3), (0, 3, 1, 4)];
    for (i, (manna, downtime, ll, ticks)) in deltas.iter().enumerate() {
        let log_type = if i % 2 == 0 { LogType::Game } else { LogType::Trade };
        let mut entry = NewLogEntry::new(&pilot.id, log_type);
        entry.manna_change = *manna;
        entry.downtime_change = *downtime;
        entry.ll_clock_change = *ll;
        entry.clock_ticks.push(ClockTick {
            clock_id: own.id.clone(),
            ticks: *ticks,
        });
        entry.clock_ticks.push(ClockTick {
            clock_id: global.id.clone(),
            ticks: *ticks,
        });
        ledger.store.record_log_entry(&user, &entry).unwrap();
    }

    let logs = ledger.store.list_log_entries(&user, &pilot.id).unwrap();
    assert_eq!(logs.len(), 4);
    let pilot = ledger.store.get_pilot(&user, &pilot.id).unwrap().unwrap();
    assert_eq!(pilot.manna, logs.iter().map(|l| l.manna_change).sum::<i64>());
    assert_eq!(pilot.downtime, logs.iter().map(|l| l.downtime_change).sum::<i64>());
    assert_eq!(
        pilot.ll_clock_progress,
        logs.iter().map(|l| l.ll_clock_change).sum::<i32>()
    );

    for clock in [&own, &global] {
        let progress = ledger.store.list_clock_progress(&user, &clock.id).unwrap();
        let ticked: i32 = progress.iter().map(|p| p.ticks).sum();
        let stored = ledger.store.get_clock(&user, &clock.id).unwrap().unwrap();
        assert_eq!(stored.filled, ticked.min(stored.segments));
        assert_eq!(stored.filled, progress.iter().map(|p| p.applied).sum::<i32>());
        assert_eq!(stored.completed, stored.filled == stored.segments);
    }
}

#[test]
fn test_concurrent_writers_do_not_lose_updates() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let pilot = ledger.pilot(&user, "Ilse");
    let clock = ledger.clock(&user, Some(&pilot.id), 1000);

    const WRITERS: usize = 4;
    const LOGS_PER_WRITER: usize = 25;

    let shared = Arc::new(open(ledger.path()));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            // Half the writers share one connection, the rest open their own.
            let store = if i % 2 == 0 {
                Arc::clone(&shared)
            } else {
                Arc::new(open(ledger.path()))
            };
            let pilot_id = pilot.id.clone();
            let clock_id = clock.id.clone();
            thread::spawn(move || {
                let caller = Caller::resolve(store.as_ref(), "user-u").unwrap();
                for _ in 0..LOGS_PER_WRITER {
                    let mut entry = NewLogEntry::new(&pilot_id, LogType::Trade);
                    entry.manna_change = 1;
                    entry.clock_ticks.push(ClockTick {
                        clock_id: clock_id.clone(),
                        ticks: 1,
                    });
                    store.record_log_entry(&caller, &entry).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let total = (WRITERS * LOGS_PER_WRITER) as i64;
    let pilot = ledger.store.get_pilot(&user, &pilot.id).unwrap().unwrap();
    assert_eq!(pilot.manna, total);
    let clock = ledger.store.get_clock(&user, &clock.id).unwrap().unwrap();
    assert_eq!(i64::from(clock.filled), total);
    assert_eq!(
        ledger.store.list_log_entries(&user, &pilot.id).unwrap().len() as i64,
        total
    );
}

#[test]
fn test_unknown_identity_is_unauthorized() {
    let ledger = Ledger::new();
    assert!(matches!(
        Caller::resolve(&ledger.store, "ghost"),
        Err(Error::Unauthorized)
    ));
}

#[test]
fn test_log_type_is_checked_by_storage() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let pilot = ledger.pilot(&user, "Ilse");

    let conn = ledger.store.connection();
    let result = conn.execute(
        "INSERT INTO log_entries (id, pilot_id, type) VALUES ('l-raw', ?1, 'raid')",
        [&pilot.id],
    );
    assert!(result.is_err());
}

#[test]
fn test_deleting_pilot_cascades() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let gm = ledger.signup("gm", true);
    let pilot = ledger.pilot(&user, "Ilse");
    let corp = ledger.corporation(&gm, "SSC");
    let clock = ledger.clock(&user, Some(&pilot.id), 4);

    let mut entry = NewLogEntry::new(&pilot.id, LogType::Game);
    entry.clock_ticks.push(ClockTick {
        clock_id: clock.id.clone(),
        ticks: 1,
    });
    entry.reputation_changes.push(NewReputationChange {
        corporation_id: corp.id.clone(),
        change_value: 1,
        notes: None,
    });
    let record = ledger.store.record_log_entry(&user, &entry).unwrap();

    assert!(ledger.store.delete_pilot(&user, &pilot.id).unwrap());

    assert!(ledger.store.get_clock(&gm, &clock.id).unwrap().is_none());
    assert!(ledger.store.get_log_entry(&gm, &record.log.id).unwrap().is_none());
    assert!(ledger.store.list_pilot_reputation(&gm, &pilot.id).unwrap().is_empty());
    assert!(ledger.store.get_corporation(&gm, &corp.id).unwrap().is_some());
}

#[test]
fn test_deleting_corporation_drops_its_standing() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let gm = ledger.signup("gm", true);
    let pilot = ledger.pilot(&user, "Ilse");
    let armory = ledger.corporation(&gm, "Harrison Armory");
    let ssc = ledger.corporation(&gm, "SSC");

    let mut entry = NewLogEntry::new(&pilot.id, LogType::Game);
    for corp in [&armory, &ssc] {
        entry.reputation_changes.push(NewReputationChange {
            corporation_id: corp.id.clone(),
            change_value: 1,
            notes: None,
        });
    }
    let record = ledger.store.record_log_entry(&user, &entry).unwrap();

    assert!(ledger.store.delete_corporation(&gm, &armory.id).unwrap());

    let reputation = ledger.store.list_pilot_reputation(&user, &pilot.id).unwrap();
    assert_eq!(reputation.len(), 1);
    assert_eq!(reputation[0].corporation_id, ssc.id);
    assert!(ledger.store.get_log_entry(&user, &record.log.id).unwrap().is_some());
}

#[test]
fn test_deleting_clock_drops_its_progress() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let pilot = ledger.pilot(&user, "Ilse");
    let clock = ledger.clock(&user, Some(&pilot.id), 4);

    let mut entry = NewLogEntry::new(&pilot.id, LogType::Game);
    entry.clock_ticks.push(ClockTick {
        clock_id: clock.id.clone(),
        ticks: 2,
    });
    let record = ledger.store.record_log_entry(&user, &entry).unwrap();

    assert!(ledger.store.delete_clock(&user, &clock.id).unwrap());

    let stored = ledger
        .store
        .get_log_entry_record(&user, &record.log.id)
        .unwrap()
        .unwrap();
    assert!(stored.clock_progress.is_empty());
    assert!(matches!(
        ledger.store.list_clock_progress(&user, &clock.id),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_gm_reads_everything_but_writes_only_shared_rows() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let gm = ledger.signup("gm", true);
    let pilot = ledger.pilot(&user, "Ilse");
    let clock = ledger.clock(&user, Some(&pilot.id), 4);

    let mut entry = NewLogEntry::new(&pilot.id, LogType::Game);
    entry.clock_ticks.push(ClockTick {
        clock_id: clock.id.clone(),
        ticks: 1,
    });
    let record = ledger.store.record_log_entry(&user, &entry).unwrap();

    assert_eq!(ledger.store.list_users(&gm).unwrap().len(), 2);
    assert_eq!(ledger.store.list_log_entries(&gm, &pilot.id).unwrap().len(), 1);
    assert_eq!(ledger.store.list_clock_progress(&gm, &clock.id).unwrap().len(), 1);

    assert!(matches!(
        ledger.store.delete_log_entry(&gm, &record.log.id),
        Err(Error::Forbidden)
    ));
    assert!(matches!(
        ledger.store.delete_clock(&gm, &clock.id),
        Err(Error::Forbidden)
    ));

    let stranger = ledger.signup("stranger", false);
    assert!(!ledger.store.delete_log_entry(&stranger, &record.log.id).unwrap());
    assert!(ledger.store.list_log_entries(&stranger, &pilot.id).unwrap().is_empty());
    assert!(matches!(
        ledger.store.list_clock_progress(&stranger, &clock.id),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_migrations_survive_reopen() {
    let ledger = Ledger::new();
    let user = ledger.signup("user-u", false);
    let pilot = ledger.pilot(&user, "Ilse");

    let reopened = open(ledger.path());
    let caller = Caller::resolve(&reopened, "user-u").unwrap();
    assert_eq!(
        reopened.get_pilot(&caller, &pilot.id).unwrap().unwrap().name,
        "Ilse"
    );
}
