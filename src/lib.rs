//! # Campaign Ledger
//!
//! Storage and authorization for a tabletop mech campaign: pilots and their
//! resource counters, corporations, progress clocks, and the log ledger that
//! drives every change.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! campaign-ledger = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use campaign_ledger::store::{SqliteStore, Store};
//! use campaign_ledger::types::Caller;
//!
//! let store = SqliteStore::new("./data/ledger.db").unwrap();
//! store.initialize().unwrap();
//!
//! let caller = Caller::resolve(&store, &user_id).unwrap();
//! let pilots = store.list_pilots(&caller).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI module and the `campaign-ledger` binary. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod store;
pub mod types;
pub mod validation;
