mod ledger;

pub use ledger::LedgerConfig;
