use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Link a new auth identity and create its user profile
    Create {
        /// Identity id issued by the auth provider
        #[arg(long)]
        id: String,

        /// Provider account id (stored as the Discord id)
        #[arg(long)]
        provider_id: Option<String>,

        /// Provider username
        #[arg(long)]
        name: Option<String>,

        /// Preferred display name
        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        avatar_url: Option<String>,
    },

    /// Remove an identity and everything its user owns
    Delete {
        /// Identity id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PilotCommands {
    /// List the pilots visible to a user
    List {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,
    },

    /// Create a pilot owned by the acting user
    Add {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        callsign: Option<String>,

        /// License level (0-12)
        #[arg(long, default_value_t = 0)]
        license_level: i32,
    },
}

#[derive(Subcommand)]
pub enum CorporationCommands {
    /// List all corporations
    List {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,
    },

    /// Add a corporation (GM only)
    Add {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ClockCommands {
    /// List the clocks visible to a user
    List {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        /// Only clocks belonging to this pilot
        #[arg(long)]
        pilot: Option<String>,
    },

    /// Create a clock; omit --pilot for a global clock (GM only)
    Add {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        segments: i32,

        #[arg(long)]
        pilot: Option<String>,

        #[arg(long, default_value_t = 1)]
        tick_amount: i32,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Record a log entry from a JSON file and apply its effects
    Record {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        /// Path to the log entry JSON
        #[arg(long)]
        file: PathBuf,
    },

    /// Show a log entry with everything it changed
    Show {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        /// Log entry id
        id: String,
    },

    /// List a pilot's log entries, newest first
    List {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        pilot: String,
    },

    /// Undo a log entry's effects and delete it
    Revert {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        /// Log entry id
        id: String,
    },
}
