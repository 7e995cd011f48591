/// Ordered schema migrations. The applied version lives in `PRAGMA user_version`.
pub const MIGRATIONS: &[(i32, &str, &str)] = &[(1, "initial_schema", SCHEMA_V1)];

const SCHEMA_V1: &str = r#"
-- External auth identities; the provider owns these rows
CREATE TABLE IF NOT EXISTS identities (
    id TEXT PRIMARY KEY,
    raw_user_meta_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now'))
);

-- One profile per identity, created by the signup trigger below
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY REFERENCES identities(id) ON DELETE CASCADE,
    discord_id TEXT,
    discord_username TEXT,
    discord_avatar TEXT,
    display_name TEXT NOT NULL DEFAULT 'Pilot',
    is_gm INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS pilots (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    callsign TEXT,
    license_level INTEGER NOT NULL DEFAULT 0 CHECK (license_level BETWEEN 0 AND 12),
    ll_clock_progress INTEGER NOT NULL DEFAULT 0 CHECK (ll_clock_progress >= 0),
    background TEXT,
    notes TEXT,
    manna INTEGER NOT NULL DEFAULT 0,
    downtime INTEGER NOT NULL DEFAULT 0,
    avatar_url TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Factions curated by the GM, readable by everyone
CREATE TABLE IF NOT EXISTS corporations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Segmented progress; pilot_id NULL = global clock
CREATE TABLE IF NOT EXISTS clocks (
    id TEXT PRIMARY KEY,
    pilot_id TEXT REFERENCES pilots(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    segments INTEGER NOT NULL CHECK (segments > 0),
    filled INTEGER NOT NULL DEFAULT 0 CHECK (filled >= 0),
    tick_amount INTEGER NOT NULL DEFAULT 1 CHECK (tick_amount > 0),
    completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),

    CONSTRAINT clock_filled_within_segments CHECK (filled <= segments)
);

-- The ledger: every resource change is carried by one of these
CREATE TABLE IF NOT EXISTS log_entries (
    id TEXT PRIMARY KEY,
    pilot_id TEXT NOT NULL REFERENCES pilots(id) ON DELETE CASCADE,
    type TEXT NOT NULL CHECK (type IN ('game', 'trade')),
    description TEXT,
    manna_change INTEGER NOT NULL DEFAULT 0,
    downtime_change INTEGER NOT NULL DEFAULT 0,
    ll_clock_change INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS exotic_gear (
    id TEXT PRIMARY KEY,
    pilot_id TEXT NOT NULL REFERENCES pilots(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    notes TEXT,
    acquired_date TEXT DEFAULT (datetime('now')),
    acquired_log_id TEXT REFERENCES log_entries(id) ON DELETE SET NULL,
    lost_log_id TEXT REFERENCES log_entries(id) ON DELETE SET NULL,  -- NULL = still held
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Which log ticked which clock, and by how much; applied excludes ticks lost to the cap
CREATE TABLE IF NOT EXISTS clock_progress (
    id TEXT PRIMARY KEY,
    log_entry_id TEXT NOT NULL REFERENCES log_entries(id) ON DELETE CASCADE,
    clock_id TEXT NOT NULL REFERENCES clocks(id) ON DELETE CASCADE,
    ticks INTEGER NOT NULL CHECK (ticks > 0),
    applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),

    CONSTRAINT clock_progress_applied_within_ticks CHECK (applied BETWEEN 0 AND ticks)
);

-- Append-only reputation ledger; standing is always the sum of these rows
CREATE TABLE IF NOT EXISTS reputation_changes (
    id TEXT PRIMARY KEY,
    log_entry_id TEXT NOT NULL REFERENCES log_entries(id) ON DELETE CASCADE,
    pilot_id TEXT NOT NULL REFERENCES pilots(id) ON DELETE CASCADE,
    corporation_id TEXT NOT NULL REFERENCES corporations(id) ON DELETE CASCADE,
    change_value INTEGER NOT NULL,
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_pilots_user ON pilots(user_id);
CREATE INDEX IF NOT EXISTS idx_clocks_pilot ON clocks(pilot_id);
CREATE INDEX IF NOT EXISTS idx_log_entries_pilot ON log_entries(pilot_id);
CREATE INDEX IF NOT EXISTS idx_exotic_gear_pilot ON exotic_gear(pilot_id);
CREATE INDEX IF NOT EXISTS idx_exotic_gear_acquired_log ON exotic_gear(acquired_log_id);
CREATE INDEX IF NOT EXISTS idx_exotic_gear_lost_log ON exotic_gear(lost_log_id);
CREATE INDEX IF NOT EXISTS idx_clock_progress_log ON clock_progress(log_entry_id);
CREATE INDEX IF NOT EXISTS idx_clock_progress_clock ON clock_progress(clock_id);
CREATE INDEX IF NOT EXISTS idx_reputation_changes_log ON reputation_changes(log_entry_id);
CREATE INDEX IF NOT EXISTS idx_reputation_changes_pilot ON reputation_changes(pilot_id);
CREATE INDEX IF NOT EXISTS idx_reputation_changes_corporation ON reputation_changes(corporation_id);

CREATE VIEW IF NOT EXISTS pilot_reputation AS
SELECT
    rc.pilot_id,
    rc.corporation_id,
    c.name AS corporation_name,
    CAST(SUM(rc.change_value) AS INTEGER) AS reputation_value
FROM reputation_changes rc
JOIN corporations c ON c.id = rc.corporation_id
GROUP BY rc.pilot_id, rc.corporation_id, c.name;

CREATE VIEW IF NOT EXISTS active_exotic_gear AS
SELECT * FROM exotic_gear WHERE lost_log_id IS NULL;

-- Signup hook: runs once per identity, never on updates
CREATE TRIGGER IF NOT EXISTS on_identity_created
AFTER INSERT ON identities
FOR EACH ROW
BEGIN
    INSERT INTO users (id, discord_id, discord_username, discord_avatar, display_name, created_at, updated_at)
    VALUES (
        NEW.id,
        json_extract(NEW.raw_user_meta_data, '$.provider_id'),
        json_extract(NEW.raw_user_meta_data, '$.name'),
        json_extract(NEW.raw_user_meta_data, '$.avatar_url'),
        COALESCE(
            json_extract(NEW.raw_user_meta_data, '$.full_name'),
            json_extract(NEW.raw_user_meta_data, '$.name'),
            'Pilot'
        ),
        NEW.created_at,
        NEW.created_at
    );
END;
"#;
