//! SQL schema for the rolo SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS contacts (
    contact_id  TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,       -- 'person' | 'company'
    name        TEXT NOT NULL,
    lastname    TEXT,                -- person only
    nickname    TEXT,                -- person only
    birthday    INTEGER NOT NULL DEFAULT 0,  -- FuzzyDate coded integer
    owner_id    TEXT REFERENCES contacts(contact_id),
    attic       INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL        -- ISO 8601 UTC; server-assigned
);

-- Properties are immutable except for the attic flag.
-- Edits write a replacement row; the lineage lives in supersessions.
-- No FK on contact_id: contacts and properties are separate entity groups;
-- dangling references are caught by the repair scan.
CREATE TABLE IF NOT EXISTS properties (
    property_id TEXT PRIMARY KEY,
    contact_id  TEXT NOT NULL,
    kind        TEXT NOT NULL,       -- discriminant of PropertyValue variant
    value_json  TEXT NOT NULL,       -- JSON payload (inner data only)
    attic       INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

-- A property replaced by a newer, corrected version.
CREATE TABLE IF NOT EXISTS supersessions (
    supersession_id TEXT PRIMARY KEY,
    old_property_id TEXT NOT NULL REFERENCES properties(property_id),
    new_property_id TEXT NOT NULL REFERENCES properties(property_id),
    recorded_at     TEXT NOT NULL,
    UNIQUE (old_property_id),
    CHECK  (old_property_id != new_property_id)
);

-- Normalised search tokens. Append-only; rows are shared across contacts
-- and only the purge operation ever deletes them.
CREATE TABLE IF NOT EXISTS plain_keys (
    key_id TEXT PRIMARY KEY,
    token  TEXT NOT NULL UNIQUE
);

-- token -> contact posting rows. No FK on contact_id: the index is
-- reconciled out of band and rows may briefly outlive their contact.
CREATE TABLE IF NOT EXISTS index_entries (
    key_id     TEXT NOT NULL REFERENCES plain_keys(key_id),
    contact_id TEXT NOT NULL,
    PRIMARY KEY (key_id, contact_id)
);

CREATE INDEX IF NOT EXISTS contacts_owner_idx      ON contacts(owner_id);
CREATE INDEX IF NOT EXISTS contacts_created_idx    ON contacts(created_at);
CREATE INDEX IF NOT EXISTS properties_contact_idx  ON properties(contact_id);
CREATE INDEX IF NOT EXISTS properties_kind_idx     ON properties(kind);
CREATE INDEX IF NOT EXISTS properties_created_idx  ON properties(created_at);
CREATE INDEX IF NOT EXISTS entries_contact_idx     ON index_entries(contact_id);

PRAGMA user_version = 1;
";
