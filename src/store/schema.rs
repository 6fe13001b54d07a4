pub const SCHEMA: &str = r#"
-- Platform users; `repos` is a JSON array of owned shape names
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'user',
    active INTEGER NOT NULL DEFAULT 1,
    password_hash TEXT,              -- argon2id PHC string, NULL = no password login
    repos TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Third-party applications; client_secret signs that application's tokens
CREATE TABLE IF NOT EXISTS applications (
    client_id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    client_secret TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Runtime-defined shapes; `fields` is the JSON field descriptor list.
-- Each shape's records live in their own table, created on first use.
-- Table names are case-insensitive in SQLite, so shape names are too.
CREATE TABLE IF NOT EXISTS shapes (
    name TEXT PRIMARY KEY COLLATE NOCASE,
    owner_id TEXT NOT NULL,
    kind TEXT NOT NULL DEFAULT 'custom',
    fields TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_applications_owner ON applications(owner_id);
CREATE INDEX IF NOT EXISTS idx_shapes_owner ON shapes(owner_id);
"#;

/// Prefix of the per-shape record tables.
pub const COLLECTION_PREFIX: &str = "repo_";

/// DDL for one shape's record table. `table` must already be a validated name.
pub fn collection_ddl(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    _id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid TEXT NOT NULL UNIQUE,
    _rev INTEGER NOT NULL DEFAULT 0,
    body TEXT NOT NULL
);
"#
    )
}

/// DDL for a uniqueness index over one field of a shape's JSON body.
pub fn unique_index_ddl(table: &str, field: &str) -> String {
    format!(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS "{table}__{field}" ON "{table}"(json_extract(body, '$.{field}'));"#
    )
}
