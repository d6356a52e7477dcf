//! SQLite schema definition.

/// Complete database schema for medlink.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Users (one row per user document)
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('patient', 'doctor')),
    current_medicines TEXT NOT NULL DEFAULT '[]',   -- JSON array of Medicine
    saved_medicines TEXT NOT NULL DEFAULT '[]',     -- JSON array of SavedMedicine
    reports TEXT NOT NULL DEFAULT '[]',             -- JSON array of Report
    otps TEXT NOT NULL DEFAULT '[]',                -- JSON array of OtpEntry
    access_requests TEXT,                           -- JSON array of AccessRequest, NULL until first request
    authorized_patients TEXT NOT NULL DEFAULT '[]', -- JSON array of patient ids
    notification_token TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);
"#;
