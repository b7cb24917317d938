//! SQL schema for the Parc SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id     TEXT PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    role        TEXT NOT NULL,              -- 'Admin' | 'Chef de Parc'
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ois (
    oi_id                   TEXT PRIMARY KEY,
    value                   TEXT NOT NULL UNIQUE,
    total_hours_of_work     TEXT NOT NULL DEFAULT '0',   -- decimal string
    -- Only ever moves forward; written by the scheduler alone.
    last_notified_threshold INTEGER CHECK (last_notified_threshold >= 0),
    next_cycle_visit        TEXT,
    last_cycle_visit        TEXT,
    last_visit_accepted     INTEGER,
    created_at              TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS preventive_templates (
    template_id   TEXT PRIMARY KEY,
    oi_id         TEXT NOT NULL REFERENCES ois(oi_id) ON DELETE CASCADE,
    trigger_hours INTEGER NOT NULL CHECK (trigger_hours > 0),
    title         TEXT NOT NULL,
    description   TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (oi_id, trigger_hours, description)
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id         TEXT PRIMARY KEY,
    seq             INTEGER NOT NULL UNIQUE,     -- source of display_id
    oi_id           TEXT REFERENCES ois(oi_id) ON DELETE SET NULL,
    kind            TEXT NOT NULL,
    description     TEXT NOT NULL,
    assigned_to     TEXT REFERENCES users(user_id) ON DELETE SET NULL,
    status          TEXT NOT NULL,
    hours_of_work   TEXT,
    estimated_hours TEXT,
    start_date      TEXT,
    end_date        TEXT,
    closed_at       TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Only the read flag is ever updated.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    message         TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0,
    recipient_user  TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    recipient_role  TEXT NOT NULL,
    category        TEXT NOT NULL,
    oi_id           TEXT REFERENCES ois(oi_id) ON DELETE CASCADE,
    task_id         TEXT REFERENCES tasks(task_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS templates_oi_idx        ON preventive_templates(oi_id, trigger_hours);
CREATE INDEX IF NOT EXISTS notifications_user_idx  ON notifications(recipient_user, read);
CREATE INDEX IF NOT EXISTS tasks_oi_idx            ON tasks(oi_id);
CREATE INDEX IF NOT EXISTS tasks_assignee_idx      ON tasks(assigned_to, created_at);

PRAGMA user_version = 1;
";
