//! SQL schema for the Drip SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL,   -- 'draft' | 'active' | 'paused' | 'completed'
    settings    TEXT NOT NULL,   -- JSON-encoded CampaignSettings
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sequence_steps (
    campaign_id  TEXT NOT NULL REFERENCES campaigns(campaign_id),
    step_number  INTEGER NOT NULL,
    subject      TEXT NOT NULL,
    content      TEXT NOT NULL,
    timing_value INTEGER NOT NULL,
    timing_unit  TEXT NOT NULL,  -- 'days' | 'hours' | 'minutes'
    PRIMARY KEY (campaign_id, step_number)
);

CREATE TABLE IF NOT EXISTS contacts (
    contact_id        TEXT PRIMARY KEY,
    campaign_id       TEXT NOT NULL REFERENCES campaigns(campaign_id),
    email             TEXT NOT NULL,
    first_name        TEXT,
    last_name         TEXT,
    company           TEXT,
    timezone          TEXT,
    location          TEXT,
    status            TEXT NOT NULL DEFAULT 'not_contacted',
    sequence_step     INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    last_contacted_at TEXT,
    next_email_due    TEXT,
    sequence_schedule TEXT           -- JSON-encoded SequenceSchedule or NULL
);

-- One row per email that went out. Append-only.
CREATE TABLE IF NOT EXISTS sends (
    campaign_id TEXT NOT NULL REFERENCES campaigns(campaign_id),
    contact_id  TEXT NOT NULL REFERENCES contacts(contact_id),
    step        INTEGER NOT NULL,
    sent_at     TEXT NOT NULL,
    UNIQUE (contact_id, step)
);

CREATE INDEX IF NOT EXISTS contacts_campaign_idx ON contacts(campaign_id);
CREATE INDEX IF NOT EXISTS sends_campaign_idx    ON sends(campaign_id, sent_at);

PRAGMA user_version = 1;
";
