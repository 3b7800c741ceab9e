// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite schema.
//!
//! JSON-shaped attributes are TEXT columns validated through serde on
//! write. Deleting a target cascades to its scans; deleting a scan
//! cascades to everything it discovered.

use rusqlite::Connection;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS targets (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    primary_domain  TEXT NOT NULL,
    scope           TEXT NOT NULL DEFAULT '[]',
    exclusions      TEXT NOT NULL DEFAULT '[]',
    ip_ranges       TEXT NOT NULL DEFAULT '[]',
    asns            TEXT NOT NULL DEFAULT '[]',
    created_at_ms   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS scans (
    id              TEXT PRIMARY KEY,
    target_id       TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    profile         TEXT NOT NULL DEFAULT 'normal',
    status          TEXT NOT NULL DEFAULT 'pending',
    progress        TEXT NOT NULL DEFAULT '{}',
    current_stage   TEXT,
    error           TEXT,
    is_resumed      INTEGER NOT NULL DEFAULT 0,
    created_at_ms   INTEGER NOT NULL,
    started_at_ms   INTEGER,
    completed_at_ms INTEGER,
    checkpoint      TEXT
);

CREATE TABLE IF NOT EXISTS subdomains (
    id          TEXT PRIMARY KEY,
    scan_id     TEXT NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    hostname    TEXT NOT NULL,
    addresses   TEXT NOT NULL DEFAULT '[]',
    is_live     INTEGER NOT NULL DEFAULT 0,
    status_code INTEGER,
    title       TEXT,
    tech        TEXT NOT NULL DEFAULT '[]',
    sources     TEXT NOT NULL DEFAULT '[]',
    UNIQUE (scan_id, hostname)
);

CREATE TABLE IF NOT EXISTS endpoints (
    id              TEXT PRIMARY KEY,
    scan_id         TEXT NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    url             TEXT NOT NULL,
    method          TEXT NOT NULL DEFAULT 'GET',
    status_code     INTEGER,
    content_type    TEXT,
    content_length  INTEGER,
    parameters      TEXT NOT NULL DEFAULT '[]',
    pattern_matches TEXT NOT NULL DEFAULT '[]',
    discovered_via  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS findings (
    id               TEXT PRIMARY KEY,
    scan_id          TEXT NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    title            TEXT NOT NULL,
    severity         TEXT NOT NULL,
    cvss_score       REAL,
    affected_url     TEXT,
    parameter        TEXT,
    evidence         TEXT,
    poc_commands     TEXT NOT NULL DEFAULT '[]',
    tool_source      TEXT NOT NULL,
    template_id      TEXT,
    false_positive   INTEGER NOT NULL DEFAULT 0,
    triage_rationale TEXT,
    triage_model     TEXT
);

CREATE TABLE IF NOT EXISTS ports (
    id       TEXT PRIMARY KEY,
    scan_id  TEXT NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
    ip       TEXT NOT NULL,
    port     INTEGER NOT NULL,
    protocol TEXT NOT NULL DEFAULT 'tcp',
    service  TEXT,
    version  TEXT,
    state    TEXT NOT NULL DEFAULT 'open',
    UNIQUE (scan_id, ip, port, protocol)
);

CREATE TABLE IF NOT EXISTS system_state (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    network_status TEXT NOT NULL DEFAULT 'online',
    battery_level  INTEGER,
    is_charging    INTEGER NOT NULL DEFAULT 0,
    temperature    REAL,
    llm_model      TEXT,
    free_memory_mb INTEGER,
    updated_at_ms  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_target ON scans(target_id);
CREATE INDEX IF NOT EXISTS idx_subdomains_scan ON subdomains(scan_id);
CREATE INDEX IF NOT EXISTS idx_endpoints_scan ON endpoints(scan_id);
CREATE INDEX IF NOT EXISTS idx_findings_scan ON findings(scan_id);
CREATE INDEX IF NOT EXISTS idx_ports_scan ON ports(scan_id);
";

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(SCHEMA)
}
