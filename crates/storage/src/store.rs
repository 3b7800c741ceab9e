// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The artifact store: append-only persistence for scan output.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use dn_core::{
    id, Endpoint, Finding, Port, PortState, Profile, Protocol, Scan, ScanId, ScanStatus, Severity,
    Subdomain, SystemState, Target, TargetId,
};

use crate::error::StoreError;
use crate::schema;

/// Embedded relational store for targets, scans, and discovered artifacts.
///
/// All access goes through one connection behind a mutex, which is what
/// serializes status writes per scan row.
pub struct ArtifactStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore").finish_non_exhaustive()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(text)?)
}

impl ArtifactStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    // === Targets ===

    pub fn create_target(&self, target: &Target) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO targets (id, name, primary_domain, scope, exclusions, ip_ranges, asns, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                target.id.as_str(),
                target.name,
                target.primary_domain,
                to_json(&target.scope)?,
                to_json(&target.exclusions)?,
                to_json(&target.ip_ranges)?,
                to_json(&target.asns)?,
                target.created_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn target(&self, id: &TargetId) -> Result<Option<Target>, StoreError> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, name, primary_domain, scope, exclusions, ip_ranges, asns, created_at_ms
                 FROM targets WHERE id = ?1",
                params![id.as_str()],
                row_to_target,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn targets(&self) -> Result<Vec<Target>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, primary_domain, scope, exclusions, ip_ranges, asns, created_at_ms
             FROM targets ORDER BY created_at_ms DESC",
        )?;
        let rows = stmt.query_map([], row_to_target)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete a target; cascades to its scans and their artifacts.
    pub fn delete_target(&self, id: &TargetId) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .lock()
            .execute("DELETE FROM targets WHERE id = ?1", params![id.as_str()])?;
        Ok(changed > 0)
    }

    // === Scans ===

    pub fn create_scan(&self, scan: &Scan) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO scans (id, target_id, profile, status, progress, current_stage, error,
                                is_resumed, created_at_ms, started_at_ms, completed_at_ms, checkpoint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                scan.id.as_str(),
                scan.target_id.as_str(),
                scan.profile.to_string(),
                scan.status.to_string(),
                to_json(&scan.progress)?,
                scan.current_stage,
                scan.error,
                scan.is_resumed,
                scan.created_at_ms,
                scan.started_at_ms,
                scan.completed_at_ms,
                scan.checkpoint,
            ],
        )?;
        Ok(())
    }

    pub fn scan(&self, id: &ScanId) -> Result<Option<Scan>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, target_id, profile, status, progress, current_stage, error,
                        is_resumed, created_at_ms, started_at_ms, completed_at_ms, checkpoint
                 FROM scans WHERE id = ?1",
                params![id.as_str()],
                row_to_scan_raw,
            )
            .optional()?;
        row.map(raw_to_scan).transpose()
    }

    pub fn scans_for_target(&self, target_id: &TargetId) -> Result<Vec<Scan>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, target_id, profile, status, progress, current_stage, error,
                    is_resumed, created_at_ms, started_at_ms, completed_at_ms, checkpoint
             FROM scans WHERE target_id = ?1 ORDER BY created_at_ms DESC",
        )?;
        let rows = stmt.query_map(params![target_id.as_str()], row_to_scan_raw)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(raw_to_scan)
            .collect()
    }

    /// Scans left `running` or `paused` by a previous process, in need of
    /// re-enqueueing on startup.
    pub fn interrupted_scans(&self) -> Result<Vec<Scan>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, target_id, profile, status, progress, current_stage, error,
                    is_resumed, created_at_ms, started_at_ms, completed_at_ms, checkpoint
             FROM scans WHERE status IN ('running', 'paused') ORDER BY created_at_ms",
        )?;
        let rows = stmt.query_map([], row_to_scan_raw)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(raw_to_scan)
            .collect()
    }

    /// Atomic status write: status plus (optionally) current stage,
    /// progress map, and error text.
    ///
    /// Sets `started_at_ms` the first time the scan goes `running` and
    /// `completed_at_ms` when it reaches a terminal status. Rejects writes
    /// to terminal rows — terminal scans are frozen.
    pub fn update_scan_status(
        &self,
        id: &ScanId,
        status: ScanStatus,
        current_stage: Option<&str>,
        progress: Option<&HashMap<String, u8>>,
        error: Option<&str>,
        epoch_ms: u64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<(String, Option<u64>)> = tx
            .query_row(
                "SELECT status, started_at_ms FROM scans WHERE id = ?1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((current, started_at_ms)) = existing else {
            return Err(StoreError::NotFound { entity: "scan", id: id.to_string() });
        };
        let current: ScanStatus = current
            .parse()
            .map_err(|_| StoreError::InvalidField { field: "status", value: current.clone() })?;
        if current.is_terminal() {
            return Err(StoreError::TerminalScan(id.to_string()));
        }

        tx.execute(
            "UPDATE scans SET status = ?2 WHERE id = ?1",
            params![id.as_str(), status.to_string()],
        )?;
        if let Some(stage) = current_stage {
            tx.execute(
                "UPDATE scans SET current_stage = ?2 WHERE id = ?1",
                params![id.as_str(), stage],
            )?;
        }
        if let Some(progress) = progress {
            tx.execute(
                "UPDATE scans SET progress = ?2 WHERE id = ?1",
                params![id.as_str(), to_json(progress)?],
            )?;
        }
        if let Some(error) = error {
            tx.execute(
                "UPDATE scans SET error = ?2 WHERE id = ?1",
                params![id.as_str(), error],
            )?;
        }
        if status == ScanStatus::Running && started_at_ms.is_none() {
            tx.execute(
                "UPDATE scans SET started_at_ms = ?2 WHERE id = ?1",
                params![id.as_str(), epoch_ms],
            )?;
        }
        if status.is_terminal() {
            tx.execute(
                "UPDATE scans SET completed_at_ms = ?2 WHERE id = ?1",
                params![id.as_str(), epoch_ms],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn mark_resumed(&self, id: &ScanId, is_resumed: bool) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE scans SET is_resumed = ?2 WHERE id = ?1",
            params![id.as_str(), is_resumed],
        )?;
        Ok(())
    }

    /// Store the opaque checkpoint blob on the scan row.
    pub fn save_checkpoint_blob(&self, id: &ScanId, blob: &str) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE scans SET checkpoint = ?2 WHERE id = ?1",
            params![id.as_str(), blob],
        )?;
        Ok(())
    }

    /// Checkpoint clearance is the one write allowed on terminal rows.
    pub fn clear_checkpoint_blob(&self, id: &ScanId) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE scans SET checkpoint = NULL WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(())
    }

    // === Subdomains ===

    /// Insert or refresh a discovered hostname; unique per (scan, hostname).
    pub fn add_subdomain(&self, subdomain: &Subdomain) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO subdomains (id, scan_id, hostname, addresses, is_live, status_code, title, tech, sources)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (scan_id, hostname) DO UPDATE SET sources = excluded.sources",
            params![
                id::row_id(),
                subdomain.scan_id.as_str(),
                subdomain.hostname,
                to_json(&subdomain.addresses)?,
                subdomain.is_live,
                subdomain.status_code,
                subdomain.title,
                to_json(&subdomain.tech)?,
                to_json(&subdomain.sources)?,
            ],
        )?;
        Ok(())
    }

    pub fn update_subdomain_resolution(
        &self,
        scan_id: &ScanId,
        hostname: &str,
        addresses: &[String],
    ) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE subdomains SET addresses = ?3 WHERE scan_id = ?1 AND hostname = ?2",
            params![scan_id.as_str(), hostname, to_json(&addresses)?],
        )?;
        Ok(())
    }

    pub fn update_subdomain_http(
        &self,
        scan_id: &ScanId,
        hostname: &str,
        status_code: u16,
        title: Option<&str>,
        tech: &[String],
    ) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE subdomains SET is_live = 1, status_code = ?3, title = ?4, tech = ?5
             WHERE scan_id = ?1 AND hostname = ?2",
            params![scan_id.as_str(), hostname, status_code, title, to_json(&tech)?],
        )?;
        Ok(())
    }

    pub fn subdomains_for_scan(&self, scan_id: &ScanId) -> Result<Vec<Subdomain>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT scan_id, hostname, addresses, is_live, status_code, title, tech, sources
             FROM subdomains WHERE scan_id = ?1 ORDER BY hostname",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, Option<u16>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(scan, hostname, addresses, is_live, status_code, title, tech, sources)| {
                Ok(Subdomain {
                    scan_id: ScanId::from_string(scan),
                    hostname,
                    addresses: from_json(&addresses)?,
                    is_live,
                    status_code,
                    title,
                    tech: from_json(&tech)?,
                    sources: from_json(&sources)?,
                })
            })
            .collect()
    }

    // === Endpoints ===

    pub fn add_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO endpoints (id, scan_id, url, method, status_code, content_type,
                                    content_length, parameters, pattern_matches, discovered_via)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id::row_id(),
                endpoint.scan_id.as_str(),
                endpoint.url,
                endpoint.method,
                endpoint.status_code,
                endpoint.content_type,
                endpoint.content_length,
                to_json(&endpoint.parameters)?,
                to_json(&endpoint.pattern_matches)?,
                endpoint.discovered_via,
            ],
        )?;
        Ok(())
    }

    pub fn update_endpoint_patterns(
        &self,
        scan_id: &ScanId,
        url: &str,
        patterns: &[String],
    ) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE endpoints SET pattern_matches = ?3 WHERE scan_id = ?1 AND url = ?2",
            params![scan_id.as_str(), url, to_json(&patterns)?],
        )?;
        Ok(())
    }

    pub fn endpoints_for_scan(&self, scan_id: &ScanId) -> Result<Vec<Endpoint>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT scan_id, url, method, status_code, content_type, content_length,
                    parameters, pattern_matches, discovered_via
             FROM endpoints WHERE scan_id = ?1 ORDER BY url",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<u16>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<u64>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(
                |(scan, url, method, status_code, content_type, content_length, parameters, matches, via)| {
                    Ok(Endpoint {
                        scan_id: ScanId::from_string(scan),
                        url,
                        method,
                        status_code,
                        content_type,
                        content_length,
                        parameters: from_json(&parameters)?,
                        pattern_matches: from_json(&matches)?,
                        discovered_via: via,
                    })
                },
            )
            .collect()
    }

    // === Findings ===

    pub fn add_finding(&self, finding: &Finding) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO findings (id, scan_id, title, severity, cvss_score, affected_url, parameter,
                                   evidence, poc_commands, tool_source, template_id, false_positive,
                                   triage_rationale, triage_model)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                id::row_id(),
                finding.scan_id.as_str(),
                finding.title,
                finding.severity.to_string(),
                finding.cvss_score,
                finding.affected_url,
                finding.parameter,
                finding.evidence,
                to_json(&finding.poc_commands)?,
                finding.tool_source,
                finding.template_id,
                finding.false_positive,
                finding.triage_rationale,
                finding.triage_model,
            ],
        )?;
        Ok(())
    }

    pub fn findings_for_scan(&self, scan_id: &ScanId) -> Result<Vec<Finding>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT scan_id, title, severity, cvss_score, affected_url, parameter, evidence,
                    poc_commands, tool_source, template_id, false_positive, triage_rationale, triage_model
             FROM findings WHERE scan_id = ?1",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, Option<String>>(9)?,
                row.get::<_, bool>(10)?,
                row.get::<_, Option<String>>(11)?,
                row.get::<_, Option<String>>(12)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(
                |(scan, title, severity, cvss, url, parameter, evidence, poc, tool, template, fp, rationale, model)| {
                    Ok(Finding {
                        scan_id: ScanId::from_string(scan),
                        title,
                        severity: severity.parse::<Severity>().map_err(|_| {
                            StoreError::InvalidField { field: "severity", value: severity }
                        })?,
                        cvss_score: cvss,
                        affected_url: url,
                        parameter,
                        evidence,
                        poc_commands: from_json(&poc)?,
                        tool_source: tool,
                        template_id: template,
                        false_positive: fp,
                        triage_rationale: rationale,
                        triage_model: model,
                    })
                },
            )
            .collect()
    }

    // === Ports ===

    /// Insert an observed port; unique per (scan, ip, port, protocol).
    pub fn add_port(&self, port: &Port) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO ports (id, scan_id, ip, port, protocol, service, version, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (scan_id, ip, port, protocol) DO UPDATE SET
                 service = excluded.service,
                 version = excluded.version,
                 state = excluded.state",
            params![
                id::row_id(),
                port.scan_id.as_str(),
                port.ip,
                port.port,
                port.protocol.to_string(),
                port.service,
                port.version,
                port.state.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn ports_for_scan(&self, scan_id: &ScanId) -> Result<Vec<Port>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT scan_id, ip, port, protocol, service, version, state
             FROM ports WHERE scan_id = ?1 ORDER BY ip, port",
        )?;
        let rows = stmt.query_map(params![scan_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u16>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .map(|(scan, ip, port, protocol, service, version, state)| {
                Ok(Port {
                    scan_id: ScanId::from_string(scan),
                    ip,
                    port,
                    protocol: match protocol.as_str() {
                        "udp" => Protocol::Udp,
                        _ => Protocol::Tcp,
                    },
                    service,
                    version,
                    state: match state.as_str() {
                        "filtered" => PortState::Filtered,
                        "closed" => PortState::Closed,
                        _ => PortState::Open,
                    },
                })
            })
            .collect()
    }

    // === System state ===

    /// Write the single health-snapshot row.
    pub fn upsert_system_state(&self, state: &SystemState) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT INTO system_state (id, network_status, battery_level, is_charging,
                                       temperature, llm_model, free_memory_mb, updated_at_ms)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (id) DO UPDATE SET
                 network_status = excluded.network_status,
                 battery_level = excluded.battery_level,
                 is_charging = excluded.is_charging,
                 temperature = excluded.temperature,
                 llm_model = excluded.llm_model,
                 free_memory_mb = excluded.free_memory_mb,
                 updated_at_ms = excluded.updated_at_ms",
            params![
                state.network_status.to_string(),
                state.battery_level,
                state.is_charging,
                state.temperature,
                state.llm_model,
                state.free_memory_mb,
                state.updated_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn system_state(&self) -> Result<Option<SystemState>, StoreError> {
        self.conn
            .lock()
            .query_row(
                "SELECT network_status, battery_level, is_charging, temperature, llm_model,
                        free_memory_mb, updated_at_ms
                 FROM system_state WHERE id = 1",
                [],
                |row| {
                    let network: String = row.get(0)?;
                    Ok(SystemState {
                        network_status: if network == "offline" {
                            dn_core::NetworkStatus::Offline
                        } else {
                            dn_core::NetworkStatus::Online
                        },
                        battery_level: row.get(1)?,
                        is_charging: row.get(2)?,
                        temperature: row.get(3)?,
                        llm_model: row.get(4)?,
                        free_memory_mb: row.get(5)?,
                        updated_at_ms: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
    }
}

type RawScan = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    u64,
    Option<u64>,
    Option<u64>,
    Option<String>,
);

fn row_to_scan_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawScan> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
    ))
}

fn raw_to_scan(raw: RawScan) -> Result<Scan, StoreError> {
    let (id, target_id, profile, status, progress, current_stage, error, is_resumed, created, started, completed, checkpoint) =
        raw;
    Ok(Scan {
        id: ScanId::from_string(id),
        target_id: TargetId::from_string(target_id),
        profile: profile
            .parse::<Profile>()
            .map_err(|_| StoreError::InvalidField { field: "profile", value: profile })?,
        status: status
            .parse::<ScanStatus>()
            .map_err(|_| StoreError::InvalidField { field: "status", value: status })?,
        progress: from_json(&progress)?,
        current_stage,
        error,
        is_resumed,
        created_at_ms: created,
        started_at_ms: started,
        completed_at_ms: completed,
        checkpoint,
    })
}

fn row_to_target(row: &rusqlite::Row<'_>) -> rusqlite::Result<Target> {
    let scope: String = row.get(3)?;
    let exclusions: String = row.get(4)?;
    let ip_ranges: String = row.get(5)?;
    let asns: String = row.get(6)?;
    Ok(Target {
        id: TargetId::from_string(row.get::<_, String>(0)?),
        name: row.get(1)?,
        primary_domain: row.get(2)?,
        scope: serde_json::from_str(&scope).unwrap_or_default(),
        exclusions: serde_json::from_str(&exclusions).unwrap_or_default(),
        ip_ranges: serde_json::from_str(&ip_ranges).unwrap_or_default(),
        asns: serde_json::from_str(&asns).unwrap_or_default(),
        created_at_ms: row.get(7)?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
