// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTOs crossing the wire; entity rows never leave the daemon directly.

use serde::{Deserialize, Serialize};

use dn_core::{Finding, Scan, Subdomain, SystemState, Target};

/// Client-supplied target definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub primary_domain: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    #[serde(default)]
    pub asns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDto {
    pub id: String,
    pub name: String,
    pub primary_domain: String,
    pub scope: Vec<String>,
    pub exclusions: Vec<String>,
    pub created_at_ms: u64,
}

impl From<&Target> for TargetDto {
    fn from(target: &Target) -> Self {
        Self {
            id: target.id.to_string(),
            name: target.name.clone(),
            primary_domain: target.primary_domain.clone(),
            scope: target.scope.clone(),
            exclusions: target.exclusions.clone(),
            created_at_ms: target.created_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDto {
    pub id: String,
    pub target_id: String,
    pub profile: String,
    pub status: String,
    pub current_stage: Option<String>,
    pub progress: std::collections::HashMap<String, u8>,
    pub error: Option<String>,
    pub is_resumed: bool,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
}

impl From<&Scan> for ScanDto {
    fn from(scan: &Scan) -> Self {
        Self {
            id: scan.id.to_string(),
            target_id: scan.target_id.to_string(),
            profile: scan.profile.to_string(),
            status: scan.status.to_string(),
            current_stage: scan.current_stage.clone(),
            progress: scan.progress.clone(),
            error: scan.error.clone(),
            is_resumed: scan.is_resumed,
            created_at_ms: scan.created_at_ms,
            started_at_ms: scan.started_at_ms,
            completed_at_ms: scan.completed_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdomainDto {
    pub hostname: String,
    pub addresses: Vec<String>,
    pub is_live: bool,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub tech: Vec<String>,
    pub sources: Vec<String>,
}

impl From<&Subdomain> for SubdomainDto {
    fn from(subdomain: &Subdomain) -> Self {
        Self {
            hostname: subdomain.hostname.clone(),
            addresses: subdomain.addresses.clone(),
            is_live: subdomain.is_live,
            status_code: subdomain.status_code,
            title: subdomain.title.clone(),
            tech: subdomain.tech.clone(),
            sources: subdomain.sources.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingDto {
    pub title: String,
    pub severity: String,
    pub affected_url: Option<String>,
    pub evidence: Option<String>,
    pub tool_source: String,
    pub template_id: Option<String>,
    pub false_positive: bool,
    pub triage_rationale: Option<String>,
}

impl From<&Finding> for FindingDto {
    fn from(finding: &Finding) -> Self {
        Self {
            title: finding.title.clone(),
            severity: finding.severity.to_string(),
            affected_url: finding.affected_url.clone(),
            evidence: finding.evidence.clone(),
            tool_source: finding.tool_source.clone(),
            template_id: finding.template_id.clone(),
            false_positive: finding.false_positive,
            triage_rationale: finding.triage_rationale.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDto {
    pub network_status: String,
    pub battery_level: Option<u8>,
    pub is_charging: bool,
    pub temperature: Option<f64>,
    pub llm_model: Option<String>,
    pub free_memory_mb: Option<u64>,
    pub updated_at_ms: u64,
}

impl From<&SystemState> for SystemDto {
    fn from(state: &SystemState) -> Self {
        Self {
            network_status: state.network_status.to_string(),
            battery_level: state.battery_level,
            is_charging: state.is_charging,
            temperature: state.temperature,
            llm_model: state.llm_model.clone(),
            free_memory_mb: state.free_memory_mb,
            updated_at_ms: state.updated_at_ms,
        }
    }
}
