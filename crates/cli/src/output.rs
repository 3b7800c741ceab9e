// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering of daemon responses.

use dn_core::STAGE_ORDER;
use dn_wire::{FindingDto, ScanDto, SubdomainDto, SystemDto, TargetDto};

pub fn render_target(target: &TargetDto) -> String {
    let mut out = format!("{}  {}  {}", target.id, target.name, target.primary_domain);
    if !target.scope.is_empty() {
        out.push_str(&format!("  scope={}", target.scope.join(",")));
    }
    if !target.exclusions.is_empty() {
        out.push_str(&format!("  exclude={}", target.exclusions.join(",")));
    }
    out
}

pub fn render_scan(scan: &ScanDto) -> String {
    let mut out = format!(
        "{}  target={}  profile={}  status={}",
        scan.id, scan.target_id, scan.profile, scan.status
    );
    if let Some(stage) = &scan.current_stage {
        out.push_str(&format!("  stage={stage}"));
    }
    if let Some(error) = &scan.error {
        out.push_str(&format!("  error={error:?}"));
    }
    out.push('\n');
    out.push_str(&render_progress(scan));
    out
}

/// One line per stage in pipeline order, with its percent.
pub fn render_progress(scan: &ScanDto) -> String {
    let mut out = String::new();
    for stage in STAGE_ORDER {
        let Some(percent) = scan.progress.get(stage) else {
            continue;
        };
        out.push_str(&format!("  {stage:<16} {percent:>3}%\n"));
    }
    out
}

pub fn render_subdomain(subdomain: &SubdomainDto) -> String {
    let live = if subdomain.is_live { "live" } else { "    " };
    let status = subdomain
        .status_code
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<40} {} {:>4}  [{}]  {}",
        subdomain.hostname,
        live,
        status,
        subdomain.sources.join(","),
        subdomain.addresses.join(" "),
    )
}

pub fn render_finding(finding: &FindingDto) -> String {
    let fp = if finding.false_positive { " (likely false positive)" } else { "" };
    format!(
        "[{:<8}] {}{}\n  url: {}  tool: {}{}",
        finding.severity,
        finding.title,
        fp,
        finding.affected_url.as_deref().unwrap_or("-"),
        finding.tool_source,
        finding
            .template_id
            .as_ref()
            .map(|t| format!("  template: {t}"))
            .unwrap_or_default(),
    )
}

pub fn render_system(system: &SystemDto) -> String {
    let mut out = format!("network: {}", system.network_status);
    if let Some(battery) = system.battery_level {
        let charging = if system.is_charging { " (charging)" } else { "" };
        out.push_str(&format!("  battery: {battery}%{charging}"));
    }
    if let Some(temperature) = system.temperature {
        out.push_str(&format!("  temp: {temperature:.1}°C"));
    }
    if let Some(memory) = system.free_memory_mb {
        out.push_str(&format!("  free-mem: {memory} MB"));
    }
    if let Some(model) = &system.llm_model {
        out.push_str(&format!("  llm: {model}"));
    }
    out
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
