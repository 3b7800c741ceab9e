// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Port sweep with naabu, plus optional nmap service detection.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use dn_core::Port;

use crate::stage::{run_tool, Stage, StageCtx, StageError};

pub struct PortScan;

#[async_trait]
impl Stage for PortScan {
    fn name(&self) -> &'static str {
        "port_scan"
    }

    async fn run(&self, ctx: &StageCtx, prior: &HashMap<String, Value>) -> Result<Value, StageError> {
        let mut targets: BTreeSet<String> = prior
            .get("dns_resolution")
            .and_then(|v| v.get("resolutions"))
            .and_then(|v| v.as_object())
            .map(|resolutions| {
                resolutions
                    .values()
                    .filter_map(|ips| ips.as_array())
                    .flatten()
                    .filter_map(|ip| ip.as_str())
                    .map(|ip| ip.to_string())
                    .collect()
            })
            .unwrap_or_default();
        targets.insert(ctx.target.primary_domain.clone());

        let port_spec = ctx.config.ports.port_spec();
        let mut results: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        let mut total_open = 0usize;

        for target in &targets {
            let run = run_tool(
                ctx,
                "naabu",
                format!("naabu -host {target} -port {port_spec} -silent -json"),
                ctx.tool_timeout(),
            )
            .await;
            let open = parse_naabu(&run.lines, target);
            if open.is_empty() {
                continue;
            }

            for entry in &open {
                let Some(port) = entry.get("port").and_then(|p| p.as_u64()) else {
                    continue;
                };
                let ip = entry.get("ip").and_then(|i| i.as_str()).unwrap_or(target);
                let mut row = Port::open(ctx.scan_id.clone(), ip, port as u16);
                row.service = entry.get("service").and_then(|s| s.as_str()).map(|s| s.to_string());
                ctx.store.add_port(&row)?;
            }

            total_open += open.len();
            results.insert(target.clone(), open);
        }

        if ctx.config.ports.service_detection && total_open > 0 {
            self.service_detection(ctx, &results).await?;
        }

        tracing::info!(
            scan_id = %ctx.scan_id,
            hosts = results.len(),
            open = total_open,
            "port scan done"
        );

        Ok(json!({
            "scanned": targets.len(),
            "open_ports": total_open,
            "results": results,
        }))
    }
}

impl PortScan {
    /// nmap `-sV` over the discovered ports, capped per config.
    async fn service_detection(
        &self,
        ctx: &StageCtx,
        results: &BTreeMap<String, Vec<Value>>,
    ) -> Result<(), StageError> {
        let cap = ctx.config.ports.service_detection_hosts;
        for (ip, ports) in results.iter().take(cap) {
            let spec: Vec<String> = ports
                .iter()
                .filter_map(|p| p.get("port").and_then(|v| v.as_u64()))
                .take(10)
                .map(|p| p.to_string())
                .collect();
            if spec.is_empty() {
                continue;
            }
            let run = run_tool(
                ctx,
                "nmap",
                format!("nmap -sV -Pn -p {} {ip}", spec.join(",")),
                ctx.tool_timeout(),
            )
            .await;
            for (port, service, version) in parse_nmap_services(&run.lines) {
                let mut row = Port::open(ctx.scan_id.clone(), ip.clone(), port);
                row.service = Some(service);
                row.version = version;
                ctx.store.add_port(&row)?;
            }
        }
        Ok(())
    }
}

/// naabu `-json` lines `{ip, port}`, with a `host:port` plain fallback.
pub(crate) fn parse_naabu(lines: &[String], target: &str) -> Vec<Value> {
    let mut open = Vec::new();
    for line in lines {
        if let Ok(value) = serde_json::from_str::<Value>(line) {
            let Some(port) = value.get("port").and_then(|p| p.as_u64()) else {
                continue;
            };
            let ip = value.get("ip").and_then(|i| i.as_str()).unwrap_or(target);
            open.push(json!({
                "port": port,
                "ip": ip,
                "service": guess_service(port as u16),
            }));
        } else if let Some((_, port)) = line.rsplit_once(':') {
            if let Ok(port) = port.trim().parse::<u16>() {
                open.push(json!({
                    "port": port,
                    "ip": target,
                    "service": guess_service(port),
                }));
            }
        }
    }
    open
}

/// nmap `-sV` service table lines: `443/tcp open ssl/http nginx 1.25.3`.
pub(crate) fn parse_nmap_services(lines: &[String]) -> Vec<(u16, String, Option<String>)> {
    let mut services = Vec::new();
    for line in lines {
        let mut fields = line.split_whitespace();
        let Some(spec) = fields.next() else { continue };
        let Some((port, proto)) = spec.split_once('/') else { continue };
        if proto != "tcp" && proto != "udp" {
            continue;
        }
        let Ok(port) = port.parse::<u16>() else { continue };
        if fields.next() != Some("open") {
            continue;
        }
        let Some(service) = fields.next() else { continue };
        let version: Vec<&str> = fields.collect();
        let version = (!version.is_empty()).then(|| version.join(" "));
        services.push((port, service.to_string(), version));
    }
    services
}

/// Well-known service name for a port, used before detection runs.
pub(crate) fn guess_service(port: u16) -> &'static str {
    match port {
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "dns",
        80 | 8000 | 8080 | 8081 | 8082 | 8083 | 8880 | 8888 => "http",
        110 => "pop3",
        143 => "imap",
        443 | 8443 => "https",
        993 => "imaps",
        995 => "pop3s",
        3000 | 5000 | 7000 | 9000 => "http-alt",
        3306 => "mysql",
        5432 => "postgresql",
        5601 => "kibana",
        6379 => "redis",
        9090 => "prometheus",
        9092 => "kafka",
        9200 => "elasticsearch",
        27017 => "mongodb",
        _ => "unknown",
    }
}

#[cfg(test)]
#[path = "ports_tests.rs"]
mod tests;
