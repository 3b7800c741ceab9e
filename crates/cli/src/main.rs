// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dragnet` — thin client for the dragnet daemon.

mod client;
mod output;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};

use dn_wire::{Request, Response, TargetSpec};

#[derive(Parser)]
#[command(name = "dragnet", about = "Reconnaissance scan orchestration", version)]
struct Cli {
    /// Working-directory root (defaults to $DRAGNET_HOME or ~/.dragnet)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check daemon health
    Ping,
    /// Manage target scopes
    Target {
        #[command(subcommand)]
        command: TargetCommand,
    },
    /// Manage scans
    Scan {
        #[command(subcommand)]
        command: ScanCommand,
    },
    /// System-wide status and pause/resume
    System {
        #[command(subcommand)]
        command: SystemCommand,
    },
    /// Show queue state
    Queue,
    /// Stream scan progress and system events
    Watch,
    /// Stop the daemon
    Shutdown,
}

#[derive(Subcommand)]
enum TargetCommand {
    /// Register a target scope
    Add {
        name: String,
        domain: String,
        /// In-scope patterns (repeatable)
        #[arg(long = "scope")]
        scope: Vec<String>,
        /// Excluded patterns (repeatable)
        #[arg(long = "exclude")]
        exclusions: Vec<String>,
    },
    List,
    Show { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum ScanCommand {
    /// Admit a scan against a target
    Start {
        target_id: String,
        /// stealth, normal, or aggressive
        #[arg(long)]
        profile: Option<String>,
        /// Fail the scan on the first stage error
        #[arg(long)]
        stop_on_error: bool,
    },
    Show { id: String },
    Pause { id: String },
    Resume { id: String },
    Stop { id: String },
    /// List discovered subdomains
    Subdomains { id: String },
    /// List findings
    Findings { id: String },
}

#[derive(Subcommand)]
enum SystemCommand {
    Status,
    Pause,
    Resume,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = cli.root.clone().unwrap_or_else(dn_daemon::env::default_root);
    let socket = dn_daemon::Paths::new(root).socket;

    let request = match cli.command {
        Command::Ping => Request::Ping,
        Command::Target { command } => match command {
            TargetCommand::Add { name, domain, scope, exclusions } => Request::CreateTarget {
                spec: TargetSpec {
                    name,
                    primary_domain: domain,
                    scope,
                    exclusions,
                    ip_ranges: vec![],
                    asns: vec![],
                },
            },
            TargetCommand::List => Request::ListTargets,
            TargetCommand::Show { id } => Request::GetTarget { id },
            TargetCommand::Delete { id } => Request::DeleteTarget { id },
        },
        Command::Scan { command } => match command {
            ScanCommand::Start { target_id, profile, stop_on_error } => {
                Request::CreateScan { target_id, profile, stop_on_error }
            }
            ScanCommand::Show { id } => Request::GetScan { id },
            ScanCommand::Pause { id } => Request::PauseScan { id },
            ScanCommand::Resume { id } => Request::ResumeScan { id },
            ScanCommand::Stop { id } => Request::StopScan { id },
            ScanCommand::Subdomains { id } => Request::ScanSubdomains { id },
            ScanCommand::Findings { id } => Request::ScanFindings { id },
        },
        Command::System { command } => match command {
            SystemCommand::Status => Request::SystemStatus,
            SystemCommand::Pause => Request::SystemPause,
            SystemCommand::Resume => Request::SystemResume,
        },
        Command::Queue => Request::QueueStatus,
        Command::Watch => return client::watch(&socket).await,
        Command::Shutdown => Request::Shutdown,
    };

    let response = client::request(&socket, request).await?;
    print_response(response)
}

fn print_response(response: Response) -> anyhow::Result<()> {
    match response {
        Response::Ok => println!("ok"),
        Response::Pong => println!("pong"),
        Response::Error { kind, message } => bail!("{kind}: {message}"),
        Response::Target { target } => println!("{}", output::render_target(&target)),
        Response::Targets { targets } => {
            for target in &targets {
                println!("{}", output::render_target(target));
            }
        }
        Response::Scan { scan } => print!("{}", output::render_scan(&scan)),
        Response::ScanQueued { scan_id } => println!("queued {scan_id}"),
        Response::Subdomains { subdomains } => {
            for subdomain in &subdomains {
                println!("{}", output::render_subdomain(subdomain));
            }
        }
        Response::Findings { findings } => {
            for finding in &findings {
                println!("{}", output::render_finding(finding));
            }
        }
        Response::System { system } => println!("{}", output::render_system(&system)),
        Response::Queue { queued, active, paused, process_paused } => {
            println!(
                "queued: {queued}  active: {}  paused: {}  gate: {}",
                or_dash(&active),
                or_dash(&paused),
                if process_paused { "paused" } else { "open" },
            );
        }
        Response::Subscribed | Response::Event { .. } => {}
        Response::ShuttingDown => println!("daemon shutting down"),
    }
    Ok(())
}

fn or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(",")
    }
}
