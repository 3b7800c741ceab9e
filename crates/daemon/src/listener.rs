// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket listener and request dispatch.
//!
//! Accepts connections on the unix socket (and optionally TCP), decodes
//! length-prefixed requests, and answers them without blocking the
//! engine. `Subscribe` switches a connection into push mode.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};

use dn_core::{Clock, ErrorKind, Profile, Scan, ScanConfig, ScanId, SystemClock, Target, TargetId};
use dn_engine::ScanTask;
use dn_wire::{read_message, write_message, ProtocolError, Request, Response};
use dn_wire::{FindingDto, ScanDto, SubdomainDto, SystemDto, TargetDto};

use crate::lifecycle::Daemon;

/// Accept loop over the unix socket and optional TCP listener.
pub async fn serve(
    daemon: Arc<Daemon>,
    unix: UnixListener,
    tcp: Option<TcpListener>,
) {
    tracing::info!(socket = %daemon.paths.socket.display(), "listener started");
    loop {
        tokio::select! {
            _ = daemon.shutdown.cancelled() => break,
            accepted = unix.accept() => match accepted {
                Ok((stream, _)) => {
                    let daemon = Arc::clone(&daemon);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_connection(daemon, reader, writer).await;
                    });
                }
                Err(error) => tracing::error!(%error, "unix accept failed"),
            },
            accepted = accept_tcp(&tcp) => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "tcp connection");
                    let daemon = Arc::clone(&daemon);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_connection(daemon, reader, writer).await;
                    });
                }
                Err(error) => tracing::error!(%error, "tcp accept failed"),
            },
        }
    }
    tracing::info!("listener stopped");
}

async fn accept_tcp(
    tcp: &Option<TcpListener>,
) -> std::io::Result<(tokio::net::TcpStream, std::net::SocketAddr)> {
    match tcp {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

async fn handle_connection<R, W>(daemon: Arc<Daemon>, mut reader: R, mut writer: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let request: Request = match read_message(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::Closed) => return,
            Err(error) => {
                tracing::debug!(%error, "dropping connection");
                return;
            }
        };

        if request == Request::Subscribe {
            if write_message(&mut writer, &Response::Subscribed).await.is_err() {
                return;
            }
            push_events(&daemon, &mut writer).await;
            return;
        }

        let response = handle_request(&daemon, request).await;
        let shutting_down = response == Response::ShuttingDown;
        if write_message(&mut writer, &response).await.is_err() {
            return;
        }
        if shutting_down {
            daemon.shutdown.cancel();
            return;
        }
    }
}

/// Forward engine events to a subscribed connection until it drops.
async fn push_events<W>(daemon: &Arc<Daemon>, writer: &mut W)
where
    W: AsyncWrite + Unpin,
{
    let mut events = daemon.events.subscribe();
    loop {
        tokio::select! {
            _ = daemon.shutdown.cancelled() => return,
            event = events.recv() => {
                let Ok(event) = event else { return };
                let payload = match serde_json::to_value(&event) {
                    Ok(payload) => payload,
                    Err(_) => continue,
                };
                if write_message(writer, &Response::Event { event: payload }).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Answer one request. Always delegates; never mutates entities here.
pub async fn handle_request(daemon: &Arc<Daemon>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::CreateTarget { spec } => {
            let mut target = Target::new(spec.name, spec.primary_domain, SystemClock.epoch_ms());
            target.scope = spec.scope;
            target.exclusions = spec.exclusions;
            target.ip_ranges = spec.ip_ranges;
            target.asns = spec.asns;
            match daemon.store.create_target(&target) {
                Ok(()) => Response::Target { target: TargetDto::from(&target) },
                Err(error) => store_error(error),
            }
        }

        Request::GetTarget { id } => match daemon.store.target(&TargetId::from_string(id.clone())) {
            Ok(Some(target)) => Response::Target { target: TargetDto::from(&target) },
            Ok(None) => not_found("target", &id),
            Err(error) => store_error(error),
        },

        Request::ListTargets => match daemon.store.targets() {
            Ok(targets) => Response::Targets {
                targets: targets.iter().map(TargetDto::from).collect(),
            },
            Err(error) => store_error(error),
        },

        Request::DeleteTarget { id } => {
            match daemon.store.delete_target(&TargetId::from_string(id.clone())) {
                Ok(true) => Response::Ok,
                Ok(false) => not_found("target", &id),
                Err(error) => store_error(error),
            }
        }

        Request::CreateScan { target_id, profile, stop_on_error } => {
            admit_scan(daemon, target_id, profile, stop_on_error).await
        }

        Request::GetScan { id } => match daemon.store.scan(&ScanId::from_string(id.clone())) {
            Ok(Some(scan)) => Response::Scan { scan: Box::new(ScanDto::from(&scan)) },
            Ok(None) => not_found("scan", &id),
            Err(error) => store_error(error),
        },

        Request::PauseScan { id } => {
            if daemon.queue.pause(&ScanId::from_string(id.clone())) {
                Response::Ok
            } else {
                not_executing(&id)
            }
        }

        Request::ResumeScan { id } => {
            match daemon.resume_scan(&ScanId::from_string(id.clone())).await {
                Ok(true) => Response::Ok,
                Ok(false) => not_executing(&id),
                Err(error) => store_error(error),
            }
        }

        Request::StopScan { id } => {
            daemon.queue.stop(&ScanId::from_string(id));
            Response::Ok
        }

        Request::ScanSubdomains { id } => {
            match daemon.store.subdomains_for_scan(&ScanId::from_string(id)) {
                Ok(subdomains) => Response::Subdomains {
                    subdomains: subdomains.iter().map(SubdomainDto::from).collect(),
                },
                Err(error) => store_error(error),
            }
        }

        Request::ScanFindings { id } => {
            match daemon.store.findings_for_scan(&ScanId::from_string(id)) {
                Ok(findings) => Response::Findings {
                    findings: findings.iter().map(FindingDto::from).collect(),
                },
                Err(error) => store_error(error),
            }
        }

        Request::SystemStatus => match daemon.store.system_state() {
            Ok(state) => Response::System {
                system: SystemDto::from(&state.unwrap_or_default()),
            },
            Err(error) => store_error(error),
        },

        Request::SystemPause => {
            let paused = daemon.monitor.trigger_pause("operator request");
            daemon.queue.set_process_paused(true);
            *daemon.system_paused.lock() = Some(paused);
            Response::Ok
        }

        Request::SystemResume => {
            daemon.queue.set_process_paused(false);
            if let Some(paused) = daemon.system_paused.lock().take() {
                daemon.monitor.trigger_resume(&paused);
            }
            Response::Ok
        }

        Request::QueueStatus => {
            let status = daemon.queue.status();
            Response::Queue {
                queued: status.queued,
                active: status.active,
                paused: status.paused,
                process_paused: status.process_paused,
            }
        }

        // Handled inline by the connection loop.
        Request::Subscribe => Response::Subscribed,

        Request::Shutdown => Response::ShuttingDown,
    }
}

async fn admit_scan(
    daemon: &Arc<Daemon>,
    target_id: String,
    profile: Option<String>,
    stop_on_error: bool,
) -> Response {
    let target_id = TargetId::from_string(target_id);
    match daemon.store.target(&target_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("target", target_id.as_str()),
        Err(error) => return store_error(error),
    }

    let profile = match profile.as_deref() {
        None => Profile::default(),
        Some(raw) => match raw.parse::<Profile>() {
            Ok(profile) => profile,
            Err(()) => {
                return Response::error(
                    ErrorKind::Internal,
                    format!("unknown profile: {raw}"),
                )
            }
        },
    };

    let scan = Scan::new(target_id, profile, SystemClock.epoch_ms());
    if let Err(error) = daemon.store.create_scan(&scan) {
        return store_error(error);
    }

    // Typed config is built exactly once, at admission.
    let mut config = ScanConfig::for_profile(profile);
    config.stop_on_error = stop_on_error;

    let scan_id = scan.id.clone();
    if !daemon
        .queue
        .add(ScanTask { scan_id: scan_id.clone(), config, is_resumed: false })
        .await
    {
        return Response::error(ErrorKind::Internal, "queue unavailable");
    }
    Response::ScanQueued { scan_id: scan_id.to_string() }
}

fn store_error(error: dn_storage::StoreError) -> Response {
    Response::error(ErrorKind::StoreWriteFailure, error.to_string())
}

fn not_found(entity: &str, id: &str) -> Response {
    Response::error(ErrorKind::Internal, format!("{entity} not found: {id}"))
}

fn not_executing(id: &str) -> Response {
    Response::error(ErrorKind::Internal, format!("scan not executing: {id}"))
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
