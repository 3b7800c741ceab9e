// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client over the unix socket.

use std::path::Path;

use anyhow::{bail, Context};
use tokio::net::UnixStream;

use dn_wire::{read_message, write_message, Request, Response};

/// One request/response exchange with the daemon.
pub async fn request(socket: &Path, request: Request) -> anyhow::Result<Response> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("cannot reach dragnetd at {}", socket.display()))?;
    write_message(&mut stream, &request).await?;
    let response = read_message(&mut stream).await?;
    Ok(response)
}

/// Subscribe and print events until interrupted.
pub async fn watch(socket: &Path) -> anyhow::Result<()> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("cannot reach dragnetd at {}", socket.display()))?;
    write_message(&mut stream, &Request::Subscribe).await?;

    let first: Response = read_message(&mut stream).await?;
    if first != Response::Subscribed {
        bail!("unexpected response to subscribe: {first:?}");
    }

    loop {
        let response: Response = read_message(&mut stream).await?;
        if let Response::Event { event } = response {
            println!("{event}");
        }
    }
}
