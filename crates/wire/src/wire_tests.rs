// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Request, Response};

#[test]
fn encode_prefixes_payload_length() {
    let frame = encode(&Request::Ping).unwrap();
    let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    assert_eq!(len as usize, frame.len() - 4);
}

#[test]
fn encode_decode_round_trips() {
    let request = Request::CreateScan {
        target_id: "tgt-abc".to_string(),
        profile: Some("aggressive".to_string()),
        stop_on_error: true,
    };
    let frame = encode(&request).unwrap();
    let decoded: Request = decode(&frame).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn truncated_frame_is_closed() {
    let err = decode::<Request>(&[0, 0]).unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
}

#[tokio::test]
async fn stream_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_message(&mut client, &Request::QueueStatus).await.unwrap();
    let request: Request = read_message(&mut server).await.unwrap();
    assert_eq!(request, Request::QueueStatus);

    write_message(&mut server, &Response::Pong).await.unwrap();
    let response: Response = read_message(&mut client).await.unwrap();
    assert_eq!(response, Response::Pong);
}

#[tokio::test]
async fn closed_stream_reports_closed() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    let err = read_message::<Request, _>(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::Closed));
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let bogus = (MAX_FRAME + 1).to_be_bytes();
    tokio::io::AsyncWriteExt::write_all(&mut client, &bogus).await.unwrap();

    let err = read_message::<Request, _>(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
}
