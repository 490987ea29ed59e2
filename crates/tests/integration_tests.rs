//! Integration tests for mongolite
//!
//! These tests run the real TCP server on an ephemeral port and talk to it
//! with hand-built legacy wire frames.

use std::net::SocketAddr;
use std::time::Duration;

use bson::{doc, Bson, Document};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use mongolite_common::config::ServerConfig;
use mongolite_core::{Reply, Router, EXHAUSTED_CURSOR};
use mongolite_protocol::codec::{decode_reply, encode_get_more, encode_insert, encode_query};
use mongolite_protocol::wire::{parse_header, serialize_header, MsgHeader, OpCode, HEADER_LEN};
use mongolite_protocol::{MongoliteServer, SharedRouter};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Test helper to start a server on an ephemeral port
async fn start_server(server: MongoliteServer) -> (SocketAddr, SharedRouter) {
    let server = server.bind("127.0.0.1:0");
    let listener = server.listen().await.expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    let router = server.router();

    tokio::spawn(server.serve(listener));
    (addr, router)
}

async fn start_default_server() -> (SocketAddr, SharedRouter) {
    start_server(MongoliteServer::new(Router::new())).await
}

/// Test helper to read one OP_REPLY frame
async fn read_reply(stream: &mut TcpStream) -> Reply {
    let mut header = [0u8; HEADER_LEN];
    timeout(IO_TIMEOUT, stream.read_exact(&mut header))
        .await
        .expect("Timed out waiting for reply")
        .expect("Failed to read reply header");

    let parsed = parse_header(&header).expect("Bad reply header");
    let mut frame = header.to_vec();
    frame.resize(usize::try_from(parsed.message_length).unwrap(), 0);
    timeout(IO_TIMEOUT, stream.read_exact(&mut frame[HEADER_LEN..]))
        .await
        .expect("Timed out waiting for reply body")
        .expect("Failed to read reply body");

    decode_reply(&frame).expect("Bad reply frame").1
}

async fn command(stream: &mut TcpStream, request_id: i32, database: &str, cmd: Document) -> Reply {
    let frame = encode_query(request_id, &format!("{}.$cmd", database), &cmd, 0, -1).unwrap();
    stream.write_all(&frame).await.unwrap();
    read_reply(stream).await
}

async fn query(stream: &mut TcpStream, request_id: i32, collection: &str, skip: i32, limit: i32) -> Reply {
    let frame = encode_query(request_id, collection, &doc! {}, skip, limit).unwrap();
    stream.write_all(&frame).await.unwrap();
    read_reply(stream).await
}

// ============================================================================
// Query / Insert / GetMore
// ============================================================================

#[tokio::test]
async fn test_insert_query_getmore_scenario() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let documents = vec![doc! { "a": 1 }, doc! { "a": 2 }, doc! { "a": 3 }];
    let frame = encode_insert(1, "test.c", &documents).unwrap();
    stream.write_all(&frame).await.unwrap();

    let windowed = query(&mut stream, 2, "test.c", 1, 1).await;
    assert_eq!(windowed.response_to, 2);
    assert_eq!(windowed.documents, vec![doc! { "a": 2 }]);

    let all = query(&mut stream, 3, "test.c", 0, 0).await;
    assert_eq!(all.documents, documents);
    assert_eq!(all.cursor_id, EXHAUSTED_CURSOR);

    let frame = encode_get_more(4, "test.c", 0, 0).unwrap();
    stream.write_all(&frame).await.unwrap();
    let more = read_reply(&mut stream).await;
    assert_eq!(more.response_to, 4);
    assert!(more.documents.is_empty());
    assert_eq!(more.cursor_id, EXHAUSTED_CURSOR);
}

#[tokio::test]
async fn test_query_unknown_collection_is_empty() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = query(&mut stream, 1, "test.nothing", 0, 0).await;
    assert!(reply.documents.is_empty());
    assert_eq!(reply.flags, 0);
}

#[tokio::test]
async fn test_connections_share_one_store() {
    let (addr, router) = start_default_server().await;
    let mut writer = TcpStream::connect(addr).await.unwrap();
    let mut reader = TcpStream::connect(addr).await.unwrap();

    let frame = encode_insert(1, "shared.items", &[doc! { "k": "v" }]).unwrap();
    writer.write_all(&frame).await.unwrap();
    // A reply on the same connection proves the insert was applied.
    let ack = command(&mut writer, 2, "shared", doc! { "getlasterror": 1 }).await;
    assert_eq!(ack.documents, vec![doc! { "n": 0, "err": Bson::Null, "ok": 1 }]);

    let reply = query(&mut reader, 1, "shared.items", 0, 0).await;
    assert_eq!(reply.documents, vec![doc! { "k": "v" }]);
    assert_eq!(router.lock().store().count("shared.items"), 1);
}

#[tokio::test]
async fn test_acknowledged_inserts() {
    let config = ServerConfig {
        acknowledge_inserts: true,
        ..ServerConfig::default()
    };
    let (addr, _router) = start_server(MongoliteServer::from_config(&config)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let frame = encode_insert(21, "test.ack", &[doc! { "a": 1 }]).unwrap();
    stream.write_all(&frame).await.unwrap();

    let ack = read_reply(&mut stream).await;
    assert_eq!(ack.response_to, 21);
    assert!(ack.documents.is_empty());
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_whatsmyuri_matches_client_address() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let local = stream.local_addr().unwrap();

    let reply = command(&mut stream, 1, "admin", doc! { "whatsmyuri": 1 }).await;
    assert_eq!(
        reply.documents,
        vec![doc! { "you": format!("{}:{}", local.ip(), local.port()) }]
    );
}

#[tokio::test]
async fn test_unknown_command_does_not_kill_connection() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let failed = command(&mut stream, 1, "admin", doc! { "fsync": 1 }).await;
    assert_eq!(failed.response_to, 1);
    assert_eq!(failed.documents[0].get_i32("ok").unwrap(), 0);
    assert!(!failed.documents[0].get_str("errmsg").unwrap().is_empty());

    let status = command(&mut stream, 2, "admin", doc! { "replSetGetStatus": 1 }).await;
    assert_eq!(
        status.documents,
        vec![doc! { "errmsg": "not running with --replSet", "ok": 0 }]
    );
}

#[tokio::test]
async fn test_count_command() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let documents: Vec<Document> = (0..5).map(|i| doc! { "i": i }).collect();
    stream
        .write_all(&encode_insert(1, "bench.items", &documents).unwrap())
        .await
        .unwrap();

    let reply = command(&mut stream, 2, "bench", doc! { "count": "items", "query": {} }).await;
    assert_eq!(reply.documents[0].get_i64("n").unwrap(), 5);
    assert_eq!(reply.documents[0].get_i32("ok").unwrap(), 1);
}

// ============================================================================
// Malformed / unsupported input
// ============================================================================

#[tokio::test]
async fn test_malformed_body_is_dropped() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut bad = encode_query(1, "test.c", &doc! { "a": 1 }, 0, 0).unwrap();
    let doc_start = HEADER_LEN + 4 + "test.c".len() + 1 + 8;
    bad[doc_start..doc_start + 4].copy_from_slice(&999_i32.to_le_bytes());
    stream.write_all(&bad).await.unwrap();

    let ping = command(&mut stream, 2, "admin", doc! { "ping": 1 }).await;
    assert_eq!(ping.response_to, 2);
    assert_eq!(ping.documents, vec![doc! { "ok": 1 }]);
}

#[tokio::test]
async fn test_unsupported_opcode_gets_no_reply() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut frame = bytes::BytesMut::new();
    serialize_header(
        &MsgHeader {
            message_length: 20,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::Update,
        },
        &mut frame,
    );
    frame.extend_from_slice(&[0, 0, 0, 0]);
    stream.write_all(&frame).await.unwrap();

    let ping = command(&mut stream, 2, "admin", doc! { "ping": 1 }).await;
    assert_eq!(ping.response_to, 2);
}

#[tokio::test]
async fn test_bad_frame_length_closes_connection() {
    let (addr, _router) = start_default_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut frame = bytes::BytesMut::new();
    serialize_header(
        &MsgHeader {
            message_length: 8,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::Query,
        },
        &mut frame,
    );
    stream.write_all(&frame).await.unwrap();

    let mut buf = [0u8; 1];
    let read = timeout(IO_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("Server did not close the connection");
    assert!(matches!(read, Ok(0) | Err(_)));
}
