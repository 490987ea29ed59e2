//! Decoded inbound messages, outbound replies and client identity

use std::net::SocketAddr;

use bson::Document;

/// Cursor id meaning "no more batches". Every reply carries it.
pub const EXHAUSTED_CURSOR: i64 = 0;

/// Suffix marking a query namespace as a command namespace.
pub const COMMAND_NAMESPACE_SUFFIX: &str = ".$cmd";

/// A well-formed inbound request, as produced by the wire codec
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Append documents to a collection
    Insert {
        collection: String,
        documents: Vec<Document>,
        request_id: i32,
    },
    /// Read a window of a collection, or run a command when the namespace
    /// is `<db>.$cmd`
    Query {
        collection: String,
        query: Document,
        fields: Option<Document>,
        skip: u32,
        limit: u32,
        flags: i32,
        request_id: i32,
    },
    /// Continue a cursor
    GetMore {
        collection: String,
        cursor_id: i64,
        limit: u32,
        request_id: i32,
    },
    /// An opcode the codec frames but the core does not serve
    Unsupported { op_code: i32, request_id: i32 },
}

impl Message {
    /// Short name used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Insert { .. } => "insert",
            Message::Query { .. } => "query",
            Message::GetMore { .. } => "getmore",
            Message::Unsupported { .. } => "unsupported",
        }
    }

    /// Whether this is a query addressed to a command namespace
    pub fn is_command(&self) -> bool {
        matches!(self, Message::Query { collection, .. } if collection.ends_with(COMMAND_NAMESPACE_SUFFIX))
    }
}

/// Outbound reply to a query, get-more or acknowledged insert
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response_to: i32,
    pub flags: i32,
    pub cursor_id: i64,
    pub starting_from: i32,
    pub documents: Vec<Document>,
}

impl Reply {
    pub fn new(response_to: i32, documents: Vec<Document>) -> Self {
        Self {
            response_to,
            flags: 0,
            cursor_id: EXHAUSTED_CURSOR,
            starting_from: 0,
            documents,
        }
    }

    pub fn empty(response_to: i32) -> Self {
        Self::new(response_to, Vec::new())
    }

    pub fn single(response_to: i32, document: Document) -> Self {
        Self::new(response_to, vec![document])
    }
}

/// Identity of the connection a message arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientContext {
    peer: SocketAddr,
}

impl ClientContext {
    pub fn new(peer: SocketAddr) -> Self {
        Self { peer }
    }

    /// Peer address as `ip:port`, without brackets around IPv6 hosts
    pub fn uri(&self) -> String {
        format!("{}:{}", self.peer.ip(), self.peer.port())
    }
}
