//! Legacy opcode codec
//!
//! Inbound frames are decoded into [`Message`]s; replies are encoded as
//! OP_REPLY. The request-side encoders and [`decode_reply`] exist for
//! clients and tests speaking to the server.

use std::io::Cursor;

use bson::Document;
use bytes::{Buf, BufMut, BytesMut};

use mongolite_common::error::ProtocolError;
use mongolite_core::{Message, Reply};

use crate::wire::{parse_header, serialize_header, MsgHeader, OpCode, HEADER_LEN};

/// Length of the empty BSON document.
const MIN_DOCUMENT_LEN: usize = 5;

/// Decode the body of a frame whose header has already been read
pub fn decode_message(header: &MsgHeader, body: &[u8]) -> Result<Message, ProtocolError> {
    let mut reader = BodyReader::new(body);
    let request_id = header.request_id;

    match header.op_code {
        OpCode::Insert => {
            let _flags = reader.i32("flags")?;
            let collection = reader.cstring("fullCollectionName")?;
            let mut documents = Vec::new();
            while !reader.is_empty() {
                documents.push(reader.document()?);
            }
            Ok(Message::Insert {
                collection,
                documents,
                request_id,
            })
        }
        OpCode::Query => {
            let flags = reader.i32("flags")?;
            let collection = reader.cstring("fullCollectionName")?;
            let skip = reader.i32("numberToSkip")?;
            let limit = reader.i32("numberToReturn")?;
            let query = reader.document()?;
            let fields = if reader.is_empty() {
                None
            } else {
                Some(reader.document()?)
            };
            reader.finish()?;

            Ok(Message::Query {
                collection,
                query,
                fields,
                skip: u32::try_from(skip).unwrap_or(0),
                // A negative count asks for a single batch of that size.
                limit: limit.unsigned_abs(),
                flags,
                request_id,
            })
        }
        OpCode::GetMore => {
            let _zero = reader.i32("ZERO")?;
            let collection = reader.cstring("fullCollectionName")?;
            let limit = reader.i32("numberToReturn")?;
            let cursor_id = reader.i64("cursorID")?;
            reader.finish()?;

            Ok(Message::GetMore {
                collection,
                cursor_id,
                limit: limit.unsigned_abs(),
                request_id,
            })
        }
        OpCode::Update
        | OpCode::Delete
        | OpCode::KillCursors
        | OpCode::LegacyMsg
        | OpCode::Msg
        | OpCode::Compressed => Ok(Message::Unsupported {
            op_code: header.op_code.code(),
            request_id,
        }),
        OpCode::Reply => Err(ProtocolError::InvalidFormat(
            "clients must not send OP_REPLY".to_string(),
        )),
        OpCode::Other(code) => Err(ProtocolError::InvalidFormat(format!("unknown opcode {}", code))),
    }
}

/// Encode `reply` as an OP_REPLY frame carrying `request_id`
pub fn encode_reply(request_id: i32, reply: &Reply) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::new();
    body.put_i32_le(reply.flags);
    body.put_i64_le(reply.cursor_id);
    body.put_i32_le(reply.starting_from);
    body.put_i32_le(count_field(reply.documents.len())?);
    for document in &reply.documents {
        write_document(document, &mut body)?;
    }

    frame(request_id, reply.response_to, OpCode::Reply, &body)
}

/// Decode an OP_REPLY frame, header included
pub fn decode_reply(frame: &[u8]) -> Result<(MsgHeader, Reply), ProtocolError> {
    let header = parse_header(frame)?;
    if header.op_code != OpCode::Reply {
        return Err(ProtocolError::InvalidFormat(format!(
            "expected OP_REPLY, got opcode {}",
            header.op_code.code()
        )));
    }

    let mut reader = BodyReader::new(&frame[HEADER_LEN..]);
    let flags = reader.i32("responseFlags")?;
    let cursor_id = reader.i64("cursorID")?;
    let starting_from = reader.i32("startingFrom")?;
    let returned = reader.i32("numberReturned")?;

    // The count is untrusted; every document takes at least five bytes.
    let capacity = usize::try_from(returned).unwrap_or(0).min(reader.remaining() / MIN_DOCUMENT_LEN);
    let mut documents = Vec::with_capacity(capacity);
    for _ in 0..returned {
        documents.push(reader.document()?);
    }
    reader.finish()?;

    Ok((
        header,
        Reply {
            response_to: header.response_to,
            flags,
            cursor_id,
            starting_from,
            documents,
        },
    ))
}

/// Encode an OP_INSERT frame
pub fn encode_insert(
    request_id: i32,
    collection: &str,
    documents: &[Document],
) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::new();
    body.put_i32_le(0);
    put_cstring(collection, &mut body)?;
    for document in documents {
        write_document(document, &mut body)?;
    }

    frame(request_id, 0, OpCode::Insert, &body)
}

/// Encode an OP_QUERY frame
pub fn encode_query(
    request_id: i32,
    collection: &str,
    query: &Document,
    skip: i32,
    limit: i32,
) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::new();
    body.put_i32_le(0);
    put_cstring(collection, &mut body)?;
    body.put_i32_le(skip);
    body.put_i32_le(limit);
    write_document(query, &mut body)?;

    frame(request_id, 0, OpCode::Query, &body)
}

/// Encode an OP_GET_MORE frame
pub fn encode_get_more(
    request_id: i32,
    collection: &str,
    limit: i32,
    cursor_id: i64,
) -> Result<BytesMut, ProtocolError> {
    let mut body = BytesMut::new();
    body.put_i32_le(0);
    put_cstring(collection, &mut body)?;
    body.put_i32_le(limit);
    body.put_i64_le(cursor_id);

    frame(request_id, 0, OpCode::GetMore, &body)
}

fn frame(request_id: i32, response_to: i32, op_code: OpCode, body: &[u8]) -> Result<BytesMut, ProtocolError> {
    let total = HEADER_LEN + body.len();
    let message_length = i32::try_from(total).map_err(|_| ProtocolError::MessageTooLarge {
        size: total,
        max: i32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(total);
    serialize_header(
        &MsgHeader {
            message_length,
            request_id,
            response_to,
            op_code,
        },
        &mut buf,
    );
    buf.extend_from_slice(body);
    Ok(buf)
}

fn count_field(count: usize) -> Result<i32, ProtocolError> {
    i32::try_from(count).map_err(|_| ProtocolError::InvalidFormat(format!("too many documents: {}", count)))
}

fn put_cstring(value: &str, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    if value.as_bytes().contains(&0) {
        return Err(ProtocolError::InvalidFormat(format!(
            "collection name {:?} contains NUL",
            value
        )));
    }
    buf.extend_from_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn write_document(document: &Document, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let mut bytes = Vec::new();
    document
        .to_writer(&mut bytes)
        .map_err(|e| ProtocolError::InvalidDocument(e.to_string()))?;
    buf.extend_from_slice(&bytes);
    Ok(())
}

/// Bounds-checked little-endian reads over a frame body
struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn i32(&mut self, field: &str) -> Result<i32, ProtocolError> {
        if self.buf.remaining() < 4 {
            return Err(truncated(field));
        }
        Ok(self.buf.get_i32_le())
    }

    fn i64(&mut self, field: &str) -> Result<i64, ProtocolError> {
        if self.buf.remaining() < 8 {
            return Err(truncated(field));
        }
        Ok(self.buf.get_i64_le())
    }

    fn cstring(&mut self, field: &str) -> Result<String, ProtocolError> {
        let end = self
            .buf
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| truncated(field))?;
        let value = std::str::from_utf8(&self.buf[..end])
            .map_err(|_| ProtocolError::InvalidFormat(format!("{} is not valid UTF-8", field)))?
            .to_string();
        self.buf.advance(end + 1);
        Ok(value)
    }

    fn document(&mut self) -> Result<Document, ProtocolError> {
        if self.buf.remaining() < 4 {
            return Err(ProtocolError::InvalidDocument("truncated document length".to_string()));
        }

        let declared = i32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        let len = usize::try_from(declared)
            .ok()
            .filter(|&len| len >= MIN_DOCUMENT_LEN && len <= self.buf.remaining())
            .ok_or_else(|| {
                ProtocolError::InvalidDocument(format!(
                    "document length {} with {} bytes left",
                    declared,
                    self.buf.remaining()
                ))
            })?;

        let document = Document::from_reader(&mut Cursor::new(&self.buf[..len]))
            .map_err(|e| ProtocolError::InvalidDocument(e.to_string()))?;
        self.buf.advance(len);
        Ok(document)
    }

    fn finish(&self) -> Result<(), ProtocolError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::InvalidFormat(format!(
                "{} unexpected trailing bytes",
                self.buf.remaining()
            )))
        }
    }
}

fn truncated(field: &str) -> ProtocolError {
    ProtocolError::InvalidFormat(format!("truncated {}", field))
}
