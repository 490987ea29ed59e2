//! Message header and opcodes of the legacy wire protocol

use bytes::{Buf, BufMut, BytesMut};

use mongolite_common::error::ProtocolError;

/// Size of the standard message header.
pub const HEADER_LEN: usize = 16;

/// Wire protocol opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Reply,
    LegacyMsg,
    Update,
    Insert,
    Query,
    GetMore,
    Delete,
    KillCursors,
    Compressed,
    Msg,
    Other(i32),
}

impl OpCode {
    pub fn code(self) -> i32 {
        match self {
            OpCode::Reply => 1,
            OpCode::LegacyMsg => 1000,
            OpCode::Update => 2001,
            OpCode::Insert => 2002,
            OpCode::Query => 2004,
            OpCode::GetMore => 2005,
            OpCode::Delete => 2006,
            OpCode::KillCursors => 2007,
            OpCode::Compressed => 2012,
            OpCode::Msg => 2013,
            OpCode::Other(code) => code,
        }
    }
}

impl From<i32> for OpCode {
    fn from(value: i32) -> Self {
        match value {
            1 => OpCode::Reply,
            1000 => OpCode::LegacyMsg,
            2001 => OpCode::Update,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2006 => OpCode::Delete,
            2007 => OpCode::KillCursors,
            2012 => OpCode::Compressed,
            2013 => OpCode::Msg,
            other => OpCode::Other(other),
        }
    }
}

/// Message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: OpCode,
}

impl MsgHeader {
    /// Number of bytes following the header, checked against `max_message_bytes`
    pub fn body_len(&self, max_message_bytes: usize) -> Result<usize, ProtocolError> {
        let total = usize::try_from(self.message_length).map_err(|_| {
            ProtocolError::InvalidFormat(format!("negative message length {}", self.message_length))
        })?;

        if total < HEADER_LEN {
            return Err(ProtocolError::InvalidFormat(format!(
                "message length {} shorter than header",
                total
            )));
        }
        if total > max_message_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size: total,
                max: max_message_bytes,
            });
        }
        Ok(total - HEADER_LEN)
    }
}

/// Parse a message header
pub fn parse_header(mut data: &[u8]) -> Result<MsgHeader, ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::IncompleteMessage);
    }

    Ok(MsgHeader {
        message_length: data.get_i32_le(),
        request_id: data.get_i32_le(),
        response_to: data.get_i32_le(),
        op_code: data.get_i32_le().into(),
    })
}

/// Serialize a message header
pub fn serialize_header(header: &MsgHeader, buf: &mut BytesMut) {
    buf.put_i32_le(header.message_length);
    buf.put_i32_le(header.request_id);
    buf.put_i32_le(header.response_to);
    buf.put_i32_le(header.op_code.code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip_layout() {
        let header = MsgHeader {
            message_length: 36,
            request_id: 7,
            response_to: 0,
            op_code: OpCode::Query,
        };
        let mut buf = BytesMut::new();
        serialize_header(&header, &mut buf);

        assert_eq!(&buf[..4], &36_i32.to_le_bytes());
        assert_eq!(&buf[12..16], &2004_i32.to_le_bytes());
        assert_eq!(parse_header(&buf).unwrap(), header);
    }

    #[test]
    fn test_short_header() {
        assert_eq!(parse_header(&[0u8; 15]), Err(ProtocolError::IncompleteMessage));
    }

    #[test]
    fn test_unknown_opcode_kept() {
        assert_eq!(OpCode::from(4242), OpCode::Other(4242));
        assert_eq!(OpCode::Other(4242).code(), 4242);
    }

    #[test]
    fn test_body_len_bounds() {
        let mut header = MsgHeader {
            message_length: 10,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::Insert,
        };
        assert!(matches!(header.body_len(1024), Err(ProtocolError::InvalidFormat(_))));

        header.message_length = -5;
        assert!(matches!(header.body_len(1024), Err(ProtocolError::InvalidFormat(_))));

        header.message_length = 2048;
        assert_eq!(
            header.body_len(1024),
            Err(ProtocolError::MessageTooLarge { size: 2048, max: 1024 })
        );

        header.message_length = 40;
        assert_eq!(header.body_len(1024), Ok(24));
    }
}
