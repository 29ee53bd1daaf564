// JDWP protocol definitions and packet framing
//
// Reference: https://docs.oracle.com/javase/8/docs/platform/jpda/jdwp/jdwp-protocol.html

use bytes::{BufMut, BytesMut};
use std::fmt;
use thiserror::Error;

// JDWP uses big-endian (network byte order) for all multi-byte values.

pub type JdwpResult<T> = Result<T, JdwpError>;

#[derive(Debug, Error)]
pub enum JdwpError {
    /// The peer did not answer the 14-byte magic with the same bytes.
    #[error("JDWP handshake failed")]
    HandshakeFailed,

    /// I/O failure on the underlying stream. Fatal to the connection.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Malformed packet header. Fatal, the stream cannot be re-framed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A payload did not match the expected shape. Fatal, the decoder
    /// position is lost.
    #[error("decode error: {0}")]
    Decode(String),

    /// Non-zero error code in a reply. The connection stays usable.
    #[error("JDWP error: {0}")]
    Peer(ErrorCode),

    /// No reply arrived within the request timeout. The connection
    /// stays usable.
    #[error("request timed out")]
    Timeout,

    /// The ambient cancellation fired while waiting.
    #[error("cancelled")]
    Cancelled,

    /// The stream ended, or the connection was torn down while the
    /// caller was waiting.
    #[error("connection closed")]
    ConnectionClosed,
}

impl JdwpError {
    /// Whether this error ends the connection, as opposed to failing a
    /// single call.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            JdwpError::Peer(_) | JdwpError::Timeout | JdwpError::Cancelled
        )
    }
}

/// JDWP handshake magic, sent verbatim in both directions right after
/// the stream is established.
pub const JDWP_HANDSHAKE: &[u8; 14] = b"JDWP-Handshake";

// Packet structure:
// length (4 bytes) - includes header
// id (4 bytes)
// flags (1 byte) - bit 0x80 set = reply
// [Command packet: command set (1 byte) + command (1 byte)]
// [Reply packet: error code (2 bytes)]
// data (variable)

pub const HEADER_SIZE: usize = 11;
pub const REPLY_FLAG: u8 = 0x80;

/// Hard cap on inbound packet size (10MB) so a corrupt length prefix
/// cannot exhaust memory.
pub const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReplyPacket {
    pub id: u32,
    pub error_code: u16,
    pub data: Vec<u8>,
}

impl CommandPacket {
    pub fn new(id: u32, command_set: u8, command: u8) -> Self {
        Self::with_data(id, command_set, command, Vec::new())
    }

    pub fn with_data(id: u32, command_set: u8, command: u8, data: Vec<u8>) -> Self {
        Self {
            id,
            command_set,
            command,
            data,
        }
    }

    /// Serialize into one contiguous frame, ready for a single write.
    pub fn encode(&self) -> Vec<u8> {
        let length = HEADER_SIZE + self.data.len();
        let mut buf = BytesMut::with_capacity(length);

        buf.put_u32(length as u32);
        buf.put_u32(self.id);
        buf.put_u8(0x00); // command flag
        buf.put_u8(self.command_set);
        buf.put_u8(self.command);
        buf.put_slice(&self.data);

        buf.to_vec()
    }
}

impl ReplyPacket {
    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    /// Map a non-zero error code to `JdwpError::Peer`.
    pub fn check_error(&self) -> JdwpResult<()> {
        if self.is_error() {
            Err(JdwpError::Peer(ErrorCode::from_u16(self.error_code)))
        } else {
            Ok(())
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The fixed JDWP error-code enumeration carried by reply packets.
///
/// Codes outside the table land in `Other` rather than failing the
/// decode; the set has grown over JVM versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidThread,
    InvalidThreadGroup,
    InvalidPriority,
    ThreadNotSuspended,
    ThreadSuspended,
    InvalidObject,
    InvalidClass,
    ClassNotPrepared,
    InvalidMethodId,
    InvalidLocation,
    InvalidFieldId,
    InvalidFrameId,
    NoMoreFrames,
    OpaqueFrame,
    NotCurrentFrame,
    TypeMismatch,
    InvalidSlot,
    Duplicate,
    NotFound,
    InvalidMonitor,
    NotMonitorOwner,
    Interrupt,
    InvalidClassFormat,
    CircularClassDefinition,
    FailsVerification,
    AddMethodNotImplemented,
    SchemaChangeNotImplemented,
    InvalidTypestate,
    HierarchyChangeNotImplemented,
    DeleteMethodNotImplemented,
    UnsupportedVersion,
    NamesDontMatch,
    ClassModifiersChangeNotImplemented,
    MethodModifiersChangeNotImplemented,
    NotImplemented,
    NullPointer,
    AbsentInformation,
    InvalidEventType,
    IllegalArgument,
    OutOfMemory,
    AccessDenied,
    VmDead,
    Internal,
    UnattachedThread,
    InvalidTag,
    AlreadyInvoking,
    InvalidIndex,
    InvalidLength,
    InvalidString,
    InvalidClassLoader,
    InvalidArray,
    TransportLoad,
    TransportInit,
    NativeMethod,
    InvalidCount,
    Other(u16),
}

impl ErrorCode {
    pub fn from_u16(code: u16) -> ErrorCode {
        use ErrorCode::*;
        match code {
            10 => InvalidThread,
            11 => InvalidThreadGroup,
            12 => InvalidPriority,
            13 => ThreadNotSuspended,
            14 => ThreadSuspended,
            20 => InvalidObject,
            21 => InvalidClass,
            22 => ClassNotPrepared,
            23 => InvalidMethodId,
            24 => InvalidLocation,
            25 => InvalidFieldId,
            30 => InvalidFrameId,
            31 => NoMoreFrames,
            32 => OpaqueFrame,
            33 => NotCurrentFrame,
            34 => TypeMismatch,
            35 => InvalidSlot,
            40 => Duplicate,
            41 => NotFound,
            50 => InvalidMonitor,
            51 => NotMonitorOwner,
            52 => Interrupt,
            60 => InvalidClassFormat,
            61 => CircularClassDefinition,
            62 => FailsVerification,
            63 => AddMethodNotImplemented,
            64 => SchemaChangeNotImplemented,
            65 => InvalidTypestate,
            66 => HierarchyChangeNotImplemented,
            67 => DeleteMethodNotImplemented,
            68 => UnsupportedVersion,
            69 => NamesDontMatch,
            70 => ClassModifiersChangeNotImplemented,
            71 => MethodModifiersChangeNotImplemented,
            99 => NotImplemented,
            100 => NullPointer,
            101 => AbsentInformation,
            102 => InvalidEventType,
            103 => IllegalArgument,
            110 => OutOfMemory,
            111 => AccessDenied,
            112 => VmDead,
            113 => Internal,
            115 => UnattachedThread,
            500 => InvalidTag,
            502 => AlreadyInvoking,
            503 => InvalidIndex,
            504 => InvalidLength,
            506 => InvalidString,
            507 => InvalidClassLoader,
            508 => InvalidArray,
            509 => TransportLoad,
            510 => TransportInit,
            511 => NativeMethod,
            512 => InvalidCount,
            other => Other(other),
        }
    }

    /// The name the JDWP specification gives this code.
    pub fn name(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            InvalidThread => "INVALID_THREAD",
            InvalidThreadGroup => "INVALID_THREAD_GROUP",
            InvalidPriority => "INVALID_PRIORITY",
            ThreadNotSuspended => "THREAD_NOT_SUSPENDED",
            ThreadSuspended => "THREAD_SUSPENDED",
            InvalidObject => "INVALID_OBJECT",
            InvalidClass => "INVALID_CLASS",
            ClassNotPrepared => "CLASS_NOT_PREPARED",
            InvalidMethodId => "INVALID_METHODID",
            InvalidLocation => "INVALID_LOCATION",
            InvalidFieldId => "INVALID_FIELDID",
            InvalidFrameId => "INVALID_FRAMEID",
            NoMoreFrames => "NO_MORE_FRAMES",
            OpaqueFrame => "OPAQUE_FRAME",
            NotCurrentFrame => "NOT_CURRENT_FRAME",
            TypeMismatch => "TYPE_MISMATCH",
            InvalidSlot => "INVALID_SLOT",
            Duplicate => "DUPLICATE",
            NotFound => "NOT_FOUND",
            InvalidMonitor => "INVALID_MONITOR",
            NotMonitorOwner => "NOT_MONITOR_OWNER",
            Interrupt => "INTERRUPT",
            InvalidClassFormat => "INVALID_CLASS_FORMAT",
            CircularClassDefinition => "CIRCULAR_CLASS_DEFINITION",
            FailsVerification => "FAILS_VERIFICATION",
            AddMethodNotImplemented => "ADD_METHOD_NOT_IMPLEMENTED",
            SchemaChangeNotImplemented => "SCHEMA_CHANGE_NOT_IMPLEMENTED",
            InvalidTypestate => "INVALID_TYPESTATE",
            HierarchyChangeNotImplemented => "HIERARCHY_CHANGE_NOT_IMPLEMENTED",
            DeleteMethodNotImplemented => "DELETE_METHOD_NOT_IMPLEMENTED",
            UnsupportedVersion => "UNSUPPORTED_VERSION",
            NamesDontMatch => "NAMES_DONT_MATCH",
            ClassModifiersChangeNotImplemented => "CLASS_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
            MethodModifiersChangeNotImplemented => "METHOD_MODIFIERS_CHANGE_NOT_IMPLEMENTED",
            NotImplemented => "NOT_IMPLEMENTED",
            NullPointer => "NULL_POINTER",
            AbsentInformation => "ABSENT_INFORMATION",
            InvalidEventType => "INVALID_EVENT_TYPE",
            IllegalArgument => "ILLEGAL_ARGUMENT",
            OutOfMemory => "OUT_OF_MEMORY",
            AccessDenied => "ACCESS_DENIED",
            VmDead => "VM_DEAD",
            Internal => "INTERNAL",
            UnattachedThread => "UNATTACHED_THREAD",
            InvalidTag => "INVALID_TAG",
            AlreadyInvoking => "ALREADY_INVOKING",
            InvalidIndex => "INVALID_INDEX",
            InvalidLength => "INVALID_LENGTH",
            InvalidString => "INVALID_STRING",
            InvalidClassLoader => "INVALID_CLASS_LOADER",
            InvalidArray => "INVALID_ARRAY",
            TransportLoad => "TRANSPORT_LOAD",
            TransportInit => "TRANSPORT_INIT",
            NativeMethod => "NATIVE_METHOD",
            InvalidCount => "INVALID_COUNT",
            Other(_) => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Other(code) => write!(f, "UNKNOWN_ERROR({code})"),
            known => f.write_str(known.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_packet_encode() {
        let packet = CommandPacket::new(1, 1, 1);
        let encoded = packet.encode();

        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(&encoded[0..4], &[0, 0, 0, 11]); // length (big-endian)
        assert_eq!(&encoded[4..8], &[0, 0, 0, 1]); // id (big-endian)
        assert_eq!(encoded[8], 0x00); // command flag
        assert_eq!(encoded[9], 1); // command set
        assert_eq!(encoded[10], 1); // command
    }

    #[test]
    fn test_big_endian_encoding() {
        let packet = CommandPacket::new(0x12345678, 1, 1);
        let encoded = packet.encode();

        assert_eq!(&encoded[4..8], &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_payload_length() {
        let packet = CommandPacket::with_data(7, 15, 1, vec![0xAA; 5]);
        let encoded = packet.encode();

        assert_eq!(encoded.len(), HEADER_SIZE + 5);
        assert_eq!(&encoded[0..4], &[0, 0, 0, 16]);
        assert_eq!(&encoded[11..], &[0xAA; 5]);
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(ErrorCode::from_u16(10), ErrorCode::InvalidThread);
        assert_eq!(ErrorCode::from_u16(13), ErrorCode::ThreadNotSuspended);
        assert_eq!(ErrorCode::from_u16(35), ErrorCode::InvalidSlot);
        assert_eq!(ErrorCode::from_u16(112), ErrorCode::VmDead);
        assert_eq!(ErrorCode::from_u16(9999), ErrorCode::Other(9999));

        assert_eq!(ErrorCode::VmDead.to_string(), "VM_DEAD");
        assert_eq!(ErrorCode::Other(9999).to_string(), "UNKNOWN_ERROR(9999)");
    }

    #[test]
    fn test_reply_error_surface() {
        let reply = ReplyPacket {
            id: 3,
            error_code: 13,
            data: Vec::new(),
        };
        match reply.check_error() {
            Err(JdwpError::Peer(ErrorCode::ThreadNotSuspended)) => {}
            other => panic!("unexpected: {other:?}"),
        }

        let ok = ReplyPacket {
            id: 3,
            error_code: 0,
            data: Vec::new(),
        };
        assert!(ok.check_error().is_ok());
    }

    #[test]
    fn test_fatality() {
        assert!(JdwpError::HandshakeFailed.is_fatal());
        assert!(JdwpError::ConnectionClosed.is_fatal());
        assert!(JdwpError::Decode("bad".into()).is_fatal());
        assert!(!JdwpError::Timeout.is_fatal());
        assert!(!JdwpError::Peer(ErrorCode::VmDead).is_fatal());
        assert!(!JdwpError::Cancelled.is_fatal());
    }
}
