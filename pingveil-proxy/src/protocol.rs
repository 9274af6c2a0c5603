//! Minimal Minecraft Java framing: just enough for the handshake and the
//! status exchange.
//!
//! Frames are `VarInt length | VarInt packet id | data`. Reads are unbuffered
//! so a connection can be handed to a passthrough without losing bytes.

use pingveil_core::FetchError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted, the maximum a 3-byte VarInt can describe.
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Status responses are JSON strings capped at 32767 UTF-16 units; allow the
/// UTF-8 worst case.
const MAX_STRING_LEN: usize = 32_767 * 3;

pub const HANDSHAKE_ID: i32 = 0x00;
pub const STATUS_REQUEST_ID: i32 = 0x00;
pub const STATUS_RESPONSE_ID: i32 = 0x00;
pub const PING_ID: i32 = 0x01;
pub const PONG_ID: i32 = 0x01;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("VarInt is longer than 5 bytes")]
    VarIntTooLong,

    #[error("frame length {0} is out of range")]
    InvalidFrameLength(i32),

    #[error("packet ended early")]
    Truncated,

    #[error("string length {0} is out of range")]
    InvalidStringLength(i32),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("expected packet 0x{expected:02x}, got 0x{found:02x}")]
    UnexpectedPacket { expected: i32, found: i32 },

    #[error("unknown next state {0}")]
    InvalidNextState(i32),

    #[error("handshake not received in time")]
    HandshakeTimeout,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// True when the peer simply hung up.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

impl From<ProtocolError> for FetchError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => FetchError::Connection(e),
            other => FetchError::InvalidResponse(other.to_string()),
        }
    }
}

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7f == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7f) as u8 | 0x80);
        value >>= 7;
    }
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, ProtocolError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Read one frame and return its body (packet id followed by data).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let len = read_varint(reader).await?;
    if len <= 0 || len as usize > MAX_FRAME_LEN {
        return Err(ProtocolError::InvalidFrameLength(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), ProtocolError> {
    let mut out = Vec::with_capacity(body.len() + 5);
    write_varint(&mut out, body.len() as i32);
    out.extend_from_slice(body);
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}

/// Cursor over a frame body.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos.checked_add(n).ok_or(ProtocolError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(ProtocolError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn varint(&mut self) -> Result<i32, ProtocolError> {
        let mut value: u32 = 0;
        for i in 0..5 {
            let byte = self.take(1)?[0];
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(ProtocolError::VarIntTooLong)
    }

    pub fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.varint()?;
        if len < 0 || len as usize > MAX_STRING_LEN {
            return Err(ProtocolError::InvalidStringLength(len));
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn i64(&mut self) -> Result<i64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    /// Read the packet id and check it.
    pub fn expect_id(&mut self, expected: i32) -> Result<(), ProtocolError> {
        let found = self.varint()?;
        if found != expected {
            return Err(ProtocolError::UnexpectedPacket { expected, found });
        }
        Ok(())
    }
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
    Transfer,
}

impl TryFrom<i32> for NextState {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            3 => Ok(Self::Transfer),
            other => Err(ProtocolError::InvalidNextState(other)),
        }
    }
}

impl NextState {
    fn id(self) -> i32 {
        match self {
            Self::Status => 1,
            Self::Login => 2,
            Self::Transfer => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

impl Handshake {
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(body);
        reader.expect_id(HANDSHAKE_ID)?;
        Ok(Self {
            protocol_version: reader.varint()?,
            server_address: reader.string()?,
            server_port: reader.u16()?,
            next_state: NextState::try_from(reader.varint()?)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, HANDSHAKE_ID);
        write_varint(&mut buf, self.protocol_version);
        write_string(&mut buf, &self.server_address);
        buf.extend_from_slice(&self.server_port.to_be_bytes());
        write_varint(&mut buf, self.next_state.id());
        buf
    }
}

pub fn status_request() -> Vec<u8> {
    let mut buf = Vec::new();
    write_varint(&mut buf, STATUS_REQUEST_ID);
    buf
}

pub fn status_response(json: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(json.len() + 4);
    write_varint(&mut buf, STATUS_RESPONSE_ID);
    write_string(&mut buf, json);
    buf
}

pub fn decode_status_response(body: &[u8]) -> Result<String, ProtocolError> {
    let mut reader = PacketReader::new(body);
    reader.expect_id(STATUS_RESPONSE_ID)?;
    reader.string()
}

pub fn ping(payload: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    write_varint(&mut buf, PING_ID);
    buf.extend_from_slice(&payload.to_be_bytes());
    buf
}

pub fn pong(payload: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9);
    write_varint(&mut buf, PONG_ID);
    buf.extend_from_slice(&payload.to_be_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_known_encodings() {
        let cases: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (255, &[0xff, 0x01]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (2_097_151, &[0xff, 0xff, 0x7f]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, *value);
            assert_eq!(buf.as_slice(), *expected, "encoding {value}");
            assert_eq!(PacketReader::new(expected).varint().unwrap(), *value);
        }
    }

    #[test]
    fn test_varint_too_long() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            PacketReader::new(&bytes).varint(),
            Err(ProtocolError::VarIntTooLong)
        ));
    }

    #[test]
    fn test_handshake_decode() {
        let handshake = Handshake {
            protocol_version: 763,
            server_address: "play.example.net".to_string(),
            server_port: 25565,
            next_state: NextState::Status,
        };
        assert_eq!(Handshake::decode(&handshake.encode()).unwrap(), handshake);
    }

    #[test]
    fn test_handshake_rejects_unknown_state() {
        let mut body = Vec::new();
        write_varint(&mut body, HANDSHAKE_ID);
        write_varint(&mut body, 47);
        write_string(&mut body, "localhost");
        body.extend_from_slice(&25565u16.to_be_bytes());
        write_varint(&mut body, 9);
        assert!(matches!(
            Handshake::decode(&body),
            Err(ProtocolError::InvalidNextState(9))
        ));
    }

    #[test]
    fn test_truncated_handshake() {
        let body = [0x00, 0xaf, 0x05, 0x09, b'l'];
        assert!(matches!(Handshake::decode(&body), Err(ProtocolError::Truncated)));
    }

    #[test]
    fn test_status_response_decode() {
        let json = r#"{"version":{"name":"1.8.8","protocol":47}}"#;
        assert_eq!(decode_status_response(&status_response(json)).unwrap(), json);
    }

    #[test]
    fn test_wrong_packet_id() {
        assert!(matches!(
            decode_status_response(&ping(5)),
            Err(ProtocolError::UnexpectedPacket {
                expected: 0,
                found: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_frame_over_stream() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, &ping(42)).await.unwrap();
        let body = read_frame(&mut server).await.unwrap();
        let mut reader = PacketReader::new(&body);
        reader.expect_id(PING_ID).unwrap();
        assert_eq!(reader.i64().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_zero_length_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(8);
        client.write_all(&[0x00]).await.unwrap();
        assert!(matches!(
            read_frame(&mut server).await,
            Err(ProtocolError::InvalidFrameLength(0))
        ));
    }

    #[tokio::test]
    async fn test_hangup_is_disconnect() {
        let (client, mut server) = tokio::io::duplex(8);
        drop(client);
        let err = read_frame(&mut server).await.unwrap_err();
        assert!(err.is_disconnect());
    }
}
