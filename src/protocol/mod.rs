//! Wire codec for the browser channel.
//!
//! One WebSocket binary message is exactly one packet: a one-byte tag
//! followed by a type-dependent payload. Multi-byte integers are big-endian
//! unsigned. The login exchange reuses the frame-request tag; it is only
//! decoded as a login while the session is still unauthenticated.

pub mod events;

pub use events::{InputEvent, MouseButton};

use thiserror::Error;

/// Client -> server: frame request (and the login on the first exchange).
pub const TAG_FRAME_REQUEST: u8 = 0x01;
/// Server -> client: frame response.
pub const TAG_FRAME_RESPONSE: u8 = 0x02;
/// Client -> server: input event batch.
pub const TAG_INPUT: u8 = 0x03;

/// Frame response kinds.
pub const FRAME_EMPTY: u8 = 0x00;
pub const FRAME_FULL: u8 = 0x01;
pub const FRAME_PARTIAL: u8 = 0x02;

/// Login result status bytes.
pub const LOGIN_DENIED: u8 = 0x00;
pub const LOGIN_CONTROLLER: u8 = 0x01;
pub const LOGIN_VIEWER: u8 = 0x02;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("unknown packet tag 0x{0:02x}")]
    UnknownTag(u8),
}

/// Authenticated session role. Only controllers may drive host input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Viewer,
    Controller,
}

impl Role {
    pub fn status_byte(self) -> u8 {
        match self {
            Role::Controller => LOGIN_CONTROLLER,
            Role::Viewer => LOGIN_VIEWER,
        }
    }
}

/// A client's request for the next frame at its current viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRequest {
    pub width: u16,
    pub height: u16,
    pub quality: u8,
}

/// Any packet a client may send after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    FrameRequest(FrameRequest),
    Input(Vec<InputEvent>),
}

/// A server frame response. `width`/`height` are the remote viewport the
/// frame was produced at; `Partial` carries the crop origin of its region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResponse {
    Empty { width: u16, height: u16 },
    Full { width: u16, height: u16, jpeg: Vec<u8> },
    Partial { width: u16, height: u16, x: u16, y: u16, jpeg: Vec<u8> },
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Decode a post-login client message.
pub fn decode_client(msg: &[u8]) -> Result<ClientPacket, ProtocolError> {
    let (&tag, payload) = msg
        .split_first()
        .ok_or(ProtocolError::Malformed("empty message"))?;
    match tag {
        TAG_FRAME_REQUEST => {
            if payload.len() != 5 {
                return Err(ProtocolError::Malformed("frame request payload length"));
            }
            let quality = payload[4];
            if quality == 0 {
                return Err(ProtocolError::Malformed("zero quality"));
            }
            Ok(ClientPacket::FrameRequest(FrameRequest {
                width: read_u16(&payload[0..2]),
                height: read_u16(&payload[2..4]),
                quality,
            }))
        }
        TAG_INPUT => {
            let text = std::str::from_utf8(payload)
                .map_err(|_| ProtocolError::Malformed("input batch is not UTF-8"))?;
            let events: Vec<InputEvent> = serde_json::from_str(text)
                .map_err(|_| ProtocolError::Malformed("input batch JSON"))?;
            Ok(ClientPacket::Input(events))
        }
        other => Err(ProtocolError::UnknownTag(other)),
    }
}

pub fn encode_frame_request(req: &FrameRequest) -> Vec<u8> {
    let mut buf = Vec::with_capacity(6);
    buf.push(TAG_FRAME_REQUEST);
    buf.extend_from_slice(&req.width.to_be_bytes());
    buf.extend_from_slice(&req.height.to_be_bytes());
    buf.push(req.quality);
    buf
}

pub fn encode_input(events: &[InputEvent]) -> Vec<u8> {
    let json = serde_json::to_string(events).expect("input events serialize to JSON");
    let mut buf = Vec::with_capacity(1 + json.len());
    buf.push(TAG_INPUT);
    buf.extend_from_slice(json.as_bytes());
    buf
}

/// Decode the first message of a session: a length-prefixed password under
/// the shared frame-request tag.
pub fn decode_login(msg: &[u8]) -> Result<String, ProtocolError> {
    let (&tag, payload) = msg
        .split_first()
        .ok_or(ProtocolError::Malformed("empty message"))?;
    if tag != TAG_FRAME_REQUEST {
        return Err(ProtocolError::Malformed("login tag"));
    }
    if payload.len() < 2 {
        return Err(ProtocolError::Malformed("login length prefix"));
    }
    let len = read_u16(&payload[0..2]) as usize;
    let secret = &payload[2..];
    if secret.len() != len {
        return Err(ProtocolError::Malformed("login payload length"));
    }
    String::from_utf8(secret.to_vec()).map_err(|_| ProtocolError::Malformed("login is not UTF-8"))
}

pub fn encode_login(password: &str) -> Vec<u8> {
    let secret = password.as_bytes();
    let mut buf = Vec::with_capacity(3 + secret.len());
    buf.push(TAG_FRAME_REQUEST);
    buf.extend_from_slice(&(secret.len() as u16).to_be_bytes());
    buf.extend_from_slice(secret);
    buf
}

/// The fixed-shape login result, always two bytes. `None` means denied.
pub fn encode_login_result(role: Option<Role>) -> Vec<u8> {
    let status = role.map(Role::status_byte).unwrap_or(LOGIN_DENIED);
    vec![TAG_FRAME_REQUEST, status]
}

impl FrameResponse {
    pub fn width(&self) -> u16 {
        match *self {
            FrameResponse::Empty { width, .. }
            | FrameResponse::Full { width, .. }
            | FrameResponse::Partial { width, .. } => width,
        }
    }

    pub fn height(&self) -> u16 {
        match *self {
            FrameResponse::Empty { height, .. }
            | FrameResponse::Full { height, .. }
            | FrameResponse::Partial { height, .. } => height,
        }
    }

    pub fn kind(&self) -> u8 {
        match self {
            FrameResponse::Empty { .. } => FRAME_EMPTY,
            FrameResponse::Full { .. } => FRAME_FULL,
            FrameResponse::Partial { .. } => FRAME_PARTIAL,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(match self {
            FrameResponse::Empty { .. } => 6,
            FrameResponse::Full { jpeg, .. } => 6 + jpeg.len(),
            FrameResponse::Partial { jpeg, .. } => 10 + jpeg.len(),
        });
        buf.push(TAG_FRAME_RESPONSE);
        buf.push(self.kind());
        buf.extend_from_slice(&self.width().to_be_bytes());
        buf.extend_from_slice(&self.height().to_be_bytes());
        match self {
            FrameResponse::Empty { .. } => {}
            FrameResponse::Full { jpeg, .. } => buf.extend_from_slice(jpeg),
            FrameResponse::Partial { x, y, jpeg, .. } => {
                buf.extend_from_slice(&x.to_be_bytes());
                buf.extend_from_slice(&y.to_be_bytes());
                buf.extend_from_slice(jpeg);
            }
        }
        buf
    }

    pub fn decode(msg: &[u8]) -> Result<Self, ProtocolError> {
        if msg.len() < 6 {
            return Err(ProtocolError::Malformed("frame response header"));
        }
        if msg[0] != TAG_FRAME_RESPONSE {
            return Err(ProtocolError::Malformed("frame response tag"));
        }
        let width = read_u16(&msg[2..4]);
        let height = read_u16(&msg[4..6]);
        match msg[1] {
            FRAME_EMPTY => {
                if msg.len() != 6 {
                    return Err(ProtocolError::Malformed("empty frame trailing bytes"));
                }
                Ok(FrameResponse::Empty { width, height })
            }
            FRAME_FULL => Ok(FrameResponse::Full {
                width,
                height,
                jpeg: msg[6..].to_vec(),
            }),
            FRAME_PARTIAL => {
                if msg.len() < 10 {
                    return Err(ProtocolError::Malformed("partial frame header"));
                }
                Ok(FrameResponse::Partial {
                    width,
                    height,
                    x: read_u16(&msg[6..8]),
                    y: read_u16(&msg[8..10]),
                    jpeg: msg[10..].to_vec(),
                })
            }
            _ => Err(ProtocolError::Malformed("frame type")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_request_roundtrip() {
        let req = FrameRequest {
            width: 640,
            height: 480,
            quality: 50,
        };
        let encoded = encode_frame_request(&req);
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_client(&encoded), Ok(ClientPacket::FrameRequest(req)));
    }

    #[test]
    fn test_frame_request_rejects_bad_length_and_zero_quality() {
        assert_eq!(
            decode_client(&[TAG_FRAME_REQUEST, 0, 1, 0]),
            Err(ProtocolError::Malformed("frame request payload length"))
        );
        assert_eq!(
            decode_client(&[TAG_FRAME_REQUEST, 2, 128, 1, 224, 0]),
            Err(ProtocolError::Malformed("zero quality"))
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(decode_client(&[0x7f, 0, 0]), Err(ProtocolError::UnknownTag(0x7f)));
        assert_eq!(
            decode_client(&[]),
            Err(ProtocolError::Malformed("empty message"))
        );
    }

    #[test]
    fn test_input_batch_roundtrip() {
        let events = vec![
            InputEvent::MouseMove { x: 10, y: 20 },
            InputEvent::KeyDown { key: "Enter".into() },
        ];
        let encoded = encode_input(&events);
        assert_eq!(encoded[0], TAG_INPUT);
        assert_eq!(decode_client(&encoded), Ok(ClientPacket::Input(events)));
    }

    #[test]
    fn test_input_batch_bad_json_rejected() {
        let mut msg = vec![TAG_INPUT];
        msg.extend_from_slice(b"[[0, 1]");
        assert_eq!(
            decode_client(&msg),
            Err(ProtocolError::Malformed("input batch JSON"))
        );

        // One bad record poisons the whole batch.
        let mut msg = vec![TAG_INPUT];
        msg.extend_from_slice(br#"[[0, 1, 2], [1, 1]]"#);
        assert!(decode_client(&msg).is_err());
    }

    #[test]
    fn test_login_roundtrip() {
        let encoded = encode_login("hunter2");
        assert_eq!(decode_login(&encoded).unwrap(), "hunter2");

        let empty = encode_login("");
        assert_eq!(decode_login(&empty).unwrap(), "");
    }

    #[test]
    fn test_login_length_mismatch_rejected() {
        let mut msg = encode_login("abc");
        msg.truncate(msg.len() - 1);
        assert!(decode_login(&msg).is_err());

        assert!(decode_login(&[TAG_INPUT, 0, 0]).is_err());
    }

    #[test]
    fn test_login_result_shape() {
        assert_eq!(
            encode_login_result(Some(Role::Controller)),
            vec![TAG_FRAME_REQUEST, LOGIN_CONTROLLER]
        );
        assert_eq!(
            encode_login_result(Some(Role::Viewer)),
            vec![TAG_FRAME_REQUEST, LOGIN_VIEWER]
        );
        assert_eq!(encode_login_result(None), vec![TAG_FRAME_REQUEST, LOGIN_DENIED]);
    }

    #[test]
    fn test_empty_frame_is_exactly_six_bytes() {
        let resp = FrameResponse::Empty {
            width: 640,
            height: 480,
        };
        let encoded = resp.encode();
        assert_eq!(encoded.len(), 6);
        assert_eq!(FrameResponse::decode(&encoded), Ok(resp));
    }

    #[test]
    fn test_full_frame_roundtrip() {
        let resp = FrameResponse::Full {
            width: 800,
            height: 600,
            jpeg: vec![0xff, 0xd8, 0xff, 0xd9],
        };
        assert_eq!(FrameResponse::decode(&resp.encode()), Ok(resp));
    }

    #[test]
    fn test_partial_frame_roundtrip() {
        let resp = FrameResponse::Partial {
            width: 800,
            height: 600,
            x: 120,
            y: 44,
            jpeg: vec![1, 2, 3],
        };
        assert_eq!(FrameResponse::decode(&resp.encode()), Ok(resp));
    }

    #[test]
    fn test_truncated_frame_response_rejected() {
        assert!(FrameResponse::decode(&[TAG_FRAME_RESPONSE, FRAME_PARTIAL, 0, 8, 0, 8, 0]).is_err());
        assert!(FrameResponse::decode(&[TAG_FRAME_RESPONSE, 0x09, 0, 8, 0, 8]).is_err());
        // Empty frames carry no pixel payload.
        assert!(FrameResponse::decode(&[TAG_FRAME_RESPONSE, FRAME_EMPTY, 0, 8, 0, 8, 1]).is_err());
    }
}
