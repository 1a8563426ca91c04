//! Binary wire protocol spoken with the in-browser automation agent.
//!
//! Every message is a frame:
//!
//! ```text
//! [len: u32 LE] [opcode: u8] [fields...]
//! ```
//!
//! `len` counts the opcode and fields, not the header. Field encodings:
//!
//! - string: `u32` LE byte count, then UTF-8 bytes
//! - `u32`: 4 bytes LE
//! - optional value: a `u8` flag (`0` absent, `1` present), then the value
//!
//! Locators travel as their source text; the agent resolves them against the
//! live page.
//!
//! Responses share one opcode (`0xA0`) followed by a response-kind byte. An
//! agent that fails before it can build a response may instead send a bare
//! `0x99` frame carrying the message.
//!
//! # Example
//!
//! ```
//! use logbench_core::protocol::{Request, encode_request, decode_request};
//!
//! let req = Request::PressKey {
//!     selector: "textarea >> nth=0".into(),
//!     key: "ArrowLeft".into(),
//! };
//! let wire = encode_request(&req);
//!
//! // The decoder takes the frame body, without its length header.
//! assert_eq!(decode_request(&wire[4..]).unwrap(), req);
//! ```

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpCode(u8),

    #[error("frame ended before the field did")]
    InsufficientData,

    #[error("invalid UTF-8 in string field")]
    Utf8Error,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// First byte of every frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Heartbeat = 0x01,
    /// title
    OpenPage = 0x02,
    /// selector, text, optional per-key delay (ms)
    TypeText = 0x03,
    /// selector, key
    PressKey = 0x04,
    /// chord
    KeyboardPress = 0x05,
    /// selector
    Click = 0x06,
    /// selector, timeout (ms)
    WaitForSelector = 0x07,
    /// selector
    InputValue = 0x08,
    DumpTree = 0x10,
    /// selector
    Count = 0x11,
    /// Bare agent failure: message.
    Error = 0x99,
    /// response kind, then kind-specific fields
    Response = 0xA0,
}

impl OpCode {
    const ALL: [OpCode; 12] = [
        OpCode::Heartbeat,
        OpCode::OpenPage,
        OpCode::TypeText,
        OpCode::PressKey,
        OpCode::KeyboardPress,
        OpCode::Click,
        OpCode::WaitForSelector,
        OpCode::InputValue,
        OpCode::DumpTree,
        OpCode::Count,
        OpCode::Error,
        OpCode::Response,
    ];

    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|op| *op as u8 == byte)
            .ok_or(ProtocolError::InvalidOpCode(byte))
    }
}

/// A command for the agent. Selectors are locator source strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Heartbeat,
    /// Create a page with this title and navigate to it.
    OpenPage { title: String },
    TypeText {
        selector: String,
        text: String,
        delay_ms: Option<u32>,
    },
    PressKey { selector: String, key: String },
    /// A chord on the page keyboard, not bound to an element.
    KeyboardPress { chord: String },
    Click { selector: String },
    /// Resolves with the matched element once it is visible.
    WaitForSelector { selector: String, timeout_ms: u32 },
    InputValue { selector: String },
    DumpTree,
    Count { selector: String },
}

impl Request {
    /// Static name for span fields.
    pub fn opcode_name(&self) -> &'static str {
        match self {
            Request::Heartbeat => "heartbeat",
            Request::OpenPage { .. } => "open_page",
            Request::TypeText { .. } => "type_text",
            Request::PressKey { .. } => "press_key",
            Request::KeyboardPress { .. } => "keyboard_press",
            Request::Click { .. } => "click",
            Request::WaitForSelector { .. } => "wait_for_selector",
            Request::InputValue { .. } => "input_value",
            Request::DumpTree => "dump_tree",
            Request::Count { .. } => "count",
        }
    }

    fn opcode(&self) -> OpCode {
        match self {
            Request::Heartbeat => OpCode::Heartbeat,
            Request::OpenPage { .. } => OpCode::OpenPage,
            Request::TypeText { .. } => OpCode::TypeText,
            Request::PressKey { .. } => OpCode::PressKey,
            Request::KeyboardPress { .. } => OpCode::KeyboardPress,
            Request::Click { .. } => OpCode::Click,
            Request::WaitForSelector { .. } => OpCode::WaitForSelector,
            Request::InputValue { .. } => OpCode::InputValue,
            Request::DumpTree => OpCode::DumpTree,
            Request::Count { .. } => OpCode::Count,
        }
    }
}

/// An agent answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error { message: String },
    /// JSON element tree; a single element for `WaitForSelector`.
    Tree { json: String },
    /// `None` when the element has no value.
    Value { value: Option<String> },
    Count { count: u32 },
}

impl Response {
    fn kind(&self) -> u8 {
        match self {
            Response::Ok => 0x00,
            Response::Error { .. } => 0x01,
            Response::Tree { .. } => 0x02,
            Response::Value { .. } => 0x03,
            Response::Count { .. } => 0x04,
        }
    }
}

/// Builds one frame body.
struct FrameWriter {
    body: Vec<u8>,
}

impl FrameWriter {
    fn new(op: OpCode) -> Self {
        Self { body: vec![op as u8] }
    }

    fn byte(&mut self, b: u8) -> &mut Self {
        self.body.push(b);
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.body.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn str(&mut self, s: &str) -> &mut Self {
        self.u32(s.len() as u32);
        self.body.extend_from_slice(s.as_bytes());
        self
    }

    fn opt_u32(&mut self, v: Option<u32>) -> &mut Self {
        match v {
            Some(v) => self.byte(1).u32(v),
            None => self.byte(0),
        }
    }

    fn opt_str(&mut self, v: Option<&str>) -> &mut Self {
        match v {
            Some(s) => self.byte(1).str(s),
            None => self.byte(0),
        }
    }

    fn finish(&self) -> Vec<u8> {
        encode_frame(&self.body)
    }
}

/// Reads fields off a frame body in order.
struct FrameReader<'a> {
    rest: &'a [u8],
}

impl<'a> FrameReader<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { rest: body }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.rest.len() < n {
            return Err(ProtocolError::InsufficientData);
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let mut le = [0u8; 4];
        le.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(le))
    }

    fn str(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::Utf8Error)
    }

    fn flag(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.byte()? != 0)
    }

    fn opt_u32(&mut self) -> Result<Option<u32>, ProtocolError> {
        if self.flag()? {
            self.u32().map(Some)
        } else {
            Ok(None)
        }
    }

    fn opt_str(&mut self) -> Result<Option<String>, ProtocolError> {
        if self.flag()? {
            self.str().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Prefixes `body` with its length header.
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(body);
    frame
}

pub fn read_frame_length(header: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*header)
}

/// Encodes a complete frame, header included.
pub fn encode_request(req: &Request) -> Vec<u8> {
    let mut w = FrameWriter::new(req.opcode());
    match req {
        Request::Heartbeat | Request::DumpTree => {}
        Request::OpenPage { title } => {
            w.str(title);
        }
        Request::TypeText {
            selector,
            text,
            delay_ms,
        } => {
            w.str(selector).str(text).opt_u32(*delay_ms);
        }
        Request::PressKey { selector, key } => {
            w.str(selector).str(key);
        }
        Request::KeyboardPress { chord } => {
            w.str(chord);
        }
        Request::Click { selector } | Request::InputValue { selector } | Request::Count { selector } => {
            w.str(selector);
        }
        Request::WaitForSelector {
            selector,
            timeout_ms,
        } => {
            w.str(selector).u32(*timeout_ms);
        }
    }
    w.finish()
}

/// Decodes a frame body (no length header).
pub fn decode_request(body: &[u8]) -> Result<Request, ProtocolError> {
    let mut r = FrameReader::new(body);
    let req = match OpCode::from_u8(r.byte()?)? {
        OpCode::Heartbeat => Request::Heartbeat,
        OpCode::OpenPage => Request::OpenPage { title: r.str()? },
        OpCode::TypeText => Request::TypeText {
            selector: r.str()?,
            text: r.str()?,
            delay_ms: r.opt_u32()?,
        },
        OpCode::PressKey => Request::PressKey {
            selector: r.str()?,
            key: r.str()?,
        },
        OpCode::KeyboardPress => Request::KeyboardPress { chord: r.str()? },
        OpCode::Click => Request::Click { selector: r.str()? },
        OpCode::WaitForSelector => Request::WaitForSelector {
            selector: r.str()?,
            timeout_ms: r.u32()?,
        },
        OpCode::InputValue => Request::InputValue { selector: r.str()? },
        OpCode::DumpTree => Request::DumpTree,
        OpCode::Count => Request::Count { selector: r.str()? },
        op @ (OpCode::Error | OpCode::Response) => {
            return Err(ProtocolError::InvalidPayload(format!(
                "0x{:02X} is a response opcode",
                op as u8
            )))
        }
    };
    Ok(req)
}

/// Encodes a complete frame, header included.
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let mut w = FrameWriter::new(OpCode::Response);
    w.byte(resp.kind());
    match resp {
        Response::Ok => {}
        Response::Error { message } => {
            w.str(message);
        }
        Response::Tree { json } => {
            w.str(json);
        }
        Response::Value { value } => {
            w.opt_str(value.as_deref());
        }
        Response::Count { count } => {
            w.u32(*count);
        }
    }
    w.finish()
}

/// Decodes a frame body (no length header). Accepts both the `0xA0`
/// response form and a bare `0x99` error.
pub fn decode_response(body: &[u8]) -> Result<Response, ProtocolError> {
    let mut r = FrameReader::new(body);
    match OpCode::from_u8(r.byte()?)? {
        OpCode::Response => {}
        OpCode::Error => return Ok(Response::Error { message: r.str()? }),
        op => {
            return Err(ProtocolError::InvalidPayload(format!(
                "0x{:02X} is a request opcode",
                op as u8
            )))
        }
    }

    let resp = match r.byte()? {
        0x00 => Response::Ok,
        0x01 => Response::Error { message: r.str()? },
        0x02 => Response::Tree { json: r.str()? },
        0x03 => Response::Value { value: r.opt_str()? },
        0x04 => Response::Count { count: r.u32()? },
        other => {
            return Err(ProtocolError::InvalidPayload(format!(
                "unknown response kind 0x{other:02X}"
            )))
        }
    };
    Ok(resp)
}
