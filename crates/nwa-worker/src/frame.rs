//! STOMP 1.2 frames
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! Header names and values escape `\`, `:`, CR and LF, except in `CONNECT`
//! and `CONNECTED` frames. Bare EOLs between frames are heart-beats.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::StompError;

/// Upper bound for a frame without `content-length`
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn escapes_headers(&self) -> bool {
        self.command != "CONNECT" && self.command != "CONNECTED"
    }

    /// Append the wire form of the frame to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let escape = self.escapes_headers();
        buf.put_slice(self.command.as_bytes());
        buf.put_u8(b'\n');
        for (name, value) in &self.headers {
            if name == "content-length" {
                continue;
            }
            put_header_part(buf, name, escape);
            buf.put_u8(b':');
            put_header_part(buf, value, escape);
            buf.put_u8(b'\n');
        }
        if !self.body.is_empty() {
            buf.put_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        buf.put_u8(b'\n');
        buf.put_slice(&self.body);
        buf.put_u8(0);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Take one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` when more data is needed. Heart-beats are consumed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, StompError> {
        skip_heartbeats(buf);
        if buf.is_empty() {
            return Ok(None);
        }

        let Some((head_len, sep_len)) = find_head_end(buf) else {
            if buf.len() > MAX_FRAME_SIZE {
                return Err(StompError::Protocol("frame header too large".to_string()));
            }
            return Ok(None);
        };

        let head = std::str::from_utf8(&buf[..head_len])
            .map_err(|e| StompError::Protocol(format!("frame header is not UTF-8: {}", e)))?;
        let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
        let command = lines.next().unwrap_or_default().to_string();
        if command.is_empty() {
            return Err(StompError::Protocol("missing command".to_string()));
        }
        let unescape = command != "CONNECT" && command != "CONNECTED";

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::Protocol(format!("invalid header line '{}'", line)))?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .map(|(_, v)| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| StompError::Protocol(format!("invalid content-length '{}'", v)))
            })
            .transpose()?;

        let body_start = head_len + sep_len;
        let body_len = match content_length {
            Some(len) if len > MAX_FRAME_SIZE => {
                return Err(StompError::Protocol(format!(
                    "content-length {} exceeds the maximum frame size",
                    len
                )));
            }
            Some(len) => {
                if buf.len() <= body_start + len {
                    return Ok(None);
                }
                if buf[body_start + len] != 0 {
                    return Err(StompError::Protocol(
                        "frame body not terminated by NUL".to_string(),
                    ));
                }
                len
            }
            None => match buf[body_start..].iter().position(|b| *b == 0) {
                Some(len) => len,
                None if buf.len() > MAX_FRAME_SIZE => {
                    return Err(StompError::Protocol("frame too large".to_string()));
                }
                None => return Ok(None),
            },
        };

        buf.advance(body_start);
        let body = buf.split_to(body_len).freeze();
        buf.advance(1);

        Ok(Some(Frame {
            command,
            headers,
            body,
        }))
    }
}

fn skip_heartbeats(buf: &mut BytesMut) {
    loop {
        if buf.starts_with(b"\n") {
            buf.advance(1);
        } else if buf.starts_with(b"\r\n") {
            buf.advance(2);
        } else {
            return;
        }
    }
}

/// Length of the command and header lines plus the length of the blank line separator
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some((i, 2));
            }
            if buf.get(i + 1) == Some(&b'\r') && buf.get(i + 2) == Some(&b'\n') {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

fn put_header_part(buf: &mut BytesMut, s: &str, escape: bool) {
    if !escape {
        buf.put_slice(s.as_bytes());
        return;
    }
    for c in s.chars() {
        match c {
            '\\' => buf.put_slice(b"\\\\"),
            ':' => buf.put_slice(b"\\c"),
            '\n' => buf.put_slice(b"\\n"),
            '\r' => buf.put_slice(b"\\r"),
            c => {
                let mut tmp = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}

fn unescape_header(s: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('c') => out.push(':'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => {
                return Err(StompError::Protocol(format!(
                    "undefined escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
