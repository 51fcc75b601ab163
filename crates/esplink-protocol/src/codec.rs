//! HTTP/1.1 request codec for the radio's TCP link.
//!
//! The radio needs the payload size before it accepts any bytes
//! (`AT+CIPSEND=<len>`), so the request length is computed from the live
//! field values first and the request is encoded afterwards. Both walk the
//! same template pieces, which keeps the announced size and the bytes on the
//! wire identical.
//!
//! GET carries the body as the query string:
//!
//! ```text
//! GET <path>?<body> HTTP/1.1\r\nHost: <host>:<port>\r\n\r\n
//! ```
//!
//! POST carries it as a form-encoded body:
//!
//! ```text
//! POST <path> HTTP/1.1\r\nHost: <host>:<port>\r\nAccept:*/*\r\nContent-Length: <n>\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n\r\n<body>
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const GET_PREFIX: &str = "GET ";
const POST_PREFIX: &str = "POST ";
const QUERY_SEP: &str = "?";
const VERSION_HOST: &str = " HTTP/1.1\r\nHost: ";
const PORT_SEP: &str = ":";
const POST_HEADERS: &str = "\r\nAccept:*/*\r\nContent-Length: ";
const POST_CONTENT_TYPE: &str = "\r\nContent-Type: application/x-www-form-urlencoded";
const HEADER_END: &str = "\r\n\r\n";

/// HTTP method supported by the link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported method name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported HTTP method '{0}', expected GET or POST")]
pub struct ParseMethodError(pub String);

impl FromStr for HttpMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("GET") {
            Ok(Self::Get)
        } else if s.eq_ignore_ascii_case("POST") {
            Ok(Self::Post)
        } else {
            Err(ParseMethodError(s.to_string()))
        }
    }
}

/// Borrowed view of one request, ready to be sized and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub method: HttpMethod,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub body: &'a str,
}

impl<'a> HttpRequest<'a> {
    /// Exact number of bytes `encode` produces for the current field values.
    pub fn encoded_len(&self) -> usize {
        let common = VERSION_HOST.len()
            + self.host.len()
            + PORT_SEP.len()
            + decimal_len(usize::from(self.port))
            + HEADER_END.len();
        match self.method {
            HttpMethod::Get => {
                GET_PREFIX.len() + self.path.len() + QUERY_SEP.len() + self.body.len() + common
            }
            HttpMethod::Post => {
                POST_PREFIX.len()
                    + self.path.len()
                    + common
                    + POST_HEADERS.len()
                    + decimal_len(self.body.len())
                    + POST_CONTENT_TYPE.len()
                    + self.body.len()
            }
        }
    }

    /// Encode the request as written to the TCP link.
    pub fn encode(&self) -> Vec<u8> {
        let port = self.port.to_string();
        let mut out = Vec::with_capacity(self.encoded_len());
        match self.method {
            HttpMethod::Get => {
                for piece in [
                    GET_PREFIX,
                    self.path,
                    QUERY_SEP,
                    self.body,
                    VERSION_HOST,
                    self.host,
                    PORT_SEP,
                    &port,
                    HEADER_END,
                ] {
                    out.extend_from_slice(piece.as_bytes());
                }
            }
            HttpMethod::Post => {
                let body_len = self.body.len().to_string();
                for piece in [
                    POST_PREFIX,
                    self.path,
                    VERSION_HOST,
                    self.host,
                    PORT_SEP,
                    &port,
                    POST_HEADERS,
                    &body_len,
                    POST_CONTENT_TYPE,
                    HEADER_END,
                    self.body,
                ] {
                    out.extend_from_slice(piece.as_bytes());
                }
            }
        }
        out
    }
}

/// Number of characters in the decimal representation of `n`.
fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
