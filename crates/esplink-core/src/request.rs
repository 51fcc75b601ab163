//! The single request slot and the completed response it produces.

use esplink_protocol::{HttpMethod, HttpRequest};

use crate::config::Capacities;
use crate::error::{Field, SubmitError, ValidationError};

/// Description of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: HttpMethod,
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Query string for GET, form body for POST.
    pub body: String,
    /// Keep the request and start over after a failed exchange instead of
    /// dropping it.
    pub retry: bool,
}

impl Request {
    pub fn get(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            host: host.into(),
            port,
            path: path.into(),
            body: String::new(),
            retry: false,
        }
    }

    pub fn post(
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: HttpMethod::Post,
            body: body.into(),
            ..Self::get(host, port, path)
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    /// Reject fields over their capacity. Nothing is truncated.
    pub fn validate(&self, caps: &Capacities) -> Result<(), ValidationError> {
        ValidationError::check_len(Field::Host, &self.host, caps.host)?;
        ValidationError::check_len(Field::Path, &self.path, caps.path)?;
        ValidationError::check_len(Field::Body, &self.body, caps.body)
    }

    /// Borrowed view used to size and encode the HTTP message.
    pub fn as_http(&self) -> HttpRequest<'_> {
        HttpRequest {
            method: self.method,
            host: &self.host,
            port: self.port,
            path: &self.path,
            body: &self.body,
        }
    }
}

/// Request installed in the slot, tagged with the generation it was
/// installed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub generation: u64,
    pub request: Request,
}

/// Holds zero or one pending request.
#[derive(Debug, Default)]
pub struct RequestSlot {
    pending: Option<PendingRequest>,
    next_generation: u64,
}

impl RequestSlot {
    /// Install `request` if the slot is empty. Returns its generation.
    pub fn install(&mut self, request: Request) -> Result<u64, SubmitError> {
        if self.pending.is_some() {
            return Err(SubmitError::Busy);
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.pending = Some(PendingRequest {
            generation,
            request,
        });
        Ok(generation)
    }

    /// Empty the slot. Returns whether a request was removed.
    pub fn clear(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Empty the slot only if it still holds `generation`.
    pub fn clear_generation(&mut self, generation: u64) -> bool {
        if self.holds(generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn holds(&self, generation: u64) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.pending.is_some()
    }
}

/// Payload extracted from a finished exchange, `<html>` frame included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    payload: Vec<u8>,
}

impl CompletedResponse {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text; invalid UTF-8 is replaced.
    pub fn into_string(self) -> String {
        match String::from_utf8(self.payload) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_limits() {
        let caps = Capacities::default();
        let ok = Request::get("example.com", 80, "/a").with_body("x=1");
        assert!(ok.validate(&caps).is_ok());

        let long_host = Request::get("h".repeat(256), 80, "/");
        assert!(matches!(
            long_host.validate(&caps),
            Err(ValidationError::TooLong {
                field: Field::Host,
                ..
            })
        ));

        let long_path = Request::get("h", 80, "p".repeat(256));
        assert!(matches!(
            long_path.validate(&caps),
            Err(ValidationError::TooLong {
                field: Field::Path,
                ..
            })
        ));

        let max_body = Request::post("h", 80, "/", "b".repeat(1023));
        assert!(max_body.validate(&caps).is_ok());
        let long_body = Request::post("h", 80, "/", "b".repeat(1024));
        assert!(long_body.validate(&caps).is_err());
    }

    #[test]
    fn test_slot_holds_one_request() {
        let mut slot = RequestSlot::default();
        let first = slot.install(Request::get("a", 80, "/")).unwrap();
        assert!(slot.is_occupied());

        assert_eq!(
            slot.install(Request::get("b", 80, "/")),
            Err(SubmitError::Busy)
        );
        assert_eq!(slot.pending().unwrap().request.host, "a");

        assert!(slot.clear());
        assert!(!slot.clear());

        let second = slot.install(Request::get("b", 80, "/")).unwrap();
        assert_ne!(first, second);
        assert!(!slot.clear_generation(first));
        assert!(slot.holds(second));
        assert!(slot.clear_generation(second));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_response_into_string() {
        let resp = CompletedResponse::new(b"<html>hi</html>".to_vec());
        assert_eq!(resp.payload(), b"<html>hi</html>");
        assert_eq!(resp.into_string(), "<html>hi</html>");
        assert_eq!(CompletedResponse::new(vec![0xff]).into_string(), "\u{fffd}");
    }
}
