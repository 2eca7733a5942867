//! The request record filled in by payload generators

use http::{HeaderMap, Method};

/// A single outbound request, filled in by a payload generator and
/// dispatched by the attacker.
///
/// The attacker pre-allocates one `Target` per request slot; generators
/// overwrite every field rather than appending.
#[derive(Debug, Clone)]
pub struct Target {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: String::new(),
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl Target {
    /// Reset all fields so the record can be refilled for the next request.
    pub fn clear(&mut self) {
        self.method = Method::GET;
        self.url.clear();
        self.headers.clear();
        self.body.clear();
    }
}
