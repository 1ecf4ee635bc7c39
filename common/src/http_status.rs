//! HTTP status classification for the bridge's HTTP collaborators.
//!
//! The CRM endpoint and the contact source both answer over HTTP. Their
//! failures need sorting into "try again later", "the service is down" and
//! "the service said no", and that decision is made from the status code
//! alone, never from response text.

/// HTTP status code for error categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 4xx client errors.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx server errors.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// The peer is up but has nothing for us yet (still indexing, rate limited,
    /// warming up). Worth asking again after a delay.
    pub fn is_not_ready(&self) -> bool {
        matches!(self.0, 204 | 404 | 408 | 425 | 429 | 503)
    }

    /// The peer is failing as a whole rather than refusing this one request.
    pub fn is_unavailable(&self) -> bool {
        self.is_server_error() || matches!(self.0, 408 | 429)
    }

    /// The peer processed the request and refused it on its merits.
    pub fn is_rejection(&self) -> bool {
        self.is_client_error() && !matches!(self.0, 408 | 429)
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
