pub mod client;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Request header (and response header on login) carrying the session id.
pub const SESSION_HEADER: &str = "X-Shield-Session";
/// Cookie the SHIELD core also sets on login.
pub const SESSION_COOKIE: &str = "shield8";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: String,
}

/// Opaque session token issued by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    pub fn new(token: impl Into<String>) -> Session {
        Session(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Keep the token out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Session(..)")
    }
}
