//! Authentication for the two REST collaborators.
//!
//! The source platform uses HTTP Basic credentials; the destination CMDB
//! uses a static token carried in a `Token`-scheme Authorization header.

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{header, RequestBuilder};

/// Credentials for an API endpoint.
///
/// The [`Debug`] impl redacts secrets to prevent accidental credential
/// exposure in log output.
#[derive(Clone)]
pub enum ApiAuth {
    /// HTTP Basic authentication.
    Basic { username: String, password: String },

    /// Static token, sent as `Authorization: Token <value>`.
    Token { token: String },
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl ApiAuth {
    /// Attach the Authorization header to a request.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                builder.header(header::AUTHORIZATION, format!("Basic {encoded}"))
            }
            Self::Token { token } => {
                builder.header(header::AUTHORIZATION, format!("Token {token}"))
            }
        }
    }
}
