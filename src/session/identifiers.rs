// Syntactic checks on user identifiers
// A contact is either a Matrix user ID (@local:server) or a plain email address

use once_cell::sync::Lazy;
use regex::Regex;

static MATRIX_USER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@[\x21-\x39\x3B-\x7E]+:(?:[A-Za-z0-9.\-]+|\[[0-9A-Fa-f:.]+\])(?::[0-9]{1,5})?$")
        .expect("matrix user id pattern")
});

static EMAIL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}$").expect("email pattern")
});

/// Default hostname prefixes of the platforms hosting external users
pub const DEFAULT_EXTERNAL_HOST_PREFIXES: [&str; 2] = ["e.", "agent.externe."];

/// Returns true if `id` looks like a Matrix user identifier
pub fn is_matrix_user_id(id: &str) -> bool {
    MATRIX_USER_ID.is_match(id)
}

pub fn is_email_address(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address)
}

/// Whether `hostname` belongs to one of the external platforms
pub fn is_external_host<S: AsRef<str>>(hostname: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|prefix| hostname.starts_with(prefix.as_ref()))
}

/// The local part and homeserver of a Matrix user ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixIdComponents {
    pub local_user_id: String,
    pub home_server: String,
}

impl MatrixIdComponents {
    /// Splits a Matrix user ID, returns None if the ID is malformed
    /// or carries more than one `:` separator.
    pub fn parse(matrix_id: &str) -> Option<Self> {
        if !is_matrix_user_id(matrix_id) {
            return None;
        }

        let parts: Vec<&str> = matrix_id.split(':').collect();
        if parts.len() != 2 {
            return None;
        }

        Some(MatrixIdComponents {
            local_user_id: parts[0].trim_start_matches('@').to_string(),
            home_server: parts[1].to_string(),
        })
    }
}
