/// RFC 7807 problem documents as used by ACME error responses
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Identifier;

/// Prefix of RFC 8555 error types
pub const ERROR_PREFIX: &str = "urn:ietf:params:acme:error:";

/// Prefix used by pre-RFC ACME servers
pub const LEGACY_ERROR_PREFIX: &str = "urn:acme:error:";

/// Strip the ACME error-URN prefix from a problem type.
///
/// Returns the bare error kind (e.g. `badNonce`), or `None` for types
/// outside the ACME error namespace.
pub fn strip_error_prefix(problem_type: &str) -> Option<&str> {
    problem_type
        .strip_prefix(ERROR_PREFIX)
        .or_else(|| problem_type.strip_prefix(LEGACY_ERROR_PREFIX))
}

/// An ACME problem document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Problem type URI
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,

    /// Short human-readable summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTTP status code of the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Human-readable explanation, localized by the server when an
    /// `Accept-Language` header was sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URL of a resource with further information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// The identifier this problem relates to, set on sub-problems
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    /// Per-identifier sub-problems
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subproblems: Vec<Problem>,
}

impl Problem {
    /// Problem type URI, `about:blank` when the server sent none
    pub fn problem_type(&self) -> &str {
        self.problem_type.as_deref().unwrap_or("about:blank")
    }

    /// The ACME error kind without its URN prefix, or `None` for
    /// non-ACME problem types
    pub fn acme_error(&self) -> Option<&str> {
        strip_error_prefix(self.problem_type())
    }

    /// `true` if this problem has the given ACME error kind
    pub fn is_acme_error(&self, kind: &str) -> bool {
        self.acme_error() == Some(kind)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(detail) = &self.detail {
            write!(f, "{detail}")
        } else if let Some(title) = &self.title {
            write!(f, "{title}")
        } else {
            write!(f, "{}", self.problem_type())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_error_prefix() {
        assert_eq!(
            strip_error_prefix("urn:ietf:params:acme:error:badNonce"),
            Some("badNonce")
        );
        assert_eq!(
            strip_error_prefix("urn:acme:error:unauthorized"),
            Some("unauthorized")
        );
        assert_eq!(strip_error_prefix("urn:example:other"), None);
        assert_eq!(strip_error_prefix("about:blank"), None);
    }

    #[test]
    fn test_problem_parsing() {
        let json = r#"{
            "type": "urn:ietf:params:acme:error:malformed",
            "detail": "Order includes an unsupported identifier",
            "status": 400,
            "subproblems": [
                {
                    "type": "urn:ietf:params:acme:error:rejectedIdentifier",
                    "detail": "bad identifier",
                    "identifier": {"type": "dns", "value": "bad.example"}
                }
            ]
        }"#;

        let problem: Problem = serde_json::from_str(json).expect("failed to parse problem");
        assert_eq!(problem.acme_error(), Some("malformed"));
        assert_eq!(problem.status, Some(400));
        assert_eq!(problem.subproblems.len(), 1);
        let sub = &problem.subproblems[0];
        assert_eq!(sub.acme_error(), Some("rejectedIdentifier"));
        assert_eq!(sub.identifier.as_ref().unwrap().value(), "bad.example");
    }

    #[test]
    fn test_problem_display_prefers_detail() {
        let problem = Problem {
            problem_type: Some("urn:ietf:params:acme:error:unauthorized".into()),
            title: Some("Unauthorized".into()),
            detail: Some("account key is not authorized".into()),
            ..Problem::default()
        };
        assert_eq!(problem.to_string(), "account key is not authorized");
    }

    #[test]
    fn test_problem_type_defaults_to_about_blank() {
        let problem = Problem::default();
        assert_eq!(problem.problem_type(), "about:blank");
        assert_eq!(problem.acme_error(), None);
    }
}
