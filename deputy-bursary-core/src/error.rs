//! Error taxonomy for everything that talks to the Deputy API.
//!
//! Every [`DeputyError`] unwinds to the CLI boundary and ends the run. The
//! one per-record anomaly, [`MissingRelatedObject`], is not a run error: the
//! views that meet it log it and count it.

use thiserror::Error;

/// A joined object (e.g. `ContactObject`) was not inlined into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource} {id} has no joined {object}")]
pub struct MissingRelatedObject {
    pub resource: String,
    pub id: i64,
    pub object: String,
}

#[derive(Debug, Error)]
pub enum DeputyError {
    /// Connection, socket or timeout failure before a response arrived.
    #[error("[transport] {detail} (API {path})")]
    Transport { path: String, detail: String },

    #[error("[http_error] API {path} failed with {status} {reason}")]
    Http {
        path: String,
        status: u16,
        reason: String,
    },

    /// The API promises direct 200 responses; a 302 usually means a bad endpoint.
    #[error("[unexpected_api] API {path} answered 302 redirect to {location}")]
    UnexpectedRedirect { path: String, location: String },

    #[error("[json_response_parse] error parsing JSON response for {path}: {detail}")]
    ResponseParse { path: String, detail: String },

    #[error("Ctrl-C - user requested exit.")]
    UserCancelled,

    #[error("[configuration] {0}")]
    Configuration(String),

    /// The old year record was deleted but the replacement could not be
    /// created. The employee currently has no year assignment.
    #[error(
        "employee {employee_id} lost year record {deleted_record_id} and the replacement failed: {source}"
    )]
    IncompleteYearUpdate {
        employee_id: i64,
        deleted_record_id: i64,
        #[source]
        source: Box<DeputyError>,
    },
}

impl DeputyError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        DeputyError::Configuration(msg.into())
    }

    /// HTTP status for [`DeputyError::Http`], e.g. 401/403 on bad credentials.
    pub fn status(&self) -> Option<u16> {
        match self {
            DeputyError::Http { status, .. } => Some(*status),
            DeputyError::UnexpectedRedirect { .. } => Some(302),
            _ => None,
        }
    }
}

pub type Result<T, E = DeputyError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_update_names_the_lost_record() {
        let err = DeputyError::IncompleteYearUpdate {
            employee_id: 7,
            deleted_record_id: 42,
            source: Box::new(DeputyError::configuration("no training module titled Year2")),
        };
        assert_eq!(
            err.to_string(),
            "employee 7 lost year record 42 and the replacement failed: [configuration] no training module titled Year2"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn user_cancelled_renders_without_error_code() {
        assert_eq!(
            DeputyError::UserCancelled.to_string(),
            "Ctrl-C - user requested exit."
        );
    }
}
