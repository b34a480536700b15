//! Error taxonomy surfaced to intent callers.

use crate::access::gate::PermissionDenied;
use crate::model::person::{PersonId, ValidationError};
use crate::repo::person_store::StoreError;
use crate::service::snapshot_service::PersistenceError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by tree services.
pub type TreeResult<T> = Result<T, TreeError>;

/// User-facing error category of a rejected intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
            Self::Persistence => "persistence",
        }
    }
}

/// Errors from tree service operations.
#[derive(Debug)]
pub enum TreeError {
    /// Malformed dataset, self reference, asymmetric edge and similar.
    Validation(ValidationError),
    /// Target person does not exist.
    PersonNotFound(PersonId),
    /// The two persons are not related.
    RelationNotFound { person: PersonId, other: PersonId },
    /// Session mode forbids the operation.
    PermissionDenied(PermissionDenied),
    /// Snapshot could not be written. In-memory state is kept.
    Persistence(PersistenceError),
}

impl TreeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::PersonNotFound(_) | Self::RelationNotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::RelationNotFound { person, other } => {
                write!(f, "no relationship between {person} and {other}")
            }
            Self::PermissionDenied(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::PermissionDenied(err) => Some(err),
            Self::Persistence(err) => Some(err),
            Self::PersonNotFound(_) | Self::RelationNotFound { .. } => None,
        }
    }
}

impl From<StoreError> for TreeError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(err) => Self::Validation(err),
            StoreError::PersonNotFound(id) => Self::PersonNotFound(id),
            StoreError::RelationNotFound { person, other } => {
                Self::RelationNotFound { person, other }
            }
        }
    }
}

impl From<ValidationError> for TreeError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<PermissionDenied> for TreeError {
    fn from(value: PermissionDenied) -> Self {
        Self::PermissionDenied(value)
    }
}

impl From<PersistenceError> for TreeError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}
