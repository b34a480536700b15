//! Session modes and the operation authorization predicate.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Session mode string for full edit access.
pub const SESSION_MODE_ADMIN: &str = "admin";
/// Session mode string for read-only access.
pub const SESSION_MODE_RESTRICTED_VIEWER: &str = "restricted-viewer";

const RESTRICTED_VIEWER_ALIASES: &[&str] = &[SESSION_MODE_RESTRICTED_VIEWER, "viewer", "user"];

/// Per-session access mode, selected once at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Admin,
    RestrictedViewer,
}

impl SessionMode {
    /// Stable string id.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => SESSION_MODE_ADMIN,
            Self::RestrictedViewer => SESSION_MODE_RESTRICTED_VIEWER,
        }
    }
}

impl Display for SessionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one session mode flag.
///
/// `viewer` and `user` are accepted as aliases of `restricted-viewer`.
pub fn parse_session_mode(value: &str) -> Result<SessionMode, SessionModeError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(SessionModeError::EmptyMode);
    }
    if normalized == SESSION_MODE_ADMIN {
        return Ok(SessionMode::Admin);
    }
    if RESTRICTED_VIEWER_ALIASES.contains(&normalized) {
        return Ok(SessionMode::RestrictedViewer);
    }
    Err(SessionModeError::UnsupportedMode(normalized.to_string()))
}

/// Session mode parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionModeError {
    EmptyMode,
    UnsupportedMode(String),
}

impl Display for SessionModeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMode => write!(f, "session mode must not be empty"),
            Self::UnsupportedMode(value) => write!(
                f,
                "session mode is unsupported: {value}; expected admin|restricted-viewer"
            ),
        }
    }
}

impl Error for SessionModeError {}

/// Operation requested by an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Open,
    EditAttributes,
    AddRelative,
    RemoveRelative,
    RemovePerson,
    SetPartnership,
    ResetData,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        Self::Open,
        Self::EditAttributes,
        Self::AddRelative,
        Self::RemoveRelative,
        Self::RemovePerson,
        Self::SetPartnership,
        Self::ResetData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::EditAttributes => "edit_attributes",
            Self::AddRelative => "add_relative",
            Self::RemoveRelative => "remove_relative",
            Self::RemovePerson => "remove_person",
            Self::SetPartnership => "set_partnership",
            Self::ResetData => "reset_data",
        }
    }

    /// Whether the operation changes tree data.
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure authorization predicate over `(mode, operation)`.
pub fn is_permitted(mode: SessionMode, operation: OperationKind) -> bool {
    match mode {
        SessionMode::Admin => true,
        SessionMode::RestrictedViewer => !operation.is_mutation(),
    }
}

/// Rejection raised when the session mode forbids an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDenied {
    pub mode: SessionMode,
    pub operation: OperationKind,
}

impl Display for PermissionDenied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation `{}` is not permitted in `{}` mode",
            self.operation, self.mode
        )
    }
}

impl Error for PermissionDenied {}

/// Gate holding the session mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionGate {
    mode: SessionMode,
}

impl PermissionGate {
    pub fn new(mode: SessionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Fails with `PermissionDenied` when the mode forbids `operation`.
    pub fn authorize(&self, operation: OperationKind) -> Result<(), PermissionDenied> {
        if is_permitted(self.mode, operation) {
            Ok(())
        } else {
            Err(PermissionDenied {
                mode: self.mode,
                operation,
            })
        }
    }

    /// Whether person forms should be presented read-only.
    pub fn is_read_only(&self) -> bool {
        !is_permitted(self.mode, OperationKind::EditAttributes)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_permitted, parse_session_mode, OperationKind, PermissionGate, SessionMode,
        SessionModeError,
    };

    #[test]
    fn parses_supported_modes_and_aliases() {
        assert_eq!(
            parse_session_mode("admin").expect("admin parse"),
            SessionMode::Admin
        );
        assert_eq!(
            parse_session_mode(" restricted-viewer ").expect("viewer parse"),
            SessionMode::RestrictedViewer
        );
        assert_eq!(
            parse_session_mode("user").expect("legacy alias parse"),
            SessionMode::RestrictedViewer
        );
    }

    #[test]
    fn rejects_empty_and_unknown_modes() {
        assert_eq!(
            parse_session_mode("  ").expect_err("empty mode must fail"),
            SessionModeError::EmptyMode
        );
        assert_eq!(
            parse_session_mode("Admin").expect_err("modes are case-sensitive"),
            SessionModeError::UnsupportedMode("Admin".to_string())
        );
    }

    #[test]
    fn admin_is_permitted_everything() {
        for operation in OperationKind::ALL {
            assert!(is_permitted(SessionMode::Admin, operation));
        }
    }

    #[test]
    fn restricted_viewer_may_only_open() {
        let gate = PermissionGate::new(SessionMode::RestrictedViewer);
        gate.authorize(OperationKind::Open)
            .expect("open should be allowed");
        for operation in OperationKind::ALL {
            if operation == OperationKind::Open {
                continue;
            }
            let denied = gate
                .authorize(operation)
                .expect_err("mutations must be denied");
            assert_eq!(denied.operation, operation);
            assert_eq!(denied.mode, SessionMode::RestrictedViewer);
        }
        assert!(gate.is_read_only());
    }
}
