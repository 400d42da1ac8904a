use thiserror::Error;

/// Errors raised by the authentication session layer.
///
/// Each variant carries a stable machine-readable code (see
/// [`AuthError::code`]) so callers can branch without string-matching the
/// display message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Failed to initialize authentication service")]
    InitFailed,

    #[error("Login failed")]
    LoginFailed,

    #[error("Registration failed")]
    RegistrationFailed,

    #[error("Failed to refresh token")]
    TokenRefreshFailed,

    #[error("No authenticated user")]
    NoUser,

    #[error("No user data available")]
    NoUserData,
}

impl AuthError {
    /// Stable error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InitFailed => "INIT_FAILED",
            AuthError::LoginFailed => "LOGIN_FAILED",
            AuthError::RegistrationFailed => "REGISTRATION_FAILED",
            AuthError::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            AuthError::NoUser => "NO_USER",
            AuthError::NoUserData => "NO_USER_DATA",
        }
    }
}

/// Role-based access denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required role: {required_role}")]
pub struct AuthorizationError {
    /// The role the current user does not hold
    pub required_role: String,
}

impl AuthorizationError {
    pub fn new(required_role: impl Into<String>) -> Self {
        Self {
            required_role: required_role.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(AuthError::InitFailed.code(), "INIT_FAILED");
        assert_eq!(AuthError::LoginFailed.code(), "LOGIN_FAILED");
        assert_eq!(AuthError::RegistrationFailed.code(), "REGISTRATION_FAILED");
        assert_eq!(AuthError::TokenRefreshFailed.code(), "TOKEN_REFRESH_FAILED");
        assert_eq!(AuthError::NoUser.code(), "NO_USER");
        assert_eq!(AuthError::NoUserData.code(), "NO_USER_DATA");
    }

    #[test]
    fn authorization_error_names_the_missing_role() {
        let err = AuthorizationError::new("admin");
        assert_eq!(err.to_string(), "Missing required role: admin");
    }
}
