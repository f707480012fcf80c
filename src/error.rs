use std::borrow::Cow;

use anyhow::anyhow;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Unauthorized,
    InvalidInput,
    NotFound,
    Unknown,
}

impl ErrorKind {
    /// Internal failures are the ones a client cannot fix by changing the request.
    pub const fn is_internal(self) -> bool {
        matches!(self, ErrorKind::Database | ErrorKind::Unknown)
    }
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: Cow<'static, str>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn database(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Database,
            code: "database_error",
            public: public.into(),
            source,
        }
    }

    pub fn unauthorized(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unauthorized,
            code: "unauthorized",
            public: public.into(),
            source,
        }
    }

    pub fn invalid_with_code(
        code: &'static str,
        public: impl Into<Cow<'static, str>>,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            public: public.into(),
            source,
        }
    }

    pub fn not_found(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "not_found",
            public: public.into(),
            source,
        }
    }

    pub fn unknown(public: impl Into<Cow<'static, str>>, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public: public.into(),
            source,
        }
    }
}

impl std::fmt::Display for LibError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.public)
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for LibError {
    fn from(value: sqlx::Error) -> Self {
        Self::database("Database request failed", anyhow!(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_side_kinds_are_internal() {
        assert!(LibError::database("Failed", anyhow!("reset")).kind.is_internal());
        assert!(LibError::unknown("Failed", anyhow!("boom")).kind.is_internal());
        assert!(!LibError::not_found("Missing", anyhow!("gone")).kind.is_internal());
        assert!(!LibError::unauthorized("No", anyhow!("anon")).kind.is_internal());
    }

    #[test]
    fn display_shows_code_and_public_message() {
        let err = LibError::invalid_with_code("invalid_id", "Invalid graph id", anyhow!("x"));
        assert_eq!(err.to_string(), "invalid_id: Invalid graph id");
    }
}
