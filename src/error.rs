use crate::models::InsightStatus;
use std::fmt;

#[derive(Debug)]
pub enum InsightError {
    NotFound(String),
    BadRequest(String),
    InvalidTransition {
        from: InsightStatus,
        to: InsightStatus,
        detail: Option<String>,
    },
    Store(anyhow::Error),
}

impl InsightError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn invalid_transition(from: InsightStatus, to: InsightStatus) -> Self {
        Self::InvalidTransition {
            from,
            to,
            detail: None,
        }
    }

    pub fn invalid_transition_because(
        from: InsightStatus,
        to: InsightStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            from,
            to,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for InsightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::InvalidTransition { from, to, detail } => {
                write!(
                    f,
                    "the insight is {} and couldn't change to {}",
                    from.as_str(),
                    to.as_str()
                )?;
                if let Some(detail) = detail {
                    write!(f, ", because {detail}")?;
                }
                Ok(())
            }
            Self::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for InsightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for InsightError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

pub type InsightResult<T> = Result<T, InsightError>;
