use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed post: {reason}")]
    MalformedPost { reason: &'static str },
}

impl DomainError {
    pub fn malformed(reason: &'static str) -> Self {
        Self::MalformedPost { reason }
    }
}
