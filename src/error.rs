use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("mail error: {0}")]
    Mail(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for CrewError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CrewError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for CrewError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

pub use crate::Result;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_category_prefix() {
        let err = CrewError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        let err = CrewError::Mail("relay refused".to_string());
        assert_eq!(format!("{err}"), "mail error: relay refused");
    }

    #[test]
    fn io_and_json_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(CrewError::from(io), CrewError::Io(_)));
        let json = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        assert!(matches!(CrewError::from(json), CrewError::Serialization(_)));
    }
}
