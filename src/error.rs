use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    ProtocolFailure,
    ContractViolation,
    LocalIo,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network response was not ok ({0})")]
    Status(StatusCode),

    #[error("Content-Length response header unavailable")]
    MissingContentLength,

    #[error("malformed upload response: {0}")]
    MalformedReceipt(#[from] serde_json::Error),

    #[error("page has no data-download attribute on #data")]
    MissingDownloadAttr,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Network(_) => ErrorKind::NetworkFailure,
            TransferError::Status(_) => ErrorKind::ProtocolFailure,
            TransferError::MissingContentLength
            | TransferError::MalformedReceipt(_)
            | TransferError::MissingDownloadAttr
            | TransferError::Url(_) => ErrorKind::ContractViolation,
            TransferError::Io(_) => ErrorKind::LocalIo,
        }
    }
}
