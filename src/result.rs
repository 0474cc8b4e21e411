pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("HEAD request failed")]
    Head(#[source] reqwest_middleware::Error),

    #[error("HEAD request responded with {status}")]
    HeadStatus { status: http::StatusCode },

    #[error("Content-Length header {value:?} is not a valid length")]
    InvalidContentLength { value: String },

    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Content-Length header is missing")]
    MissingContentLength,

    #[error("Expected range size: {expected_size}, actual size: {actual_size}")]
    RangeSize {
        expected_size: usize,
        actual_size: usize,
    },

    #[error("Range request responded with {status}: {message:?}")]
    RangeStatus {
        status: http::StatusCode,
        message: String,
    },

    #[error("Read of {size} bytes at position {position} extends past the end of the file ({length} bytes)")]
    ReadBeyondEnd { position: u64, size: u64, length: u64 },

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    ReqwestMiddleware(#[from] reqwest_middleware::Error),

    #[error("Seek from {base} by {offset} moves before the start of the file")]
    SeekOutOfRange { base: u64, offset: i64 },

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    #[error("Read size must be greater than zero")]
    ZeroSizeRead,
}
