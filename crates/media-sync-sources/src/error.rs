use media_sync_models::ValidationFailure;
use thiserror::Error;

/// Failure talking to an external collaborator (Plex, Letterboxd, Radarr)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered 400: the request itself was refused as invalid
    #[error("{service} rejected the request: {message}")]
    BadRequest { service: &'static str, message: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to parse {service} response: {message}")]
    Parse { service: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        SourceError::Other(message.into())
    }

    pub fn parse(service: &'static str, message: impl Into<String>) -> Self {
        SourceError::Parse {
            service,
            message: message.into(),
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, SourceError::BadRequest { .. })
    }

    /// Turn a non-success response into an error, keeping the body for context
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST {
            SourceError::BadRequest { service, message: body }
        } else {
            SourceError::Status {
                service,
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Failure creating a catalog entry in Radarr
#[derive(Debug, Error)]
pub enum AddMovieError {
    /// HTTP 400 with Radarr's structured validation list
    #[error("Radarr rejected the movie ({} validation error(s))", .0.len())]
    Rejected(Vec<ValidationFailure>),

    /// HTTP 400 whose body could not be parsed
    #[error("Radarr rejected the movie with an unparseable body: {body}")]
    UnparseableRejection { body: String },

    #[error("Radarr returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl From<reqwest::Error> for AddMovieError {
    fn from(err: reqwest::Error) -> Self {
        AddMovieError::Source(SourceError::Http(err))
    }
}
