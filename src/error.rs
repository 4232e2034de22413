use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parameters or output configuration that cannot be realised.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The active backend lacks a capability the caller asked for.
    #[error("{backend} does not support {capability}")]
    UnsupportedBackend {
        backend: String,
        capability: String,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing array {}: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("{context}: {source}")]
    Video {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The vision provider failed on a frame.
    #[error("vision: {0}")]
    Vision(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "opencv")]
impl From<opencv::Error> for Error {
    fn from(err: opencv::Error) -> Self {
        Error::Vision(format!("OpenCV error: {}", err))
    }
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn video(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Video {
            context: context.into(),
            source: source.into(),
        }
    }
}
