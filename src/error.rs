use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no suitable touchscreen found")]
    NoTouchscreen,
    #[error("{message}: {source}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },
    #[error("wake handle: {0}")]
    Wake(#[source] nix::Error),
    #[error("gesture recognizer already started")]
    AlreadyStarted,
    #[error("gesture recognizer already shut down")]
    AlreadyShutDown,
}

impl Error {
    pub fn io(message: impl Into<String>, source: io::Error) -> Error {
        Error::Io {
            message: message.into(),
            source,
        }
    }
}

pub trait AddMessage<T> {
    fn add_message<S: Into<String>>(self, message: S) -> Result<T, Error>;
}

impl<T> AddMessage<T> for io::Result<T> {
    fn add_message<S: Into<String>>(self, message: S) -> Result<T, Error> {
        self.map_err(|source| Error::io(message, source))
    }
}
