//! Command-line Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open the metadata database")]
    Metadata,
    #[display("could not prepare content storage")]
    Storage,
    #[display("server stopped unexpectedly")]
    Serve,
    #[display("invalid server URL: {_0}")]
    ServerUrl(#[error(not(source))] String),
    #[display("request to the server failed")]
    Request,
    /// The server answered with an error response.
    #[display("server responded {status}: {message}")]
    Response {
        #[error(not(source))]
        status: u16,
        #[error(not(source))]
        message: String,
    },
    #[display("could not write {_0}")]
    Output(#[error(not(source))] String),
}
