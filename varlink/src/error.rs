use std::io;

use serde_json::Value;

use crate::Reply;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error")]
    Io(#[source] io::Error),
    #[error("Connection Closed")]
    ConnectionClosed,
    #[error("JSON Error")]
    Json(#[source] serde_json::Error),
    #[error("Interface definition error")]
    Parse(#[from] varlink_parser::Error),
    #[error("Invalid varlink address URI '{0}'")]
    InvalidAddress(String),
    #[error("Unknown protocol '{0}' in varlink address")]
    UnknownProtocol(String),
    #[error("Service is already running")]
    AlreadyRunning,
    #[error("Interface '{0}' is already registered")]
    InterfaceAlreadyRegistered(String),
    #[error("Interface '{interface}' does not define method '{method}'")]
    MethodNotInInterface { interface: String, method: String },
    #[error("Method '{method}' of interface '{interface}' already has a handler")]
    MethodAlreadyBound { interface: String, method: String },
    #[error("Call::reply() called with continues, but without more in the request")]
    CallContinuesMismatch,
    #[error("Call::reply() called after the final reply was sent")]
    ReplyAlreadySent,
    #[error("Refused to send error '{0}', it is reserved for the varlink service")]
    ReservedErrorName(String),
    #[error("Invalid error name '{0}'")]
    InvalidErrorName(String),
    #[error("Interface not found: '{0}'")]
    InterfaceNotFound(String),
    #[error("Method not found: '{0}'")]
    MethodNotFound(String),
    #[error("Method not implemented: '{0}'")]
    MethodNotImplemented(String),
    #[error("Invalid parameter: '{0}'")]
    InvalidParameter(String),
    #[error("Error reply: '{error}'")]
    VarlinkErrorReply {
        error: String,
        parameters: Option<Value>,
    },
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match e.classify() {
            Category::Io => Error::from(io::Error::from(e)),
            _ => Error::Json(e),
        }
    }
}

fn error_parameter(parameters: &Option<Value>, key: &str) -> String {
    parameters
        .as_ref()
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl From<Reply> for Error {
    fn from(reply: Reply) -> Self {
        let Reply {
            error, parameters, ..
        } = reply;

        match error.as_deref() {
            Some("org.varlink.service.InterfaceNotFound") => {
                Error::InterfaceNotFound(error_parameter(&parameters, "interface"))
            }
            Some("org.varlink.service.MethodNotFound") => {
                Error::MethodNotFound(error_parameter(&parameters, "method"))
            }
            Some("org.varlink.service.MethodNotImplemented") => {
                Error::MethodNotImplemented(error_parameter(&parameters, "method"))
            }
            Some("org.varlink.service.InvalidParameter") => {
                Error::InvalidParameter(error_parameter(&parameters, "parameter"))
            }
            _ => Error::VarlinkErrorReply {
                error: error.unwrap_or_default(),
                parameters,
            },
        }
    }
}

impl Error {
    /// True, if the peer went away or the connection was shut down.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
