use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::*;
use crate::protocol::write_message;
use crate::{
    ErrorInterfaceNotFound, ErrorInvalidParameter, ErrorMethodNotFound,
    ErrorMethodNotImplemented, Reply, Request, ORG_VARLINK_SERVICE,
};

/// Call is passed to the method handlers. It carries the request and is the
/// only way to send replies for it.
///
/// The reply rules of the protocol are enforced here, before anything is
/// written:
///
/// * replies with `continues` are only allowed if the caller asked for `more`
/// * after the final reply (the first one without `continues`) nothing can be sent
/// * `org.varlink.service` errors are reserved for the service itself
///
/// For `oneshot` requests all replies are silently dropped.
///
///# Examples
///
///```rust
///# use serde_derive::Serialize;
/// #[derive(Serialize)]
/// struct Progress {
///     percent: i64,
/// }
///
/// fn update(call: &mut varlink::Call) -> varlink::Result<()> {
///     if !call.wants_more() {
///         return call.reply(Progress { percent: 100 });
///     }
///
///     call.set_continues(true);
///     for percent in [0, 50] {
///         call.reply(Progress { percent })?;
///     }
///     call.set_continues(false);
///     call.reply(Progress { percent: 100 })
/// }
///```
pub struct Call<'a> {
    writer: &'a mut dyn Write,
    request: &'a Request,
    continues: bool,
    replied: bool,
}

impl<'a> Call<'a> {
    pub(crate) fn new(writer: &'a mut dyn Write, request: &'a Request) -> Self {
        Call {
            writer,
            request,
            continues: false,
            replied: false,
        }
    }

    /// True, if this request accepts more than one reply.
    pub fn wants_more(&self) -> bool {
        self.request.more == Some(true)
    }

    /// True, if this request does not want a reply.
    pub fn is_oneshot(&self) -> bool {
        self.request.oneshot == Some(true)
    }

    /// Set this to `true` to indicate, that more replies are following.
    pub fn set_continues(&mut self, cont: bool) {
        self.continues = cont;
    }

    pub fn get_request(&self) -> &Request {
        self.request
    }

    /// True, once the final reply for this call was sent (or dropped for
    /// `oneshot` requests).
    pub fn has_replied(&self) -> bool {
        self.replied
    }

    /// Deserializes the call parameters. Missing parameters are treated as
    /// an empty object, which also deserializes into `()`.
    pub fn get_parameters<T: DeserializeOwned>(&self) -> Result<T> {
        let parameters = match self.request.parameters {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(ref p) => p.clone(),
        };
        let empty = parameters.as_object().map_or(false, Map::is_empty);

        match serde_json::from_value(parameters) {
            Ok(p) => Ok(p),
            // unit types only deserialize from null
            Err(e) if empty => serde_json::from_value(Value::Null).map_err(|_| e.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sends `parameters` as the reply. With `set_continues(true)` this
    /// is an intermediate reply of a `more` call.
    pub fn reply<T: Serialize>(&mut self, parameters: T) -> Result<()> {
        let parameters = serde_json::to_value(parameters)?;
        self.reply_struct(Reply::parameters(Some(parameters)))
    }

    /// Don't use this directly. Rather use the standard `reply()` method.
    pub fn reply_struct(&mut self, mut reply: Reply) -> Result<()> {
        if self.replied {
            return Err(Error::ReplyAlreadySent);
        }

        let continues = reply.error.is_none() && (self.continues || reply.continues == Some(true));

        if continues && !self.wants_more() {
            return Err(Error::CallContinuesMismatch);
        }

        reply.continues = if continues { Some(true) } else { None };
        if !continues {
            self.replied = true;
        }

        if self.is_oneshot() {
            return Ok(());
        }

        write_message(&mut *self.writer, &reply)
    }

    /// Sends the error `name`, which has to be fully qualified with the
    /// interface name, e.g. `org.example.ping.PingError`.
    pub fn reply_error<T: Serialize>(&mut self, name: &str, parameters: T) -> Result<()> {
        match name.rfind('.') {
            Some(n) if n > 0 && n + 1 < name.len() => {
                if &name[..n] == ORG_VARLINK_SERVICE {
                    return Err(Error::ReservedErrorName(name.into()));
                }
            }
            _ => return Err(Error::InvalidErrorName(name.into())),
        }

        self.reply_service_error(name, parameters)
    }

    fn reply_service_error<T: Serialize>(&mut self, name: &str, parameters: T) -> Result<()> {
        let parameters = match serde_json::to_value(parameters)? {
            Value::Null => None,
            p => Some(p),
        };
        self.reply_struct(Reply::error(name, parameters))
    }

    /// reply with the standard varlink `org.varlink.service.MethodNotFound` error
    pub fn reply_method_not_found(&mut self, method: &str) -> Result<()> {
        self.reply_service_error(
            "org.varlink.service.MethodNotFound",
            ErrorMethodNotFound {
                method: method.into(),
            },
        )
    }

    /// reply with the standard varlink `org.varlink.service.MethodNotImplemented` error
    pub fn reply_method_not_implemented(&mut self, method: &str) -> Result<()> {
        self.reply_service_error(
            "org.varlink.service.MethodNotImplemented",
            ErrorMethodNotImplemented {
                method: method.into(),
            },
        )
    }

    /// reply with the standard varlink `org.varlink.service.InvalidParameter` error
    pub fn reply_invalid_parameter(&mut self, parameter: &str) -> Result<()> {
        self.reply_service_error(
            "org.varlink.service.InvalidParameter",
            ErrorInvalidParameter {
                parameter: parameter.into(),
            },
        )
    }

    pub(crate) fn reply_interface_not_found(&mut self, interface: &str) -> Result<()> {
        self.reply_service_error(
            "org.varlink.service.InterfaceNotFound",
            ErrorInterfaceNotFound {
                interface: interface.into(),
            },
        )
    }
}
