//!Server and client support for the [varlink protocol](http://varlink.org)
//!
//!A varlink service is described by an interface definition, e.g. `org.example.ping`:
//!
//!```varlink
//!# Example service
//!interface org.example.ping
//!
//!# Returns the same string
//!method Ping(ping: string) -> (pong: string)
//!```
//!
//!To serve it, create a [`VarlinkInterface`] from the description, bind a handler for every
//!method you implement and register it with a [`VarlinkService`]:
//!
//!```rust,no_run
//!use serde_derive::{Deserialize, Serialize};
//!
//!#[derive(Deserialize)]
//!struct PingArgs {
//!    ping: String,
//!}
//!
//!#[derive(Serialize)]
//!struct PingReply {
//!    pong: String,
//!}
//!
//!fn main() -> varlink::Result<()> {
//!    let interface = varlink::VarlinkInterface::new(
//!        "# Example service
//!interface org.example.ping
//!
//!# Returns the same string
//!method Ping(ping: string) -> (pong: string)
//!",
//!    )?
//!    .with_method("Ping", |call: &mut varlink::Call, args: PingArgs| {
//!        call.reply(PingReply { pong: args.ping })
//!    })?;
//!
//!    let service = varlink::VarlinkService::new(
//!        "org.varlink",
//!        "test service",
//!        "0.1",
//!        "http://varlink.org",
//!    );
//!    service.register_interface(interface)?;
//!
//!    let args: Vec<_> = std::env::args().collect();
//!    varlink::listen(&service, &args[1], &varlink::ListenConfig::default())
//!}
//!```
//!
//!where args[1] would follow the varlink
//![address specification](https://github.com/varlink/documentation/wiki#address).
//!
//!Currently supported address URIs are:
//!
//!- TCP `tcp:127.0.0.1:12345` hostname/IP address and port
//!- UNIX socket `unix:/run/org.example.ftl` (parameters after `;` are ignored)
//!- UNIX abstract namespace socket `unix:@org.example.ftl` (on Linux only)
//!
//!If the process was started via
//![socket activation](https://github.com/varlink/documentation/wiki#activation),
//!`listen()` serves the passed socket instead of binding the address.
//!
//!On the client side, a [`Connection`] sends calls and decodes the replies:
//!
//!```rust,no_run
//!# fn main() -> varlink::Result<()> {
//!let mut connection = varlink::Connection::with_address("unix:/run/org.example.ping")?;
//!let reply: serde_json::Value =
//!    connection.call("org.example.ping.Ping", serde_json::json!({"ping": "Test"}))?;
//!assert_eq!(reply["pong"], "Test");
//!
//!let info = varlink::OrgVarlinkServiceClient::new(&mut connection).get_info()?;
//!println!("{:?}", info.interfaces);
//!# Ok(())
//!# }
//!```

#![doc(
    html_logo_url = "https://varlink.org/images/varlink.png",
    html_favicon_url = "https://varlink.org/images/varlink-small.png"
)]

use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::address::Address;
pub use crate::call::Call;
pub use crate::client::{Connection, MethodCall, OrgVarlinkServiceClient};
pub use crate::error::{Error, Result};
pub use crate::protocol::{read_message, write_message};
pub use crate::server::{listen, listen_on, ListenConfig, Listener};
pub use crate::service::{Interface, ServiceState, VarlinkInterface, VarlinkService};
pub use crate::stream::Stream;

mod address;
mod call;
mod client;
mod error;
mod protocol;
mod server;
mod service;
mod stream;


/// Name of the interface every varlink service implements.
pub const ORG_VARLINK_SERVICE: &str = "org.varlink.service";

/// The structure of a varlink request. Used to serialize json into it.
///
/// There should be no need to use this directly.
#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct Request {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub more: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oneshot: Option<bool>,
}

impl Request {
    pub fn create<S: Into<String>>(method: S, parameters: Option<Value>) -> Self {
        Request {
            method: method.into(),
            parameters,
            more: None,
            oneshot: None,
        }
    }
}

/// The structure of a varlink reply. Used to deserialize it into json.
///
/// There should be no need to use this directly.
/// See [`Call`] for the methods to send replies.
#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continues: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn parameters(parameters: Option<Value>) -> Self {
        Reply {
            parameters,
            continues: None,
            error: None,
        }
    }

    pub fn error<S: Into<String>>(name: S, parameters: Option<Value>) -> Self {
        Reply {
            parameters,
            continues: None,
            error: Some(name.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorInterfaceNotFound {
    pub interface: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorInvalidParameter {
    pub parameter: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorMethodNotImplemented {
    pub method: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ErrorMethodNotFound {
    pub method: String,
}

/// The reply of `org.varlink.service.GetInfo`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct ServiceInfo {
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub url: String,
    pub interfaces: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct GetInterfaceDescriptionArgs {
    #[serde(default)]
    pub interface: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct GetInterfaceDescriptionReply {
    pub description: String,
}
