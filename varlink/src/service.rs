use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use varlink_parser::IDL;

use crate::call::Call;
use crate::error::*;
use crate::protocol::read_message;
use crate::stream::Stream;
use crate::{
    GetInterfaceDescriptionArgs, GetInterfaceDescriptionReply, Request, ServiceInfo,
    ORG_VARLINK_SERVICE,
};

pub(crate) const ORG_VARLINK_SERVICE_DESCRIPTION: &str = r#"# The Varlink Service Interface is provided by every varlink service. It
# describes the service and the interfaces it implements.
interface org.varlink.service

# Get a list of all the interfaces a service provides and information
# about the implementation.
method GetInfo() -> (
  vendor: string,
  product: string,
  version: string,
  url: string,
  interfaces: string[]
)

# Get the description of an interface that is implemented by this service.
method GetInterfaceDescription(interface: string) -> (description: string)

# The requested interface was not found.
error InterfaceNotFound (interface: string)

# The requested method was not found
error MethodNotFound (method: string)

# The interface defines the requested method, but the service does not
# implement it.
error MethodNotImplemented (method: string)

# One of the passed parameters is invalid.
error InvalidParameter (parameter: string)
"#;

/// This trait has to be implemented by any varlink interface implementor.
///
/// [`VarlinkInterface`] implements it for interfaces built from a description
/// and a set of method handlers.
pub trait Interface {
    fn get_name(&self) -> &str;
    /// The varlink interface definition, returned verbatim by
    /// `org.varlink.service.GetInterfaceDescription`.
    fn get_description(&self) -> &str;
    /// True, if the interface definition declares `method`.
    fn is_method(&self, method: &str) -> bool;
    /// True, if there is an implementation for `method`.
    fn is_implemented(&self, method: &str) -> bool;
    /// Handles `method`. Only called for declared and implemented methods.
    fn call(&self, method: &str, call: &mut Call) -> Result<()>;
}

type Handler = Box<dyn Fn(&mut Call) -> Result<()> + Send + Sync>;

/// An [`Interface`] made of a parsed varlink interface definition and
/// one handler per implemented method.
///
/// Declared methods without a handler are answered with
/// `org.varlink.service.MethodNotImplemented`.
pub struct VarlinkInterface {
    idl: IDL,
    handlers: HashMap<String, Handler>,
}

impl VarlinkInterface {
    /// Parses `description`. Every type it references has to be declared.
    pub fn new<S: ?Sized + AsRef<str>>(description: &S) -> Result<Self> {
        let idl = IDL::from_string(description)?;
        idl.validate()?;
        Ok(VarlinkInterface {
            idl,
            handlers: HashMap::new(),
        })
    }

    /// Binds `handler` to `method`. Every method can only be bound once.
    ///
    /// The call parameters are deserialized into `P` before the handler runs;
    /// if that fails, the call is answered with
    /// `org.varlink.service.InvalidParameter` for `parameters`. Methods
    /// without input can take `()`.
    pub fn with_method<P, F>(mut self, method: &str, handler: F) -> Result<Self>
    where
        P: DeserializeOwned,
        F: Fn(&mut Call, P) -> Result<()> + Send + Sync + 'static,
    {
        if !self.idl.methods.contains_key(method) {
            return Err(Error::MethodNotInInterface {
                interface: self.idl.name.clone(),
                method: method.into(),
            });
        }

        if self.handlers.contains_key(method) {
            return Err(Error::MethodAlreadyBound {
                interface: self.idl.name.clone(),
                method: method.into(),
            });
        }

        self.handlers.insert(
            method.into(),
            Box::new(move |call: &mut Call| match call.get_parameters::<P>() {
                Ok(args) => handler(call, args),
                Err(e) => {
                    debug!(
                        "Invalid parameters for {}: {}",
                        call.get_request().method,
                        e
                    );
                    call.reply_invalid_parameter("parameters")
                }
            }),
        );

        Ok(self)
    }

    pub fn idl(&self) -> &IDL {
        &self.idl
    }
}

impl Interface for VarlinkInterface {
    fn get_name(&self) -> &str {
        &self.idl.name
    }

    fn get_description(&self) -> &str {
        &self.idl.description
    }

    fn is_method(&self, method: &str) -> bool {
        self.idl.methods.contains_key(method)
    }

    fn is_implemented(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    fn call(&self, method: &str, call: &mut Call) -> Result<()> {
        match self.handlers.get(method) {
            Some(handler) => handler(call),
            None => call.reply_method_not_implemented(method),
        }
    }
}

/// Lifecycle of a [`VarlinkService`].
///
/// Interfaces can only be registered while `Registering`. Listening is
/// possible from `Registering` and, again, from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Registering,
    Running,
    ShuttingDown,
    Stopped,
}

struct Registry {
    names: Vec<String>,
    interfaces: HashMap<String, Box<dyn Interface + Send + Sync>>,
}

#[derive(Default)]
struct Connections {
    next_id: u64,
    streams: HashMap<u64, Box<dyn Stream>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// VarlinkService handles all the I/O and dispatches method calls to the registered interfaces.
///
/// Every service implements `org.varlink.service` itself, so clients can
/// ask for the service information and the interface definitions.
pub struct VarlinkService {
    vendor: String,
    product: String,
    version: String,
    url: String,
    registry: RwLock<Registry>,
    state: Mutex<ServiceState>,
    stopping: AtomicBool,
    active: AtomicUsize,
    connections: Mutex<Connections>,
}

impl VarlinkService {
    /// Create a new `VarlinkService`.
    ///
    /// See the [Service](https://github.com/varlink/documentation/wiki/Service) section of the
    /// varlink wiki about the `vendor`, `product`, `version` and `url`.
    ///
    ///# Examples
    ///
    ///```rust
    /// let service = varlink::VarlinkService::new(
    ///     "org.varlink",
    ///     "test service",
    ///     "0.1",
    ///     "http://varlink.org",
    /// );
    /// assert_eq!(service.get_info().interfaces, vec!["org.varlink.service"]);
    ///```
    pub fn new(vendor: &str, product: &str, version: &str, url: &str) -> Self {
        VarlinkService {
            vendor: vendor.into(),
            product: product.into(),
            version: version.into(),
            url: url.into(),
            registry: RwLock::new(Registry {
                names: vec![ORG_VARLINK_SERVICE.into()],
                interfaces: HashMap::new(),
            }),
            state: Mutex::new(ServiceState::Registering),
            stopping: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            connections: Mutex::new(Connections::default()),
        }
    }

    /// Adds an interface to the service.
    ///
    /// Fails if an interface of the same name is already registered or the
    /// service has been started.
    pub fn register_interface<I>(&self, interface: I) -> Result<()>
    where
        I: Interface + Send + Sync + 'static,
    {
        let state = lock(&self.state);
        if *state != ServiceState::Registering {
            return Err(Error::AlreadyRunning);
        }

        let name = interface.get_name().to_string();
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);

        if name == ORG_VARLINK_SERVICE || registry.interfaces.contains_key(&name) {
            return Err(Error::InterfaceAlreadyRegistered(name));
        }

        registry.names.push(name.clone());
        registry.interfaces.insert(name, Box::new(interface));
        Ok(())
    }

    pub fn state(&self) -> ServiceState {
        *lock(&self.state)
    }

    /// Vendor, product, version, url and the names of all registered
    /// interfaces in registration order.
    pub fn get_info(&self) -> ServiceInfo {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        ServiceInfo {
            vendor: self.vendor.clone(),
            product: self.product.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
            interfaces: registry.names.clone(),
        }
    }

    /// The interface definition of a registered interface.
    pub fn get_interface_description(&self, interface: &str) -> Option<String> {
        if interface == ORG_VARLINK_SERVICE {
            return Some(ORG_VARLINK_SERVICE_DESCRIPTION.into());
        }

        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .interfaces
            .get(interface)
            .map(|i| i.get_description().to_string())
    }

    /// Stops a running service.
    ///
    /// The accept loop returns, and all open connections are shut down, so
    /// blocked reads return. Has no effect if the service is not running.
    pub fn shutdown(&self) {
        {
            let mut state = lock(&self.state);
            if *state != ServiceState::Running {
                return;
            }
            *state = ServiceState::ShuttingDown;
        }

        let connections = lock(&self.connections);
        self.stopping.store(true, Ordering::SeqCst);
        for stream in connections.streams.values() {
            let _ = stream.shutdown();
        }
    }

    fn call_service(&self, method: &str, call: &mut Call) -> Result<()> {
        match method {
            "GetInfo" => call.reply(self.get_info()),
            "GetInterfaceDescription" => {
                let args = match call.get_parameters::<GetInterfaceDescriptionArgs>() {
                    Ok(args) => args,
                    Err(_) => return call.reply_invalid_parameter("interface"),
                };

                match self.get_interface_description(&args.interface) {
                    Some(description) => call.reply(GetInterfaceDescriptionReply { description }),
                    None => call.reply_invalid_parameter("interface"),
                }
            }
            _ => call.reply_method_not_found(method),
        }
    }

    fn dispatch(&self, interface: &str, method: &str, call: &mut Call) -> Result<()> {
        if interface == ORG_VARLINK_SERVICE {
            return self.call_service(method, call);
        }

        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);

        let iface = match registry.interfaces.get(interface) {
            Some(iface) => iface,
            None => return call.reply_interface_not_found(interface),
        };

        if !iface.is_method(method) {
            return call.reply_method_not_found(method);
        }

        if !iface.is_implemented(method) {
            return call.reply_method_not_implemented(method);
        }

        iface.call(method, call)
    }

    /// Handles one varlink message (without the NUL terminator) and writes
    /// the replies to `writer`.
    ///
    /// A message which is not a valid request is an error; the connection it
    /// came from should be closed.
    pub fn handle_message(&self, writer: &mut dyn Write, message: &[u8]) -> Result<()> {
        let request: Request = serde_json::from_slice(message)?;
        let mut call = Call::new(writer, &request);

        debug!("Call {}", request.method);

        let n = match request.method.rfind('.') {
            Some(n) if n > 0 => n,
            _ => return call.reply_invalid_parameter("method"),
        };

        let (interface, method) = (&request.method[..n], &request.method[n + 1..]);

        if let Err(e) = self.dispatch(interface, method, &mut call) {
            warn!("Method {} failed: {}", request.method, e);
            return Err(e);
        }

        if !call.has_replied() && !call.is_oneshot() {
            warn!("Method {} returned without a final reply", request.method);
        }

        Ok(())
    }

    /// Handles incoming varlink messages from `reader` and sends the replies on `writer`,
    /// until the reader reaches the end of the stream.
    ///
    /// This method can be used to implement your own server.
    pub fn handle(&self, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Result<()> {
        loop {
            let message = match read_message(reader) {
                Ok(message) => message,
                Err(Error::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            };

            self.handle_message(writer, &message)?;
        }
    }

    pub(crate) fn begin(&self) -> Result<ServiceState> {
        let mut state = lock(&self.state);
        match *state {
            previous @ (ServiceState::Registering | ServiceState::Stopped) => {
                *state = ServiceState::Running;
                self.stopping.store(false, Ordering::SeqCst);
                Ok(previous)
            }
            _ => Err(Error::AlreadyRunning),
        }
    }

    pub(crate) fn restore(&self, previous: ServiceState) {
        *lock(&self.state) = previous;
    }

    pub(crate) fn finish(&self) {
        *lock(&self.state) = ServiceState::Stopped;
        self.stopping.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    pub(crate) fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Tracks `stream` until the returned guard is dropped.
    pub(crate) fn track(&self, stream: &dyn Stream) -> Result<ConnectionGuard<'_>> {
        let clone = stream.try_clone()?;
        let mut connections = lock(&self.connections);

        if self.is_stopping() {
            let _ = clone.shutdown();
        }

        let id = connections.next_id;
        connections.next_id += 1;
        connections.streams.insert(id, clone);
        self.active.fetch_add(1, Ordering::SeqCst);

        Ok(ConnectionGuard { service: self, id })
    }

    pub(crate) fn close_connections(&self) {
        for stream in lock(&self.connections).streams.values() {
            let _ = stream.shutdown();
        }
    }
}

/// Shuts the connection down and forgets about it, on every exit path of
/// the connection thread.
pub(crate) struct ConnectionGuard<'a> {
    service: &'a VarlinkService,
    id: u64,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        if let Some(stream) = lock(&self.service.connections).streams.remove(&self.id) {
            let _ = stream.shutdown();
        }
        self.service.active.fetch_sub(1, Ordering::SeqCst);
    }
}
