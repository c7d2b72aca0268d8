//! Handle network connections for a varlink service

use std::io::{self, BufReader};
use std::net::TcpListener;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, fs, process, thread};

use log::{debug, error, info, warn};

use crate::address::Address;
use crate::error::*;
use crate::service::{ConnectionGuard, VarlinkService};
use crate::stream::Stream;

/// First file descriptor passed by socket activation.
const LISTEN_FDS_START: RawFd = 3;

/// A bound server socket.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    Unix {
        listener: UnixListener,
        /// The socket file, removed again when the listener is dropped.
        path: Option<PathBuf>,
    },
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn bind_abstract(name: &str) -> Result<UnixListener> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name)?;
    Ok(UnixListener::bind_addr(&addr)?)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn bind_abstract(name: &str) -> Result<UnixListener> {
    Err(Error::InvalidAddress(format!("unix:@{}", name)))
}

impl Listener {
    /// Binds a new socket for `address`.
    ///
    /// A stale socket file at the path of a `unix:` address is removed first.
    pub fn bind<S: ?Sized + AsRef<str>>(address: &S) -> Result<Self> {
        match Address::parse(address)? {
            Address::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr)?)),
            Address::UnixAbstract(name) => Ok(Listener::Unix {
                listener: bind_abstract(&name)?,
                path: None,
            }),
            Address::Unix(path) => {
                // ignore error on non-existent file
                let _ = fs::remove_file(&path);
                Ok(Listener::Unix {
                    listener: UnixListener::bind(&path)?,
                    path: Some(path.into()),
                })
            }
        }
    }

    /// Adopts a listening socket passed by the service manager.
    ///
    /// `LISTEN_PID` and `LISTEN_FDS` are removed from the environment in any
    /// case, so child processes don't pick them up. The socket is only used if
    /// `LISTEN_PID` names this process and exactly one descriptor was passed.
    /// `address` determines whether it is treated as a TCP or a Unix socket.
    pub fn from_activation<S: ?Sized + AsRef<str>>(address: &S) -> Result<Option<Self>> {
        let pid = env::var("LISTEN_PID").ok();
        let fds = env::var("LISTEN_FDS").ok();
        env::remove_var("LISTEN_PID");
        env::remove_var("LISTEN_FDS");

        let pid = pid.and_then(|p| p.parse::<u32>().ok());
        let fds = fds.and_then(|n| n.parse::<usize>().ok());

        if pid != Some(process::id()) || fds != Some(1) {
            return Ok(None);
        }

        let listener = match Address::parse(address)? {
            Address::Tcp(_) => unsafe { Listener::Tcp(TcpListener::from_raw_fd(LISTEN_FDS_START)) },
            Address::Unix(_) | Address::UnixAbstract(_) => Listener::Unix {
                listener: unsafe { UnixListener::from_raw_fd(LISTEN_FDS_START) },
                path: None,
            },
        };

        info!("Using activation socket for {}", address.as_ref());
        Ok(Some(listener))
    }

    pub fn accept(&self) -> Result<Box<dyn Stream>> {
        match self {
            Listener::Tcp(l) => {
                let (s, _addr) = l.accept()?;
                Ok(Box::new(s))
            }
            Listener::Unix { listener, .. } => {
                let (s, _addr) = listener.accept()?;
                Ok(Box::new(s))
            }
        }
    }

    /// The address clients can connect to, e.g. the real port of `tcp:127.0.0.1:0`.
    pub fn local_address(&self) -> Result<String> {
        match self {
            Listener::Tcp(l) => Ok(format!("tcp:{}", l.local_addr()?)),
            Listener::Unix { listener, path } => {
                if let Some(path) = path {
                    return Ok(format!("unix:{}", path.display()));
                }

                let addr = listener.local_addr()?;
                if let Some(path) = addr.as_pathname() {
                    return Ok(format!("unix:{}", path.display()));
                }

                #[cfg(any(target_os = "linux", target_os = "android"))]
                {
                    use std::os::linux::net::SocketAddrExt;
                    if let Some(name) = addr.as_abstract_name() {
                        return Ok(format!("unix:@{}", String::from_utf8_lossy(name)));
                    }
                }

                Err(Error::InvalidAddress(format!("{:?}", addr)))
            }
        }
    }

    /// Waits up to `timeout` milliseconds for an incoming connection.
    fn wait(&self, timeout: u64) -> Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout = timeout.min(libc::c_int::MAX as u64) as libc::c_int;

        loop {
            let ret = unsafe { libc::poll(&mut fds, 1, timeout) };
            if ret >= 0 {
                return Ok(ret > 0);
            }

            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Listener::Tcp(l) => l.as_raw_fd(),
            Listener::Unix { listener, .. } => listener.as_raw_fd(),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix {
            path: Some(ref path),
            ..
        } = *self
        {
            let _ = fs::remove_file(path);
        }
    }
}

/// Configuration for [`listen`] and [`listen_on`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    /// Time in seconds for the server to quit, when it is idle. `0` waits forever.
    pub idle_timeout: u64,
    /// Time in milliseconds between checks for a requested shutdown.
    pub poll_interval: u64,
    /// Use a socket passed by the service manager, if there is one.
    pub activation: bool,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            idle_timeout: 0,
            poll_interval: 100,
            activation: true,
        }
    }
}

/// Marks the service as stopped, once the server is done.
struct Stopped<'a>(&'a VarlinkService);

impl Drop for Stopped<'_> {
    fn drop(&mut self) {
        self.0.finish();
        info!("Service stopped");
    }
}

/// `listen` runs `service` on `address`, with one thread per connection.
///
/// If the process was socket activated (and `config.activation` is set), the
/// passed socket is used instead of binding a new one.
///
/// The function returns after [`VarlinkService::shutdown`] was called, or
/// after `config.idle_timeout` seconds without any connection. It still waits
/// for all connection threads to finish.
///
///# Examples
///
///```
/// let service = varlink::VarlinkService::new(
///     "org.varlink",
///     "test service",
///     "0.1",
///     "http://varlink.org",
/// );
///
/// let dir = tempfile::tempdir().unwrap();
/// let address = format!("unix:{}", dir.path().join("listen_timeout").display());
///
/// varlink::listen(
///     &service,
///     &address,
///     &varlink::ListenConfig {
///         idle_timeout: 1,
///         ..Default::default()
///     },
/// )
/// .unwrap();
///
/// assert_eq!(service.state(), varlink::ServiceState::Stopped);
///```
///# Note
/// You don't have to use this simple server. With the `VarlinkService::handle()` method you
/// can implement your own server model using whatever framework you prefer.
pub fn listen<S: ?Sized + AsRef<str>>(
    service: &VarlinkService,
    address: &S,
    config: &ListenConfig,
) -> Result<()> {
    let previous = service.begin()?;

    let listener = match open(address.as_ref(), config) {
        Ok(listener) => listener,
        Err(e) => {
            service.restore(previous);
            return Err(e);
        }
    };

    serve(service, &listener, config)
}

/// Like [`listen`], but on an already bound `listener`.
pub fn listen_on(service: &VarlinkService, listener: Listener, config: &ListenConfig) -> Result<()> {
    service.begin()?;
    serve(service, &listener, config)
}

fn open(address: &str, config: &ListenConfig) -> Result<Listener> {
    if config.activation {
        if let Some(listener) = Listener::from_activation(address)? {
            return Ok(listener);
        }
    }
    Listener::bind(address)
}

fn serve(service: &VarlinkService, listener: &Listener, config: &ListenConfig) -> Result<()> {
    let _stopped = Stopped(service);

    match listener.local_address() {
        Ok(address) => info!("Listening on {}", address),
        Err(_) => info!("Listening"),
    }

    thread::scope(|scope| {
        let ret = accept_loop(service, listener, config, scope);
        if ret.is_err() {
            service.close_connections();
        }
        ret
    })
}

fn accept_loop<'scope, 'env>(
    service: &'env VarlinkService,
    listener: &Listener,
    config: &ListenConfig,
    scope: &'scope thread::Scope<'scope, 'env>,
) -> Result<()> {
    let interval = config.poll_interval.max(1);
    let idle_deadline = || {
        (config.idle_timeout > 0)
            .then(|| Instant::now() + Duration::from_secs(config.idle_timeout))
    };
    let mut deadline = idle_deadline();

    loop {
        if service.is_stopping() {
            return Ok(());
        }

        let ready = match listener.wait(interval) {
            Ok(ready) => ready,
            Err(_) if service.is_stopping() => return Ok(()),
            Err(e) => {
                error!("Waiting for connections failed: {}", e);
                return Err(e);
            }
        };

        if !ready {
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    if service.active_connections() == 0 {
                        info!("Idle timeout reached");
                        return Ok(());
                    }
                    deadline = idle_deadline();
                }
            }
            continue;
        }

        let stream = match listener.accept() {
            Ok(stream) => stream,
            Err(_) if service.is_stopping() => return Ok(()),
            Err(e) => {
                error!("Accept failed: {}", e);
                return Err(e);
            }
        };

        deadline = idle_deadline();

        let guard = match service.track(&*stream) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Dropping connection: {}", e);
                continue;
            }
        };

        scope.spawn(move || serve_connection(service, stream, guard));
    }
}

fn serve_connection(service: &VarlinkService, stream: Box<dyn Stream>, _guard: ConnectionGuard<'_>) {
    debug!("Connection opened");

    let (reader, mut writer) = match stream.split() {
        Ok(halves) => halves,
        Err(e) => {
            warn!("Connection setup failed: {}", e);
            return;
        }
    };
    let mut reader = BufReader::new(reader);

    match service.handle(&mut reader, &mut writer) {
        Ok(()) => debug!("Connection closed"),
        Err(e) => debug!("Connection closed: {}", e),
    }
}
