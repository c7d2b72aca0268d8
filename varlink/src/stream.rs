use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;

use crate::address::Address;
use crate::error::*;

/// A connected transport, either TCP or a Unix domain socket.
pub trait Stream: Read + Write + Send + Sync + AsRawFd {
    /// Independent reader and writer halves sharing the same socket.
    fn split(&self) -> Result<(Box<dyn Read + Send + Sync>, Box<dyn Write + Send + Sync>)>;
    /// Shuts down both directions; blocked reads on any clone return.
    fn shutdown(&self) -> Result<()>;
    fn try_clone(&self) -> Result<Box<dyn Stream>>;
}

impl Stream for TcpStream {
    #[inline]
    fn split(&self) -> Result<(Box<dyn Read + Send + Sync>, Box<dyn Write + Send + Sync>)> {
        Ok((
            Box::new(TcpStream::try_clone(self)?),
            Box::new(TcpStream::try_clone(self)?),
        ))
    }

    #[inline]
    fn shutdown(&self) -> Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)?;
        Ok(())
    }

    #[inline]
    fn try_clone(&self) -> Result<Box<dyn Stream>> {
        Ok(Box::new(TcpStream::try_clone(self)?))
    }
}

impl Stream for UnixStream {
    #[inline]
    fn split(&self) -> Result<(Box<dyn Read + Send + Sync>, Box<dyn Write + Send + Sync>)> {
        Ok((
            Box::new(UnixStream::try_clone(self)?),
            Box::new(UnixStream::try_clone(self)?),
        ))
    }

    #[inline]
    fn shutdown(&self) -> Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)?;
        Ok(())
    }

    #[inline]
    fn try_clone(&self) -> Result<Box<dyn Stream>> {
        Ok(Box::new(UnixStream::try_clone(self)?))
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn connect_abstract(name: &str) -> Result<UnixStream> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name)?;
    Ok(UnixStream::connect_addr(&addr)?)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn connect_abstract(name: &str) -> Result<UnixStream> {
    Err(Error::InvalidAddress(format!("unix:@{}", name)))
}

/// Opens a client connection to `address`.
pub fn connect(address: &Address) -> Result<Box<dyn Stream>> {
    Ok(match address {
        Address::Tcp(addr) => Box::new(TcpStream::connect(addr)?),
        Address::Unix(path) => Box::new(UnixStream::connect(path)?),
        Address::UnixAbstract(name) => Box::new(connect_abstract(name)?),
    })
}
