use std::fmt;
use std::str::FromStr;

use crate::error::*;

/// A parsed varlink address of the form `protocol:target[;parameters]`.
///
/// Everything after the first `;` of the target is ignored.
///
///# Examples
///
///```rust
/// use varlink::Address;
///
/// let a: Address = "unix:/run/org.example.ping;mode=0666".parse().unwrap();
/// assert_eq!(a, Address::Unix("/run/org.example.ping".into()));
/// assert_eq!(a.to_string(), "unix:/run/org.example.ping");
///
/// assert!("http://localhost".parse::<Address>().is_err());
///```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// `tcp:host:port`
    Tcp(String),
    /// `unix:/path/to/socket`
    Unix(String),
    /// `unix:@name`, a Linux abstract socket without a file system path
    UnixAbstract(String),
}

impl Address {
    pub fn parse<S: ?Sized + AsRef<str>>(address: &S) -> Result<Self> {
        let address = address.as_ref();

        let (protocol, target) = address
            .split_once(':')
            .ok_or_else(|| Error::InvalidAddress(address.into()))?;

        let target = target.split(';').next().unwrap_or_default();

        match protocol {
            "tcp" | "unix" if target.is_empty() => Err(Error::InvalidAddress(address.into())),
            "tcp" => Ok(Address::Tcp(target.into())),
            "unix" => match target.strip_prefix('@') {
                Some("") => Err(Error::InvalidAddress(address.into())),
                Some(name) => Ok(Address::UnixAbstract(name.into())),
                None => Ok(Address::Unix(target.into())),
            },
            _ => Err(Error::UnknownProtocol(protocol.into())),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Tcp(a) => write!(f, "tcp:{}", a),
            Address::Unix(a) => write!(f, "unix:{}", a),
            Address::UnixAbstract(a) => write!(f, "unix:@{}", a),
        }
    }
}
