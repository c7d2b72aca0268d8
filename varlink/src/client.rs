//! Client side of the varlink protocol

use std::io::{BufReader, Read, Write};
use std::marker::PhantomData;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::address::Address;
use crate::error::*;
use crate::protocol::{read_message, write_message};
use crate::stream::{self, Stream};
use crate::{GetInterfaceDescriptionArgs, GetInterfaceDescriptionReply, Reply, Request, ServiceInfo};

/// A connection to a varlink service.
///
/// Calls on one connection are sequential: a call has to be answered
/// completely before the next one is sent.
pub struct Connection {
    reader: BufReader<Box<dyn Read + Send + Sync>>,
    writer: Box<dyn Write + Send + Sync>,
    stream: Option<Box<dyn Stream>>,
    address: String,
}

impl Connection {
    /// Connects to the service at `address`, e.g. `unix:/run/org.example.ping`.
    pub fn with_address<S: ?Sized + AsRef<str>>(address: &S) -> Result<Self> {
        let parsed = Address::parse(address)?;
        let stream = stream::connect(&parsed)?;
        let (reader, writer) = stream.split()?;

        debug!("Connected to {}", parsed);

        Ok(Connection {
            reader: BufReader::new(reader),
            writer,
            stream: Some(stream),
            address: address.as_ref().into(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::ConnectionClosed);
        }
        write_message(&mut self.writer, request)
    }

    fn recv<R: DeserializeOwned>(&mut self) -> Result<(R, bool)> {
        if self.stream.is_none() {
            return Err(Error::ConnectionClosed);
        }

        let message = read_message(&mut self.reader)?;
        let reply: Reply = serde_json::from_slice(&message)?;

        if reply.error.is_some() {
            return Err(reply.into());
        }

        let continues = reply.continues == Some(true);
        let parameters = match reply.parameters {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(p) => p,
        };

        Ok((serde_json::from_value(parameters)?, continues))
    }

    fn request<P: Serialize>(method: &str, parameters: P) -> Result<Request> {
        Ok(Request::create(
            method,
            Some(serde_json::to_value(parameters)?),
        ))
    }

    /// Calls `method` and waits for its reply.
    ///
    /// Error replies are returned as `Err`, with the `org.varlink.service`
    /// errors mapped to their own [`Error`] variants.
    pub fn call<P, R>(&mut self, method: &str, parameters: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = Self::request(method, parameters)?;
        self.send(&request)?;
        let (reply, _) = self.recv()?;
        Ok(reply)
    }

    /// Calls `method` with `more` set, and returns an iterator over the
    /// replies. The iterator ends after the final reply.
    ///
    ///# Examples
    ///
    ///```rust,no_run
    ///# fn main() -> varlink::Result<()> {
    /// let mut connection = varlink::Connection::with_address("unix:/run/org.example.more")?;
    /// for reply in connection.more::<_, serde_json::Value>(
    ///     "org.example.more.TestMore",
    ///     serde_json::json!({"n": 10}),
    /// )? {
    ///     println!("{}", reply?);
    /// }
    ///# Ok(())
    ///# }
    ///```
    pub fn more<P, R>(&mut self, method: &str, parameters: P) -> Result<MethodCall<'_, R>>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut request = Self::request(method, parameters)?;
        request.more = Some(true);
        self.send(&request)?;

        Ok(MethodCall {
            connection: self,
            done: false,
            reply: PhantomData,
        })
    }

    /// Calls `method` without waiting for a reply. The service does not send one.
    pub fn oneshot<P: Serialize>(&mut self, method: &str, parameters: P) -> Result<()> {
        let mut request = Self::request(method, parameters)?;
        request.oneshot = Some(true);
        self.send(&request)
    }

    /// Shuts the connection down. Further calls fail with
    /// [`Error::ConnectionClosed`].
    pub fn close(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(stream) => stream.shutdown(),
            None => Err(Error::ConnectionClosed),
        }
    }
}

/// The replies of a call made with [`Connection::more`].
///
/// Replies not consumed before the iterator is dropped are read and
/// discarded, so the connection can be used for the next call.
pub struct MethodCall<'a, R> {
    connection: &'a mut Connection,
    done: bool,
    reply: PhantomData<R>,
}

impl<R: DeserializeOwned> Iterator for MethodCall<'_, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.connection.recv() {
            Ok((reply, continues)) => {
                self.done = !continues;
                Some(Ok(reply))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R> Drop for MethodCall<'_, R> {
    fn drop(&mut self) {
        while !self.done {
            match self.connection.recv::<Value>() {
                Ok((_, continues)) => self.done = !continues,
                Err(_) => self.done = true,
            }
        }
    }
}

/// Typed client for `org.varlink.service`, which every service implements.
pub struct OrgVarlinkServiceClient<'a> {
    connection: &'a mut Connection,
}

impl<'a> OrgVarlinkServiceClient<'a> {
    pub fn new(connection: &'a mut Connection) -> Self {
        OrgVarlinkServiceClient { connection }
    }

    pub fn get_info(&mut self) -> Result<ServiceInfo> {
        self.connection
            .call("org.varlink.service.GetInfo", Map::new())
    }

    pub fn get_interface_description(&mut self, interface: &str) -> Result<String> {
        let reply: GetInterfaceDescriptionReply = self.connection.call(
            "org.varlink.service.GetInterfaceDescription",
            GetInterfaceDescriptionArgs {
                interface: interface.into(),
            },
        )?;
        Ok(reply.description)
    }
}
