//! Framed IRC connection over TCP, TLS, or any duplex byte stream.
//!
//! [`Connection`] owns the read side of a stream and drives dispatch: every
//! inbound line is parsed, fanned out to `Incoming` subscribers, and
//! returned to the caller; replies collected from subscribers are written
//! back before `read` returns. The clonable [`Writer`] is the write side,
//! safe to use concurrently from other tasks.

use std::io;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tracing::warn;

use crate::codec::MessageCodec;
use crate::dispatch::{Direction, Dispatcher};
use crate::error::{ProtocolError, SendError};
use crate::message::Message;

type MessageSink<T> = SplitSink<Framed<T, MessageCodec>, Message>;
type MessageStream<T> = SplitStream<Framed<T, MessageCodec>>;

/// The read side of an IRC connection.
///
/// There is one logical reader per connection; handler execution is
/// synchronous on the reading task, which is what guarantees that derived
/// state observes events in wire arrival order.
pub struct Connection<T> {
    stream: MessageStream<T>,
    writer: Writer<T>,
    dispatcher: Arc<Dispatcher>,
}

impl Connection<TcpStream> {
    /// Connect over plain TCP.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Connection::new(stream, dispatcher))
    }
}

impl Connection<TlsStream<TcpStream>> {
    /// Connect over TLS, verifying against the system root store.
    ///
    /// `domain` is the server name presented for certificate verification;
    /// it is usually the host part of `addr`.
    pub async fn connect_tls(
        addr: impl ToSocketAddrs,
        domain: &str,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, ProtocolError> {
        let tcp = TcpStream::connect(addr).await?;

        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().certs {
            // A root that fails to parse is skipped, not fatal.
            let _ = roots.add(cert);
        }
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let server_name = ServerName::try_from(domain.to_owned())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = TlsConnector::from(Arc::new(config))
            .connect(server_name, tcp)
            .await?;

        Ok(Connection::new(stream, dispatcher))
    }
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected duplex stream.
    pub fn new(stream: T, dispatcher: Arc<Dispatcher>) -> Self {
        let (sink, stream) = Framed::new(stream, MessageCodec::new()).split();
        let writer = Writer {
            sink: Arc::new(Mutex::new(sink)),
            dispatcher: Arc::clone(&dispatcher),
        };
        Self {
            stream,
            writer,
            dispatcher,
        }
    }

    /// A clonable handle to the write side of this connection.
    pub fn writer(&self) -> Writer<T> {
        self.writer.clone()
    }

    /// The dispatcher messages on this connection are fanned out to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Block until the next inbound message.
    ///
    /// The message is dispatched to `Incoming` subscribers before being
    /// returned; replies they produce are written back first. Lines that
    /// fail to parse (or are oversized or not UTF-8) are logged and
    /// skipped; the loop only ends on a transport error or
    /// [`ProtocolError::ConnectionReset`] at end of stream.
    pub async fn read(&mut self) -> Result<Message, ProtocolError> {
        loop {
            match self.stream.next().await {
                None => return Err(ProtocolError::ConnectionReset),
                Some(Err(err)) if err.is_recoverable() => {
                    warn!("skipping bad line: {err}");
                }
                Some(Err(err)) => return Err(err),
                Some(Ok(message)) => {
                    let replies = self.dispatcher.dispatch(Direction::Incoming, &message);
                    for reply in replies {
                        self.writer.write(reply).await?;
                    }
                    return Ok(message);
                }
            }
        }
    }
}

/// The write side of an IRC connection.
///
/// Cloning is cheap; clones share one sink. Writes are synchronous (each
/// awaits the flush) and serialized by a mutex held only for the write
/// itself, so independent tasks may send concurrently with the read loop.
pub struct Writer<T> {
    sink: Arc<Mutex<MessageSink<T>>>,
    dispatcher: Arc<Dispatcher>,
}

impl<T> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<T> Writer<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Write one message and flush.
    ///
    /// On success the message is dispatched to `Outgoing` subscribers, so
    /// state trackers observe the client's own traffic too.
    pub async fn write(&self, message: Message) -> Result<(), ProtocolError> {
        {
            let mut sink = self.sink.lock().await;
            sink.send(message.clone()).await?;
        }
        self.dispatcher.dispatch(Direction::Outgoing, &message);
        Ok(())
    }

    /// Write a batch of messages, stopping at the first failure.
    ///
    /// The returned [`SendError`] reports how many messages were fully
    /// sent before the failure.
    pub async fn send_all(&self, messages: Vec<Message>) -> Result<usize, SendError> {
        let total = messages.len();
        for (sent, message) in messages.into_iter().enumerate() {
            if let Err(source) = self.write(message).await {
                return Err(SendError { sent, source });
            }
        }
        Ok(total)
    }

    /// Flush and close the write side. No `QUIT` is sent.
    pub async fn close(&self) -> Result<(), ProtocolError> {
        self.sink.lock().await.close().await
    }
}
