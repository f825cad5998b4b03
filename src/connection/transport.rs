use std::io::ErrorKind;
use std::time::Duration;
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use crate::{Error, Result};
use crate::connection::TransportTarget;

/// Ordered, reliable byte delivery underneath a connection
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Write all of `data`
    async fn send_data(&self, data: &[u8]) -> Result<()>;

    /// Next piece of received data. End of stream is an error.
    async fn receive_data(&self) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// TCP transport, optionally wrapped in TLS
pub struct TcpTransport {
    reader: Mutex<BoxedReader>,
    writer: Mutex<BoxedWriter>,
    read_size: usize,
}

impl TcpTransport {
    /// Connect to the target, negotiating TLS for `rtmps`
    pub async fn connect(
        target: &TransportTarget,
        connect_timeout: Duration,
        read_size: usize,
    ) -> Result<Self> {
        let addr = target.address();

        // Connect with timeout
        let stream = match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Error::connection(format!("Failed to connect to {}: {}", addr, e))),
            Err(_) => return Err(Error::connection(format!("Timed out connecting to {}", addr))),
        };

        // Set TCP options
        stream.set_nodelay(true)?;

        if !target.tls {
            info!("Connected to {}", target);
            return Ok(TcpTransport::from_stream(stream, read_size));
        }

        let connector = native_tls::TlsConnector::new()
            .map_err(|e| Error::connection(format!("TLS setup failed: {}", e)))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let stream = connector
            .connect(&target.host, stream)
            .await
            .map_err(|e| Error::connection(format!("TLS handshake with {} failed: {}", addr, e)))?;

        info!("Connected to {} over TLS", target);
        Ok(TcpTransport::from_stream(stream, read_size))
    }

    /// Wrap an already established stream
    pub fn from_stream<S>(stream: S, read_size: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        TcpTransport {
            reader: Mutex::new(Box::new(reader)),
            writer: Mutex::new(Box::new(writer)),
            read_size: read_size.max(1),
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send_data(&self, data: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(data).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive_data(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.read_size];
        let n = self.reader.lock().await.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "Connection closed by peer",
            )));
        }
        buf.truncate(n);
        Ok(buf)
    }

    async fn close(&self) -> Result<()> {
        debug!("Shutting down transport");
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}
