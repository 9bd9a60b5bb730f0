//! The abstract transport capability (spec §6): `recv`, `send`, optional
//! `sendfile`, and a `timeout` combinator, implemented once here over
//! `tokio::io::{AsyncRead, AsyncWrite}` so the protocol crates never touch a
//! concrete socket type directly — grounded in `rama-core`'s habit of
//! putting the I/O seam behind a trait rather than hard-wiring `TcpStream`.

use bytes::Buf;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use weft_types::WeftError;

/// A bidirectional byte stream a protocol connection task drives.
///
/// `recv`/`send` mirror spec §6 exactly: `recv` returns the number of bytes
/// read (`0` is a clean peer close, not an error); `send` loops internally
/// until the buffer is fully drained, so callers never see a partial write.
#[async_trait::async_trait]
pub trait AsyncIo: Send + Sync + Unpin {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError>;

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError>;

    /// Kernel-assisted file-to-socket transfer. The default implementation
    /// falls back to `read`+`send` in chunks, as spec §6 allows ("on
    /// absence, writer falls back to read+send").
    async fn sendfile(
        &mut self,
        file: &mut tokio::fs::File,
        len: u64,
        chunk_size: usize,
    ) -> Result<u64, WeftError> {
        let mut remaining = len;
        let mut sent = 0u64;
        let mut buf = vec![0u8; chunk_size.max(1)];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = file
                .read(&mut buf[..want])
                .await
                .map_err(WeftError::RecvError)?;
            if n == 0 {
                break;
            }
            self.send(&buf[..n]).await?;
            sent += n as u64;
            remaining -= n as u64;
        }
        Ok(sent)
    }
}

/// Blanket transport wrapping any `AsyncRead + AsyncWrite`, e.g.
/// `tokio::net::TcpStream` or a `tokio_rustls::server::TlsStream`.
pub struct Transport<S> {
    inner: S,
}

impl<S> Transport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

#[async_trait::async_trait]
impl<S> AsyncIo for Transport<S>
where
    S: AsyncRead + AsyncWrite + Send + Sync + Unpin,
{
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
        self.inner.read(buf).await.map_err(WeftError::RecvError)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
        self.inner
            .write_all(bytes)
            .await
            .map_err(WeftError::SendError)
    }
}

/// Wraps an inner [`AsyncIo`] with bytes already pulled off the wire but not
/// yet consumed — the protocol negotiator's way of handing unread bytes
/// back to whichever reader takes over next (spec §4.1 step 3's "the caller
/// is expected to transition into HTTP/2 mode preserving the unread bytes",
/// and symmetrically for the post-Upgrade WebSocket/h2c handoff in §4.8).
///
/// `recv` drains `prefix` first, satisfying the caller's buffer from it
/// before ever touching `inner`; once `prefix` is empty this is a
/// transparent passthrough.
pub struct PrefixedIo<IO> {
    prefix: bytes::BytesMut,
    inner: IO,
}

impl<IO> PrefixedIo<IO> {
    pub fn new(prefix: bytes::BytesMut, inner: IO) -> Self {
        Self { prefix, inner }
    }

    pub fn into_inner(self) -> IO {
        self.inner
    }
}

#[async_trait::async_trait]
impl<IO: AsyncIo> AsyncIo for PrefixedIo<IO> {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
        if !self.prefix.is_empty() {
            let n = buf.len().min(self.prefix.len());
            buf[..n].copy_from_slice(&self.prefix[..n]);
            self.prefix.advance(n);
            return Ok(n);
        }
        self.inner.recv(buf).await
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
        self.inner.send(bytes).await
    }

    async fn sendfile(
        &mut self,
        file: &mut tokio::fs::File,
        len: u64,
        chunk_size: usize,
    ) -> Result<u64, WeftError> {
        self.inner.sendfile(file, len, chunk_size).await
    }
}

/// Lets two owning halves — typically an HTTP/1.1 `Reader` and `Writer` —
/// share one physical socket across a keep-alive loop.
///
/// Neither `weft-h1`'s reader nor its writer borrows its transport; each
/// takes one by value, the same way `rama-http-core`'s `h1::Connection`
/// holds its `TokioIo` outright. A keep-alive connection needs both at once,
/// so this wraps the real transport in `Arc<tokio::sync::Mutex<_>>` and
/// hands out cheap clones — safe because request reads and response writes
/// on one connection never overlap (spec §5's per-connection model is
/// strictly sequential), so the lock is never actually contended.
pub struct SharedIo<IO> {
    inner: std::sync::Arc<tokio::sync::Mutex<IO>>,
}

impl<IO> SharedIo<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            inner: std::sync::Arc::new(tokio::sync::Mutex::new(io)),
        }
    }
}

impl<IO> Clone for SharedIo<IO> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[async_trait::async_trait]
impl<IO: AsyncIo> AsyncIo for SharedIo<IO> {
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
        self.inner.lock().await.recv(buf).await
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
        self.inner.lock().await.send(bytes).await
    }

    async fn sendfile(
        &mut self,
        file: &mut tokio::fs::File,
        len: u64,
        chunk_size: usize,
    ) -> Result<u64, WeftError> {
        self.inner.lock().await.sendfile(file, len, chunk_size).await
    }
}

/// Races `fut` against a duration, mapping expiry to `err`.
///
/// `duration = None` means "no timeout" (spec §6: "negative = no timeout"),
/// in which case `fut` is simply awaited to completion.
pub async fn timeout<F, T>(
    duration: Option<Duration>,
    fut: F,
    err: impl FnOnce() -> WeftError,
) -> Result<T, WeftError>
where
    F: Future<Output = T>,
{
    match duration {
        None => Ok(fut.await),
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| err()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedIo(VecDeque<Vec<u8>>);

    #[async_trait::async_trait]
    impl AsyncIo for ScriptedIo {
        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
            match self.0.pop_front() {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        async fn send(&mut self, _bytes: &[u8]) -> Result<(), WeftError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_prefix_before_falling_through_to_inner() {
        let inner = ScriptedIo(VecDeque::from([b"world".to_vec()]));
        let mut io = PrefixedIo::new(bytes::BytesMut::from(&b"hello"[..]), inner);

        let mut buf = [0u8; 5];
        let n = io.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        let mut buf = [0u8; 5];
        let n = io.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"world");
    }

    #[tokio::test]
    async fn empty_prefix_is_a_transparent_passthrough() {
        let inner = ScriptedIo(VecDeque::from([b"x".to_vec()]));
        let mut io = PrefixedIo::new(bytes::BytesMut::new(), inner);
        let mut buf = [0u8; 1];
        let n = io.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"x");
    }

    #[tokio::test]
    async fn shared_io_clones_see_each_others_writes() {
        #[derive(Default)]
        struct RecordingIo(Vec<u8>);

        #[async_trait::async_trait]
        impl AsyncIo for RecordingIo {
            async fn recv(&mut self, _buf: &mut [u8]) -> Result<usize, WeftError> {
                Ok(0)
            }

            async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
                self.0.extend_from_slice(bytes);
                Ok(())
            }
        }

        let mut a = SharedIo::new(RecordingIo::default());
        let mut b = a.clone();
        a.send(b"hello ").await.unwrap();
        b.send(b"world").await.unwrap();
        assert_eq!(a.inner.lock().await.0, b"hello world");
    }
}
