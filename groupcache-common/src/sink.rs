//! The byte sink abstraction payloads are streamed through.
//!
//! `spec.md` keeps the origin loader and validator contracts deliberately
//! abstract ("writes to `sink` but must not close it"). Concretely, a sink is
//! anything that can receive successive byte chunks: an in-memory
//! accumulator for the memory cache, a file handle for the disk cache, or an
//! HTTP response body writer in `groupcache-transport`.

use crate::error::Result;

/// An append-only byte destination. Implementations must not assume a single
/// `write_all` call carries the whole payload — origin loaders are free to
/// write in chunks.
#[async_trait::async_trait]
pub trait Sink: Send {
    async fn write_all(&mut self, buf: &[u8]) -> Result<()>;
}

#[async_trait::async_trait]
impl Sink for Vec<u8> {
    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink for bytes::BytesMut {
    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}
