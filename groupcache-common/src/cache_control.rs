/// Per-request cache directives threaded through the read-through pipeline.
///
/// The origin loader may set `no_store` while filling a miss (`spec.md` §6);
/// when it does, the orchestrator propagates `no_store = true` back to the
/// caller and skips insertion in both the memory and disk caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControl {
    pub no_store: bool,
}

impl CacheControl {
    pub fn new() -> Self {
        Self::default()
    }
}
