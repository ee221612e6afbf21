//! The network plane: the peer wire protocol (C11), the remote HTTP client,
//! the admission-limited HTTP server (C10), and the peer pool tying client
//! construction and picker memoization together.

pub mod client;
pub mod pool;
pub mod server;
pub mod wire;

pub mod prelude {
    pub use crate::client::RemoteClient;
    pub use crate::pool::{PeerPool, PeerPoolConfig};
    pub use crate::server::serve;
}
