pub mod config;
pub mod connection;
pub mod consumer;
pub mod replay;
pub mod resolver;
pub mod syncer;

pub use config::{SyncConfig, SyncMode};
pub use connection::{Connection, DialOptions, RollForward, SyncEvent, Transport, TransportKind};
pub use consumer::SyncConsumer;
pub use replay::{PeerCall, ReplayChain, ReplayConnection, ReplayHandle};
pub use resolver::PointResolver;
pub use syncer::{SyncHandle, SyncOrchestrator, SyncOutcome, SyncState, SyncStats};
