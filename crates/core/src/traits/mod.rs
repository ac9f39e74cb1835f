pub mod gate;
pub mod lock;
pub mod oracle;
pub mod provider;

pub use gate::ReplicationGate;
pub use lock::DistributedLock;
pub use oracle::JobStatusOracle;
pub use provider::ResourceProvider;
