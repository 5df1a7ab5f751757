//! Data source integrations (Nightscout API, in-memory store).

pub mod memory;
pub mod nightscout;
pub mod source;

pub use memory::MemoryStore;
pub use nightscout::{NightscoutClient, NightscoutConfig};
pub use source::DataSource;
