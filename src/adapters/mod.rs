pub mod espn;
pub mod gamma;
mod http;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use espn::EspnScoreboard;
pub use gamma::GammaMarkets;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::{CycleBatch, LiveScoreSource, MarketSource, SyncStore};
