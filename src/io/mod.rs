/*!
# IO utilities

Parquet partition/chunk reading and writing, fixed-size chunking and progress ledgers.
!*/
mod chunks;
mod ledger;
pub mod store;

pub use chunks::Chunks;
pub use ledger::Ledger;
pub use store::ChunkStore;
