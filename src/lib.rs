pub mod directory;
pub mod error;
pub mod format;
pub mod marketplace;
pub mod quote;
pub mod server;
pub mod ticker;
