mod attribute_record_store;
mod client;
mod config;
mod migration;

pub use attribute_record_store::*;
pub use client::*;
pub use config::*;
pub use migration::*;
