mod collector_handler;
mod server;

pub use collector_handler::*;
pub use server::*;
