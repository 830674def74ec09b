pub mod collector_api;
pub mod domain;
pub mod http;

pub use collector_api::*;
pub use domain::*;
pub use http::*;
