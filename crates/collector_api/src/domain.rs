mod stat_ingestion_service;

pub use stat_ingestion_service::*;
