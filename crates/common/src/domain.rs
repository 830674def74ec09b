mod attribute;
mod attribute_record;
mod record_store;
mod result;

pub use attribute::*;
pub use attribute_record::*;
pub use record_store::*;
pub use result::*;
