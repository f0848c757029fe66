//! Entities and collections
//!
//! Maps the service's feed responses onto typed entities and provides the
//! generic list/get/create/delete operations every collection shares.

mod collection;
mod record;

pub use collection::{Collection, Entity, Refresh};
pub(crate) use collection::fetch_record;
pub use record::{parse_feed, parse_flag, stringify, Content, FieldSpec, Metadata, Record};
