//! Request layer - turns `[METHOD] URL [ITEM ...]` into a [`RequestSpec`](crate::models::RequestSpec)

pub mod builder;
pub mod coerce;
pub mod items;
pub mod method;

pub use builder::RequestBuilder;
pub use coerce::coerce;
pub use items::{ItemClassifier, ItemKind};
pub use method::{infer, normalize_url, Invocation};
