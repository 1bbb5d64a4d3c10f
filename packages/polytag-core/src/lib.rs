pub mod cache;
pub mod parser;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod search;
pub mod store;

mod error;

use std::{future::Future, pin::Pin};

pub use cache::TagState;
pub use error::{Error, FieldError};
pub use parser::{ParseError, TagInput, parse_tags};
pub use query::{Aggregate, Column, Direction, Predicate, Relation, Select, with_tag_context};
pub use reconcile::{ContextReport, ReconcileReport, destroy_taggings, reconcile};
pub use registry::{EntityType, Registry, RegistryBuilder};
pub use search::{
	PopularTag, PopularTagsOptions, TaggedMatch, TaggedWithOptions, popular_tags, select_matches,
	tagged_similar, tagged_with, tagged_with_sifter,
};
pub use store::{PgTagStore, TagStore};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Context every taggable type gets when it declares none.
pub const DEFAULT_CONTEXT: &str = "tag";
