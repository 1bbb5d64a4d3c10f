use sqlx::PgConnection;

use polytag_storage::{
	models::{NewTagging, Tag, TagAssignment, TaggableRef, Tagging},
	queries,
};

use crate::BoxFuture;

type StoreResult<T> = polytag_storage::Result<T>;

/// Persistence operations the tag cache and the reconciler depend on.
pub trait TagStore
where
	Self: Send,
{
	/// Every tagging of `owner` joined with its tag name, in one read.
	fn load_assignments<'a>(
		&'a mut self,
		owner: &'a TaggableRef,
	) -> BoxFuture<'a, StoreResult<Vec<TagAssignment>>>;

	/// Deletes the taggings of `owner` in `context`, or in all contexts for `None`.
	fn delete_taggings<'a>(
		&'a mut self,
		owner: &'a TaggableRef,
		context: Option<&'a str>,
	) -> BoxFuture<'a, StoreResult<u64>>;

	fn find_tags<'a>(&'a mut self, names: &'a [String]) -> BoxFuture<'a, StoreResult<Vec<Tag>>>;

	fn create_tag<'a>(&'a mut self, name: &'a str) -> BoxFuture<'a, StoreResult<Tag>>;

	fn create_tagging<'a>(&'a mut self, new: &'a NewTagging)
	-> BoxFuture<'a, StoreResult<Tagging>>;
}

/// [`TagStore`] over one Postgres connection. Pass `&mut *tx` to run inside a transaction.
pub struct PgTagStore<'c> {
	conn: &'c mut PgConnection,
}
impl<'c> PgTagStore<'c> {
	pub fn new(conn: &'c mut PgConnection) -> Self {
		Self { conn }
	}

	pub fn connection(&mut self) -> &mut PgConnection {
		&mut *self.conn
	}
}
impl TagStore for PgTagStore<'_> {
	fn load_assignments<'a>(
		&'a mut self,
		owner: &'a TaggableRef,
	) -> BoxFuture<'a, StoreResult<Vec<TagAssignment>>> {
		Box::pin(async move { queries::load_assignments(self.conn, owner).await })
	}

	fn delete_taggings<'a>(
		&'a mut self,
		owner: &'a TaggableRef,
		context: Option<&'a str>,
	) -> BoxFuture<'a, StoreResult<u64>> {
		Box::pin(async move { queries::delete_taggings(self.conn, owner, context).await })
	}

	fn find_tags<'a>(&'a mut self, names: &'a [String]) -> BoxFuture<'a, StoreResult<Vec<Tag>>> {
		Box::pin(async move { queries::find_tags_by_names(self.conn, names).await })
	}

	fn create_tag<'a>(&'a mut self, name: &'a str) -> BoxFuture<'a, StoreResult<Tag>> {
		Box::pin(async move { queries::create_tag(self.conn, name).await })
	}

	fn create_tagging<'a>(
		&'a mut self,
		new: &'a NewTagging,
	) -> BoxFuture<'a, StoreResult<Tagging>> {
		Box::pin(async move { queries::insert_tagging(self.conn, new).await })
	}
}
