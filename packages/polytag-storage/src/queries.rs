use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{NewTagging, Tag, TagAssignment, TaggableRef, Tagging},
};

/// Every tagging of `owner` with its tag name, in creation order per context.
pub async fn load_assignments(
	executor: &mut PgConnection,
	owner: &TaggableRef,
) -> Result<Vec<TagAssignment>> {
	let rows = sqlx::query_as::<_, TagAssignment>(
		"\
SELECT
	taggings.context,
	tags.name
FROM taggings
INNER JOIN tags ON tags.id = taggings.tag_id
WHERE taggings.taggable_type = $1
	AND taggings.taggable_id = $2
ORDER BY taggings.context, taggings.created_at, taggings.id",
	)
	.bind(owner.taggable_type.as_str())
	.bind(owner.taggable_id)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Deletes the taggings of `owner` in `context`, or in every context when `context` is `None`.
pub async fn delete_taggings(
	executor: &mut PgConnection,
	owner: &TaggableRef,
	context: Option<&str>,
) -> Result<u64> {
	let res = sqlx::query(
		"\
DELETE FROM taggings
WHERE taggable_type = $1
	AND taggable_id = $2
	AND ($3::text IS NULL OR context = $3)",
	)
	.bind(owner.taggable_type.as_str())
	.bind(owner.taggable_id)
	.bind(context)
	.execute(&mut *executor)
	.await?;

	Ok(res.rows_affected())
}

pub async fn find_tags_by_names(executor: &mut PgConnection, names: &[String]) -> Result<Vec<Tag>> {
	if names.is_empty() {
		return Ok(vec![]);
	}

	let names = names.to_vec();
	let rows = sqlx::query_as::<_, Tag>(
		"\
SELECT
	id,
	name,
	created_at
FROM tags
WHERE name = ANY($1::text[])",
	)
	.bind(&names)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Creates a tag, or returns the existing row when another writer created the name first.
pub async fn create_tag(executor: &mut PgConnection, name: &str) -> Result<Tag> {
	if name.trim().is_empty() {
		return Err(Error::InvalidArgument("tag name must not be empty".to_string()));
	}

	let row = sqlx::query_as::<_, Tag>(
		"\
INSERT INTO tags (id, name, created_at)
VALUES ($1, $2, now())
ON CONFLICT (name) DO UPDATE
SET name = EXCLUDED.name
RETURNING
	id,
	name,
	created_at",
	)
	.bind(Uuid::new_v4())
	.bind(name)
	.fetch_one(&mut *executor)
	.await?;

	Ok(row)
}

pub async fn insert_tagging(executor: &mut PgConnection, new: &NewTagging) -> Result<Tagging> {
	let (tagger_type, tagger_id) = match &new.tagger {
		Some(tagger) => (Some(tagger.tagger_type.as_str()), Some(tagger.tagger_id)),
		None => (None, None),
	};
	let row = sqlx::query_as::<_, Tagging>(
		"\
INSERT INTO taggings (
	id,
	tag_id,
	taggable_type,
	taggable_id,
	context,
	tagger_type,
	tagger_id
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
RETURNING
	id,
	tag_id,
	taggable_type,
	taggable_id,
	context,
	tagger_type,
	tagger_id,
	created_at",
	)
	.bind(Uuid::new_v4())
	.bind(new.tag_id)
	.bind(new.taggable.taggable_type.as_str())
	.bind(new.taggable.taggable_id)
	.bind(new.context.as_str())
	.bind(tagger_type)
	.bind(tagger_id)
	.fetch_one(&mut *executor)
	.await?;

	Ok(row)
}

/// The taggings of `owner` scoped to one context.
pub async fn list_context_taggings(
	executor: &mut PgConnection,
	owner: &TaggableRef,
	context: &str,
) -> Result<Vec<Tagging>> {
	let rows = sqlx::query_as::<_, Tagging>(
		"\
SELECT
	id,
	tag_id,
	taggable_type,
	taggable_id,
	context,
	tagger_type,
	tagger_id,
	created_at
FROM taggings
WHERE taggable_type = $1
	AND taggable_id = $2
	AND context = $3
ORDER BY created_at, id",
	)
	.bind(owner.taggable_type.as_str())
	.bind(owner.taggable_id)
	.bind(context)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// The tags of `owner` scoped to one context.
pub async fn list_context_tags(
	executor: &mut PgConnection,
	owner: &TaggableRef,
	context: &str,
) -> Result<Vec<Tag>> {
	let rows = sqlx::query_as::<_, Tag>(
		"\
SELECT
	tags.id,
	tags.name,
	tags.created_at
FROM tags
INNER JOIN taggings ON taggings.tag_id = tags.id
WHERE taggings.taggable_type = $1
	AND taggings.taggable_id = $2
	AND taggings.context = $3
ORDER BY taggings.created_at, taggings.id",
	)
	.bind(owner.taggable_type.as_str())
	.bind(owner.taggable_id)
	.bind(context)
	.fetch_all(&mut *executor)
	.await?;

	Ok(rows)
}

/// Deletes tags no tagging points at any more.
pub async fn purge_orphan_tags(executor: &mut PgConnection) -> Result<u64> {
	let res = sqlx::query(
		"\
DELETE FROM tags
WHERE NOT EXISTS (
	SELECT 1
	FROM taggings
	WHERE taggings.tag_id = tags.id
)",
	)
	.execute(&mut *executor)
	.await?;

	if res.rows_affected() > 0 {
		tracing::info!(count = res.rows_affected(), "Purged orphan tags.");
	}

	Ok(res.rows_affected())
}
