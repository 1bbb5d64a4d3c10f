//! Tag searches: entities by tag name, entities similar to one entity, tags by popularity.
//!
//! Every search joins the tagging rows, filters them, and closes the result with
//! Count-and-Regroup, so `tags_count` can be filtered and ordered like a plain column.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::{
	DEFAULT_CONTEXT, Error, Result,
	query::{Column, Predicate, Relation, Select, TAGGINGS_TABLE, TAGS_COUNT, TAGS_TABLE},
	registry::EntityType,
	with_tag_context,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedWithOptions {
	/// Contexts to search. Empty searches every context.
	pub on: Vec<String>,
	/// Require every requested name. Takes precedence over `min`.
	pub all: bool,
	/// Require at least this many of the requested names.
	pub min: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopularTagsOptions {
	pub on: Vec<String>,
	pub min: Option<i64>,
}

/// Row shape of `tagged_with` and `tagged_similar` after [`Relation::select_as`] on the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TaggedMatch {
	pub id: Uuid,
	pub tags_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PopularTag {
	pub id: Uuid,
	pub name: String,
	pub tags_count: i64,
}

/// Entities of `entity` tagged with any of `names`, each with the number of distinct requested
/// names it carries as `tags_count`.
pub fn tagged_with(
	entity: &EntityType,
	names: &[String],
	options: &TaggedWithOptions,
) -> Result<Relation> {
	ensure_contexts(entity, &options.on)?;

	let names = distinct(names);
	let relation = tagged_base(entity)
		.filter(tag_column("name").any_of(&names))
		.filter_opt(with_tag_context(&options.on))
		.count_and_regroup_by(tag_column("id"))
		.materialize();
	let count = relation.tags_count();

	if options.all {
		let required = i64::try_from(names.len())
			.map_err(|_| Error::InvalidArgument("too many tag names".to_string()))?;

		return Ok(relation.filter(count.equals(required)));
	}
	if let Some(min) = options.min {
		return Ok(relation.filter(count.at_least(min)));
	}

	Ok(relation)
}

/// [`tagged_with`] as a `key IN (...)` predicate for another query over the same table.
pub fn tagged_with_sifter(
	entity: &EntityType,
	names: &[String],
	options: &TaggedWithOptions,
) -> Result<Predicate> {
	Ok(tagged_with(entity, names, options)?.into_sifter())
}

/// Other entities of `entity` sharing tags with the instance `taggable_id`, whose current names
/// per context are `own`.
///
/// `on` restricts the comparison to one declared context. Without it, an entity type with more
/// than one declared context leaves out the default `tag` context.
pub fn tagged_similar(
	entity: &EntityType,
	taggable_id: Uuid,
	own: &HashMap<String, Vec<String>>,
	on: Option<&str>,
) -> Result<Relation> {
	let contexts = match on {
		Some(on) => {
			entity.ensure_context(on)?;

			vec![on]
		},
		None => entity.contexts().iter().map(String::as_str).collect(),
	};
	let contexts: Vec<&str> = if contexts.len() > 1 {
		contexts.into_iter().filter(|context| *context != DEFAULT_CONTEXT).collect()
	} else {
		contexts
	};
	let context_column = tagging_column("context");
	let conditions = contexts.into_iter().filter_map(|context| {
		let names = own.get(context).filter(|names| !names.is_empty())?;

		Some(tag_column("name").any_of(names).and(context_column.equals(context)))
	});
	let condition = Predicate::any(conditions).unwrap_or(Predicate::False);
	let base = tagged_base(entity);
	let itself = base.key().not_equals(taggable_id);

	Ok(base.filter(condition).filter(itself).count_and_regroup().materialize())
}

/// Tags used by entities of `entity`, most used first, with the usage count as `tags_count`.
pub fn popular_tags(entity: &EntityType, options: &PopularTagsOptions) -> Result<Relation> {
	ensure_contexts(entity, &options.on)?;

	let relation = Select::from_table(TAGS_TABLE, "id", ["id", "name"])
		.inner_join(TAGGINGS_TABLE, tagging_column("tag_id").equals_column(&tag_column("id")))
		.filter_opt(with_tag_context(&options.on))
		.filter(tagging_column("taggable_type").equals(entity.type_name()))
		.count_and_regroup()
		.materialize();
	let count = relation.tags_count();

	match options.min {
		Some(min) => Ok(relation.filter(count.at_least(min))),
		None => Ok(relation),
	}
}

/// Projection matching [`TaggedMatch`].
pub fn select_matches(relation: Relation) -> Relation {
	let key = relation.key();

	relation.select_as(key.name(), "id").select_as(TAGS_COUNT, TAGS_COUNT)
}

/// `entity INNER JOIN taggings INNER JOIN tags`, restricted to taggings of this entity type.
fn tagged_base(entity: &EntityType) -> Select {
	let select = Select::from_table(entity.table(), entity.primary_key(), entity.columns());
	let owner = tagging_column("taggable_id")
		.equals_column(&select.key())
		.and(tagging_column("taggable_type").equals(entity.type_name()));

	select
		.inner_join(TAGGINGS_TABLE, owner)
		.inner_join(TAGS_TABLE, tag_column("id").equals_column(&tagging_column("tag_id")))
}

fn ensure_contexts(entity: &EntityType, contexts: &[String]) -> Result<()> {
	for context in contexts {
		entity.ensure_context(context)?;
	}

	Ok(())
}

fn distinct(names: &[String]) -> Vec<String> {
	let mut seen = HashSet::with_capacity(names.len());

	names.iter().filter(|name| seen.insert(name.as_str())).cloned().collect()
}

fn tag_column(name: &str) -> Column {
	Column::new(TAGS_TABLE, name)
}

fn tagging_column(name: &str) -> Column {
	Column::new(TAGGINGS_TABLE, name)
}
