use std::collections::{HashMap, HashSet};

use serde::Serialize;

use polytag_storage::models::{NewTagging, TaggableRef, TaggerRef};

use crate::{Result, cache::TagState, store::TagStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
	pub contexts: Vec<ContextReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
	pub context: String,
	/// Taggings deleted before the context was rebuilt.
	pub removed: u64,
	pub created_tags: usize,
	pub created_taggings: usize,
}

/// Persists every dirty context of `state`, in the order the contexts were written.
///
/// Each context is replaced as a whole: its taggings are deleted, missing tags are created and one
/// tagging per distinct name is inserted. Validation errors fail before the store is touched. On
/// any error the dirty set and the cached names are left as they were, so the call can be repeated;
/// contexts already replaced by this call stay replaced unless the caller's transaction rolls back.
pub async fn reconcile<S>(state: &mut TagState, store: &mut S) -> Result<ReconcileReport>
where
	S: TagStore + ?Sized,
{
	state.validate()?;

	let owner = state.owner();
	let mut report = ReconcileReport::default();

	for context in state.dirty_contexts() {
		let names = distinct_names(state.desired(context));
		let tagger = state.tagger(context).cloned();
		let context_report = reconcile_context(store, &owner, context, &names, tagger).await?;

		report.contexts.push(context_report);
	}

	state.clear_dirty();

	Ok(report)
}

/// Deletes every tagging of `owner`. Run it when the owning entity is deleted.
pub async fn destroy_taggings<S>(store: &mut S, owner: &TaggableRef) -> Result<u64>
where
	S: TagStore + ?Sized,
{
	let removed = store.delete_taggings(owner, None).await?;

	tracing::info!(
		taggable_type = %owner.taggable_type,
		taggable_id = %owner.taggable_id,
		removed,
		"Destroyed taggings."
	);

	Ok(removed)
}

async fn reconcile_context<S>(
	store: &mut S,
	owner: &TaggableRef,
	context: &str,
	names: &[String],
	tagger: Option<TaggerRef>,
) -> Result<ContextReport>
where
	S: TagStore + ?Sized,
{
	let removed = store.delete_taggings(owner, Some(context)).await?;
	let mut tag_ids = HashMap::with_capacity(names.len());

	if !names.is_empty() {
		for tag in store.find_tags(names).await? {
			tag_ids.insert(tag.name, tag.id);
		}
	}

	let mut created_tags = 0;

	for name in names {
		if tag_ids.contains_key(name) {
			continue;
		}

		let tag = store.create_tag(name).await?;

		tag_ids.insert(tag.name, tag.id);

		created_tags += 1;
	}

	let mut created_taggings = 0;

	for name in names {
		let Some(tag_id) = tag_ids.get(name).copied() else {
			continue;
		};
		let new = NewTagging {
			tag_id,
			taggable: owner.clone(),
			context: context.to_string(),
			tagger: tagger.clone(),
		};

		store.create_tagging(&new).await?;

		created_taggings += 1;
	}

	tracing::info!(
		taggable_type = %owner.taggable_type,
		taggable_id = %owner.taggable_id,
		context,
		removed,
		created_tags,
		created_taggings,
		"Reconciled tag context."
	);

	Ok(ContextReport { context: context.to_string(), removed, created_tags, created_taggings })
}

/// First occurrence of every non-blank name, in input order.
fn distinct_names(names: &[String]) -> Vec<String> {
	let mut seen = HashSet::with_capacity(names.len());

	names
		.iter()
		.filter(|name| !name.trim().is_empty())
		.filter(|name| seen.insert(name.as_str()))
		.cloned()
		.collect()
}
