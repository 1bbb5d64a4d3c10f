//! Per-instance tag cache and dirty tracking.
//!
//! A [`TagState`] belongs to one in-memory entity instance. The first read or write loads every
//! tagging of the instance in one store call and groups the names by context. Writes replace a
//! context's list and mark it dirty until [`crate::reconcile`] persists it.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use polytag_storage::models::{TaggableRef, TaggerRef};

use crate::{
	Error, FieldError, Result,
	parser::TagInput,
	query::Relation,
	registry::EntityType,
	search,
	store::TagStore,
};

const INVALID_VALUE: &str = "is invalid";

#[derive(Debug, Clone)]
pub struct TagState {
	entity: Arc<EntityType>,
	taggable_id: Uuid,
	cached: Option<HashMap<String, Vec<String>>>,
	dirty: Vec<String>,
	taggers: HashMap<String, TaggerRef>,
	errors: Vec<FieldError>,
}
impl TagState {
	pub fn new(entity: Arc<EntityType>, taggable_id: Uuid) -> Self {
		Self {
			entity,
			taggable_id,
			cached: None,
			dirty: vec![],
			taggers: HashMap::new(),
			errors: vec![],
		}
	}

	pub fn entity(&self) -> &EntityType {
		&self.entity
	}

	pub fn taggable_id(&self) -> Uuid {
		self.taggable_id
	}

	pub fn owner(&self) -> TaggableRef {
		TaggableRef::new(self.entity.type_name(), self.taggable_id)
	}

	pub fn is_cached(&self) -> bool {
		self.cached.is_some()
	}

	/// Loads the cache if it is empty. A failed load leaves the state untouched.
	pub async fn populate<S>(&mut self, store: &mut S) -> Result<()>
	where
		S: TagStore + ?Sized,
	{
		self.loaded(store).await?;

		Ok(())
	}

	/// Names cached for `context`, populating the cache on first access.
	pub async fn read<S>(&mut self, store: &mut S, context: &str) -> Result<&[String]>
	where
		S: TagStore + ?Sized,
	{
		self.entity.ensure_context(context)?;

		let cached = self.loaded(store).await?;

		Ok(cached.get(context).map(Vec::as_slice).unwrap_or(&[]))
	}

	/// Every declared context with its cached names, in declaration order.
	pub async fn read_all<S>(&mut self, store: &mut S) -> Result<Vec<(String, Vec<String>)>>
	where
		S: TagStore + ?Sized,
	{
		let entity = self.entity.clone();
		let cached = self.loaded(store).await?;

		Ok(entity
			.contexts()
			.iter()
			.map(|context| (context.clone(), cached.get(context).cloned().unwrap_or_default()))
			.collect())
	}

	pub async fn write<S>(
		&mut self,
		store: &mut S,
		context: &str,
		input: impl Into<TagInput>,
	) -> Result<()>
	where
		S: TagStore + ?Sized,
	{
		self.write_as(store, context, input, None).await
	}

	/// Replaces the names of `context` and marks it dirty. `tagger` is recorded on every tagging
	/// the next reconciliation creates for this context.
	pub async fn write_as<S>(
		&mut self,
		store: &mut S,
		context: &str,
		input: impl Into<TagInput>,
		tagger: Option<TaggerRef>,
	) -> Result<()>
	where
		S: TagStore + ?Sized,
	{
		self.entity.ensure_context(context)?;

		let names = input.into().into_names()?;
		let cached = self.loaded(store).await?;

		cached.insert(context.to_string(), names);

		if !self.dirty.iter().any(|dirty| dirty == context) {
			self.dirty.push(context.to_string());
		}

		match tagger {
			Some(tagger) => {
				self.taggers.insert(context.to_string(), tagger);
			},
			None => {
				self.taggers.remove(context);
			},
		}

		self.errors.retain(|error| error.field != context);

		Ok(())
	}

	/// Assigns an untyped value. Strings are parsed, arrays of strings are taken as they are and
	/// `null` clears the context. Any other value is recorded as a validation error instead.
	pub async fn assign_value<S>(&mut self, store: &mut S, context: &str, value: &Value) -> Result<()>
	where
		S: TagStore + ?Sized,
	{
		self.entity.ensure_context(context)?;

		let input = match value {
			Value::Null => Some(TagInput::List(vec![])),
			Value::String(raw) => Some(TagInput::Delimited(raw.clone())),
			Value::Array(items) => items
				.iter()
				.map(|item| item.as_str().map(ToString::to_string))
				.collect::<Option<Vec<_>>>()
				.map(TagInput::List),
			_ => None,
		};
		let Some(input) = input else {
			self.errors.retain(|error| error.field != context);
			self.errors.push(FieldError {
				field: context.to_string(),
				message: INVALID_VALUE.to_string(),
			});

			return Ok(());
		};

		self.write(store, context, input).await
	}

	/// Names the next reconciliation persists for `context`. Empty when nothing is cached.
	pub fn desired(&self, context: &str) -> &[String] {
		self.cached
			.as_ref()
			.and_then(|cached| cached.get(context))
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	/// Dirty contexts in the order they were first written.
	pub fn dirty_contexts(&self) -> &[String] {
		&self.dirty
	}

	pub fn is_dirty(&self, context: &str) -> bool {
		self.dirty.iter().any(|dirty| dirty == context)
	}

	pub fn tagger(&self, context: &str) -> Option<&TaggerRef> {
		self.taggers.get(context)
	}

	pub fn errors(&self) -> &[FieldError] {
		&self.errors
	}

	pub fn validate(&self) -> Result<()> {
		if self.errors.is_empty() {
			return Ok(());
		}

		Err(Error::Validation { errors: self.errors.clone() })
	}

	/// Called after a successful reconciliation. Cached names stay as written.
	pub fn clear_dirty(&mut self) {
		self.dirty.clear();
		self.taggers.clear();
	}

	/// Forgets everything held in memory, as after reloading the entity. The next access reads
	/// the persisted taggings again.
	pub fn reset(&mut self) {
		self.cached = None;
		self.dirty.clear();
		self.taggers.clear();
		self.errors.clear();
	}

	/// Entities of the same type sharing tags with this one, ranked by shared tag count.
	pub async fn tagged_similar<S>(&mut self, store: &mut S, on: Option<&str>) -> Result<Relation>
	where
		S: TagStore + ?Sized,
	{
		let entity = self.entity.clone();
		let taggable_id = self.taggable_id;
		let cached = self.loaded(store).await?;

		search::tagged_similar(&entity, taggable_id, cached, on)
	}

	async fn loaded<S>(&mut self, store: &mut S) -> Result<&mut HashMap<String, Vec<String>>>
	where
		S: TagStore + ?Sized,
	{
		let cached = match self.cached.take() {
			Some(cached) => cached,
			None => {
				let owner = self.owner();
				let assignments = store.load_assignments(&owner).await?;
				let mut cached = HashMap::<String, Vec<String>>::new();

				for assignment in assignments {
					cached.entry(assignment.context).or_default().push(assignment.name);
				}

				tracing::debug!(
					taggable_type = %owner.taggable_type,
					taggable_id = %owner.taggable_id,
					contexts = cached.len(),
					"Loaded tag cache."
				);

				cached
			},
		};

		Ok(self.cached.insert(cached))
	}
}
