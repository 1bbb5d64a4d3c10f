use std::{
	collections::HashMap,
	sync::{Arc, OnceLock},
};

use regex::Regex;

use crate::{DEFAULT_CONTEXT, Error, Result};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// A taggable entity type: where its rows live and which tag contexts it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityType {
	type_name: String,
	table: String,
	primary_key: String,
	columns: Vec<String>,
	contexts: Vec<String>,
}
impl EntityType {
	pub fn new(
		type_name: impl Into<String>,
		table: impl Into<String>,
		columns: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		Self {
			type_name: type_name.into(),
			table: table.into(),
			primary_key: "id".to_string(),
			columns: columns.into_iter().map(Into::into).collect(),
			contexts: vec![],
		}
	}

	pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
		self.primary_key = primary_key.into();

		self
	}

	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn primary_key(&self) -> &str {
		&self.primary_key
	}

	pub fn columns(&self) -> &[String] {
		&self.columns
	}

	/// Declared contexts in declaration order.
	pub fn contexts(&self) -> &[String] {
		&self.contexts
	}

	pub fn has_context(&self, context: &str) -> bool {
		self.contexts.iter().any(|declared| declared == context)
	}

	pub fn ensure_context(&self, context: &str) -> Result<()> {
		if self.has_context(context) {
			return Ok(());
		}

		Err(Error::InvalidContext {
			context: context.to_string(),
			type_name: self.type_name.clone(),
		})
	}

	fn add_context(&mut self, context: &str) {
		if !self.has_context(context) {
			self.contexts.push(context.to_string());
		}
	}
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
	types: Vec<EntityType>,
}
impl RegistryBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an entity type. Registering the same type name again replaces its table layout and
	/// keeps the contexts declared so far.
	pub fn register_type(&mut self, entity: EntityType) -> &mut Self {
		match self.types.iter_mut().find(|known| known.type_name == entity.type_name) {
			Some(known) => {
				let contexts = std::mem::take(&mut known.contexts);

				*known = entity;

				for context in contexts {
					known.add_context(&context);
				}
			},
			None => self.types.push(entity),
		}

		self
	}

	/// Declares a context on a registered type. Declaring it twice is a no-op.
	pub fn register_context(&mut self, type_name: &str, context: &str) -> Result<&mut Self> {
		let Some(entity) = self.types.iter_mut().find(|known| known.type_name == type_name) else {
			return Err(Error::UnknownType { type_name: type_name.to_string() });
		};

		entity.add_context(context);

		Ok(self)
	}

	pub fn build(self) -> Result<Registry> {
		let mut types = HashMap::with_capacity(self.types.len());

		for mut entity in self.types {
			validate_entity(&entity)?;

			if entity.contexts.is_empty() {
				entity.add_context(DEFAULT_CONTEXT);
			}

			types.insert(entity.type_name.clone(), Arc::new(entity));
		}

		Ok(Registry { types })
	}
}

/// Read-only map from type name to its taggable declaration.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	types: HashMap<String, Arc<EntityType>>,
}
impl Registry {
	pub fn builder() -> RegistryBuilder {
		RegistryBuilder::new()
	}

	pub fn from_config(taggables: &[polytag_config::Taggable]) -> Result<Self> {
		let mut builder = RegistryBuilder::new();

		for taggable in taggables {
			builder.register_type(
				EntityType::new(&taggable.type_name, &taggable.table, &taggable.columns)
					.with_primary_key(&taggable.primary_key),
			);

			for context in &taggable.contexts {
				builder.register_context(&taggable.type_name, context)?;
			}
		}

		builder.build()
	}

	pub fn entity(&self, type_name: &str) -> Result<Arc<EntityType>> {
		self.types
			.get(type_name)
			.cloned()
			.ok_or_else(|| Error::UnknownType { type_name: type_name.to_string() })
	}

	pub fn contexts(&self, type_name: &str) -> Result<&[String]> {
		self.types
			.get(type_name)
			.map(|entity| entity.contexts())
			.ok_or_else(|| Error::UnknownType { type_name: type_name.to_string() })
	}

	pub fn type_names(&self) -> impl Iterator<Item = &str> {
		self.types.keys().map(String::as_str)
	}
}

/// Installs the process-wide registry. Meant to run once during startup.
pub fn install(registry: Registry) -> Result<&'static Registry> {
	GLOBAL
		.set(registry)
		.map_err(|_| Error::InvalidArgument("the tag registry is already installed".to_string()))?;

	GLOBAL
		.get()
		.ok_or_else(|| Error::InvalidArgument("the tag registry is not installed".to_string()))
}

fn validate_entity(entity: &EntityType) -> Result<()> {
	if entity.type_name.trim().is_empty() {
		return Err(Error::InvalidArgument("taggable type name must not be empty".to_string()));
	}

	let identifier_re = Regex::new(IDENTIFIER_PATTERN)
		.map_err(|err| Error::InvalidArgument(format!("identifier pattern: {err}")))?;
	let identifiers = [("table", &entity.table), ("primary key", &entity.primary_key)]
		.into_iter()
		.chain(entity.columns.iter().map(|column| ("column", column)))
		.chain(entity.contexts.iter().map(|context| ("context", context)));

	for (label, identifier) in identifiers {
		if !identifier_re.is_match(identifier) {
			return Err(Error::InvalidArgument(format!(
				"{label} {identifier:?} of {} is not a plain identifier",
				entity.type_name
			)));
		}
	}

	if !entity.columns.iter().any(|column| column == &entity.primary_key) {
		return Err(Error::InvalidArgument(format!(
			"columns of {} must include the primary key {:?}",
			entity.type_name, entity.primary_key
		)));
	}
	if entity.columns.iter().any(|column| column == crate::query::TAGS_COUNT) {
		return Err(Error::InvalidArgument(format!(
			"{} must not declare a column named {}",
			entity.type_name,
			crate::query::TAGS_COUNT
		)));
	}

	Ok(())
}
