//! Immutable query values for tag searches.
//!
//! A query moves through three shapes. [`Select`] is an open query that can be joined and
//! filtered. [`Select::count_and_regroup`] turns it into an [`Aggregate`]: grouped by every natural
//! column, counting matches into `tags_count`, ordered by that count. An aggregate exposes no
//! filtering at all; [`Aggregate::materialize`] closes it into a [`Relation`], a derived table that
//! can be filtered, ordered, limited, executed, or embedded as a sifter. Aggregating again requires
//! going back through [`Relation::into_select`].

pub mod expr;

pub use expr::{Column, Predicate, Value};

use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder, postgres::PgRow};

use crate::Result;

pub const TAGS_TABLE: &str = "tags";
pub const TAGGINGS_TABLE: &str = "taggings";
/// Name of the derived count column.
pub const TAGS_COUNT: &str = "tags_count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}
impl Direction {
	fn as_sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Source {
	Table(String),
	Derived(Box<Relation>),
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
	table: String,
	on: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
	source: Source,
	alias: String,
	key: String,
	columns: Vec<String>,
	joins: Vec<Join>,
	filters: Vec<Predicate>,
}
impl Select {
	/// Starts a query over `table`. `columns` are its natural columns and must include `key`.
	pub fn from_table(
		table: impl Into<String>,
		key: impl Into<String>,
		columns: impl IntoIterator<Item = impl Into<String>>,
	) -> Self {
		let table = table.into();

		Self {
			source: Source::Table(table.clone()),
			alias: table,
			key: key.into(),
			columns: columns.into_iter().map(Into::into).collect(),
			joins: vec![],
			filters: vec![],
		}
	}

	pub fn column(&self, name: &str) -> Column {
		Column::new(&self.alias, name)
	}

	pub fn key(&self) -> Column {
		self.column(&self.key)
	}

	pub fn inner_join(mut self, table: impl Into<String>, on: Predicate) -> Self {
		self.joins.push(Join { table: table.into(), on });

		self
	}

	pub fn filter(mut self, predicate: Predicate) -> Self {
		self.filters.push(predicate);

		self
	}

	pub fn filter_opt(self, predicate: Option<Predicate>) -> Self {
		match predicate {
			Some(predicate) => self.filter(predicate),
			None => self,
		}
	}

	/// Count-and-Regroup over tagging rows: counts distinct `taggings.id`.
	pub fn count_and_regroup(self) -> Aggregate {
		self.count_and_regroup_by(Column::new(TAGGINGS_TABLE, "id"))
	}

	/// Count-and-Regroup with an explicit counted column.
	pub fn count_and_regroup_by(self, counted: Column) -> Aggregate {
		Aggregate { select: self, counted }
	}

	fn push_from_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		builder.push(" FROM ");

		match &self.source {
			Source::Table(table) => {
				builder.push(table);
			},
			Source::Derived(relation) => {
				builder.push("(");
				relation.push_sql(builder);
				builder.push(") AS ").push(&self.alias);
			},
		}

		for join in &self.joins {
			builder.push(" INNER JOIN ").push(&join.table).push(" ON ");
			join.on.push_sql(builder);
		}

		push_where(builder, &self.filters);
	}
}

/// A grouped query carrying `tags_count`. Close it with [`Aggregate::materialize`] before
/// filtering on the count or composing it further.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
	select: Select,
	counted: Column,
}
impl Aggregate {
	pub fn materialize(self) -> Relation {
		let alias = self.select.alias.clone();
		let key = self.select.key.clone();
		let mut columns = self.select.columns.clone();

		columns.push(TAGS_COUNT.to_string());

		Relation {
			order: vec![(Column::new(&alias, TAGS_COUNT), Direction::Desc)],
			inner: Box::new(self),
			alias,
			key,
			columns,
			projection: vec![],
			filters: vec![],
			limit: None,
		}
	}

	fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		let select = &self.select;

		builder.push("SELECT ");

		for column in &select.columns {
			select.column(column).push_sql(builder);
			builder.push(", ");
		}

		builder.push("COUNT(DISTINCT ");
		self.counted.push_sql(builder);
		builder.push(") AS ").push(TAGS_COUNT);
		select.push_from_where(builder);
		builder.push(" GROUP BY ");

		for (idx, column) in select.columns.iter().enumerate() {
			if idx > 0 {
				builder.push(", ");
			}

			select.column(column).push_sql(builder);
		}

		builder.push(" ORDER BY ").push(TAGS_COUNT).push(" DESC");
	}
}

#[derive(Debug, Clone, PartialEq)]
struct SelectItem {
	column: String,
	alias: Option<String>,
}

/// A closed aggregate: behaves as a plain table of the natural columns plus `tags_count`.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
	inner: Box<Aggregate>,
	alias: String,
	key: String,
	columns: Vec<String>,
	projection: Vec<SelectItem>,
	filters: Vec<Predicate>,
	order: Vec<(Column, Direction)>,
	limit: Option<i64>,
}
impl Relation {
	pub fn column(&self, name: &str) -> Column {
		Column::new(&self.alias, name)
	}

	pub fn key(&self) -> Column {
		self.column(&self.key)
	}

	pub fn tags_count(&self) -> Column {
		self.column(TAGS_COUNT)
	}

	pub fn filter(mut self, predicate: Predicate) -> Self {
		self.filters.push(predicate);

		self
	}

	/// Adds an ordering key after the existing ones (`tags_count DESC` comes first).
	pub fn order_by(mut self, column: Column, direction: Direction) -> Self {
		self.order.push((column, direction));

		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);

		self
	}

	/// Restricts the output columns. Without a projection every column is returned.
	pub fn select_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.projection = columns
			.into_iter()
			.map(|column| SelectItem { column: column.into(), alias: None })
			.collect();

		self
	}

	pub fn select_ids(self) -> Self {
		let key = self.key.clone();

		self.select_columns([key])
	}

	pub fn select_as(mut self, column: impl Into<String>, alias: impl Into<String>) -> Self {
		self.projection.push(SelectItem { column: column.into(), alias: Some(alias.into()) });

		self
	}

	/// `key IN (SELECT key FROM <this relation>)`, for embedding inside another query's filter.
	pub fn into_sifter(self) -> Predicate {
		let column = self.key();
		let mut relation = self.select_ids();

		relation.order.clear();

		Predicate::InSubquery(column, Box::new(relation))
	}

	/// Re-opens the relation as the source of a new query, so it can be joined and aggregated
	/// again. The old `tags_count` stays usable in this relation's own filters only.
	pub fn into_select(self) -> Select {
		let alias = self.alias.clone();
		let key = self.key.clone();
		let visible = if self.projection.is_empty() {
			self.columns.clone()
		} else {
			self.projection
				.iter()
				.map(|item| item.alias.clone().unwrap_or_else(|| item.column.clone()))
				.collect()
		};
		// The previous count is replaced by the next aggregation's count.
		let columns = visible.into_iter().filter(|column| column != TAGS_COUNT).collect();

		Select {
			source: Source::Derived(Box::new(self)),
			alias,
			key,
			columns,
			joins: vec![],
			filters: vec![],
		}
	}

	pub fn to_sql(&self) -> String {
		let mut builder = QueryBuilder::<Postgres>::new("");

		self.push_sql(&mut builder);

		builder.sql().to_string()
	}

	pub async fn fetch_all<T>(&self, executor: &mut PgConnection) -> Result<Vec<T>>
	where
		T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
	{
		let mut builder = QueryBuilder::<Postgres>::new("");

		self.push_sql(&mut builder);

		let rows = builder.build_query_as::<T>().fetch_all(&mut *executor).await?;

		Ok(rows)
	}

	pub(crate) fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		builder.push("SELECT ");

		if self.projection.is_empty() {
			builder.push("*");
		}

		for (idx, item) in self.projection.iter().enumerate() {
			if idx > 0 {
				builder.push(", ");
			}

			self.column(&item.column).push_sql(builder);

			if let Some(alias) = &item.alias {
				builder.push(" AS ").push(alias);
			}
		}

		builder.push(" FROM (");
		self.inner.push_sql(builder);
		builder.push(") AS ").push(&self.alias);
		push_where(builder, &self.filters);

		for (idx, (column, direction)) in self.order.iter().enumerate() {
			builder.push(if idx == 0 { " ORDER BY " } else { ", " });
			column.push_sql(builder);
			builder.push(" ").push(direction.as_sql());
		}

		if let Some(limit) = self.limit {
			builder.push(" LIMIT ").push_bind(limit);
		}
	}
}

/// OR-combines `taggings.context = ?` over `contexts`. No contexts means no restriction.
pub fn with_tag_context(contexts: &[String]) -> Option<Predicate> {
	let context = Column::new(TAGGINGS_TABLE, "context");

	Predicate::any(contexts.iter().map(|name| context.equals(name)))
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, filters: &[Predicate]) {
	for (idx, filter) in filters.iter().enumerate() {
		builder.push(if idx == 0 { " WHERE " } else { " AND " });
		filter.push_sql(builder);
	}
}
