use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::query::Relation;

/// A column qualified by the table (or derived-table alias) it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
	table: String,
	name: String,
}
impl Column {
	pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
		Self { table: table.into(), name: name.into() }
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn equals(&self, value: impl Into<Value>) -> Predicate {
		Predicate::Eq(self.clone(), value.into())
	}

	pub fn not_equals(&self, value: impl Into<Value>) -> Predicate {
		Predicate::NotEq(self.clone(), value.into())
	}

	pub fn at_least(&self, value: impl Into<Value>) -> Predicate {
		Predicate::Gte(self.clone(), value.into())
	}

	pub fn any_of(&self, values: &[String]) -> Predicate {
		Predicate::AnyOf(self.clone(), values.to_vec())
	}

	pub fn equals_column(&self, other: &Column) -> Predicate {
		Predicate::ColumnsEq(self.clone(), other.clone())
	}

	pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		builder.push(&self.table).push(".").push(&self.name);
	}
}

/// A value bound as a query parameter. Values never reach the SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Text(String),
	Int(i64),
	Uuid(Uuid),
}
impl Value {
	fn push_bind(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		match self {
			Self::Text(value) => builder.push_bind(value.clone()),
			Self::Int(value) => builder.push_bind(*value),
			Self::Uuid(value) => builder.push_bind(*value),
		};
	}
}
impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}
impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}
impl From<&String> for Value {
	fn from(value: &String) -> Self {
		Self::Text(value.clone())
	}
}
impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<Uuid> for Value {
	fn from(value: Uuid) -> Self {
		Self::Uuid(value)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
	False,
	Eq(Column, Value),
	NotEq(Column, Value),
	Gte(Column, Value),
	/// `column = ANY($n)` over a text array.
	AnyOf(Column, Vec<String>),
	ColumnsEq(Column, Column),
	And(Vec<Predicate>),
	Or(Vec<Predicate>),
	/// `column IN (subquery)`, the sifter form of a closed relation.
	InSubquery(Column, Box<Relation>),
}
impl Predicate {
	pub fn and(self, other: Predicate) -> Self {
		match self {
			Self::And(mut parts) => {
				parts.push(other);

				Self::And(parts)
			},
			this => Self::And(vec![this, other]),
		}
	}

	/// OR-combines `parts`. `None` when there is nothing to combine.
	pub fn any(parts: impl IntoIterator<Item = Predicate>) -> Option<Self> {
		let mut parts = parts.into_iter().collect::<Vec<_>>();

		match parts.len() {
			0 => None,
			1 => parts.pop(),
			_ => Some(Self::Or(parts)),
		}
	}

	pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
		match self {
			Self::False => {
				builder.push("FALSE");
			},
			Self::Eq(column, value) => push_comparison(builder, column, " = ", value),
			Self::NotEq(column, value) => push_comparison(builder, column, " <> ", value),
			Self::Gte(column, value) => push_comparison(builder, column, " >= ", value),
			Self::AnyOf(column, values) => {
				column.push_sql(builder);
				builder.push(" = ANY(").push_bind(values.clone()).push(")");
			},
			Self::ColumnsEq(left, right) => {
				left.push_sql(builder);
				builder.push(" = ");
				right.push_sql(builder);
			},
			Self::And(parts) => push_joined(builder, parts, " AND ", "TRUE"),
			Self::Or(parts) => push_joined(builder, parts, " OR ", "FALSE"),
			Self::InSubquery(column, relation) => {
				column.push_sql(builder);
				builder.push(" IN (");
				relation.push_sql(builder);
				builder.push(")");
			},
		}
	}
}

fn push_comparison(
	builder: &mut QueryBuilder<'_, Postgres>,
	column: &Column,
	op: &str,
	value: &Value,
) {
	column.push_sql(builder);
	builder.push(op);
	value.push_bind(builder);
}

fn push_joined(
	builder: &mut QueryBuilder<'_, Postgres>,
	parts: &[Predicate],
	separator: &str,
	empty: &str,
) {
	match parts {
		[] => {
			builder.push(empty);
		},
		[only] => only.push_sql(builder),
		_ => {
			builder.push("(");

			for (idx, part) in parts.iter().enumerate() {
				if idx > 0 {
					builder.push(separator);
				}

				part.push_sql(builder);
			}

			builder.push(")");
		},
	}
}
