use std::fmt::{Display, Formatter};

use crate::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{context:?} is not a valid tag context for {type_name}.")]
	InvalidContext { context: String, type_name: String },
	#[error("{type_name:?} is not a registered taggable type.")]
	UnknownType { type_name: String },
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	Parse(#[from] ParseError),
	#[error("Validation failed: {}", display_field_errors(.errors))]
	Validation { errors: Vec<FieldError> },
	#[error(transparent)]
	Storage(#[from] polytag_storage::Error),
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(polytag_storage::Error::Sqlx(err))
	}
}

/// A validation error attached to one tag context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
	pub field: String,
	pub message: String,
}
impl Display for FieldError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{} {}", self.field, self.message)
	}
}

fn display_field_errors(errors: &[FieldError]) -> String {
	errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
