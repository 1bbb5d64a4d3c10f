//! Tokenizer for delimited tag strings.
//!
//! Input is one CSV record with `,` as the delimiter. A field may be quoted to carry the delimiter
//! (`"red, dark"`), and a doubled quote inside a quoted field stands for one quote. Whitespace
//! between the delimiter and an opening quote is skipped, so `red, "dark, red"` and
//! `red,"dark, red"` parse the same. Every field is trimmed and blank fields are dropped.

use std::fmt::{Display, Formatter};

const DELIMITER: char = ',';
const QUOTE: char = '"';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
	/// Character offset into the input.
	pub position: usize,
	pub message: String,
}
impl Display for ParseError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "Malformed tag list at {}: {}", self.position, self.message)
	}
}
impl std::error::Error for ParseError {}

/// A tag list as handed to a context setter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagInput {
	List(Vec<String>),
	Delimited(String),
}
impl TagInput {
	pub fn into_names(self) -> Result<Vec<String>, ParseError> {
		match self {
			Self::List(names) => Ok(names),
			Self::Delimited(raw) => parse_tags(&raw),
		}
	}
}
impl From<Vec<String>> for TagInput {
	fn from(names: Vec<String>) -> Self {
		Self::List(names)
	}
}
impl From<&[&str]> for TagInput {
	fn from(names: &[&str]) -> Self {
		Self::List(names.iter().map(|name| name.to_string()).collect())
	}
}
impl<const N: usize> From<[&str; N]> for TagInput {
	fn from(names: [&str; N]) -> Self {
		Self::List(names.iter().map(|name| name.to_string()).collect())
	}
}
impl From<&str> for TagInput {
	fn from(raw: &str) -> Self {
		Self::Delimited(raw.to_string())
	}
}
impl From<String> for TagInput {
	fn from(raw: String) -> Self {
		Self::Delimited(raw)
	}
}

pub fn parse_tags(raw: &str) -> Result<Vec<String>, ParseError> {
	if raw.is_empty() {
		return Ok(vec![]);
	}

	let chars = raw.chars().collect::<Vec<_>>();
	let mut names = Vec::new();
	let mut pos = 0;

	loop {
		let (field, next) = read_field(&chars, pos)?;
		let name = field.trim();

		if !name.is_empty() {
			names.push(name.to_string());
		}

		match next {
			Some(next) => pos = next,
			None => break,
		}
	}

	Ok(names)
}

/// Reads one field starting at `start`. Returns the raw field text and the offset just past the
/// delimiter, or `None` when the input is exhausted.
fn read_field(chars: &[char], start: usize) -> Result<(String, Option<usize>), ParseError> {
	let mut pos = start;

	while pos < chars.len() && chars[pos].is_whitespace() {
		pos += 1;
	}

	if chars.get(pos) == Some(&QUOTE) {
		return read_quoted(chars, pos);
	}

	let mut field = String::new();

	for (offset, &ch) in chars[start..].iter().enumerate() {
		match ch {
			DELIMITER => return Ok((field, Some(start + offset + 1))),
			QUOTE =>
				return Err(ParseError {
					position: start + offset,
					message: "quote inside an unquoted field".to_string(),
				}),
			_ => field.push(ch),
		}
	}

	Ok((field, None))
}

fn read_quoted(chars: &[char], open: usize) -> Result<(String, Option<usize>), ParseError> {
	let mut field = String::new();
	let mut pos = open + 1;

	loop {
		match chars.get(pos) {
			None =>
				return Err(ParseError {
					position: open,
					message: "unclosed quoted field".to_string(),
				}),
			Some(&QUOTE) if chars.get(pos + 1) == Some(&QUOTE) => {
				field.push(QUOTE);

				pos += 2;
			},
			Some(&QUOTE) => {
				pos += 1;

				break;
			},
			Some(&ch) => {
				field.push(ch);

				pos += 1;
			},
		}
	}

	match chars.get(pos) {
		None => Ok((field, None)),
		Some(&DELIMITER) => Ok((field, Some(pos + 1))),
		Some(_) => Err(ParseError {
			position: pos,
			message: "closing quote must be followed by a delimiter".to_string(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn names(raw: &str) -> Vec<String> {
		parse_tags(raw).expect("Expected tag list to parse.")
	}

	#[test]
	fn empty_input_is_empty_list() {
		assert!(names("").is_empty());
	}

	#[test]
	fn fields_are_trimmed() {
		assert_eq!(names("red, blue ,green"), vec!["red", "blue", "green"]);
	}

	#[test]
	fn quoted_field_keeps_delimiter() {
		assert_eq!(names(r#"hello,"foo, bar""#), vec!["hello", "foo, bar"]);
		assert_eq!(names(r#"hello,   "foo, bar", baz"#), vec!["hello", "foo, bar", "baz"]);
		assert_eq!(names(r#""say ""hi""""#), vec![r#"say "hi""#]);
	}

	#[test]
	fn blank_fields_are_dropped() {
		assert_eq!(names("a,, b, "), vec!["a", "b"]);
	}

	#[test]
	fn list_input_passes_through() {
		let input = TagInput::from(vec![" a ".to_string(), "a".to_string()]);

		assert_eq!(input.into_names().expect("List input never fails."), vec![" a ", "a"]);
	}

	#[test]
	fn unbalanced_quote_fails() {
		let err = parse_tags(r#"red,"blue"#).expect_err("Expected unclosed quote error.");

		assert_eq!(err.position, 4);
		assert!(parse_tags(r#"re"d"#).is_err());
		assert!(parse_tags(r#""red" x,blue"#).is_err());
	}
}
