use time::OffsetDateTime;
use uuid::Uuid;

/// Polymorphic reference to a tagged entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggableRef {
	pub taggable_type: String,
	pub taggable_id: Uuid,
}
impl TaggableRef {
	pub fn new(taggable_type: impl Into<String>, taggable_id: Uuid) -> Self {
		Self { taggable_type: taggable_type.into(), taggable_id }
	}
}

/// Who applied a tag. Stored as given, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggerRef {
	pub tagger_type: String,
	pub tagger_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tag {
	pub id: Uuid,
	pub name: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tagging {
	pub id: Uuid,
	pub tag_id: Uuid,
	pub taggable_type: String,
	pub taggable_id: Uuid,
	pub context: String,
	pub tagger_type: Option<String>,
	pub tagger_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
}
impl Tagging {
	pub fn tagger(&self) -> Option<TaggerRef> {
		match (&self.tagger_type, self.tagger_id) {
			(Some(tagger_type), Some(tagger_id)) =>
				Some(TaggerRef { tagger_type: tagger_type.clone(), tagger_id }),
			_ => None,
		}
	}
}

/// A tagging joined with its tag name.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TagAssignment {
	pub context: String,
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct NewTagging {
	pub tag_id: Uuid,
	pub taggable: TaggableRef,
	pub context: String,
	pub tagger: Option<TaggerRef>,
}
