use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub taggables: Vec<Taggable>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// One entity type that carries tags.
#[derive(Debug, Clone, Deserialize)]
pub struct Taggable {
	/// Value written to `taggings.taggable_type`.
	pub type_name: String,
	pub table: String,
	#[serde(default = "default_primary_key")]
	pub primary_key: String,
	/// Natural columns of the table. Aggregate queries group by every one of them.
	pub columns: Vec<String>,
	/// Declared tag contexts. Empty means the single default context.
	#[serde(default)]
	pub contexts: Vec<String>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_primary_key() -> String {
	"id".to_string()
}
