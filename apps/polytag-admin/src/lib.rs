use std::path::PathBuf;

use clap::{
	Parser, Subcommand,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use polytag_core::{
	Direction, PgTagStore, PopularTag, PopularTagsOptions, Registry, Relation, TagState,
	TaggedMatch, TaggedWithOptions, registry,
};
use polytag_storage::{db::Db, models::TaggerRef, queries};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab", styles = styles())]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create the tag tables if they do not exist.
	Migrate,
	/// Print the tags of one entity, per context.
	Show(EntityArgs),
	/// Replace the tags of one entity in one context.
	Tag(TagArgs),
	/// Entities carrying the given tag names.
	TaggedWith(TaggedWithArgs),
	/// Entities sharing tags with one entity.
	Similar(SimilarArgs),
	/// Tags ranked by usage for one entity type.
	Popular(PopularArgs),
	/// Delete tags no tagging refers to.
	PurgeOrphans,
}

#[derive(Debug, clap::Args)]
pub struct EntityArgs {
	#[arg(long = "type", value_name = "TYPE")]
	pub type_name: String,
	#[arg(long)]
	pub id: Uuid,
}

#[derive(Debug, clap::Args)]
pub struct TagArgs {
	#[command(flatten)]
	pub entity: EntityArgs,
	#[arg(long, default_value = polytag_core::DEFAULT_CONTEXT)]
	pub context: String,
	#[arg(long, requires = "tagger_id")]
	pub tagger_type: Option<String>,
	#[arg(long, requires = "tagger_type")]
	pub tagger_id: Option<Uuid>,
	/// Comma separated tag names. Quote a name to keep a comma in it.
	#[arg(value_name = "TAGS")]
	pub tags: String,
}

#[derive(Debug, clap::Args)]
pub struct TaggedWithArgs {
	#[arg(long = "type", value_name = "TYPE")]
	pub type_name: String,
	#[arg(long)]
	pub on: Vec<String>,
	#[arg(long, conflicts_with = "min")]
	pub all: bool,
	#[arg(long)]
	pub min: Option<i64>,
	#[arg(long)]
	pub limit: Option<i64>,
	#[arg(value_name = "NAMES", required = true)]
	pub names: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct SimilarArgs {
	#[command(flatten)]
	pub entity: EntityArgs,
	#[arg(long)]
	pub on: Option<String>,
	#[arg(long)]
	pub limit: Option<i64>,
}

#[derive(Debug, clap::Args)]
pub struct PopularArgs {
	#[arg(long = "type", value_name = "TYPE")]
	pub type_name: String,
	#[arg(long)]
	pub on: Vec<String>,
	#[arg(long)]
	pub min: Option<i64>,
	#[arg(long)]
	pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ContextTags {
	context: String,
	names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
	taggable_type: String,
	taggable_id: Uuid,
	contexts: Vec<ContextTags>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = polytag_config::load(&args.config)?;

	init_tracing(&config);

	let registry = registry::install(Registry::from_config(&config.taggables)?)?;
	let db = Db::connect(&config.storage.postgres).await?;

	match args.command {
		Command::Migrate => {
			db.ensure_schema().await?;

			tracing::info!("Tag schema is ready.");
		},
		Command::Show(entity) => show(&db, registry, entity).await?,
		Command::Tag(tag) => tag_entity(&db, registry, tag).await?,
		Command::TaggedWith(search) => tagged_with(&db, registry, search).await?,
		Command::Similar(similar) => similar_to(&db, registry, similar).await?,
		Command::Popular(popular) => popular_tags(&db, registry, popular).await?,
		Command::PurgeOrphans => {
			let mut tx = db.pool.begin().await?;
			let purged = queries::purge_orphan_tags(&mut tx).await?;

			tx.commit().await?;

			print_json(&serde_json::json!({ "purged": purged }))?;
		},
	}

	Ok(())
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default() | Effects::BOLD)
		.usage(AnsiColor::Green.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
}

async fn show(db: &Db, registry: &Registry, args: EntityArgs) -> color_eyre::Result<()> {
	let entity = registry.entity(&args.type_name)?;
	let mut conn = db.pool.acquire().await?;
	let mut store = PgTagStore::new(&mut conn);
	let mut state = TagState::new(entity, args.id);
	let contexts = state
		.read_all(&mut store)
		.await?
		.into_iter()
		.map(|(context, names)| ContextTags { context, names })
		.collect();

	print_json(&ShowOutput { taggable_type: args.type_name, taggable_id: args.id, contexts })
}

async fn tag_entity(db: &Db, registry: &Registry, args: TagArgs) -> color_eyre::Result<()> {
	let entity = registry.entity(&args.entity.type_name)?;
	let tagger = match (args.tagger_type, args.tagger_id) {
		(Some(tagger_type), Some(tagger_id)) => Some(TaggerRef { tagger_type, tagger_id }),
		_ => None,
	};
	let mut tx = db.pool.begin().await?;
	let mut store = PgTagStore::new(&mut tx);
	let mut state = TagState::new(entity, args.entity.id);

	state.write_as(&mut store, &args.context, args.tags, tagger).await?;

	let report = polytag_core::reconcile(&mut state, &mut store).await?;

	tx.commit().await?;

	print_json(&report)
}

async fn tagged_with(db: &Db, registry: &Registry, args: TaggedWithArgs) -> color_eyre::Result<()> {
	let entity = registry.entity(&args.type_name)?;
	let options = TaggedWithOptions { on: args.on, all: args.all, min: args.min };
	let mut relation = ties_by_key(polytag_core::select_matches(polytag_core::tagged_with(
		&entity,
		&args.names,
		&options,
	)?));

	if let Some(limit) = args.limit {
		relation = relation.limit(limit);
	}

	let mut conn = db.pool.acquire().await?;
	let found = relation.fetch_all::<TaggedMatch>(&mut conn).await?;

	print_json(&found)
}

async fn similar_to(db: &Db, registry: &Registry, args: SimilarArgs) -> color_eyre::Result<()> {
	let entity = registry.entity(&args.entity.type_name)?;
	let mut conn = db.pool.acquire().await?;
	let mut store = PgTagStore::new(&mut conn);
	let mut state = TagState::new(entity, args.entity.id);
	let mut relation = ties_by_key(polytag_core::select_matches(
		state.tagged_similar(&mut store, args.on.as_deref()).await?,
	));

	if let Some(limit) = args.limit {
		relation = relation.limit(limit);
	}

	let found = relation.fetch_all::<TaggedMatch>(store.connection()).await?;

	print_json(&found)
}

async fn popular_tags(db: &Db, registry: &Registry, args: PopularArgs) -> color_eyre::Result<()> {
	let entity = registry.entity(&args.type_name)?;
	let options = PopularTagsOptions { on: args.on, min: args.min };
	let relation = polytag_core::popular_tags(&entity, &options)?;
	let name = relation.column("name");
	let mut relation = relation.order_by(name, Direction::Asc);

	if let Some(limit) = args.limit {
		relation = relation.limit(limit);
	}

	let mut conn = db.pool.acquire().await?;
	let ranked = relation.fetch_all::<PopularTag>(&mut conn).await?;

	print_json(&ranked)
}

/// Entities with equal counts come out in key order.
fn ties_by_key(relation: Relation) -> Relation {
	let key = relation.key();

	relation.order_by(key, Direction::Asc)
}

fn init_tracing(config: &polytag_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	println!("{}", serde_json::to_string_pretty(value)?);

	Ok(())
}
