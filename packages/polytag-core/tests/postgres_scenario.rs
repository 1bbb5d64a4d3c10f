use std::sync::Arc;

use sqlx::PgConnection;
use uuid::Uuid;

use polytag_config::Postgres;
use polytag_core::{
	EntityType, PgTagStore, PopularTag, PopularTagsOptions, Registry, TagState, TaggedMatch,
	TaggedWithOptions, popular_tags, reconcile, select_matches, tagged_with, tagged_with_sifter,
};
use polytag_storage::{db::Db, queries};
use polytag_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");

	polytag_testkit::create_entity_table(&mut conn, "articles", &["title text NOT NULL"])
		.await
		.expect("Failed to create articles table.");
	drop(conn);

	db
}

async fn insert_article(conn: &mut PgConnection, title: &str) -> Uuid {
	let id = Uuid::new_v4();

	sqlx::query("INSERT INTO articles (id, title) VALUES ($1, $2)")
		.bind(id)
		.bind(title)
		.execute(&mut *conn)
		.await
		.expect("Failed to insert article.");

	id
}

fn article() -> Arc<EntityType> {
	let mut builder = Registry::builder();

	builder.register_type(EntityType::new("Article", "articles", ["id", "title"]));

	for context in ["tag", "category"] {
		builder.register_context("Article", context).expect("Article is registered.");
	}

	builder
		.build()
		.expect("Expected registry to build.")
		.entity("Article")
		.expect("Article is registered.")
}

fn names(names: &[&str]) -> Vec<String> {
	names.iter().map(ToString::to_string).collect()
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set POLYTAG_PG_DSN to run."]
async fn tagged_entities_are_found_ranked_and_compared() {
	let Some(base_dsn) = polytag_testkit::env_dsn() else {
		eprintln!(
			"Skipping tagged_entities_are_found_ranked_and_compared; set POLYTAG_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let entity = article();
	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");
	let first_id = insert_article(&mut conn, "first").await;
	let second_id = insert_article(&mut conn, "second").await;
	let mut store = PgTagStore::new(&mut conn);
	let mut first = TagState::new(entity.clone(), first_id);
	let mut second = TagState::new(entity.clone(), second_id);

	first.write(&mut store, "tag", "red, blue").await.expect("Failed to write tags.");
	first.write(&mut store, "category", "fruit").await.expect("Failed to write categories.");
	reconcile(&mut first, &mut store).await.expect("Failed to reconcile first article.");
	second.write(&mut store, "tag", "red").await.expect("Failed to write tags.");
	reconcile(&mut second, &mut store).await.expect("Failed to reconcile second article.");

	let taggings = queries::list_context_taggings(store.connection(), &first.owner(), "tag")
		.await
		.expect("Failed to list taggings.");

	assert_eq!(taggings.len(), 2);

	let blue = tagged_with(&entity, &names(&["blue"]), &TaggedWithOptions::default())
		.expect("Expected a relation.");
	let found: Vec<TaggedMatch> = select_matches(blue)
		.fetch_all(store.connection())
		.await
		.expect("Failed to run tagged_with.");

	assert_eq!(found, vec![TaggedMatch { id: first_id, tags_count: 1 }]);

	let red = tagged_with(&entity, &names(&["red"]), &TaggedWithOptions::default())
		.expect("Expected a relation.");
	let found: Vec<TaggedMatch> =
		select_matches(red).fetch_all(store.connection()).await.expect("Failed to run query.");

	assert_eq!(found.len(), 2);
	assert!(found.iter().all(|found| found.tags_count == 1));

	let all = TaggedWithOptions { all: true, ..Default::default() };
	let both = tagged_with(&entity, &names(&["red", "blue"]), &all).expect("Expected a relation.");
	let found: Vec<TaggedMatch> =
		select_matches(both).fetch_all(store.connection()).await.expect("Failed to run query.");

	assert_eq!(found, vec![TaggedMatch { id: first_id, tags_count: 2 }]);

	let popular =
		popular_tags(&entity, &PopularTagsOptions::default()).expect("Expected a relation.");
	let ranked: Vec<PopularTag> =
		popular.fetch_all(store.connection()).await.expect("Failed to run popular_tags.");
	let count = |name: &str| ranked.iter().find(|tag| tag.name == name).map(|tag| tag.tags_count);

	assert_eq!(ranked[0].name, "red");
	assert_eq!(count("red"), Some(2));
	assert_eq!(count("blue"), Some(1));
	assert_eq!(count("fruit"), Some(1));

	let similar =
		first.tagged_similar(&mut store, Some("tag")).await.expect("Expected a relation.");
	let found: Vec<TaggedMatch> =
		select_matches(similar).fetch_all(store.connection()).await.expect("Failed to run query.");

	assert_eq!(found, vec![TaggedMatch { id: second_id, tags_count: 1 }]);

	let sifter = tagged_with_sifter(&entity, &names(&["fruit"]), &TaggedWithOptions::default())
		.expect("Expected a predicate.");
	let mut builder =
		sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT title FROM articles WHERE ");

	sifter.push_sql(&mut builder);
	builder.push(" ORDER BY title");

	let titles: Vec<(String,)> = builder
		.build_query_as()
		.fetch_all(store.connection())
		.await
		.expect("Failed to list articles.");

	assert_eq!(titles, vec![("first".to_string(),)]);

	drop(store);
	drop(conn);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set POLYTAG_PG_DSN to run."]
async fn tagged_with_counts_each_name_once() {
	let Some(base_dsn) = polytag_testkit::env_dsn() else {
		eprintln!("Skipping tagged_with_counts_each_name_once; set POLYTAG_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let entity = article();
	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");
	let first_id = insert_article(&mut conn, "first").await;
	let second_id = insert_article(&mut conn, "second").await;
	let mut store = PgTagStore::new(&mut conn);
	let mut first = TagState::new(entity.clone(), first_id);
	let mut second = TagState::new(entity.clone(), second_id);

	first.write(&mut store, "tag", ["a"]).await.expect("Failed to write tags.");
	first.write(&mut store, "category", ["a"]).await.expect("Failed to write categories.");
	reconcile(&mut first, &mut store).await.expect("Failed to reconcile first article.");
	second.write(&mut store, "tag", ["a", "b", "a"]).await.expect("Failed to write tags.");
	reconcile(&mut second, &mut store).await.expect("Failed to reconcile second article.");

	let all = TaggedWithOptions { all: true, ..Default::default() };
	let min = TaggedWithOptions { min: Some(2), ..Default::default() };

	for options in [&all, &min] {
		let both = tagged_with(&entity, &names(&["a", "b"]), options).expect("Expected a relation.");
		let found: Vec<TaggedMatch> =
			select_matches(both).fetch_all(store.connection()).await.expect("Failed to run query.");

		assert_eq!(found, vec![TaggedMatch { id: second_id, tags_count: 2 }]);
	}

	let only_a = tagged_with(&entity, &names(&["a"]), &TaggedWithOptions::default())
		.expect("Expected a relation.");
	let found: Vec<TaggedMatch> =
		select_matches(only_a).fetch_all(store.connection()).await.expect("Failed to run query.");

	assert_eq!(found.len(), 2);
	assert!(found.contains(&TaggedMatch { id: first_id, tags_count: 1 }));
	assert!(found.contains(&TaggedMatch { id: second_id, tags_count: 1 }));

	let popular =
		popular_tags(&entity, &PopularTagsOptions::default()).expect("Expected a relation.");
	let ranked: Vec<PopularTag> =
		popular.fetch_all(store.connection()).await.expect("Failed to run popular_tags.");
	let ranked: Vec<(&str, i64)> =
		ranked.iter().map(|tag| (tag.name.as_str(), tag.tags_count)).collect();

	assert_eq!(ranked, vec![("a", 3), ("b", 1)]);

	drop(store);
	drop(conn);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
