use uuid::Uuid;

use polytag_config::Postgres;
use polytag_storage::{
	db::Db,
	models::{NewTagging, TaggableRef, TaggerRef},
	queries,
};
use polytag_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 1 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set POLYTAG_PG_DSN to run."]
async fn tag_tables_exist_after_bootstrap() {
	let Some(base_dsn) = polytag_testkit::env_dsn() else {
		eprintln!("Skipping tag_tables_exist_after_bootstrap; set POLYTAG_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	// A second bootstrap must be a no-op.
	db.ensure_schema().await.expect("Failed to re-run schema bootstrap.");

	for table in ["tags", "taggings"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "Missing table {table}.");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set POLYTAG_PG_DSN to run."]
async fn create_tag_returns_existing_row_for_known_name() {
	let Some(base_dsn) = polytag_testkit::env_dsn() else {
		eprintln!("Skipping create_tag_returns_existing_row_for_known_name; set POLYTAG_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");
	let first = queries::create_tag(&mut conn, "red").await.expect("Failed to create tag.");
	let second = queries::create_tag(&mut conn, "red").await.expect("Failed to create tag again.");

	assert_eq!(first.id, second.id);
	assert!(queries::create_tag(&mut conn, "  ").await.is_err());

	let found = queries::find_tags_by_names(&mut conn, &["red".to_string(), "blue".to_string()])
		.await
		.expect("Failed to find tags.");

	assert_eq!(found.len(), 1);
	assert_eq!(found[0].name, "red");

	drop(conn);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set POLYTAG_PG_DSN to run."]
async fn context_views_and_orphan_purge() {
	let Some(base_dsn) = polytag_testkit::env_dsn() else {
		eprintln!("Skipping context_views_and_orphan_purge; set POLYTAG_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let mut conn = db.pool.acquire().await.expect("Failed to acquire connection.");
	let owner = TaggableRef::new("Article", Uuid::new_v4());
	let tagger = TaggerRef { tagger_type: "User".to_string(), tagger_id: Uuid::new_v4() };
	let red = queries::create_tag(&mut conn, "red").await.expect("Failed to create tag.");
	let fruit = queries::create_tag(&mut conn, "fruit").await.expect("Failed to create tag.");

	for (tag_id, context, tagger) in
		[(red.id, "tag", None), (fruit.id, "category", Some(tagger.clone()))]
	{
		let new =
			NewTagging { tag_id, taggable: owner.clone(), context: context.to_string(), tagger };

		queries::insert_tagging(&mut conn, &new).await.expect("Failed to insert tagging.");
	}

	let category = queries::list_context_taggings(&mut conn, &owner, "category")
		.await
		.expect("Failed to list context taggings.");

	assert_eq!(category.len(), 1);
	assert_eq!(category[0].tagger(), Some(tagger));

	let tags = queries::list_context_tags(&mut conn, &owner, "tag")
		.await
		.expect("Failed to list context tags.");

	assert_eq!(tags.iter().map(|tag| tag.name.as_str()).collect::<Vec<_>>(), vec!["red"]);

	let removed = queries::delete_taggings(&mut conn, &owner, Some("tag"))
		.await
		.expect("Failed to delete context taggings.");

	assert_eq!(removed, 1);

	let assignments =
		queries::load_assignments(&mut conn, &owner).await.expect("Failed to load assignments.");

	assert_eq!(assignments.len(), 1);
	assert_eq!(assignments[0].context, "category");

	let purged = queries::purge_orphan_tags(&mut conn).await.expect("Failed to purge orphans.");

	assert_eq!(purged, 1);

	let remaining = queries::find_tags_by_names(&mut conn, &["red".to_string()])
		.await
		.expect("Failed to find tags.");

	assert!(remaining.is_empty());

	let removed = queries::delete_taggings(&mut conn, &owner, None)
		.await
		.expect("Failed to delete all taggings.");

	assert_eq!(removed, 1);

	drop(conn);
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
