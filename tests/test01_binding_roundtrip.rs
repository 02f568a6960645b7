mod common;

use std::collections::HashMap;

use serde_json::json;
use sql_binder::prelude::*;

struct Person {
    id: i64,
    name: String,
    active: bool,
}

impl FromRow for Person {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        Ok(Self {
            id: column(row, "id")?
                .as_int()
                .ok_or_else(|| SqlBinderError::Mapping("id is not an integer".into()))?,
            name: column(row, "name")?
                .as_text()
                .ok_or_else(|| SqlBinderError::Mapping("name is not text".into()))?
                .to_string(),
            active: column(row, "active")?
                .as_bool()
                .ok_or_else(|| SqlBinderError::Mapping("active is not a boolean".into()))?,
        })
    }
}

async fn binder_with_schema() -> (common::TestDb, Binder) {
    let db = common::test_db();
    let binder = Binder::new();
    binder.set_pool(db.pool.clone()).expect("pool assignment");
    binder
        .transaction(|tx| async move {
            tx.batch(
                "CREATE TABLE people (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 name TEXT NOT NULL UNIQUE, \
                 email TEXT, \
                 active INTEGER NOT NULL DEFAULT 1);",
            )
            .await
        })
        .await
        .expect("schema should apply");
    (db, binder)
}

fn insert_binding() -> Execute {
    Execute::new(
        "INSERT INTO people (name, email) VALUES (#{person.name}, #{person.email})",
        &["person"],
    )
    .expect("binding should compile")
}

#[tokio::test]
async fn execute_reports_affected_rows() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let person = json!({"name": "alice", "email": "alice@example.com"});
    let affected = insert.call(&binder, &[&person]).await.expect("insert");
    assert_eq!(affected, 1);
}

#[tokio::test]
async fn scalar_single_maps_one_value() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    for name in ["alice", "bob"] {
        let person = json!({"name": name, "email": null});
        insert.call(&binder, &[&person]).await.expect("insert");
    }

    let count =
        QueryOne::<i64>::new("SELECT count(*) FROM people", &[]).expect("binding");
    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(2));

    let by_name = QueryOne::<i64>::new(
        "SELECT id FROM people WHERE name = #{name}",
        &["name"],
    )
    .expect("binding");
    assert_eq!(by_name.call(&binder, &[&"missing"]).await.expect("query"), None);

    let too_many = QueryOne::<i64>::new("SELECT id FROM people", &[]).expect("binding");
    assert!(matches!(
        too_many.call(&binder, &[]).await.unwrap_err(),
        SqlBinderError::TooManyRows(2)
    ));

    let too_wide = QueryOne::<i64>::new(
        "SELECT id, name FROM people WHERE name = #{name}",
        &["name"],
    )
    .expect("binding");
    assert!(matches!(
        too_wide.call(&binder, &[&"alice"]).await.unwrap_err(),
        SqlBinderError::TooManyColumns(2)
    ));
}

#[tokio::test]
async fn structured_rows_map_by_column_name() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let person = json!({"name": "carol", "email": "carol@example.com"});
    insert.call(&binder, &[&person]).await.expect("insert");

    let row = QueryOne::<HashMap<String, SqlValue>>::new(
        "SELECT name, email FROM people WHERE name = #{name}",
        &["name"],
    )
    .expect("binding");
    let mapped = row
        .call(&binder, &[&"carol"])
        .await
        .expect("query")
        .expect("row should exist");
    assert_eq!(mapped["name"], SqlValue::Text("carol".into()));
    assert_eq!(mapped["email"], SqlValue::Text("carol@example.com".into()));

    let people = QueryAll::<Person>::new(
        "SELECT id, name, active FROM people ORDER BY id",
        &[],
    )
    .expect("binding");
    let rows = people.call(&binder, &[]).await.expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "carol");
    assert!(rows[0].active);
    assert!(rows[0].id > 0);
}

#[tokio::test]
async fn parameterized_values_are_never_spliced() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let hostile = "a'); DROP TABLE people;--";
    let person = json!({"name": hostile, "email": null});
    insert.call(&binder, &[&person]).await.expect("insert");

    // Table intact, hostile text stored verbatim.
    let stored = QueryOne::<String>::new(
        "SELECT name FROM people WHERE name = #{name}",
        &["name"],
    )
    .expect("binding");
    assert_eq!(
        stored.call(&binder, &[&hostile]).await.expect("query"),
        Some(hostile.to_string())
    );
}

#[tokio::test]
async fn raw_references_substitute_identifiers() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let person = json!({"name": "dave", "email": null});
    insert.call(&binder, &[&person]).await.expect("insert");

    let from_table = QueryAll::<String>::new(
        "SELECT name FROM !{tbl} ORDER BY name",
        &["tbl"],
    )
    .expect("binding");
    let names = from_table.call(&binder, &[&"people"]).await.expect("query");
    assert_eq!(names, vec!["dave".to_string()]);
}

#[tokio::test]
async fn row_stream_is_ordered_and_consumed_once() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    for name in ["a", "b", "c"] {
        let person = json!({"name": name, "email": null});
        insert.call(&binder, &[&person]).await.expect("insert");
    }

    let stream_binding = QueryStream::<String>::new(
        "SELECT name FROM people ORDER BY name",
        &[],
    )
    .expect("binding");
    let mut stream = stream_binding.call(&binder, &[]).await.expect("query");
    let first: Vec<String> = stream.by_ref().collect::<Result<_, _>>().expect("mapping");
    assert_eq!(first, vec!["a", "b", "c"]);
    assert!(stream.next().is_none());
}

#[tokio::test]
async fn binding_construction_rejects_unknown_parameters() {
    let err = Execute::new("DELETE FROM people WHERE id = #{id}", &["person"]).unwrap_err();
    match err {
        SqlBinderError::UnknownParameter(path) => assert_eq!(path, "id"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn call_rejects_argument_count_mismatch() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    assert!(matches!(
        insert.call(&binder, &[]).await.unwrap_err(),
        SqlBinderError::ArgumentMismatch(_)
    ));
}

#[tokio::test]
async fn pool_configuration_is_checked() {
    let unconfigured = Binder::new();
    let count = QueryOne::<i64>::new("SELECT 1", &[]).expect("binding");
    assert!(matches!(
        count.call(&unconfigured, &[]).await.unwrap_err(),
        SqlBinderError::PoolNotConfigured
    ));

    let db = common::test_db();
    let binder = Binder::new();
    binder.set_pool(db.pool.clone()).expect("first assignment");
    assert!(matches!(
        binder.set_pool(db.pool.clone()).unwrap_err(),
        SqlBinderError::PoolAlreadyConfigured
    ));
}
