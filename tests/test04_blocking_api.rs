mod common;

use serde_json::json;
use sql_binder::prelude::*;

fn blocking_binder_with_schema() -> (common::TestDb, BlockingBinder) {
    let db = common::test_db();
    let binder = BlockingBinder::new().expect("blocking binder");
    binder.set_pool(db.pool.clone()).expect("pool assignment");
    binder
        .transaction(|tx| {
            tx.batch(
                "CREATE TABLE notes (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 body TEXT NOT NULL);",
            )
        })
        .expect("schema should apply");
    (db, binder)
}

#[test]
fn bindings_round_trip_through_the_blocking_facade() {
    let (_db, binder) = blocking_binder_with_schema();

    let insert = Execute::new("INSERT INTO notes (body) VALUES (#{note.body})", &["note"])
        .expect("binding");
    let note = json!({"body": "remember the milk"});
    assert_eq!(binder.execute(&insert, &[&note]).unwrap(), 1);

    let body = QueryOne::<String>::new(
        "SELECT body FROM notes WHERE body = #{body}",
        &["body"],
    )
    .expect("binding");
    assert_eq!(
        binder.query_one(&body, &[&"remember the milk"]).unwrap(),
        Some("remember the milk".to_string())
    );

    let all = QueryAll::<String>::new("SELECT body FROM notes ORDER BY id", &[])
        .expect("binding");
    assert_eq!(binder.query_all(&all, &[]).unwrap().len(), 1);
}

#[test]
fn blocking_transactions_commit_and_roll_back() {
    let (_db, binder) = blocking_binder_with_schema();
    let insert = Execute::new("INSERT INTO notes (body) VALUES (#{body})", &["body"])
        .expect("binding");
    let count = QueryOne::<i64>::new("SELECT count(*) FROM notes", &[]).expect("binding");

    binder
        .transaction(|tx| {
            tx.call_execute(&insert, &[&"first"])?;
            tx.call_execute(&insert, &[&"second"])?;
            assert_eq!(tx.call_query_one(&count, &[])?, Some(2));
            Ok(())
        })
        .expect("transaction should commit");
    assert_eq!(binder.query_one(&count, &[]).unwrap(), Some(2));

    let failed: Result<(), SqlBinderError> = binder.transaction(|tx| {
        tx.call_execute(&insert, &[&"doomed"])?;
        Err(SqlBinderError::Execution("abort".into()))
    });
    assert!(failed.is_err());
    assert_eq!(binder.query_one(&count, &[]).unwrap(), Some(2));
}

#[test]
fn row_streams_iterate_in_the_blocking_model() {
    let (_db, binder) = blocking_binder_with_schema();
    let insert = Execute::new("INSERT INTO notes (body) VALUES (#{body})", &["body"])
        .expect("binding");
    for body in ["a", "b"] {
        binder.execute(&insert, &[&body]).unwrap();
    }

    let stream_binding = QueryStream::<String>::new(
        "SELECT body FROM notes ORDER BY body",
        &[],
    )
    .expect("binding");
    let stream = binder.query_stream(&stream_binding, &[]).unwrap();
    let bodies: Vec<String> = stream.collect::<Result<_, _>>().unwrap();
    assert_eq!(bodies, vec!["a", "b"]);
}

#[tokio::test]
async fn blocking_facade_is_rejected_inside_async_contexts() {
    assert!(matches!(
        BlockingBinder::new().unwrap_err(),
        SqlBinderError::BlockingInAsyncContext
    ));
}
