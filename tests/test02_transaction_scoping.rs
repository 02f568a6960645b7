mod common;

use std::time::Duration;

use sql_binder::prelude::*;

async fn binder_with_schema() -> (common::TestDb, Binder) {
    let db = common::test_db();
    let binder = Binder::new();
    binder.set_pool(db.pool.clone()).expect("pool assignment");
    binder
        .transaction(|tx| async move {
            tx.batch(
                "CREATE TABLE entries (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 label TEXT NOT NULL UNIQUE);",
            )
            .await
        })
        .await
        .expect("schema should apply");
    (db, binder)
}

fn insert_binding() -> Execute {
    Execute::new("INSERT INTO entries (label) VALUES (#{label})", &["label"])
        .expect("binding should compile")
}

fn count_binding() -> QueryOne<i64> {
    QueryOne::new("SELECT count(*) FROM entries", &[]).expect("binding should compile")
}

#[tokio::test]
async fn outer_transaction_commits_inner_calls_once() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let count = count_binding();

    let (b, ins, cnt) = (&binder, &insert, &count);
    binder
        .transaction(|_tx| async move {
            ins.call(b, &[&"first"]).await?;
            ins.call(b, &[&"second"]).await?;
            // Inner calls joined the open transaction: their writes are
            // already visible here, before any commit.
            assert_eq!(cnt.call(b, &[]).await?, Some(2));
            Ok(())
        })
        .await
        .expect("transaction should commit");

    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(2));
}

#[tokio::test]
async fn inner_failure_rolls_back_sibling_work() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let count = count_binding();

    let (b, ins) = (&binder, &insert);
    let result = binder
        .transaction(|_tx| async move {
            ins.call(b, &[&"only"]).await?;
            // UNIQUE violation on the second insert.
            ins.call(b, &[&"only"]).await?;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(SqlBinderError::Sqlite(_))));
    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(0));
}

#[tokio::test]
async fn nested_transactions_defer_to_the_outermost_caller() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let count = count_binding();

    let (b, ins) = (&binder, &insert);
    let result: Result<(), SqlBinderError> = binder
        .transaction(|_outer| async move {
            b.transaction(|_inner| async move {
                ins.call(b, &[&"nested"]).await?;
                Ok(())
            })
            .await?;
            // The inner transaction returned without committing anything.
            Err(SqlBinderError::Execution("outer failure".into()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(0));
}

#[tokio::test]
async fn transaction_handle_supports_manual_statements() {
    let (_db, binder) = binder_with_schema().await;
    let count = count_binding();

    binder
        .transaction(|tx| async move {
            let label = "manual".to_string();
            let env = BindEnv::new().arg("label", &label);
            tx.execute("INSERT INTO entries (label) VALUES (#{label})", &env)
                .await?;
            let seen: Option<i64> = tx
                .query_one("SELECT count(*) FROM entries", &BindEnv::new())
                .await?;
            assert_eq!(seen, Some(1));
            Ok(())
        })
        .await
        .expect("transaction should commit");

    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(1));
}

#[tokio::test]
async fn manual_rollback_discards_earlier_work_only() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let count = count_binding();

    let (b, ins) = (&binder, &insert);
    binder
        .transaction(|tx| async move {
            ins.call(b, &[&"discarded"]).await?;
            tx.rollback().await?;
            ins.call(b, &[&"kept"]).await?;
            Ok(())
        })
        .await
        .expect("transaction should commit");

    let kept = QueryAll::<String>::new("SELECT label FROM entries ORDER BY label", &[])
        .expect("binding");
    assert_eq!(
        kept.call(&binder, &[]).await.expect("query"),
        vec!["kept".to_string()]
    );
    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(1));
}

#[tokio::test]
async fn cancelled_transaction_rolls_back() {
    let (_db, binder) = binder_with_schema().await;
    let insert = insert_binding();
    let count = count_binding();

    let (b, ins) = (&binder, &insert);
    let hung = binder.transaction(|_tx| async move {
        ins.call(b, &[&"doomed"]).await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    });
    let outcome = tokio::time::timeout(Duration::from_millis(250), hung).await;
    assert!(outcome.is_err(), "transaction should have been cancelled");

    // Give the drop-path rollback task a moment to run.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(count.call(&binder, &[]).await.expect("count"), Some(0));
}
