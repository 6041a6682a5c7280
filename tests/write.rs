#[cfg(test)]
mod tests {
    use cask::{
        BatchComposer, BatchKind, ColumnType, CounterBatchComposer, ExecutionContext, Predicate,
        QueryError, ResultPage, TableRef, Value, query_error,
    };
    use cask_mock::{MockSession, applied, init_logs};
    use indoc::indoc;
    use std::{
        collections::{BTreeMap, BTreeSet},
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    const PRODUCTS: TableRef = TableRef::new("shop", "products");
    const VIEWS: TableRef = TableRef::new("shop", "views");

    fn setup() -> (Arc<MockSession>, ExecutionContext) {
        init_logs();
        let session = Arc::new(
            MockSession::new()
                .with_table(
                    &PRODUCTS,
                    [
                        ("id", ColumnType::BigInt),
                        ("name", ColumnType::Text),
                        ("price", ColumnType::Decimal),
                        ("tags", ColumnType::Set(Box::new(ColumnType::Text))),
                        ("history", ColumnType::List(Box::new(ColumnType::Int))),
                        (
                            "attributes",
                            ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Text)),
                        ),
                    ],
                )
                .with_table(
                    &VIEWS,
                    [("id", ColumnType::BigInt), ("count", ColumnType::Counter)],
                ),
        );
        let ctx = ExecutionContext::new(session.clone(), PRODUCTS);
        (session, ctx)
    }

    /// Answers like a store: the first insert is applied, the following ones find the row.
    fn insert_once(session: &MockSession) {
        let inserted = AtomicBool::new(false);
        session.on("IF NOT EXISTS", move |_| {
            if inserted.swap(true, Ordering::SeqCst) {
                applied(
                    false,
                    vec![
                        ("id", ColumnType::BigInt, Value::BigInt(Some(1))),
                        ("name", ColumnType::Text, Value::Text(Some("desk".into()))),
                    ],
                )
            } else {
                applied(true, vec![])
            }
        });
    }

    #[tokio::test]
    async fn insert() {
        let (session, ctx) = setup();
        let outcome = ctx
            .with_ttl(60)
            .write_with_key([("id", 1)])
            .set("name", "desk")
            .set("tags", BTreeSet::from(["wood".to_string()]))
            .unset("price")
            .execute()
            .await
            .expect("Could not write");
        assert!(outcome.applied);
        let statement = &session.statements()[0];
        assert_eq!(
            statement.cql(),
            indoc! {r#"
                INSERT INTO "shop"."products" ("id", "name", "tags", "price") VALUES (?, ?, ?, ?) USING TTL ?
            "#}
            .trim()
        );
        assert!(statement.query.is_prepared());
        assert_eq!(statement.values.len(), 5);
        assert!(statement.values[3].is_none());
        assert_eq!(
            statement.values[4].as_deref(),
            Some(&60i32.to_be_bytes()[..])
        );
    }

    #[tokio::test]
    async fn empty_collection_is_written_as_null() {
        let (session, ctx) = setup();
        ctx.write_with_key([("id", 1)])
            .set("tags", Vec::<String>::new())
            .execute()
            .await
            .unwrap();
        assert_eq!(session.statements()[0].values[1], None);
    }

    #[tokio::test]
    async fn update_with_collection_deltas() {
        let (session, ctx) = setup();
        ctx.write_with_key([("id", 1)])
            .add_to_set("tags", vec!["new".to_string()])
            .append_to_list("history", vec![7])
            .put_in_map(
                "attributes",
                BTreeMap::from([("color".to_string(), "red".to_string())]),
            )
            .remove_from_map("attributes", vec!["size".to_string()])
            .execute()
            .await
            .unwrap();
        assert_eq!(
            session.statements()[0].cql(),
            indoc! {r#"
                UPDATE "shop"."products" SET "tags" = "tags" + ?, "history" = "history" + ?, "attributes" = "attributes" + ?, "attributes" = "attributes" - ? WHERE "id" = ?
            "#}
            .trim()
        );
    }

    #[tokio::test]
    async fn schema_mismatch_sends_nothing() {
        let (session, ctx) = setup();
        let error = ctx
            .write_with_key([("id", 1)])
            .set("price", "expensive")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::SchemaMismatch { column, .. }) if column == "price"
        ));
        let error = ctx
            .write_with_key([("id", 1)])
            .set("missing", 1)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::SchemaMismatch { column, .. }) if column == "missing"
        ));
        assert!(session.statements().is_empty());
    }

    #[tokio::test]
    async fn if_not_exists_is_idempotent() {
        let (session, ctx) = setup();
        insert_once(&session);
        let query = ctx
            .write_with_key([("id", 1)])
            .set("name", "desk")
            .if_not_exists();

        let first = query.execute().await.unwrap();
        assert!(first.applied);
        assert!(first.existing.is_none());

        let second = query.execute().await.unwrap();
        assert!(!second.applied);
        let existing = second.existing.expect("The current row should be returned");
        assert_eq!(existing.get::<String>("name").unwrap(), "desk");
        assert!(existing.value("[applied]").is_none());
        assert_eq!(session.statements().len(), 2);
    }

    #[tokio::test]
    async fn fail_on_conflict() {
        let (session, ctx) = setup();
        insert_once(&session);
        let query = ctx
            .write_with_key([("id", 1)])
            .set("name", "desk")
            .if_not_exists()
            .fail_on_conflict();
        assert!(query.execute().await.unwrap().applied);
        let error = query.execute().await.unwrap_err();
        let Some(QueryError::ConditionNotMet {
            condition,
            existing,
        }) = query_error(&error)
        else {
            panic!("Unexpected error: {:#}", error);
        };
        assert_eq!(condition, "IF NOT EXISTS");
        assert_eq!(
            existing.as_ref().unwrap().get::<i64>("id").unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn conditional_update() {
        let (session, ctx) = setup();
        session.on("IF", |_| applied(false, vec![]));
        let outcome = ctx
            .write_with_key([("id", 1)])
            .set("name", "chair")
            .only_if(Predicate::eq("name", "desk"))
            .execute()
            .await
            .unwrap();
        assert!(!outcome.applied);
        assert!(outcome.existing.is_none());
        assert_eq!(
            session.statements()[0].cql(),
            r#"UPDATE "shop"."products" SET "name" = ? WHERE "id" = ? IF "name" = ?"#
        );
    }

    #[tokio::test]
    async fn invalid_writes() {
        let (session, ctx) = setup();
        let invalid = [
            ctx.write_where([]).set("name", "x"),
            ctx.write_where([Predicate::eq("id", 1)]),
            ctx.write_with_key([("id", 1)])
                .set("name", "x")
                .if_not_exists()
                .only_if(Predicate::eq("name", "y")),
            ctx.write_where([Predicate::is_in("id", [1, 2])])
                .set("name", "x")
                .if_not_exists(),
            ctx.write_with_key([("id", 1)])
                .add_to_set("tags", vec!["a".to_string()])
                .if_not_exists(),
        ];
        for query in invalid {
            let error = query.execute().await.unwrap_err();
            assert!(
                matches!(query_error(&error), Some(QueryError::InvalidQuery(..))),
                "Unexpected error: {:#}",
                error
            );
        }
        assert!(session.statements().is_empty());
    }

    #[tokio::test]
    async fn write_where() {
        let (session, ctx) = setup();
        ctx.write_where([Predicate::is_in("id", [1, 2, 3])])
            .set("price", rust_decimal::Decimal::new(999, 2))
            .execute()
            .await
            .unwrap();
        let statement = &session.statements()[0];
        assert_eq!(
            statement.cql(),
            r#"UPDATE "shop"."products" SET "price" = ? WHERE "id" IN ?"#
        );
        assert!(!statement.query.is_prepared());
    }

    #[tokio::test]
    async fn delete() {
        let (session, ctx) = setup();
        ctx.delete_with_key([("id", 1)]).execute().await.unwrap();
        ctx.delete_with_key([("id", 1)])
            .column("tags")
            .column("price")
            .execute()
            .await
            .unwrap();
        session.on("IF EXISTS", |_| applied(false, vec![]));
        let error = ctx
            .delete_with_key([("id", 2)])
            .if_exists()
            .fail_on_conflict()
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::ConditionNotMet { condition, .. }) if condition == "IF EXISTS"
        ));
        let cql: Vec<_> = session
            .statements()
            .iter()
            .map(|v| v.cql().to_string())
            .collect();
        assert_eq!(
            cql,
            [
                r#"DELETE FROM "shop"."products" WHERE "id" = ?"#,
                r#"DELETE "tags", "price" FROM "shop"."products" WHERE "id" = ?"#,
                r#"DELETE FROM "shop"."products" WHERE "id" = ? IF EXISTS"#,
            ]
        );
    }

    #[tokio::test]
    async fn counter() {
        let (session, ctx) = setup();
        let views = ctx.with_table(VIEWS);
        views
            .counter_with_key([("id", 1)])
            .increment("count", 3)
            .execute()
            .await
            .unwrap();
        let statement = &session.statements()[0];
        assert_eq!(
            statement.cql(),
            r#"UPDATE "shop"."views" SET "count" = "count" + ? WHERE "id" = ?"#
        );
        assert_eq!(statement.values[0].as_deref(), Some(&3i64.to_be_bytes()[..]));

        CounterBatchComposer::new(views.clone())
            .combined_with(views.counter_with_key([("id", 1)]).decrement("count", 1))
            .combined_with(views.counter_with_key([("id", 2)]).increment("count", 1))
            .execute()
            .await
            .unwrap();
        let batches = session.batches();
        assert_eq!(batches[0].kind, BatchKind::Counter);
        assert_eq!(batches[0].statements.len(), 2);
        assert_eq!(
            batches[0].statements[0].values[0].as_deref(),
            Some(&(-1i64).to_be_bytes()[..])
        );
    }

    #[tokio::test]
    async fn logged_batch() {
        let (session, ctx) = setup();
        let batch = BatchComposer::logged(ctx.clone())
            .combined_with(ctx.write_with_key([("id", 1)]).set("name", "desk"))
            .combined_with(ctx.write_with_key([("id", 2)]).set("name", "lamp"));
        let batch = batch.combined_with(ctx.delete_with_key([("id", 3)]));
        assert_eq!(batch.len(), 3);
        assert!(batch.execute().await.unwrap().applied);
        assert_eq!(session.batch_count(), 1);
        let batches = session.batches();
        assert_eq!(batches[0].kind, BatchKind::Logged);
        let cql: Vec<_> = batches[0].statements.iter().map(|v| v.cql()).collect();
        assert_eq!(
            cql,
            [
                r#"INSERT INTO "shop"."products" ("id", "name") VALUES (?, ?)"#,
                r#"INSERT INTO "shop"."products" ("id", "name") VALUES (?, ?)"#,
                r#"DELETE FROM "shop"."products" WHERE "id" = ?"#,
            ]
        );
        // Same text, prepared once
        assert_eq!(session.prepare_count(), 2);
        assert!(session.statements().is_empty());
    }

    #[tokio::test]
    async fn conditional_batch() {
        let (session, ctx) = setup();
        session.on_batch(|_| applied(false, vec![]));
        let outcome = BatchComposer::unlogged(ctx.clone())
            .combined_with(
                ctx.write_with_key([("id", 1)])
                    .set("name", "desk")
                    .if_not_exists(),
            )
            .combined_with(ctx.delete_with_key([("id", 2)]).if_exists())
            .execute()
            .await
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(session.batches()[0].kind, BatchKind::Unlogged);
    }

    #[tokio::test]
    async fn mixed_batch_is_rejected() {
        let (session, ctx) = setup();
        let error = BatchComposer::logged(ctx.clone())
            .combined_with(ctx.write_with_key([("id", 1)]).set("name", "desk"))
            .combined_with(
                ctx.write_with_key([("id", 2)])
                    .set("name", "lamp")
                    .if_not_exists(),
            )
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::InvalidQuery(..))
        ));
        assert_eq!(session.batch_count(), 0);
    }

    #[tokio::test]
    async fn empty_batch() {
        let (session, ctx) = setup();
        let batch = BatchComposer::logged(ctx);
        assert!(batch.is_empty());
        assert!(batch.execute().await.unwrap().applied);
        assert_eq!(session.batch_count(), 0);
    }

    #[tokio::test]
    async fn driver_failure() {
        let (session, ctx) = setup();
        session.on("INSERT", |_| -> cask::Result<ResultPage> {
            Err(cask::Error::msg("connection reset"))
        });
        let error = cask_mock::silent_logs! {
            ctx.write_with_key([("id", 1)])
                .set("name", "desk")
                .execute()
                .await
                .unwrap_err()
        };
        assert!(query_error(&error).is_none());
        let message = format!("{:#}", error);
        assert!(message.contains("While executing"), "{}", message);
        assert!(message.contains("connection reset"), "{}", message);
    }

    #[test]
    fn blocking_write() {
        let (session, ctx) = setup();
        let outcome = ctx
            .write_with_key([("id", 5)])
            .set("name", "stool")
            .execute_blocking()
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(session.execute_count(), 1);
    }

    fn delayed() -> (Arc<MockSession>, ExecutionContext) {
        init_logs();
        let session = Arc::new(
            MockSession::new()
                .with_table(&PRODUCTS, [("id", ColumnType::BigInt), ("name", ColumnType::Text)])
                .with_prepare_delay(Duration::from_millis(5)),
        );
        let ctx = ExecutionContext::new(session.clone(), PRODUCTS);
        (session, ctx)
    }

    #[test]
    fn blocking_write_with_a_timer_driven_session() {
        let (session, ctx) = delayed();
        for id in [6, 7] {
            let outcome = ctx
                .write_with_key([("id", id)])
                .set("name", "bench")
                .execute_blocking()
                .unwrap();
            assert!(outcome.applied);
        }
        assert_eq!(session.prepare_count(), 1);
        assert_eq!(session.execute_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn blocking_write_inside_a_multi_thread_runtime() {
        let (session, ctx) = delayed();
        ctx.delete_with_key([("id", 8)]).execute_blocking().unwrap();
        assert_eq!(session.execute_count(), 1);
    }

    #[tokio::test]
    async fn blocking_write_inside_a_current_thread_runtime() {
        let (session, ctx) = delayed();
        let error = ctx
            .write_with_key([("id", 9)])
            .set("name", "bench")
            .execute_blocking()
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::Runtime(..))
        ));
        assert_eq!(session.prepare_count(), 0);
    }
}
