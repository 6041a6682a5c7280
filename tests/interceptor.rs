#[cfg(test)]
mod tests {
    use cask::{
        Batchable, BatchKind, ColumnType, Error, ExecutionContext, Interceptor, QueryError,
        TableRef, Value, WriteData, WriteOutcome, query_error,
    };
    use cask_mock::{MockSession, init_logs};
    use std::sync::{Arc, Mutex};

    const ORDERS: TableRef = TableRef::new("shop", "orders");
    const ORDERS_BY_CUSTOMER: TableRef = TableRef::new("shop", "orders_by_customer");

    type Trace = Arc<Mutex<Vec<String>>>;

    fn setup() -> (Arc<MockSession>, ExecutionContext) {
        init_logs();
        let columns = [
            ("id", ColumnType::Int),
            ("customer", ColumnType::Text),
            ("status", ColumnType::Text),
        ];
        let session = Arc::new(
            MockSession::new()
                .with_table(&ORDERS, columns.clone())
                .with_table(&ORDERS_BY_CUSTOMER, columns),
        );
        let ctx = ExecutionContext::new(session.clone(), ORDERS);
        (session, ctx)
    }

    fn status(data: &WriteData) -> String {
        match data.values.iter().find(|(column, _)| column == "status") {
            Some((_, Some(Value::Text(Some(v))))) => v.clone(),
            _ => "none".into(),
        }
    }

    /// Records the status it receives, then either rejects the write or stamps its own name.
    fn recording(trace: &Trace, name: &'static str, reject: bool) -> Interceptor {
        let trace = trace.clone();
        Interceptor::pre_write(move |_, data: WriteData| {
            let trace = trace.clone();
            async move {
                trace
                    .lock()
                    .unwrap()
                    .push(format!("{name} saw {}", status(&data)));
                if reject {
                    return Err(Error::new(QueryError::constraint(format!(
                        "{name} rejected the write"
                    ))));
                }
                Ok(data.set("status", name))
            }
        })
    }

    #[tokio::test]
    async fn first_error_stops_the_chain() {
        let (session, ctx) = setup();
        let trace = Trace::default();
        let ctx = ctx
            .with_interceptor(recording(&trace, "A", false))
            .with_interceptor(recording(&trace, "B", true))
            .with_interceptor(recording(&trace, "C", false));
        let error = ctx
            .write_with_key([("id", 1)])
            .set("status", "new")
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::Constraint(message)) if message == "B rejected the write"
        ));
        // B ran on the data produced by A, C never ran
        assert_eq!(*trace.lock().unwrap(), ["A saw new", "B saw A"]);
        assert!(session.statements().is_empty());
        assert_eq!(session.prepare_count(), 0);
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let (session, ctx) = setup();
        let trace = Trace::default();
        let ctx = ctx
            .with_interceptor(recording(&trace, "A", false))
            .with_interceptor(recording(&trace, "B", false));
        ctx.write_with_key([("id", 1)])
            .set("status", "new")
            .execute()
            .await
            .unwrap();
        assert_eq!(*trace.lock().unwrap(), ["A saw new", "B saw A"]);
        let statement = &session.statements()[0];
        assert_eq!(
            statement.cql(),
            r#"INSERT INTO "shop"."orders" ("id", "status") VALUES (?, ?)"#
        );
        assert_eq!(statement.values[1].as_deref(), Some(&b"B"[..]));
    }

    #[tokio::test]
    async fn interceptors_are_per_context() {
        let (session, ctx) = setup();
        let trace = Trace::default();
        let guarded = ctx.with_interceptor(recording(&trace, "A", true));
        assert_eq!(ctx.interceptors().len(), 0);
        assert_eq!(guarded.interceptors().len(), 1);
        ctx.write_with_key([("id", 1)])
            .set("status", "new")
            .execute()
            .await
            .unwrap();
        assert!(trace.lock().unwrap().is_empty());
        assert_eq!(session.statements().len(), 1);
    }

    #[tokio::test]
    async fn pre_write_rewrites_the_data() {
        let (session, ctx) = setup();
        let ctx = ctx.with_interceptor(Interceptor::pre_write(|_, data: WriteData| async move {
            Ok(data.set("status", "audited"))
        }));
        ctx.write_with_key([("id", 1)]).execute().await.unwrap();
        let statement = &session.statements()[0];
        assert_eq!(
            statement.cql(),
            r#"INSERT INTO "shop"."orders" ("id", "status") VALUES (?, ?)"#
        );
        assert_eq!(statement.values[1].as_deref(), Some(&b"audited"[..]));
    }

    #[tokio::test]
    async fn post_write_sees_the_outcome() {
        let (_session, ctx) = setup();
        let trace = Trace::default();
        let ctx = ctx.with_interceptor(Interceptor::post_write({
            let trace = trace.clone();
            move |_, _, outcome: WriteOutcome| {
                let trace = trace.clone();
                async move {
                    let seen = if outcome.applied { "applied" } else { "rejected" };
                    trace.lock().unwrap().push(seen.to_string());
                    Ok(outcome)
                }
            }
        }));
        ctx.write_with_key([("id", 1)])
            .set("status", "new")
            .execute()
            .await
            .unwrap();
        assert_eq!(*trace.lock().unwrap(), ["applied"]);
    }

    #[tokio::test]
    async fn pre_read_and_pre_delete() {
        let (session, ctx) = setup();
        let ctx = ctx
            .with_interceptor(Interceptor::pre_read(|_, data: cask::ReadData| async move {
                Ok(data.limit(100))
            }))
            .with_interceptor(Interceptor::pre_delete(|_, data: cask::DeleteData| async move {
                Ok(data.if_exists())
            }));
        ctx.list_where([]).execute().await.unwrap();
        ctx.delete_with_key([("id", 1)]).execute().await.unwrap();
        let cql: Vec<_> = session
            .statements()
            .iter()
            .map(|v| v.cql().to_string())
            .collect();
        assert_eq!(
            cql,
            [
                r#"SELECT * FROM "shop"."orders" LIMIT 100"#,
                r#"DELETE FROM "shop"."orders" WHERE "id" = ? IF EXISTS"#,
            ]
        );
    }

    #[tokio::test]
    async fn cascade_joins_the_write_in_a_logged_batch() {
        let (session, ctx) = setup();
        let trace = Trace::default();
        let ctx = ctx
            .with_interceptor(recording(&trace, "A", false))
            .with_interceptor(Interceptor::cascade_on_write(
                |ctx: ExecutionContext, data: WriteData| async move {
                    let mut copy = data.clone();
                    copy.keys.insert(0, ("customer".into(), "ada".into()));
                    let index: Arc<dyn Batchable> = Arc::new(
                        cask::WriteQuery::new(ctx.with_table(ORDERS_BY_CUSTOMER), copy),
                    );
                    Ok(vec![index])
                },
            ));
        let outcome = ctx
            .write_with_key([("id", 1)])
            .set("status", "new")
            .execute()
            .await
            .unwrap();
        assert!(outcome.applied);
        assert!(session.statements().is_empty());
        let batches = session.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].kind, BatchKind::Logged);
        let cql: Vec<_> = batches[0].statements.iter().map(|v| v.cql()).collect();
        assert_eq!(
            cql,
            [
                r#"INSERT INTO "shop"."orders" ("id", "status") VALUES (?, ?)"#,
                r#"INSERT INTO "shop"."orders_by_customer" ("customer", "id", "status") VALUES (?, ?, ?)"#,
            ]
        );
        // The head write is not intercepted twice, the cascaded one goes through the hooks
        assert_eq!(*trace.lock().unwrap(), ["A saw new", "A saw A"]);
    }

    #[tokio::test]
    async fn conditional_write_cannot_cascade() {
        let (session, ctx) = setup();
        let ctx = ctx.with_interceptor(Interceptor::cascade_on_write(
            |ctx: ExecutionContext, _| async move {
                let other: Arc<dyn Batchable> =
                    Arc::new(ctx.delete_with_key([("id", 2)]));
                Ok(vec![other])
            },
        ));
        let error = ctx
            .write_with_key([("id", 1)])
            .set("status", "new")
            .if_not_exists()
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(
            query_error(&error),
            Some(QueryError::InvalidQuery(..))
        ));
        assert_eq!(session.batch_count(), 0);
        assert_eq!(session.execute_count(), 0);
    }

    #[tokio::test]
    async fn cascade_on_delete() {
        let (session, ctx) = setup();
        let ctx = ctx.with_interceptor(Interceptor::cascade_on_delete(
            |ctx: ExecutionContext, _| async move {
                let index: Arc<dyn Batchable> = Arc::new(
                    ctx.with_table(ORDERS_BY_CUSTOMER)
                        .delete_with_key([("customer", Value::from("ada")), ("id", Value::from(1))]),
                );
                Ok(vec![index])
            },
        ));
        let outcome = ctx.delete_with_key([("id", 1)]).execute().await.unwrap();
        assert!(outcome.applied);
        let batches = session.batches();
        assert_eq!(batches[0].kind, BatchKind::Logged);
        let cql: Vec<_> = batches[0].statements.iter().map(|v| v.cql()).collect();
        assert_eq!(
            cql,
            [
                r#"DELETE FROM "shop"."orders" WHERE "id" = ?"#,
                r#"DELETE FROM "shop"."orders_by_customer" WHERE "customer" = ? AND "id" = ?"#,
            ]
        );
    }
}
