#[cfg(test)]
mod tests {
    use cask::{
        ColumnType, Entity, Error, ExecutionContext, Predicate, QueryError, Record, Subscriber,
        Subscription, TableRef, TypeRegistry, Value, query_error,
    };
    use cask_mock::{MockSession, init_logs, page};
    use futures::StreamExt;
    use std::{sync::Arc, time::Duration};
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

    const EVENTS: TableRef = TableRef::new("log", "events");

    #[derive(Debug)]
    enum Seen {
        Subscribed(Subscription),
        Next(i64),
        Error(Error),
        Complete,
    }

    struct Recorder(UnboundedSender<Seen>);

    impl Subscriber<Record> for Recorder {
        fn on_subscribe(&mut self, subscription: Subscription) {
            let _ = self.0.send(Seen::Subscribed(subscription));
        }
        fn on_next(&mut self, item: Record) {
            let _ = self.0.send(Seen::Next(item.get("seq").unwrap()));
        }
        fn on_error(&mut self, error: Error) {
            let _ = self.0.send(Seen::Error(error));
        }
        fn on_complete(&mut self) {
            let _ = self.0.send(Seen::Complete);
        }
    }

    async fn next(rx: &mut UnboundedReceiver<Seen>) -> Seen {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Nothing was delivered in time")
            .expect("The stream dropped the subscriber")
    }

    async fn quiet(rx: &mut UnboundedReceiver<Seen>) {
        if let Ok(Some(seen)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            panic!("Nothing should be delivered, received {:?}", seen);
        }
    }

    /// Ten rows split in two pages of five.
    fn setup() -> (Arc<MockSession>, ExecutionContext) {
        init_logs();
        let session = Arc::new(MockSession::new().with_table(
            &EVENTS,
            [("day", ColumnType::Int), ("seq", ColumnType::BigInt)],
        ));
        let columns = [("day", ColumnType::Int), ("seq", ColumnType::BigInt)];
        let rows = |range: std::ops::Range<i64>| {
            range
                .map(|i| vec![Value::Int(Some(1)), Value::BigInt(Some(i))])
                .collect::<Vec<_>>()
        };
        let types = TypeRegistry::new();
        session.script_pages(
            "SELECT",
            [
                page(columns.clone(), rows(0..5), &types).unwrap(),
                page(columns, rows(5..10), &types).unwrap(),
            ],
        );
        let ctx = ExecutionContext::new(session.clone(), EVENTS);
        (session, ctx)
    }

    #[tokio::test]
    async fn pages_follow_demand() {
        let (session, ctx) = setup();
        let stream = ctx
            .list_where([Predicate::eq("day", 1)])
            .fetch_size(5)
            .stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(tx));
        let Seen::Subscribed(subscription) = next(&mut rx).await else {
            panic!("The subscription must come first");
        };

        subscription.request(3);
        for i in 0..3 {
            assert!(matches!(next(&mut rx).await, Seen::Next(v) if v == i));
        }
        quiet(&mut rx).await;
        assert_eq!(session.execute_count(), 1);
        assert_eq!(session.fetch_more_count(), 0);

        subscription.request(4);
        for i in 3..7 {
            assert!(matches!(next(&mut rx).await, Seen::Next(v) if v == i));
        }
        quiet(&mut rx).await;
        assert_eq!(session.fetch_more_count(), 1);

        subscription.request(100);
        for i in 7..10 {
            assert!(matches!(next(&mut rx).await, Seen::Next(v) if v == i));
        }
        assert!(matches!(next(&mut rx).await, Seen::Complete));
        assert_eq!(session.fetch_more_count(), 1);
    }

    #[tokio::test]
    async fn single_subscriber() {
        let (_session, ctx) = setup();
        let stream = ctx.list_where([]).stream();

        let (first_tx, mut first) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(first_tx));
        let Seen::Subscribed(subscription) = next(&mut first).await else {
            panic!("The subscription must come first");
        };

        let (second_tx, mut second) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(second_tx));
        let Seen::Error(error) = next(&mut second).await else {
            panic!("The second subscriber must be rejected");
        };
        assert!(matches!(
            query_error(&error),
            Some(QueryError::StreamState(..))
        ));
        assert!(second.recv().await.is_none());

        subscription.request(2);
        assert!(matches!(next(&mut first).await, Seen::Next(0)));
        assert!(matches!(next(&mut first).await, Seen::Next(1)));
    }

    #[tokio::test]
    async fn request_zero_is_an_error() {
        let (_session, ctx) = setup();
        let stream = ctx.list_where([]).stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(tx));
        let Seen::Subscribed(subscription) = next(&mut rx).await else {
            panic!("The subscription must come first");
        };
        subscription.request(0);
        let Seen::Error(error) = next(&mut rx).await else {
            panic!("A request of zero items must fail the stream");
        };
        assert!(matches!(
            query_error(&error),
            Some(QueryError::StreamState(..))
        ));
    }

    #[tokio::test]
    async fn cancel_before_the_second_page() {
        let (session, ctx) = setup();
        let stream = ctx.list_where([]).stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(tx));
        let Seen::Subscribed(subscription) = next(&mut rx).await else {
            panic!("The subscription must come first");
        };
        subscription.request(5);
        for i in 0..5 {
            assert!(matches!(next(&mut rx).await, Seen::Next(v) if v == i));
        }
        subscription.cancel();
        subscription.request(5);
        assert!(rx.recv().await.is_none());
        assert_eq!(session.fetch_more_count(), 0);
    }

    #[tokio::test]
    async fn stream_adapter() {
        let (session, ctx) = setup();
        let values: Vec<i64> = ctx
            .list_where([])
            .stream()
            .into_stream()
            .map(|v| v.unwrap().get::<i64>("seq").unwrap())
            .collect()
            .await;
        assert_eq!(values, (0..10).collect::<Vec<_>>());
        assert_eq!(session.fetch_more_count(), 1);
    }

    #[tokio::test]
    async fn dropping_the_adapter_stops_fetching() {
        let (session, ctx) = setup();
        let mut stream = Box::pin(ctx.list_where([]).stream().into_stream());
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.get::<i64>("seq").unwrap(), 0);
        drop(stream);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.fetch_more_count(), 0);
    }

    #[tokio::test]
    async fn entity_stream() {
        #[derive(Entity, Clone, Debug, PartialEq)]
        #[cask(keyspace = "log", name = "events")]
        struct Event {
            #[cask(partition_key)]
            day: i32,
            #[cask(clustering_key)]
            seq: i64,
        }
        let (_session, ctx) = setup();
        let events: Vec<Event> = ctx
            .entity::<Event>()
            .stream([Predicate::eq("day", 1)])
            .into_stream()
            .map(|v| v.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 10);
        assert_eq!(events[9], Event { day: 1, seq: 9 });
    }

    #[test]
    fn subscribe_outside_a_runtime() {
        let (_session, ctx) = setup();
        let stream = ctx.list_where([]).stream();
        let (tx, mut rx) = mpsc::unbounded_channel();
        stream.subscribe(Recorder(tx));
        let Ok(Seen::Error(error)) = rx.try_recv() else {
            panic!("Subscribing without a runtime must fail");
        };
        assert!(matches!(
            query_error(&error),
            Some(QueryError::StreamState(..))
        ));
    }
}
