use crate::{Error, PagingState, QueryError, Record, RecordPage, Result};
use async_stream::stream;
use futures::{Stream, future::BoxFuture};
use std::{
    collections::VecDeque,
    fmt::{self, Debug, Formatter},
    future,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Receives the items of a [`ResultStream`].
///
/// Callbacks run on the task that owns the stream state, one at a time. Nothing is delivered
/// before the subscriber asks for it through [`Subscription::request`].
pub trait Subscriber<T>: Send + 'static {
    fn on_subscribe(&mut self, subscription: Subscription);
    fn on_next(&mut self, item: T);
    /// Terminal, no other callback follows.
    fn on_error(&mut self, error: Error);
    /// Terminal, no other callback follows.
    fn on_complete(&mut self);
}

#[derive(Debug)]
enum Message {
    Request(u64),
    Cancel,
}

/// Handle used by a subscriber to signal demand.
///
/// Cloneable, the stream keeps running as long as one handle is alive or the demand already
/// signalled is not satisfied.
#[derive(Debug, Clone)]
pub struct Subscription {
    tx: UnboundedSender<Message>,
}

impl Subscription {
    /// Ask for `n` more items, `n` must be positive.
    pub fn request(&self, n: u64) {
        crate::send_value!(self.tx, Message::Request(n));
    }

    /// Stop the stream, calling it again has no effect.
    pub fn cancel(&self) {
        crate::send_value!(self.tx, Message::Cancel);
    }
}

type FetchFn =
    Arc<dyn Fn(Option<PagingState>) -> BoxFuture<'static, Result<RecordPage>> + Send + Sync>;
type MapFn<T> = Arc<dyn Fn(Record) -> Result<T> + Send + Sync>;

struct Source<T> {
    fetch: FetchFn,
    mapper: MapFn<T>,
}

/// Paginated result delivered on demand, accepts a single subscriber.
///
/// Pages are fetched one at a time: the first one as soon as the stream is subscribed, the
/// following ones only when the buffered rows cannot satisfy the requested demand.
pub struct ResultStream<T> {
    source: Mutex<Option<Source<T>>>,
}

impl<T: Send + 'static> ResultStream<T> {
    /// Stream over the pages returned by `fetch`, called with `None` for the first page and
    /// with the paging state of the previous page afterward. Each row goes through `mapper`
    /// right before being delivered.
    pub fn new<F, M>(fetch: F, mapper: M) -> Self
    where
        F: Fn(Option<PagingState>) -> BoxFuture<'static, Result<RecordPage>>
            + Send
            + Sync
            + 'static,
        M: Fn(Record) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            source: Mutex::new(Some(Source {
                fetch: Arc::new(fetch),
                mapper: Arc::new(mapper),
            })),
        }
    }

    /// Start the stream. A second subscriber only receives an error, the first one is not
    /// affected.
    pub fn subscribe(&self, mut subscriber: impl Subscriber<T>) {
        let source = self.source.lock().ok().and_then(|mut v| v.take());
        let Some(source) = source else {
            log::debug!("Rejected a second subscriber");
            subscriber.on_error(
                QueryError::StreamState("multiple subscribe not supported".into()).into(),
            );
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(v) => v,
            Err(e) => {
                subscriber.on_error(
                    Error::new(e).context(QueryError::StreamState(
                        "a result stream must be subscribed within a tokio runtime".into(),
                    )),
                );
                return;
            }
        };
        let (tx, rx) = unbounded_channel();
        subscriber.on_subscribe(Subscription { tx });
        runtime.spawn(run(source, subscriber, rx));
    }

    /// Adapt into a [`futures::Stream`] requesting one row at a time.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        let (tx, mut rx) = unbounded_channel();
        self.subscribe(Forward { tx });
        stream! {
            let mut guard = None;
            while let Some(signal) = rx.recv().await {
                match signal {
                    Signal::Subscribed(subscription) => {
                        subscription.request(1);
                        guard = Some(CancelOnDrop(subscription));
                    }
                    Signal::Next(item) => {
                        yield Ok(item);
                        if let Some(CancelOnDrop(subscription)) = &guard {
                            subscription.request(1);
                        }
                    }
                    Signal::Error(error) => {
                        yield Err(error);
                        break;
                    }
                    Signal::Complete => break,
                }
            }
        }
    }
}

impl<T> Debug for ResultStream<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let subscribed = self.source.lock().map(|v| v.is_none()).unwrap_or(true);
        f.debug_struct("ResultStream")
            .field("subscribed", &subscribed)
            .finish()
    }
}

enum Event {
    Request(u64),
    Cancel,
    /// Every subscription handle was dropped.
    Closed,
    PageArrived(Result<RecordPage>),
}

async fn pending_page(
    fetch: &mut Option<BoxFuture<'static, Result<RecordPage>>>,
) -> Result<RecordPage> {
    match fetch {
        Some(fetch) => fetch.await,
        None => future::pending().await,
    }
}

/// Owns the whole state of a subscribed stream.
async fn run<T, S>(source: Source<T>, mut subscriber: S, mut rx: UnboundedReceiver<Message>)
where
    T: Send + 'static,
    S: Subscriber<T>,
{
    let mut demand: u64 = 0;
    let mut buffer: VecDeque<Record> = VecDeque::new();
    let mut paging_state: Option<PagingState> = None;
    let mut has_more = true;
    let mut closed = false;
    log::trace!("Fetching the first page");
    let mut fetching = Some((source.fetch)(None));
    loop {
        while demand > 0 {
            let Some(record) = buffer.pop_front() else {
                break;
            };
            match (source.mapper)(record) {
                Ok(item) => {
                    demand -= 1;
                    subscriber.on_next(item);
                }
                Err(e) => {
                    subscriber.on_error(e);
                    return;
                }
            }
        }
        if buffer.is_empty() && !has_more && fetching.is_none() {
            log::trace!("Stream completed");
            subscriber.on_complete();
            return;
        }
        if buffer.is_empty() && demand > 0 && has_more && fetching.is_none() {
            log::trace!("Fetching the next page, {} items requested", demand);
            fetching = Some((source.fetch)(paging_state.take()));
        }
        if closed && demand == 0 {
            log::trace!("Every subscription was dropped, stopping the stream");
            return;
        }
        let event = tokio::select! {
            biased;
            message = rx.recv(), if !closed => match message {
                Some(Message::Request(n)) => Event::Request(n),
                Some(Message::Cancel) => Event::Cancel,
                None => Event::Closed,
            },
            page = pending_page(&mut fetching), if fetching.is_some() => Event::PageArrived(page),
        };
        match event {
            Event::Request(0) => {
                subscriber.on_error(
                    QueryError::StreamState("the requested amount must be positive".into()).into(),
                );
                return;
            }
            Event::Request(n) => demand = demand.saturating_add(n),
            Event::Cancel => {
                log::trace!("Stream cancelled");
                return;
            }
            Event::Closed => closed = true,
            Event::PageArrived(Ok(page)) => {
                fetching = None;
                log::trace!("Received a page of {} rows", page.records.len());
                has_more = page.has_more_pages();
                paging_state = page.paging_state;
                buffer.extend(page.records);
            }
            Event::PageArrived(Err(e)) => {
                subscriber.on_error(e);
                return;
            }
        }
    }
}

enum Signal<T> {
    Subscribed(Subscription),
    Next(T),
    Error(Error),
    Complete,
}

struct Forward<T> {
    tx: UnboundedSender<Signal<T>>,
}

impl<T: Send + 'static> Subscriber<T> for Forward<T> {
    fn on_subscribe(&mut self, subscription: Subscription) {
        crate::send_value!(self.tx, Signal::Subscribed(subscription));
    }
    fn on_next(&mut self, item: T) {
        crate::send_value!(self.tx, Signal::Next(item));
    }
    fn on_error(&mut self, error: Error) {
        crate::send_value!(self.tx, Signal::Error(error));
    }
    fn on_complete(&mut self) {
        crate::send_value!(self.tx, Signal::Complete);
    }
}

struct CancelOnDrop(Subscription);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
