//! # Example: Traced Request Handler
//!
//! A tiny "HTTP server" traced through a tracing channel:
//! - a log subscriber on `end` / `error`
//! - a task-local store that exposes the request id to the handler
//! - an async exporter fed from a plain channel through a `SubscriberSet`
//!
//! Run with `RUST_LOG=debug` to see channel transitions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use diagbus::{
    transform, ChannelName, Config, LogReporter, Message, Subscribe, Subscriber, SubscriberSet,
    TaskLocalStore, TraceContext, TraceHandlers,
};

tokio::task_local! {
    static REQUEST_ID: u64;
}

/// Request metadata carried by the trace context.
#[derive(Debug)]
struct Request {
    id: u64,
    path: &'static str,
}

type Ctx = TraceContext<u16, String, Request>;

/// Summary published once a request is done.
#[derive(Clone, Debug)]
struct Finished {
    id: u64,
    status: u16,
}

/// Async exporter (pretends to ship summaries somewhere).
struct Exporter;

#[async_trait]
impl Subscribe<Finished> for Exporter {
    async fn on_message(&self, finished: &Finished, channel: &ChannelName) {
        tokio::time::sleep(Duration::from_millis(5)).await;
        println!("[exporter] {channel}: request {} -> {}", finished.id, finished.status);
    }

    fn name(&self) -> &'static str {
        "exporter"
    }
}

async fn handle(id: u64, path: &'static str) -> Result<u16, String> {
    tokio::time::sleep(Duration::from_millis(10)).await;
    match path {
        "/missing" => Err(format!("request {id}: no route for {path}")),
        _ => Ok(200),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    diagbus::install(Config::default().with_reporter(Arc::new(LogReporter::new())))?;

    let requests = diagbus::tracing_channel("http.server.request");
    let finished = diagbus::channel("http.server.finished");

    // Tool side.
    let handlers = TraceHandlers::new()
        .end(Subscriber::new(|msg, _| {
            if let Some(ctx) = msg.downcast_ref::<Ctx>() {
                println!("[trace] end   {} {}", ctx.meta().id, ctx.meta().path);
            }
        }))
        .error(Subscriber::new(|msg, _| {
            if let Some(ctx) = msg.downcast_ref::<Ctx>() {
                println!("[trace] error {:?}", ctx.error());
            }
        }))
        .async_end(Subscriber::new({
            let finished = finished.clone();
            move |msg: &Message, _: &ChannelName| {
                if let Some(ctx) = msg.downcast_ref::<Ctx>() {
                    let status = ctx.result().unwrap_or(500);
                    finished.publish(&Finished {
                        id: ctx.meta().id,
                        status,
                    });
                }
            }
        }));
    requests.subscribe(&handlers);

    let store = Arc::new(TaskLocalStore::new(&REQUEST_ID));
    requests.channels().start.bind_store(
        store.clone(),
        Some(transform(|msg: &Message| {
            msg.downcast_ref::<Ctx>().map_or(0, |ctx| ctx.meta().id)
        })),
    );

    let exporters = SubscriberSet::attach(&finished, vec![Arc::new(Exporter) as Arc<dyn Subscribe<Finished>>]);

    // Library side.
    for (id, path) in [(1, "/"), (2, "/missing"), (3, "/health")] {
        let ctx = Arc::new(Ctx::with_meta(Request { id, path }));
        // The start stores wrap the synchronous call that builds the future.
        let op = || handle(REQUEST_ID.try_with(|id| *id).unwrap_or(0), path);
        let out = requests.trace_promise(op, ctx).await;
        println!("[server] {path} -> {out:?}");
    }

    requests.unsubscribe(&handlers);
    requests.channels().start.unbind_store(&store);
    exporters.shutdown().await;
    Ok(())
}
