use std::{
    pin::Pin,
    task::{Context, Poll},
};

use chrono::Utc;
use futures::{
    channel::{mpsc, oneshot},
    pin_mut, select,
    stream::LocalBoxStream,
    FutureExt, SinkExt, Stream, StreamExt,
};
use talkback_client::api::{CollectionId, FeedMessage, RawStreamEvent, Time};
use ws_stream_wasm::{WsMessage, WsMeta};

// Pings will be sent every PING_INTERVAL
const PING_INTERVAL_SECS: i64 = 10;
// If the interval between two pongs is more than DISCONNECT_INTERVAL, reconnect
const DISCONNECT_INTERVAL_SECS: i64 = 20;
// Space each reconnect attempt by ATTEMPT_SPACING
const ATTEMPT_SPACING_SECS: i64 = 1;

async fn sleep_for(d: chrono::Duration) {
    let d = d.to_std().unwrap_or(std::time::Duration::from_secs(0));
    if let Err(err) = wasm_timer::Delay::new(d).await {
        tracing::warn!(?err, "failed sleeping");
    }
}

async fn sleep_until(t: Time) {
    sleep_for(t - Utc::now()).await
}

pub fn feed_url(host: &str, collection: &CollectionId) -> Option<String> {
    let rest = host.strip_prefix("http")?;
    Some(format!("ws{rest}/ws/comments/{collection}"))
}

/// Live pushes, the connection is closed once this is dropped
struct CommentFeed {
    events: mpsc::UnboundedReceiver<RawStreamEvent>,
    _cancel: oneshot::Receiver<()>,
}

impl Stream for CommentFeed {
    type Item = RawStreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RawStreamEvent>> {
        self.events.poll_next_unpin(cx)
    }
}

pub fn comment_stream(
    host: &str,
    collection: &CollectionId,
) -> LocalBoxStream<'static, RawStreamEvent> {
    let (sender, events) = mpsc::unbounded();
    let (cancel, cancel_receiver) = oneshot::channel();
    match feed_url(host, collection) {
        Some(url) => wasm_bindgen_futures::spawn_local(run_feed(url, sender, cancel)),
        None => tracing::error!(%host, "service host is not an http url, no live updates"),
    }
    CommentFeed {
        events,
        _cancel: cancel_receiver,
    }
    .boxed_local()
}

async fn run_feed(
    url: String,
    sender: mpsc::UnboundedSender<RawStreamEvent>,
    mut cancel: oneshot::Sender<()>,
) {
    let mut first_attempt = true;
    'reconnect: loop {
        match first_attempt {
            true => first_attempt = false,
            false => {
                tracing::warn!("lost comment feed connection");
                sleep_for(chrono::Duration::seconds(ATTEMPT_SPACING_SECS)).await;
                if cancel.is_canceled() {
                    return;
                }
            }
        }

        let sock = match WsMeta::connect(&url, None).await {
            Ok((_, s)) => s,
            Err(err) => {
                tracing::debug!(?err, %url, "failed connecting to the comment feed");
                continue 'reconnect;
            }
        };
        tracing::info!(%url, "connected to comment feed");

        let mut next_ping = Utc::now();
        let mut last_pong = Utc::now();
        let mut sock = sock.fuse();
        let mut cancellation = cancel.cancellation().fuse();
        loop {
            let delay_pong_reception =
                sleep_until(last_pong + chrono::Duration::seconds(DISCONNECT_INTERVAL_SECS)).fuse();
            let delay_ping_send = sleep_until(next_ping).fuse();
            pin_mut!(delay_ping_send, delay_pong_reception);
            select! {
                _ = cancellation => {
                    if let Err(err) = sock.into_inner().close().await {
                        tracing::debug!(?err, "failed closing the comment feed");
                    }
                    tracing::info!("disconnected from comment feed");
                    return;
                }
                _ = delay_pong_reception => continue 'reconnect,
                _ = delay_ping_send => {
                    if sock.send(WsMessage::Text(String::from("ping"))).await.is_err() {
                        continue 'reconnect;
                    }
                    next_ping += chrono::Duration::seconds(PING_INTERVAL_SECS);
                }
                msg = sock.next() => {
                    let msg: Result<FeedMessage, _> = match msg {
                        None => continue 'reconnect,
                        Some(WsMessage::Text(t)) => serde_json::from_str(&t),
                        Some(WsMessage::Binary(b)) => serde_json::from_slice(&b),
                    };
                    match msg {
                        Ok(FeedMessage::Pong) => last_pong = Utc::now(),
                        Ok(FeedMessage::Event(e)) => {
                            if sender.unbounded_send(e).is_err() {
                                return;
                            }
                        }
                        Err(err) => tracing::warn!(?err, "ignoring unparseable feed message"),
                    }
                }
            }
        }
    }
}
