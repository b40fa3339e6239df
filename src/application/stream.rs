//! Server-sent event stream carrying presence for one viewer connection.

use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::json;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::application::presence::{PresenceLease, PresenceSubscription};
use crate::domain::presence::PresenceEvent;

pub const SELF_EVENT: &str = "self";
pub const PRESENCE_EVENT: &str = "presence";

enum Step {
    Diff(PresenceEvent),
    Heartbeat,
    Closed,
}

/// Stream the subscription to the client while keeping `lease` alive.
///
/// The first event names the connection's own member id, then the membership
/// snapshot and diffs follow as `presence` events. Events carrying
/// `"full": true` replace the client's view; the rest are merged into it.
/// Every `heartbeat` the lease is refreshed; the stream ends once the lease
/// has been swept or superseded.
/// Dropping the stream, which happens when the client disconnects, drops the
/// lease and untracks the member.
pub fn presence_sse(
    mut subscription: PresenceSubscription,
    lease: PresenceLease,
    heartbeat: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream! {
        match Event::default()
            .event(SELF_EVENT)
            .json_data(json!({ "member": lease.member(), "topic": lease.topic() }))
        {
            Ok(event) => {
                yield Ok(event);
            }
            Err(err) => warn!(error = %err, "Failed to encode presence self event"),
        }

        let mut ticker = interval(heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            let step = tokio::select! {
                event = subscription.next() => match event {
                    Some(event) => Step::Diff(event),
                    None => Step::Closed,
                },
                _ = ticker.tick() => Step::Heartbeat,
            };

            match step {
                Step::Diff(diff) => match Event::default().event(PRESENCE_EVENT).json_data(&diff) {
                    Ok(event) => {
                        yield Ok(event);
                    }
                    Err(err) => warn!(error = %err, "Failed to encode presence diff"),
                },
                Step::Heartbeat => {
                    if !lease.touch() {
                        debug!(member = %lease.member(), "Presence lease lost; closing stream");
                        break;
                    }
                }
                Step::Closed => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat))
}
