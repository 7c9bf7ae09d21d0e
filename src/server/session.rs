//! Per-connection session state machine.
//!
//! A session moves through `AwaitLogin` -> `Serving{role}` -> closed. While
//! serving, two cooperating units share the session state: the reader
//! consumes inbound packets (latest pending frame request, input batches)
//! and the producer paces, captures, encodes, and writes frame responses.
//! Splitting them keeps the session responsive to input while a capture or
//! encode is in flight.
//!
//! Frame requests arriving while the producer is busy collapse into the
//! single pending slot: only the most recent parameters are served, with
//! one response for the collapsed run.

use anyhow::Result;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::config::Config;
use crate::input::{Dispatcher, Synthesizer};
use crate::protocol::{self, ClientPacket, FrameRequest, Role};
use crate::screen::capture::CaptureHandle;
use crate::screen::clamp_viewport;
use crate::screen::pipeline::Pipeline;

/// State shared between the reader and the producer.
struct Shared {
    /// The latest unserved frame request; newer requests overwrite older.
    pending: Mutex<Option<FrameRequest>>,
    wake: Notify,
}

/// Drive one client session over an established message channel.
///
/// The transport is any ordered duplex message stream; the supervisor wires
/// a WebSocket in, tests wire in-memory channels.
pub async fn run<Tx, Rx>(
    mut tx: Tx,
    mut rx: Rx,
    config: Arc<Config>,
    capture: CaptureHandle,
    synth: Box<dyn Synthesizer>,
) -> Result<()>
where
    Tx: Sink<Vec<u8>, Error = anyhow::Error> + Unpin,
    Rx: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    // AwaitLogin: nothing is captured, dispatched, or sent before this
    // resolves. A malformed first message closes without a reply.
    let first = match rx.next().await {
        Some(msg) => msg?,
        None => return Ok(()),
    };
    let password = protocol::decode_login(&first)?;

    let role = if password == config.control_password {
        Some(Role::Controller)
    } else if config.view_password.as_deref() == Some(password.as_str()) {
        Some(Role::Viewer)
    } else {
        None
    };

    tx.send(protocol::encode_login_result(role)).await?;
    let Some(role) = role else {
        log::info!("login rejected");
        return Ok(());
    };
    log::info!("session authenticated as {role:?}");

    let shared = Shared {
        pending: Mutex::new(None),
        wake: Notify::new(),
    };
    let mut dispatcher = Dispatcher::new(synth, role, config.max_ips);

    // Whichever unit finishes first ends the session; the other is dropped.
    // An in-flight grab still completes on the capture thread, its result
    // discarded without side effects on other sessions.
    tokio::select! {
        result = read_loop(&mut rx, &shared, &mut dispatcher) => result,
        result = produce_loop(&mut tx, &shared, &config, &capture) => result,
    }
}

async fn read_loop<Rx>(rx: &mut Rx, shared: &Shared, dispatcher: &mut Dispatcher) -> Result<()>
where
    Rx: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    // The viewport negotiated by the latest frame request; input
    // coordinates are scaled relative to it.
    let mut viewport: Option<(u16, u16)> = None;

    while let Some(msg) = rx.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("transport closed: {e:#}");
                break;
            }
        };
        match protocol::decode_client(&msg)? {
            ClientPacket::FrameRequest(request) => {
                viewport = Some(clamp_viewport(request.width, request.height));
                *shared.pending.lock().unwrap() = Some(request);
                shared.wake.notify_one();
            }
            ClientPacket::Input(events) => dispatcher.dispatch(events, viewport),
        }
    }
    Ok(())
}

async fn produce_loop<Tx>(
    tx: &mut Tx,
    shared: &Shared,
    config: &Config,
    capture: &CaptureHandle,
) -> Result<()>
where
    Tx: Sink<Vec<u8>, Error = anyhow::Error> + Unpin,
{
    let mut pipeline = Pipeline::new(config);
    let interval = config.frame_interval();
    let mut last_sent: Option<Instant> = None;

    loop {
        let pending = shared.pending.lock().unwrap().take();
        let Some(request) = pending else {
            shared.wake.notified().await;
            continue;
        };

        // Pacer: wait out the per-session frame budget before servicing.
        if let Some(at) = last_sent {
            tokio::time::sleep_until(at + interval).await;
        }
        // Requests that arrived during the wait collapse into the slot;
        // only the latest parameters are honored.
        let newer = shared.pending.lock().unwrap().take();
        let request = newer.unwrap_or(request);

        let response = match capture.grab().await {
            Ok(src) => match pipeline.produce(&src, &request) {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("frame encode failed: {e:#}");
                    pipeline.placeholder(&request)
                }
            },
            Err(e) => {
                log::warn!("display capture failed: {e:#}");
                pipeline.placeholder(&request)
            }
        };

        tx.send(response.encode()).await?;
        last_sent = Some(Instant::now());
    }
}
