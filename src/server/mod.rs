//! Connection supervisor.
//!
//! Listens on the configured port, performs the WebSocket handshake, and
//! spawns one independent session per client. Sessions share nothing but
//! the read-only config; a session-local failure never stops the accept
//! loop or touches another session.

pub mod session;

use anyhow::{Context, Result};
use futures_util::{future, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

use crate::config::Config;
use crate::input::synth::EnigoSynthesizer;
use crate::screen::capture::{CaptureHandle, ScrapGrabber};

pub struct Server {
    config: Arc<Config>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Bind and serve forever. A failed bind is a fatal init error; session
    /// errors are logged and never terminate the supervisor.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .with_context(|| format!("cannot bind port {}", self.config.port))?;
        log::info!("listening on port {}", self.config.port);

        loop {
            let (stream, peer) = listener.accept().await?;
            let config = self.config.clone();
            tokio::spawn(async move {
                log::info!("client connected: {peer}");
                match handle_connection(stream, config).await {
                    Ok(()) => log::info!("session {peer} closed"),
                    Err(e) => log::warn!("session {peer} ended: {e:#}"),
                }
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, config: Arc<Config>) -> Result<()> {
    let ws = accept_async(stream)
        .await
        .context("websocket handshake failed")?;
    let (sink, stream) = ws.split();

    // One packet per binary message. Text frames and pings are transport
    // noise; a close frame ends the stream shortly after.
    let tx = sink
        .with(|packet: Vec<u8>| {
            future::ready(Ok::<_, tokio_tungstenite::tungstenite::Error>(WsMessage::Binary(
                packet,
            )))
        })
        .sink_map_err(anyhow::Error::from);
    let rx = stream.filter_map(|msg| {
        future::ready(match msg {
            Ok(WsMessage::Binary(data)) => Some(Ok(data)),
            Ok(_) => None,
            Err(e) => Some(Err(anyhow::Error::from(e))),
        })
    });

    let fullscreen = config.fullscreen;
    let capture = CaptureHandle::spawn(move || ScrapGrabber::open(fullscreen));
    let synth = Box::new(EnigoSynthesizer::new());

    session::run(tx, rx, config, capture, synth).await
}
