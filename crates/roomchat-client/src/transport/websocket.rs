//! WebSocket socket task for roomchat.
//!
//! One tokio task per connection attempt. It performs the handshake, then
//! selects between inbound frames and the outgoing queue. It never touches
//! client state: every observation is handed to the `emit` callback as a
//! [`TransportEvent`], which the client turns into a queued action.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};

use roomchat_core::error::ChatResult;

use crate::connection::{Outgoing, TransportEvent};
use crate::transport::{client_tls_config, detect_scheme, Scheme, TlsPolicy};

/// Handles to a running socket task.
pub(crate) struct SocketTask {
    pub outgoing: mpsc::UnboundedSender<Outgoing>,
    pub handle: JoinHandle<()>,
}

/// Validate `url`, then spawn the socket task on `runtime`.
///
/// Scheme and TLS configuration errors are returned synchronously; everything
/// after that (DNS, TCP, handshake) is reported through `emit`.
pub(crate) fn spawn<F>(
    runtime: &Handle,
    url: &str,
    tls: TlsPolicy,
    connect_timeout: Duration,
    emit: F,
) -> ChatResult<SocketTask>
where
    F: Fn(TransportEvent) + Send + Sync + 'static,
{
    let connector = match detect_scheme(url)? {
        Scheme::Plain => None,
        Scheme::Tls => Some(Connector::Rustls(client_tls_config(tls)?)),
    };

    let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
    let url = url.trim().to_string();
    let handle = runtime.spawn(run(url, connector, connect_timeout, outgoing_rx, emit));

    Ok(SocketTask { outgoing, handle })
}

async fn run<F>(
    url: String,
    connector: Option<Connector>,
    connect_timeout: Duration,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    emit: F,
) where
    F: Fn(TransportEvent) + Send + Sync + 'static,
{
    let connect = connect_async_tls_with_config(url.as_str(), None, false, connector);
    let ws_stream = match tokio::time::timeout(connect_timeout, connect).await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            tracing::warn!("WebSocket connect to {} failed: {}", url, e);
            emit(TransportEvent::ConnectFailed(e.to_string()));
            return;
        }
        Err(_) => {
            tracing::warn!("WebSocket connect to {} timed out", url);
            emit(TransportEvent::ConnectFailed(format!(
                "timed out after {}s",
                connect_timeout.as_secs()
            )));
            return;
        }
    };

    tracing::info!("WebSocket connected to {}", url);
    emit(TransportEvent::Opened);

    let (mut sink, mut stream) = ws_stream.split();
    let mut close_sent = false;

    let reason = loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("recv {} bytes", text.len());
                    emit(TransportEvent::Text(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!("ignoring {}-byte binary frame", data.len());
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = sink.send(Message::Pong(payload)).await {
                        emit(TransportEvent::Error(format!("pong failed: {e}")));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("WebSocket close frame received");
                    break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    emit(TransportEvent::Error(e.to_string()));
                    break None;
                }
                None => break None,
            },

            out = outgoing.recv(), if !close_sent => match out {
                Some(Outgoing::Text(text)) => {
                    tracing::debug!("send {} bytes", text.len());
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::error!("WebSocket send error: {}", e);
                        emit(TransportEvent::Error(e.to_string()));
                    }
                }
                // A dropped sender means the client went away: close politely.
                Some(Outgoing::Close) | None => {
                    close_sent = true;
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!("close frame not sent: {}", e);
                        break None;
                    }
                }
            },
        }
    };

    let _ = sink.close().await;
    tracing::debug!("WebSocket task for {} ended", url);
    emit(TransportEvent::Closed { reason });
}
