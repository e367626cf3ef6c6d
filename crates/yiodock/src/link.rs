//! Link tasks: one spawned task per transport connection attempt.
//!
//! A link connects, reports the outcome, then pumps in both directions:
//! outbound text from an unbounded queue to the connection, inbound text
//! from the connection to the actor. Every report is tagged with the link's
//! id so the actor can drop reports from a link it has already replaced.
//!
//! Dropping the [`Link`] closes its queue. The task notices, closes the
//! connection gracefully, and exits.

use std::sync::Arc;

use tokio::sync::mpsc;
use yiodock_transport::{Connection, ConnectionId, Connector};

/// A report from a link task to the dock actor.
#[derive(Debug)]
pub(crate) struct LinkEvent {
    pub(crate) link: ConnectionId,
    pub(crate) kind: LinkEventKind,
}

#[derive(Debug)]
pub(crate) enum LinkEventKind {
    Connected,
    ConnectFailed(String),
    Text(String),
    Closed,
    Error(String),
}

/// The actor's end of a running link.
#[derive(Debug)]
pub(crate) struct Link {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<String>,
}

impl Link {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues `text` for sending. Returns `false` if the task has exited.
    pub(crate) fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }
}

/// Spawns a link task that dials `address`.
pub(crate) fn spawn_link<C: Connector>(
    connector: Arc<C>,
    id: ConnectionId,
    address: String,
    events: mpsc::UnboundedSender<LinkEvent>,
) -> Link {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_link(connector, id, address, outbound_rx, events));
    Link {
        id,
        outbound: outbound_tx,
    }
}

async fn run_link<C: Connector>(
    connector: Arc<C>,
    id: ConnectionId,
    address: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let report = |kind| events.send(LinkEvent { link: id, kind }).is_ok();

    tracing::debug!(link = %id, %address, "dialing dock");
    let conn = match connector.connect(&address).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(link = %id, error = %e, "connect failed");
            report(LinkEventKind::ConnectFailed(e.to_string()));
            return;
        }
    };
    tracing::debug!(link = %id, conn = %conn.id(), "link up");
    if !report(LinkEventKind::Connected) {
        close(&conn, id).await;
        return;
    }

    loop {
        tokio::select! {
            // Outbound first so a released link stops promptly.
            biased;

            text = outbound.recv() => {
                let Some(text) = text else {
                    tracing::debug!(link = %id, "link released");
                    close(&conn, id).await;
                    return;
                };
                if let Err(e) = conn.send(&text).await {
                    tracing::debug!(link = %id, error = %e, "send failed");
                    report(LinkEventKind::Error(e.to_string()));
                    close(&conn, id).await;
                    return;
                }
            }
            received = conn.recv() => match received {
                Ok(Some(text)) => {
                    tracing::trace!(link = %id, %text, "received");
                    if !report(LinkEventKind::Text(text)) {
                        close(&conn, id).await;
                        return;
                    }
                }
                Ok(None) => {
                    tracing::debug!(link = %id, "closed by dock");
                    report(LinkEventKind::Closed);
                    return;
                }
                Err(e) => {
                    tracing::debug!(link = %id, error = %e, "receive failed");
                    report(LinkEventKind::Error(e.to_string()));
                    return;
                }
            },
        }
    }
}

async fn close<C: Connection>(conn: &C, id: ConnectionId) {
    if let Err(e) = conn.close().await {
        tracing::debug!(link = %id, error = %e, "close failed");
    }
}
