//! C2: a named fan-out channel backed by a Unix domain socket listener.
//!
//! Every message a connected client sends is broadcast to every *other*
//! currently connected client, never echoed back to the sender. Delivery
//! is best-effort: a receiver with a full send queue silently drops the
//! message rather than applying back-pressure to the sender, since a slow
//! reader must never stall the whole fan-out (Open Question #1 in
//! DESIGN.md).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use swarm_common::Envelope;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::transport::{Framing, MessageCodec};

/// Outbound queue depth per connected client before messages are dropped.
const CLIENT_SEND_CAPACITY: usize = 256;

type ClientId = u64;

struct ClientSlot {
    tx: mpsc::Sender<Envelope>,
}

/// A single named fan-out bus.
pub struct Channel {
    name: String,
    socket_path: PathBuf,
    framing: Framing,
    clients: Arc<DashMap<ClientId, ClientSlot>>,
    next_id: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    listener_task: Option<JoinHandle<()>>,
}

impl Channel {
    pub fn new(name: impl Into<String>, socket_path: PathBuf, framing: Framing) -> Self {
        Self {
            name: name.into(),
            socket_path,
            framing,
            clients: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            listener_task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn connected_client_count(&self) -> usize {
        self.clients.len()
    }

    /// Bind and start accepting connections. Fails if the socket path
    /// already exists — the caller (the channel group, on stale-directory
    /// recovery) is responsible for removing stale sockets first.
    pub async fn start(&mut self) -> Result<(), ChannelError> {
        if self.socket_path.exists() {
            return Err(ChannelError::SocketExists(self.socket_path.clone()));
        }

        let listener = UnixListener::bind(&self.socket_path).map_err(|source| ChannelError::BindFailed {
            path: self.socket_path.clone(),
            source,
        })?;

        let clients = Arc::clone(&self.clients);
        let next_id = Arc::clone(&self.next_id);
        let running = Arc::clone(&self.running);
        let framing = self.framing;
        let channel_name = self.name.clone();

        running.store(true, Ordering::SeqCst);
        self.listener_task = Some(tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                match listener.accept().await {
                    Ok((stream, _addr)) => {
                        let id = next_id.fetch_add(1, Ordering::SeqCst);
                        spawn_client_task(id, stream, framing, Arc::clone(&clients), channel_name.clone());
                    }
                    Err(e) => {
                        warn!(channel = %channel_name, error = %e, "accept failed");
                        return;
                    }
                }
            }
        }));

        Ok(())
    }

    /// Stop accepting connections, disconnect every client, and unlink the
    /// socket file. Does not remove the parent directory — that is the
    /// channel group's job.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener_task.take() {
            handle.abort();
        }
        self.clients.clear();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn spawn_client_task(
    id: ClientId,
    stream: UnixStream,
    framing: Framing,
    clients: Arc<DashMap<ClientId, ClientSlot>>,
    channel_name: String,
) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(CLIENT_SEND_CAPACITY);
    clients.insert(id, ClientSlot { tx });

    tokio::spawn(async move {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedRead::new(read_half, MessageCodec::<Envelope>::new(framing));
        let mut writer = FramedWrite::new(write_half, MessageCodec::<Envelope>::new(framing));

        loop {
            tokio::select! {
                incoming = reader.next() => {
                    match incoming {
                        Some(Ok(envelope)) => broadcast(id, envelope, &clients),
                        Some(Err(e)) => debug!(channel = %channel_name, client = id, error = %e, "decode error"),
                        None => break,
                    }
                }
                outgoing = rx.recv() => {
                    match outgoing {
                        Some(envelope) => {
                            if writer.send(envelope).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }
        clients.remove(&id);
    });
}

fn broadcast(sender_id: ClientId, envelope: Envelope, clients: &DashMap<ClientId, ClientSlot>) {
    for entry in clients.iter() {
        if *entry.key() == sender_id {
            continue;
        }
        let _ = entry.value().tx.try_send(envelope.clone());
    }
}

/// A connection to a channel from the outside: a spawned agent, the queen,
/// or a test harness.
pub struct ChannelClient {
    writer: FramedWrite<tokio::net::unix::OwnedWriteHalf, MessageCodec<Envelope>>,
    reader: FramedRead<tokio::net::unix::OwnedReadHalf, MessageCodec<Envelope>>,
    connected: bool,
}

impl ChannelClient {
    pub async fn connect(socket_path: &Path, framing: Framing) -> Result<Self, ChannelError> {
        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|source| ChannelError::BindFailed {
                path: socket_path.to_path_buf(),
                source,
            })?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            writer: FramedWrite::new(write_half, MessageCodec::new(framing)),
            reader: FramedRead::new(read_half, MessageCodec::new(framing)),
            connected: true,
        })
    }

    pub async fn send(&mut self, envelope: Envelope) -> Result<(), ChannelError> {
        self.writer
            .send(envelope)
            .await
            .map_err(ChannelError::Transport)?;
        Ok(())
    }

    /// Await the next message from any other connected client. Returns
    /// `None` once the connection closes.
    pub async fn recv(&mut self) -> Option<Result<Envelope, ChannelError>> {
        self.reader.next().await.map(|r| r.map_err(ChannelError::Transport))
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fan_out_reaches_other_clients_but_not_sender() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("general.sock");
        let mut channel = Channel::new("general", path.clone(), Framing::LengthPrefixed);
        channel.start().await.unwrap();

        let mut c1 = ChannelClient::connect(&path, Framing::LengthPrefixed).await.unwrap();
        let mut c2 = ChannelClient::connect(&path, Framing::LengthPrefixed).await.unwrap();
        // give the accept loop a tick to register both clients
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let env = Envelope::new(
            "hi",
            swarm_common::MessageData::Message {
                from: "a1".to_string(),
                role: swarm_common::Role::Agent,
                content: "hi".to_string(),
                to: None,
                progress: None,
            },
        );
        c1.send(env.clone()).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), c2.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, env);

        // c1 should not see its own broadcast
        let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), c1.recv()).await;
        assert!(nothing.is_err(), "sender must not receive its own message");

        channel.stop().await;
    }

    #[tokio::test]
    async fn start_fails_if_socket_path_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("taken.sock");
        std::fs::write(&path, b"").unwrap();
        let mut channel = Channel::new("taken", path, Framing::LengthPrefixed);
        let err = channel.start().await.unwrap_err();
        assert!(matches!(err, ChannelError::SocketExists(_)));
    }

    #[tokio::test]
    async fn stop_unlinks_the_socket_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ephemeral.sock");
        let mut channel = Channel::new("ephemeral", path.clone(), Framing::LengthPrefixed);
        channel.start().await.unwrap();
        assert!(path.exists());
        channel.stop().await;
        assert!(!path.exists());
    }
}
