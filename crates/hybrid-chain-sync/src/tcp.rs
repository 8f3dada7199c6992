//! TCP transport: newline-delimited frames over persistent connections.
//!
//! Every accepted or dialed connection becomes a peer with a reader task
//! (lines into the shared inbound queue) and a writer task (outbound queue
//! onto the socket). A connection that never sends simply never produces a
//! frame; there are no timeouts. Closing the transport is the only shutdown
//! path.
//!
//! Frames are raw bytes up to the newline. They need not be UTF-8; decoding
//! is the receiver's business. A line longer than `max_frame_bytes` is
//! discarded and the connection stays up. A peer whose outbound queue is
//! full misses the frame rather than stalling the sender.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::ReplicationConfig;
use crate::error::{Result, SyncError};
use crate::messages::PeerId;
use crate::transport::Transport;

type Frame = (PeerId, Vec<u8>);

struct Shared {
    peers: RwLock<HashMap<PeerId, mpsc::Sender<Vec<u8>>>>,
    inbound: mpsc::Sender<Frame>,
    next_peer: AtomicU64,
    capacity: usize,
    max_frame_bytes: usize,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

enum ReadFrame {
    Frame,
    Oversized,
    Closed,
}

/// Read one newline-terminated frame into `buf`, without the terminator.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> std::io::Result<ReadFrame>
where
    R: AsyncBufRead + Unpin,
{
    let limit = max as u64 + 1;
    buf.clear();
    if AsyncReadExt::take(&mut *reader, limit).read_until(b'\n', buf).await? == 0 {
        return Ok(ReadFrame::Closed);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(ReadFrame::Frame);
    }
    if buf.len() <= max {
        // Final line with no terminator.
        return Ok(ReadFrame::Frame);
    }
    // Skip the rest of the oversized line.
    loop {
        buf.clear();
        if AsyncReadExt::take(&mut *reader, limit).read_until(b'\n', buf).await? == 0 {
            return Ok(ReadFrame::Closed);
        }
        if buf.last() == Some(&b'\n') {
            buf.clear();
            return Ok(ReadFrame::Oversized);
        }
    }
}

impl Shared {
    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    async fn register(self: &Arc<Self>, stream: TcpStream) -> PeerId {
        let id = PeerId(self.next_peer.fetch_add(1, Ordering::SeqCst));
        let remote = stream.peer_addr().ok();
        let (read_half, mut write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(self.capacity);
        self.peers.write().await.insert(id, out_tx);
        tracing::info!(peer = %id, ?remote, "peer connected");

        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let written = async {
                    write_half.write_all(&frame).await?;
                    write_half.write_all(b"\n").await
                }
                .await;
                if let Err(e) = written {
                    tracing::warn!(peer = %id, "write failed: {}", e);
                    break;
                }
            }
        });

        let shared = Arc::clone(self);
        let reader = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            let mut buf = Vec::new();
            loop {
                match read_frame(&mut reader, &mut buf, shared.max_frame_bytes).await {
                    Ok(ReadFrame::Frame) => {
                        if buf.is_empty() {
                            continue;
                        }
                        if shared.inbound.send((id, std::mem::take(&mut buf))).await.is_err() {
                            break;
                        }
                    }
                    Ok(ReadFrame::Oversized) => {
                        tracing::warn!(peer = %id, max = shared.max_frame_bytes, "discarded oversized frame");
                    }
                    Ok(ReadFrame::Closed) => break,
                    Err(e) => {
                        tracing::warn!(peer = %id, "read failed: {}", e);
                        break;
                    }
                }
            }
            shared.peers.write().await.remove(&id);
            tracing::info!(peer = %id, "peer disconnected");
        });

        self.track(writer);
        self.track(reader);
        id
    }
}

/// A [`Transport`] over TCP.
pub struct TcpTransport {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    inbound: Mutex<mpsc::Receiver<Frame>>,
}

impl TcpTransport {
    /// Bind a listener on `listen_host` at the next port from the allocator
    /// and start accepting peers.
    pub async fn bind(config: &ReplicationConfig) -> Result<Self> {
        let port = config.ports.next_port();
        let listener = TcpListener::bind((config.listen_host.as_str(), port)).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "replication listener bound");

        let capacity = config.channel_capacity.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let shared = Arc::new(Shared {
            peers: RwLock::new(HashMap::new()),
            inbound: inbound_tx,
            next_peer: AtomicU64::new(1),
            capacity,
            max_frame_bytes: config.max_frame_bytes.max(1),
            tasks: StdMutex::new(Vec::new()),
        });

        let acceptor = Arc::clone(&shared);
        let accept = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        acceptor.register(stream).await;
                    }
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                    }
                }
            }
        });
        shared.track(accept);

        Ok(Self {
            local_addr,
            shared,
            inbound: Mutex::new(inbound_rx),
        })
    }

    /// The address peers should dial.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Dial a peer and keep the connection open.
    pub async fn connect(&self, addr: impl ToSocketAddrs) -> Result<PeerId> {
        let stream = TcpStream::connect(addr).await?;
        Ok(self.shared.register(stream).await)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn broadcast(&self, frame: &[u8]) -> usize {
        let peers: Vec<(PeerId, mpsc::Sender<Vec<u8>>)> = self
            .shared
            .peers
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in peers {
            match tx.try_send(frame.to_vec()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => tracing::warn!(peer = %id, "skipping peer: outbound queue full"),
                Err(TrySendError::Closed(_)) => tracing::warn!(peer = %id, "skipping peer: connection gone"),
            }
        }
        delivered
    }

    async fn send(&self, peer: PeerId, frame: &[u8]) -> Result<()> {
        let tx = self
            .shared
            .peers
            .read()
            .await
            .get(&peer)
            .cloned()
            .ok_or(SyncError::PeerNotConnected(peer))?;
        tx.try_send(frame.to_vec()).map_err(|e| match e {
            TrySendError::Full(_) => SyncError::QueueFull(peer),
            TrySendError::Closed(_) => SyncError::PeerNotConnected(peer),
        })
    }

    async fn recv(&self) -> Option<(PeerId, Vec<u8>)> {
        self.inbound.lock().await.recv().await
    }

    async fn connected_peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.shared.peers.read().await.keys().copied().collect();
        peers.sort();
        peers
    }

    async fn close(&self) {
        let tasks: Vec<JoinHandle<()>> = self.shared.tasks.lock().unwrap().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.shared.peers.write().await.clear();
        self.inbound.lock().await.close();
        tracing::info!(local_addr = %self.local_addr, "replication listener closed");
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.shared.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}
