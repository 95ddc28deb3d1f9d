use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use seele_monitor_reporter::ReporterArgs;
use seele_monitor_reporter::rpc::NodeRpc;
use seele_monitor_reporter::shards::ShardDirectory;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Installs the rustls provider; tests race for it, later calls are no-ops.
pub fn init_crypto() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// An in-process node answering the line-delimited JSON-RPC calls the
/// reporter issues.
#[derive(Clone)]
pub struct FakeNode {
    pub addr: SocketAddr,
    shard: Arc<AtomicU32>,
    height: Arc<AtomicU64>,
    fail_stats: Arc<AtomicBool>,
}

impl FakeNode {
    pub async fn spawn() -> eyre::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let node = Self {
            addr,
            shard: Arc::new(AtomicU32::new(2)),
            height: Arc::new(AtomicU64::new(10)),
            fail_stats: Arc::new(AtomicBool::new(false)),
        };
        tokio::spawn({
            let node = node.clone();
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    tokio::spawn(node.clone().serve_conn(stream));
                }
            }
        });
        Ok(node)
    }

    async fn serve_conn(self, stream: TcpStream) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(request) = serde_json::from_str::<Value>(&line) else {
                return;
            };
            let id = request["id"].clone();
            let response = match request["method"].as_str() {
                Some("monitor_nodeInfo") => json!({"id": id, "result": {
                    "name": "seele node",
                    "node": "node-1",
                    "port": 8057,
                    "netVersion": "7",
                    "protocol": "1.0",
                    "api": "",
                    "os": "linux",
                    "os_v": "6.1",
                    "client": "seele/1.0",
                    "canUpdateHistory": true,
                    "shard": self.shard.load(Ordering::SeqCst)
                }, "error": null}),
                Some("monitor_nodeStats") => {
                    if self.fail_stats.load(Ordering::SeqCst) {
                        json!({"id": id, "result": null, "error": "stats unavailable"})
                    } else {
                        json!({"id": id, "result": {
                            "active": true,
                            "syncing": false,
                            "mining": true,
                            "hashrate": 0,
                            "peers": 3
                        }, "error": null})
                    }
                }
                Some("miner_getHashrate") => json!({"id": id, "result": 42, "error": null}),
                Some("seele_getBlockByHeight") => json!({"id": id, "result": {
                    "header": {
                        "CreateTimestamp": 1_539_050_400i64,
                        "Difficulty": 7_032_859,
                        "Height": self.height.load(Ordering::SeqCst),
                        "Creator": "0xminer"
                    },
                    "hash": "0xhash",
                    "transactions": [{}, {}]
                }, "error": null}),
                Some("seele_getInfo") => json!({"id": id, "result": {
                    "Coinbase": "0xabc",
                    "MinerStatus": "Running"
                }, "error": null}),
                _ => json!({"id": id, "result": null, "error": "unknown method"}),
            };
            let mut response = serde_json::to_vec(&response).expect("serializes");
            response.push(b'\n');
            if write_half.write_all(&response).await.is_err() {
                return;
            }
        }
    }

    pub fn set_shard(&self, shard: u32) {
        self.shard.store(shard, Ordering::SeqCst);
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn set_fail_stats(&self, fail: bool) {
        self.fail_stats.store(fail, Ordering::SeqCst);
    }
}

/// How a [`FakeStatsServer`] behaves towards its clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsServerBehavior {
    /// Answer at most this many `node-ping` frames with a pong; `None`
    /// answers all of them.
    pub pong_budget: Option<usize>,
    /// Drop the connection right after a `hello` frame arrived.
    pub drop_after_hello: bool,
}

/// An in-process stats server collecting the frames the reporter pushes.
///
/// `node-ping` frames are answered (within the pong budget) and counted, all
/// other frames are forwarded for assertions.
pub struct FakeStatsServer {
    pub addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Value>,
    handshakes: Arc<AtomicUsize>,
    pings: Arc<AtomicUsize>,
}

impl FakeStatsServer {
    pub async fn spawn(behavior: StatsServerBehavior) -> eyre::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let handshakes = Arc::new(AtomicUsize::new(0));
        let pings = Arc::new(AtomicUsize::new(0));
        tokio::spawn({
            let handshakes = Arc::clone(&handshakes);
            let pings = Arc::clone(&pings);
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        return;
                    };
                    let frames_tx = frames_tx.clone();
                    let handshakes = Arc::clone(&handshakes);
                    let pings = Arc::clone(&pings);
                    tokio::spawn(async move {
                        let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
                            return;
                        };
                        handshakes.fetch_add(1, Ordering::SeqCst);
                        while let Some(Ok(message)) = socket.next().await {
                            let text = match message {
                                Message::Text(text) => text,
                                Message::Close(_) => return,
                                _ => continue,
                            };
                            let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
                                continue;
                            };
                            let topic = frame["emit"][0].as_str().unwrap_or_default().to_owned();
                            if topic == "node-ping" {
                                let seen = pings.fetch_add(1, Ordering::SeqCst) + 1;
                                let answer = behavior.pong_budget.is_none_or(|budget| seen <= budget);
                                if answer
                                    && socket
                                        .send(Message::text(r#"{"emit":["node-pong",{}]}"#))
                                        .await
                                        .is_err()
                                {
                                    return;
                                }
                                continue;
                            }
                            let _ = frames_tx.send(frame);
                            if behavior.drop_after_hello && topic == "hello" {
                                return;
                            }
                        }
                    });
                }
            }
        });
        Ok(Self {
            addr,
            frames,
            handshakes,
            pings,
        })
    }

    /// The next non-ping frame the reporter pushed.
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(TEST_TIMEOUT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("stats server stopped")
    }

    /// Asserts that no non-ping frame arrives within `window`.
    pub async fn expect_no_frame(&mut self, window: Duration) {
        if let Ok(frame) = tokio::time::timeout(window, self.frames.recv()).await {
            panic!("expected no frame, got {frame:?}");
        }
    }

    /// Completed websocket handshakes so far.
    pub fn handshake_count(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    /// `node-ping` frames seen so far.
    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` websocket handshakes completed.
    pub async fn wait_for_handshakes(&self, count: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            while self.handshake_count() < count {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "timed out waiting for {count} handshakes, saw {}",
                self.handshake_count()
            )
        });
    }
}

/// Reporter arguments with test-friendly cadences against the fake node.
pub fn reporter_args(node: &FakeNode, shards: ShardDirectory) -> ReporterArgs {
    ReporterArgs {
        rpc: NodeRpc::new(node.addr.to_string()),
        shards,
        app_name: "seele-monitor-api".to_owned(),
        advertised_port: 9999,
        ws_router: "/api".to_owned(),
        full_event_interval: Duration::from_millis(100),
        block_event_interval: Duration::from_millis(50),
        reconnect_delay: Duration::from_millis(50),
        resend_delay: Duration::from_millis(50),
        report_error_after: 3,
    }
}
