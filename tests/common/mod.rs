//! Shared utilities for integration testing: mock JSON-RPC chain and relay
//! servers, and /bin/sh stand-ins for the job wrapper.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Well-known anvil test key, never funded anywhere real.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Read one HTTP request off the socket and return its JSON body plus the
/// lowercased header map.
async fn read_request(
    socket: &mut tokio::net::TcpStream,
) -> Option<(Value, HashMap<String, String>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let (head_end, headers) = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let mut headers = HashMap::new();
            for line in head.lines().skip(1) {
                if let Some((name, value)) = line.split_once(':') {
                    headers.insert(name.trim().to_lowercase(), value.trim().to_string());
                }
            }
            break (pos + 4, headers);
        }
    };

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buf[head_end..head_end + content_length]).ok()?;
    Some((body, headers))
}

async fn write_json_response(socket: &mut tokio::net::TcpStream, body: &Value) {
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Handle to a mock Ethereum JSON-RPC node.
///
/// Head and nonce are mutable test knobs; a transaction has a receipt once
/// its hash (lowercase 0x hex) is added to `receipts`.
#[derive(Clone)]
pub struct MockChain {
    pub addr: SocketAddr,
    pub head: Arc<AtomicU64>,
    pub nonce: Arc<AtomicU64>,
    pub receipts: Arc<Mutex<Vec<String>>>,
}

impl MockChain {
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_head(&self, number: u64) {
        self.head.store(number, Ordering::SeqCst);
    }

    pub fn set_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }

    pub fn add_receipt(&self, tx_hash: &str) {
        self.receipts.lock().unwrap().push(tx_hash.to_lowercase());
    }

    fn receipt_json(&self, tx_hash: &str) -> Value {
        json!({
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": "0x".to_string() + &"11".repeat(32),
            "blockNumber": format!("{:#x}", self.head.load(Ordering::SeqCst)),
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": "0x0000000000000000000000000000000000000000",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "contractAddress": null,
            "logs": [],
            "logsBloom": "0x".to_string() + &"0".repeat(512),
            "status": "0x1",
            "type": "0x2"
        })
    }

    fn respond(&self, request: &Value) -> Value {
        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default();
        let result = match method {
            "eth_chainId" => json!("0x1"),
            "eth_blockNumber" => {
                json!(format!("{:#x}", self.head.load(Ordering::SeqCst)))
            }
            "eth_getTransactionCount" => {
                json!(format!("{:#x}", self.nonce.load(Ordering::SeqCst)))
            }
            "eth_getTransactionReceipt" => {
                let hash = request["params"][0].as_str().unwrap_or_default().to_lowercase();
                if self.receipts.lock().unwrap().contains(&hash) {
                    self.receipt_json(&hash)
                } else {
                    Value::Null
                }
            }
            _ => {
                return json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "method not found"}
                });
            }
        };
        json!({"jsonrpc": "2.0", "id": id, "result": result})
    }
}

/// Start a mock chain with the given head and keeper nonce.
pub async fn start_mock_chain(head: u64, nonce: u64) -> MockChain {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let chain = MockChain {
        addr: listener.local_addr().unwrap(),
        head: Arc::new(AtomicU64::new(head)),
        nonce: Arc::new(AtomicU64::new(nonce)),
        receipts: Arc::new(Mutex::new(Vec::new())),
    };

    let server = chain.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let server = server.clone();
            tokio::spawn(async move {
                if let Some((request, _)) = read_request(&mut socket).await {
                    let response = server.respond(&request);
                    write_json_response(&mut socket, &response).await;
                }
            });
        }
    });

    chain
}

/// One bundle RPC recorded by a mock relay.
#[derive(Clone, Debug)]
pub struct RecordedBundleRpc {
    pub method: String,
    pub params: Value,
    pub signature: Option<String>,
}

/// Handle to a mock flashbots-style relay.
#[derive(Clone)]
pub struct MockRelay {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<RecordedBundleRpc>>>,
    pub call_bundle_result: Arc<Mutex<Value>>,
}

impl MockRelay {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn recorded(&self, method: &str) -> Vec<RecordedBundleRpc> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    /// Make subsequent eth_callBundle responses report a reverted tx.
    pub fn script_revert(&self) {
        *self.call_bundle_result.lock().unwrap() = json!({
            "results": [
                {"txHash": "0x".to_string() + &"22".repeat(32), "error": "execution reverted"}
            ]
        });
    }
}

/// Start a mock relay whose eth_callBundle succeeds until scripted otherwise.
pub async fn start_mock_relay() -> MockRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = MockRelay {
        addr: listener.local_addr().unwrap(),
        requests: Arc::new(Mutex::new(Vec::new())),
        call_bundle_result: Arc::new(Mutex::new(json!({"results": []}))),
    };

    let server = relay.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let server = server.clone();
            tokio::spawn(async move {
                let Some((request, headers)) = read_request(&mut socket).await else {
                    return;
                };
                let method = request["method"].as_str().unwrap_or_default().to_string();
                server.requests.lock().unwrap().push(RecordedBundleRpc {
                    method: method.clone(),
                    params: request["params"].clone(),
                    signature: headers.get("x-flashbots-signature").cloned(),
                });

                let id = request["id"].clone();
                let result = match method.as_str() {
                    "eth_callBundle" => server.call_bundle_result.lock().unwrap().clone(),
                    "eth_sendBundle" => json!({"bundleHash": "0x".to_string() + &"33".repeat(32)}),
                    _ => Value::Null,
                };
                let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
                write_json_response(&mut socket, &response).await;
            });
        }
    });

    relay
}

/// Write an executable /bin/sh script standing in for the job wrapper.
/// Returns the script path. `body` runs with the wrapper's arguments in $@.
#[allow(dead_code)]
pub fn write_wrapper_script(dir: &std::path::Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    path.to_string_lossy().to_string()
}
