#![allow(dead_code)]

//! Minimal RESP2 server answering scripted replies per command name

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use redis::aio::ConnectionManager;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};

use sprout_store::RedisSettings;

#[derive(Default)]
struct StubState {
    commands: Vec<Vec<String>>,
    replies: HashMap<String, VecDeque<Vec<u8>>>,
}

pub struct StubRedis {
    addr: SocketAddr,
    state: Arc<Mutex<StubState>>,
}

impl StubRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(StubState::default()));

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, shared.clone()));
            }
        });

        Self { addr, state }
    }

    pub async fn connect(&self) -> ConnectionManager {
        let settings = RedisSettings::new(format!("redis://{}", self.addr));
        sprout_store::connect(&settings).await.unwrap()
    }

    /// Queue a raw reply for the next `command`; unscripted commands get `+OK`
    pub fn reply(&self, command: &str, raw: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .unwrap()
            .replies
            .entry(command.to_ascii_uppercase())
            .or_default()
            .push_back(raw.into());
    }

    /// Received commands named `command`, with all arguments
    pub fn commands(&self, command: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|args| args.first().is_some_and(|a| a.eq_ignore_ascii_case(command)))
            .cloned()
            .collect()
    }
}

async fn serve(socket: TcpStream, state: Arc<Mutex<StubState>>) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await {
        let reply = {
            let mut state = state.lock().unwrap();
            let name = args
                .first()
                .map(|a| a.to_ascii_uppercase())
                .unwrap_or_default();
            state.commands.push(args);
            state
                .replies
                .get_mut(&name)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| b"+OK\r\n".to_vec())
        };
        if write.write_all(&reply).await.is_err() {
            break;
        }
    }
}

async fn read_command(reader: &mut BufReader<OwnedReadHalf>) -> Option<Vec<String>> {
    let header = read_line(reader).await?;
    let count: usize = header.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(reader).await?.strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Some(args)
}

async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> Option<String> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    Some(line.trim_end().to_string())
}

// ============================================================================
// RESP encoding
// ============================================================================

pub fn bulk(value: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", value.len()).into_bytes();
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn array(items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend(item);
    }
    out
}

/// One stream entry as returned inside an XREADGROUP reply
pub fn entry(id: &str, fields: &[(&str, &[u8])]) -> Vec<u8> {
    let flat = fields
        .iter()
        .flat_map(|(k, v)| [bulk(k.as_bytes()), bulk(v)])
        .collect();
    array(vec![bulk(id.as_bytes()), array(flat)])
}

/// XREADGROUP reply for a single stream
pub fn read_reply(stream: &str, entries: Vec<Vec<u8>>) -> Vec<u8> {
    array(vec![array(vec![bulk(stream.as_bytes()), array(entries)])])
}

/// Whether `args` contains `key` immediately followed by `value`
pub fn has_pair(args: &[String], key: &str, value: &str) -> bool {
    args.windows(2)
        .any(|w| w[0].eq_ignore_ascii_case(key) && w[1] == value)
}
