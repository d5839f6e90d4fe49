//! Shared test utilities and fixtures
//!
//! Fake language servers are small `sh` scripts, so the proxy tests only run
//! on unix.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use sieve_lsp::ServerConfig;
use sieve_lsp::codec::{FrameReader, FrameWriter};

pub const INITIALIZE: &[u8] =
    br#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{"processId":null,"rootUri":null,"capabilities":{}}}"#;
pub const INITIALIZED: &[u8] = br#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#;
pub const SHUTDOWN: &[u8] = br#"{"jsonrpc":"2.0","id":1,"method":"shutdown"}"#;
pub const EXIT: &[u8] = br#"{"jsonrpc":"2.0","method":"exit"}"#;

/// A server that runs `script` under `sh -c`.
pub fn sh_server(script: &str) -> ServerConfig {
    ServerConfig::new("sh").with_args(vec!["-c".to_string(), script.to_string()])
}

/// Frame `bodies` the way an editor would.
pub async fn framed(bodies: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut writer = FrameWriter::new(&mut buf);
    for body in bodies {
        writer.write_body(body).await.unwrap();
    }
    buf
}

/// Parse editor-side output back into JSON bodies. Panics on framing errors.
pub async fn read_bodies(bytes: &[u8]) -> Vec<serde_json::Value> {
    let mut reader = FrameReader::new(bytes);
    let mut bodies = Vec::new();
    while let Some(body) = reader.read_frame().await.unwrap() {
        bodies.push(serde_json::from_slice(&body).unwrap());
    }
    bodies
}

/// Poll `path` until it contains `needle`. Background log writers may lag
/// behind the end of a session.
pub async fn wait_for_file_contains(path: &Path, needle: &str) -> String {
    let mut content = String::new();
    for _ in 0..100 {
        content = std::fs::read_to_string(path).unwrap_or_default();
        if content.contains(needle) {
            return content;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} never contained {needle:?}; last content: {content:?}", path.display());
}
