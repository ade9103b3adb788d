//! CDP transport layer
//!
//! Launches Chrome, speaks the DevTools WebSocket protocol, and routes
//! responses back to the futures waiting on them. One dedicated OS thread
//! reads frames; everything else suspends on channels.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// Locate a Chrome or Chromium binary in the usual install locations.
pub fn find_chrome() -> Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        vec![]
    };

    candidates
        .into_iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or(Error::ChromeNotFound)
}

/// Launch Chrome and scrape the DevTools WebSocket URL from its stderr.
///
/// Chrome prints `DevTools listening on ws://127.0.0.1:PORT/devtools/...`
/// once the debugging endpoint is up.
pub fn launch_chrome(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut cmd = Command::new(path);
    cmd.args(args)
        .arg("--remote-debugging-port=0") // let Chrome pick a free port
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::Launch(format!("Failed to spawn Chrome: {}", e)))?;

    let stderr = match child.stderr.take() {
        Some(s) => s,
        None => {
            // Never leak a half-launched process.
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Launch("No stderr from Chrome".into()));
        }
    };

    let reader = BufReader::new(stderr);
    let mut ws_url = None;
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        tracing::trace!("Chrome stderr: {}", line);
        if line.contains("DevTools listening on") {
            if let Some(start) = line.find("ws://") {
                ws_url = Some(line[start..].trim().to_string());
                break;
            }
        }
    }

    match ws_url {
        Some(url) => {
            tracing::info!("Chrome DevTools URL: {}", url);
            Ok((child, url))
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::Launch(
                "Failed to read DevTools WebSocket URL from Chrome".into(),
            ))
        }
    }
}

mod opcode {
    pub const TEXT: u8 = 0x1;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Encode a single masked text frame (clients must mask, RFC 6455).
fn encode_text_frame(data: &[u8]) -> Vec<u8> {
    let len = data.len();
    let mut frame = Vec::with_capacity(14 + len);

    frame.push(0x80 | opcode::TEXT); // FIN + text

    if len < 126 {
        frame.push(0x80 | len as u8);
    } else if len < 65536 {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(0x80 | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    let mask: [u8; 4] = rand::random();
    frame.extend_from_slice(&mask);
    frame.extend(data.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}

/// Read one frame, returning (opcode, unmasked payload).
fn read_frame(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header)?;

    let op = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let mut len = (header[1] & 0x7F) as u64;

    if len == 126 {
        let mut ext = [0u8; 2];
        stream.read_exact(&mut ext)?;
        len = u16::from_be_bytes(ext) as u64;
    } else if len == 127 {
        let mut ext = [0u8; 8];
        stream.read_exact(&mut ext)?;
        len = u64::from_be_bytes(ext);
    }

    let mask = if masked {
        let mut m = [0u8; 4];
        stream.read_exact(&mut m)?;
        Some(m)
    } else {
        None
    };

    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;

    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok((op, payload))
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Transport over the DevTools WebSocket. Owns the Chrome child process;
/// dropping the transport kills it.
pub struct Transport {
    child: Mutex<Child>,
    writer: Mutex<TcpStream>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl Transport {
    /// Perform the WebSocket handshake against a freshly launched Chrome.
    ///
    /// Takes ownership of the child process; on any handshake failure the
    /// process is killed before the error is returned, so a failed connect
    /// never leaks a running browser.
    pub fn connect(mut child: Child, ws_url: &str) -> Result<Self> {
        match Self::handshake(ws_url) {
            Ok(stream) => Self::start(child, stream, ws_url),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(e)
            }
        }
    }

    fn handshake(ws_url: &str) -> Result<TcpStream> {
        let url = ws_url.trim_start_matches("ws://");
        let (host_port, path) = url.split_once('/').unwrap_or((url, ""));

        let mut stream = TcpStream::connect(host_port)
            .map_err(|e| Error::transport_io("Failed to connect to Chrome", e))?;

        let key = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            rand::random::<[u8; 16]>(),
        );
        let request = format!(
            "GET /{} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n",
            path, host_port, key
        );
        stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::transport_io("Handshake write failed", e))?;

        let mut response = [0u8; 1024];
        let n = stream
            .read(&mut response)
            .map_err(|e| Error::transport_io("Handshake read failed", e))?;
        let response = String::from_utf8_lossy(&response[..n]);

        if !response.contains("101") {
            return Err(Error::transport(format!(
                "WebSocket handshake rejected: {}",
                response
            )));
        }

        Ok(stream)
    }

    fn start(child: Child, stream: TcpStream, ws_url: &str) -> Result<Self> {
        tracing::debug!("WebSocket connected to {}", ws_url);

        let reader_stream = stream
            .try_clone()
            .map_err(|e| Error::transport_io("Failed to clone stream", e))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_for_reader = Arc::clone(&pending);
        std::thread::spawn(move || Self::reader_loop(reader_stream, pending_for_reader));

        Ok(Self {
            child: Mutex::new(child),
            writer: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    /// Reader loop on a dedicated thread: resolves pending commands, answers
    /// pings, ignores unsolicited events.
    fn reader_loop(mut stream: TcpStream, pending: PendingMap) {
        loop {
            let (op, payload) = match read_frame(&mut stream) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!("WebSocket read ended: {}", e);
                    break;
                }
            };

            match op {
                opcode::TEXT => {
                    let msg: Value = match serde_json::from_slice(&payload) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("Unparseable CDP message: {}", e);
                            continue;
                        }
                    };

                    let Some(id) = msg.get("id").and_then(Value::as_u64) else {
                        // Event broadcast; readiness is polled via
                        // Runtime.evaluate, so events are not tracked.
                        continue;
                    };

                    let result = match msg.get("error") {
                        Some(error) => Err(Error::cdp(
                            msg.get("method")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown"),
                            error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                            error
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown"),
                        )),
                        None => Ok(msg.get("result").cloned().unwrap_or_else(|| json!({}))),
                    };

                    let mut guard = pending.blocking_lock();
                    if let Some(tx) = guard.remove(&id) {
                        let _ = tx.send(result);
                    } else {
                        tracing::trace!("Response for unknown id: {}", id);
                    }
                }
                opcode::PING => {
                    let pong = [0x80 | opcode::PONG, 0x80, 0, 0, 0, 0];
                    let _ = stream.write_all(&pong);
                }
                opcode::CLOSE => {
                    tracing::debug!("WebSocket closed by browser");
                    break;
                }
                _ => {}
            }
        }
    }

    /// Send a browser-level command and wait for its response.
    pub async fn send<C, R>(&self, method: &str, params: &C) -> Result<R>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        self.send_inner(None, method, params).await
    }

    /// Send a command scoped to an attached target session.
    pub async fn send_to_session<C, R>(
        &self,
        session_id: &str,
        method: &str,
        params: &C,
    ) -> Result<R>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        self.send_inner(Some(session_id), method, params).await
    }

    async fn send_inner<C, R>(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: &C,
    ) -> Result<R>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id, tx);
        }

        let mut msg = json!({
            "id": id,
            "method": method,
            "params": serde_json::to_value(params)?,
        });
        if let Some(session_id) = session_id {
            msg["sessionId"] = json!(session_id);
        }

        let data = serde_json::to_string(&msg)?;
        {
            let mut writer = self.writer.lock().await;
            writer
                .write_all(&encode_text_frame(data.as_bytes()))
                .and_then(|_| writer.flush())
                .map_err(|e| Error::transport_io("WebSocket write failed", e))?;
        }

        tracing::trace!(method, id, session = ?session_id, "Sent CDP command");

        let result = rx
            .await
            .map_err(|_| Error::transport("Response channel closed"))??;
        Ok(serde_json::from_value(result)?)
    }

    /// Close the WebSocket and kill Chrome. Idempotent: already-dead
    /// processes and broken sockets are ignored.
    pub async fn close(&self) -> Result<()> {
        {
            let mut writer = self.writer.lock().await;
            let close_frame = [0x80 | opcode::CLOSE, 0x80, 0, 0, 0, 0];
            let _ = writer.write_all(&close_frame);
        }

        let mut child = self.child.lock().await;
        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // Last-resort cleanup when close() was never called.
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip_small() {
        let payload = br#"{"id":1,"method":"Page.enable"}"#;
        let frame = encode_text_frame(payload);
        assert_eq!(frame[0], 0x80 | opcode::TEXT);
        // Mask bit set, 7-bit length
        assert_eq!(frame[1], 0x80 | payload.len() as u8);

        // Unmask and compare
        let mask = &frame[2..6];
        let unmasked: Vec<u8> = frame[6..]
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ mask[i % 4])
            .collect();
        assert_eq!(unmasked, payload);
    }

    #[test]
    fn test_frame_extended_length() {
        let payload = vec![b'x'; 300];
        let frame = encode_text_frame(&payload);
        assert_eq!(frame[1], 0x80 | 126);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 300);
    }
}
