//! Shared fixtures: an in-process springboard service on a loopback socket.
//!
//! The mock speaks the real wire format (length-prefixed codec frames, then
//! a raw frame after image responses) so tests exercise the full client,
//! transport and codec stack.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sbs_client::infrastructure::storage::config::ServiceEntry;
use sbs_client::{DeviceHandle, SpringboardServiceClient, StaticServiceProvider, TransportConfig};
use sbs_core::protocol::{encode_frame, KEY_ICON_STATE, KEY_INTERFACE_ORIENTATION, KEY_PNG_SIZE};
use sbs_core::value::{decode, encode};
use sbs_core::{Request, Response, StatusCode, Value, SERVICE_NAME};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const DEVICE_UDID: &str = "00008030-001A2B3C4D5E6F70";

/// How the mock misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Announce the full PNG size, send half of it, then hang up.
    DropMidPayload,
}

/// Device-side state the mock serves from and records into.
#[derive(Debug)]
pub struct DeviceState {
    pub icon_state: Value,
    pub icons: HashMap<String, Vec<u8>>,
    pub orientation: i64,
    pub wallpaper: Option<Vec<u8>>,
    pub fault: Fault,
    /// Every request received, in order.
    pub requests: Vec<Request>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            icon_state: Value::Array(vec![Value::Array(vec![])]),
            icons: HashMap::new(),
            orientation: 1,
            wallpaper: None,
            fault: Fault::None,
            requests: Vec::new(),
        }
    }
}

pub struct MockSpringboard {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<DeviceState>>,
}

impl MockSpringboard {
    /// Binds to an ephemeral loopback port and serves connections until the
    /// test ends.
    pub async fn start(state: DeviceState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock service");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(Mutex::new(state));

        let served = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&served)));
            }
        });

        Self { addr, state }
    }

    pub fn provider(&self) -> StaticServiceProvider {
        StaticServiceProvider::new(vec![ServiceEntry {
            device: Some(DEVICE_UDID.to_string()),
            service: SERVICE_NAME.to_string(),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            use_encryption: false,
        }])
    }

    pub async fn attach(&self) -> SpringboardServiceClient {
        SpringboardServiceClient::attach(&self.provider(), &DeviceHandle::new(DEVICE_UDID), &test_transport())
            .await
            .expect("attach to mock service")
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }
}

pub fn test_transport() -> TransportConfig {
    TransportConfig {
        connect_timeout: Duration::from_secs(2),
        io_timeout: Some(Duration::from_secs(2)),
        ..TransportConfig::default()
    }
}

// ── Service loop ──────────────────────────────────────────────────────────────

async fn serve(mut stream: TcpStream, state: Arc<Mutex<DeviceState>>) {
    loop {
        let Some(body) = read_frame(&mut stream).await else {
            return;
        };
        let request = match decode(&body).map_err(|e| e.to_string()).and_then(|v| {
            Request::from_value(v).map_err(|e| e.to_string())
        }) {
            Ok(request) => request,
            Err(_) => {
                let _ = write_value(&mut stream, &Response::failure(StatusCode::PlistError)).await;
                continue;
            }
        };

        // Decide the reply while holding the lock, write after releasing it.
        let (response, raw, fault) = {
            let mut state = state.lock().unwrap();
            state.requests.push(request.clone());
            let (response, raw) = handle(&mut state, request);
            (response, raw, state.fault)
        };

        if write_value(&mut stream, &response).await.is_err() {
            return;
        }
        if let Some(raw) = raw {
            if fault == Fault::DropMidPayload {
                let mut partial = (raw.len() as u32).to_be_bytes().to_vec();
                partial.extend_from_slice(&raw[..raw.len() / 2]);
                let _ = stream.write_all(&partial).await;
                let _ = stream.shutdown().await;
                return;
            }
            let frame = encode_frame(&raw).expect("raw frame fits");
            if stream.write_all(&frame).await.is_err() {
                return;
            }
        }
    }
}

fn handle(state: &mut DeviceState, request: Request) -> (Response, Option<Vec<u8>>) {
    match request {
        Request::GetIconState { .. } => (Response::success().with(KEY_ICON_STATE, state.icon_state.clone()), None),
        Request::SetIconState { icon_state } => {
            state.icon_state = icon_state;
            (Response::success(), None)
        }
        Request::GetIconPngData { bundle_id } => match state.icons.get(&bundle_id) {
            Some(png) => png_reply(png.clone()),
            None => (Response::failure(StatusCode::InvalidArg), None),
        },
        Request::GetInterfaceOrientation => (
            Response::success().with(KEY_INTERFACE_ORIENTATION, state.orientation),
            None,
        ),
        Request::GetHomeScreenWallpaperPngData => match state.wallpaper.clone() {
            Some(png) => png_reply(png),
            None => (Response::success(), None),
        },
    }
}

fn png_reply(png: Vec<u8>) -> (Response, Option<Vec<u8>>) {
    (Response::success().with(KEY_PNG_SIZE, png.len() as i64), Some(png))
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
    stream.read_exact(&mut body).await.ok()?;
    Some(body)
}

async fn write_value(stream: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let frame = encode_frame(&encode(&response.to_value()).expect("encode response")).expect("response frame fits");
    stream.write_all(&frame).await
}

/// A small PNG-looking payload of `len` bytes.
pub fn fake_png(len: usize) -> Vec<u8> {
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend((0..len.saturating_sub(png.len())).map(|i| (i % 251) as u8));
    png.truncate(len);
    png
}
