//! Springboard services client.
//!
//! Springboard is the device's home-screen manager.  Its service answers five
//! commands, each a single request/response round trip over one
//! [`TransportSession`]:
//!
//! | method                                 | command                         | result                  |
//! |----------------------------------------|---------------------------------|-------------------------|
//! | `get_icon_state`                       | `getIconState`                  | layout [`Value`]        |
//! | `set_icon_state`                       | `setIconState`                  | `()`                    |
//! | `get_icon_pngdata`                     | `getIconPNGData`                | [`ImagePayload`]        |
//! | `get_interface_orientation`            | `getInterfaceOrientation`       | [`InterfaceOrientation`]|
//! | `get_home_screen_wallpaper_pngdata`    | `getHomescreenWallpaperPNGData` | [`ImagePayload`]        |
//!
//! The two image commands answer with a dictionary announcing `pngSize` and
//! then one raw frame holding exactly that many bytes.
//!
//! # Session state (for beginners)
//!
//! The client is either *open* or *closed*:
//!
//! ```text
//!   attach / from_session ──► Open ──close()──────────────► Closed
//!                              │                               ▲
//!                              └─ any ConnectionFailed error ──┘
//! ```
//!
//! Once closed, every method returns [`SbsError::ConnectionClosed`] without
//! touching the network.  There is no reconnect: build a new client.
//!
//! Every method takes `&mut self`, so two requests can never interleave on
//! the same connection.  To share one client between tasks, wrap it in a
//! `tokio::sync::Mutex`.

use sbs_core::{
    protocol::{KEY_ICON_STATE, KEY_INTERFACE_ORIENTATION},
    ImagePayload, InterfaceOrientation, Request, Response, SbsError, Value, SERVICE_NAME,
};
use tracing::{debug, info, warn};

use crate::infrastructure::lockdown::{negotiate, DeviceHandle, ServiceProvider};
use crate::infrastructure::transport::{TransportConfig, TransportSession};

/// Client for the `com.apple.springboardservices` device service.
#[derive(Debug)]
pub struct SpringboardServiceClient {
    session: Option<TransportSession>,
}

/// A decoded reply plus the raw payload, for image commands.
struct Reply {
    response: Response,
    payload: Option<ImagePayload>,
}

impl SpringboardServiceClient {
    /// Starts the springboard service on `device` and connects to it.
    ///
    /// # Errors
    ///
    /// Whatever [`negotiate`] or [`TransportSession::open`] returns; nothing
    /// is retried.
    pub async fn attach(
        provider: &dyn ServiceProvider,
        device: &DeviceHandle,
        config: &TransportConfig,
    ) -> Result<Self, SbsError> {
        let descriptor = negotiate(provider, device, SERVICE_NAME).await?;
        let session = TransportSession::open(descriptor, config).await?;
        info!(%device, peer = session.peer(), "springboard client attached");
        Ok(Self::from_session(session))
    }

    /// Wraps an already-open session.
    pub fn from_session(session: TransportSession) -> Self {
        let session = (!session.is_closed()).then_some(session);
        Self { session }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Closes the connection.  Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
            info!("springboard client closed");
        }
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Fetches the home-screen layout.
    pub async fn get_icon_state(&mut self) -> Result<Value, SbsError> {
        self.get_icon_state_with_format(None).await
    }

    /// Fetches the home-screen layout in a specific format version.
    ///
    /// Newer devices use `"2"` for layouts that include widgets and app
    /// library pages.  `None` lets the device pick.
    pub async fn get_icon_state_with_format(&mut self, format_version: Option<&str>) -> Result<Value, SbsError> {
        let request = Request::GetIconState {
            format_version: format_version.map(str::to_string),
        };
        let mut reply = self.call(request).await?;
        reply.response.take(KEY_ICON_STATE)
    }

    /// Replaces the home-screen layout.
    ///
    /// `new_state` is normally a layout fetched with
    /// [`get_icon_state`](Self::get_icon_state) and then edited.
    pub async fn set_icon_state(&mut self, new_state: &Value) -> Result<(), SbsError> {
        let request = Request::SetIconState {
            icon_state: new_state.clone(),
        };
        self.call(request).await.map(|_| ())
    }

    /// Fetches the PNG icon for the app `bundle_id`.
    ///
    /// # Errors
    ///
    /// [`SbsError::InvalidArgument`] if `bundle_id` is empty; no request is
    /// sent in that case.
    pub async fn get_icon_pngdata(&mut self, bundle_id: &str) -> Result<ImagePayload, SbsError> {
        if bundle_id.is_empty() {
            return Err(SbsError::InvalidArgument("bundle id must not be empty".to_string()));
        }
        let request = Request::GetIconPngData {
            bundle_id: bundle_id.to_string(),
        };
        let reply = self.call(request).await?;
        Ok(reply.payload.unwrap_or_default())
    }

    /// Reads the current interface orientation.
    ///
    /// Numbers this client does not know come back as
    /// [`InterfaceOrientation::Unrecognized`].
    pub async fn get_interface_orientation(&mut self) -> Result<InterfaceOrientation, SbsError> {
        let reply = self.call(Request::GetInterfaceOrientation).await?;
        let raw = reply.response.integer(KEY_INTERFACE_ORIENTATION)?;
        Ok(InterfaceOrientation::from_raw(raw))
    }

    /// Fetches the home-screen wallpaper as PNG.
    pub async fn get_home_screen_wallpaper_pngdata(&mut self) -> Result<ImagePayload, SbsError> {
        let reply = self.call(Request::GetHomeScreenWallpaperPngData).await?;
        Ok(reply.payload.unwrap_or_default())
    }

    // ── Round trip ────────────────────────────────────────────────────────────

    /// Sends `request`, reads its reply and applies the state rules.
    async fn call(&mut self, request: Request) -> Result<Reply, SbsError> {
        let command = request.command();
        let session = self.session.as_mut().ok_or(SbsError::ConnectionClosed)?;
        debug!(%command, "sending request");

        let result = exchange(session, &request).await;

        if let Err(err) = &result {
            if err.is_fatal() {
                warn!(%command, "{err}; closing springboard client");
                self.close().await;
            } else {
                debug!(%command, "request failed: {err}");
            }
        }
        // The session may have closed itself after losing frame alignment.
        if self.session.as_ref().is_some_and(TransportSession::is_closed) {
            self.session = None;
        }
        result
    }
}

async fn exchange(session: &mut TransportSession, request: &Request) -> Result<Reply, SbsError> {
    session.send_value(&request.to_value()).await?;
    let response = Response::from_value(session.receive_value().await?)?.into_result()?;

    if !request.expects_raw_payload() {
        return Ok(Reply {
            response,
            payload: None,
        });
    }

    let announced = match response.announced_png_size() {
        Ok(announced) => announced,
        Err(e) => {
            // A raw frame may or may not follow; the stream can't be trusted.
            session.close().await;
            return Err(e);
        }
    };
    let payload = match announced {
        Some(size) => {
            let bytes = session.receive_raw(size).await?;
            if bytes.len() != size {
                return Err(SbsError::StructuredData(format!(
                    "announced {size} payload bytes, received {}",
                    bytes.len()
                )));
            }
            ImagePayload::new(bytes)
        }
        None => {
            debug!(command = %request.command(), "service returned no image payload");
            ImagePayload::empty()
        }
    };
    Ok(Reply {
        response,
        payload: Some(payload),
    })
}
