//! Springboard services request and response messages.
//!
//! Every request is a dictionary with a `command` key plus command-specific
//! parameters.  Every response is a dictionary with an integer `status` key
//! plus command-specific results.  The two image commands follow a successful
//! response with one raw frame holding exactly `pngSize` bytes.
//!
//! | command                         | request keys        | response keys          |
//! |---------------------------------|---------------------|------------------------|
//! | `getIconState`                  | `formatVersion`?    | `iconState`            |
//! | `setIconState`                  | `iconState`         | –                      |
//! | `getIconPNGData`                | `bundleId`          | `pngSize`? + raw frame |
//! | `getInterfaceOrientation`       | –                   | `interfaceOrientation` |
//! | `getHomescreenWallpaperPNGData` | –                   | `pngSize`? + raw frame |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{error_for_status, SbsError, StatusCode};
use crate::value::{Dictionary, Value};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Service name requested from lockdown.
pub const SERVICE_NAME: &str = "com.apple.springboardservices";

pub const KEY_COMMAND: &str = "command";
pub const KEY_STATUS: &str = "status";
pub const KEY_ICON_STATE: &str = "iconState";
pub const KEY_FORMAT_VERSION: &str = "formatVersion";
pub const KEY_BUNDLE_ID: &str = "bundleId";
pub const KEY_PNG_SIZE: &str = "pngSize";
pub const KEY_INTERFACE_ORIENTATION: &str = "interfaceOrientation";

// ── Commands ──────────────────────────────────────────────────────────────────

/// The five RPC operations understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    GetIconState,
    SetIconState,
    GetIconPngData,
    GetInterfaceOrientation,
    GetHomeScreenWallpaperPngData,
}

impl Command {
    /// The identifier carried in the `command` key.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::GetIconState => "getIconState",
            Command::SetIconState => "setIconState",
            Command::GetIconPngData => "getIconPNGData",
            Command::GetInterfaceOrientation => "getInterfaceOrientation",
            Command::GetHomeScreenWallpaperPngData => "getHomescreenWallpaperPNGData",
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, ()> {
        match value {
            "getIconState" => Ok(Command::GetIconState),
            "setIconState" => Ok(Command::SetIconState),
            "getIconPNGData" => Ok(Command::GetIconPngData),
            "getInterfaceOrientation" => Ok(Command::GetInterfaceOrientation),
            "getHomescreenWallpaperPNGData" => Ok(Command::GetHomeScreenWallpaperPngData),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// A request sent to the springboard service.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetIconState { format_version: Option<String> },
    SetIconState { icon_state: Value },
    GetIconPngData { bundle_id: String },
    GetInterfaceOrientation,
    GetHomeScreenWallpaperPngData,
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::GetIconState { .. } => Command::GetIconState,
            Request::SetIconState { .. } => Command::SetIconState,
            Request::GetIconPngData { .. } => Command::GetIconPngData,
            Request::GetInterfaceOrientation => Command::GetInterfaceOrientation,
            Request::GetHomeScreenWallpaperPngData => Command::GetHomeScreenWallpaperPngData,
        }
    }

    /// Whether a successful response is followed by a raw image frame.
    pub fn expects_raw_payload(&self) -> bool {
        matches!(
            self,
            Request::GetIconPngData { .. } | Request::GetHomeScreenWallpaperPngData
        )
    }

    /// Builds the dictionary sent on the wire.
    pub fn to_value(&self) -> Value {
        let mut dict = Dictionary::new();
        dict.insert(KEY_COMMAND, self.command().as_str());
        match self {
            Request::GetIconState { format_version } => {
                if let Some(version) = format_version {
                    dict.insert(KEY_FORMAT_VERSION, version.as_str());
                }
            }
            Request::SetIconState { icon_state } => {
                dict.insert(KEY_ICON_STATE, icon_state.clone());
            }
            Request::GetIconPngData { bundle_id } => {
                dict.insert(KEY_BUNDLE_ID, bundle_id.as_str());
            }
            Request::GetInterfaceOrientation | Request::GetHomeScreenWallpaperPngData => {}
        }
        Value::Dictionary(dict)
    }

    /// Parses a request dictionary.  Used by the service side and by test doubles.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::StructuredData`] if the value is not a dictionary
    /// with a known `command` and the parameters that command needs.
    pub fn from_value(value: Value) -> Result<Self, SbsError> {
        let mut dict = value.into_dictionary().map_err(|other| {
            SbsError::StructuredData(format!("request must be a dictionary, got {}", other.type_name()))
        })?;
        let command_name = match dict.get(KEY_COMMAND) {
            Some(Value::String(s)) => s.clone(),
            _ => {
                return Err(SbsError::StructuredData(
                    "request is missing a string command".to_string(),
                ))
            }
        };
        let command = Command::try_from(command_name.as_str()).map_err(|_| {
            SbsError::StructuredData(format!("unknown command: {command_name}"))
        })?;

        let request = match command {
            Command::GetIconState => Request::GetIconState {
                format_version: match dict.remove(KEY_FORMAT_VERSION) {
                    None => None,
                    Some(Value::String(s)) => Some(s),
                    Some(other) => return Err(wrong_type(KEY_FORMAT_VERSION, "string", &other)),
                },
            },
            Command::SetIconState => Request::SetIconState {
                icon_state: dict
                    .remove(KEY_ICON_STATE)
                    .ok_or_else(|| missing(KEY_ICON_STATE))?,
            },
            Command::GetIconPngData => match dict.remove(KEY_BUNDLE_ID) {
                Some(Value::String(bundle_id)) => Request::GetIconPngData { bundle_id },
                Some(other) => return Err(wrong_type(KEY_BUNDLE_ID, "string", &other)),
                None => return Err(missing(KEY_BUNDLE_ID)),
            },
            Command::GetInterfaceOrientation => Request::GetInterfaceOrientation,
            Command::GetHomeScreenWallpaperPngData => Request::GetHomeScreenWallpaperPngData,
        };
        Ok(request)
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// A decoded response: the status plus every other key, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: i64,
    body: Dictionary,
}

impl Response {
    pub fn success() -> Self {
        Self::with_status(StatusCode::Success.raw())
    }

    pub fn failure(status: StatusCode) -> Self {
        Self::with_status(status.raw())
    }

    pub fn with_status(status: i64) -> Self {
        Self {
            status,
            body: Dictionary::new(),
        }
    }

    /// Adds a result key.  Builder-style, used when constructing responses.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key, value);
        self
    }

    pub fn status(&self) -> i64 {
        self.status
    }

    pub fn body(&self) -> &Dictionary {
        &self.body
    }

    /// Builds the dictionary sent on the wire, `status` first.
    pub fn to_value(&self) -> Value {
        let mut dict = Dictionary::with_capacity(self.body.len() + 1);
        dict.insert(KEY_STATUS, self.status);
        for (key, value) in self.body.iter() {
            dict.insert(key, value.clone());
        }
        Value::Dictionary(dict)
    }

    /// Parses a response dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::StructuredData`] if the value is not a dictionary
    /// with an integer `status`.
    pub fn from_value(value: Value) -> Result<Self, SbsError> {
        let mut body = value.into_dictionary().map_err(|other| {
            SbsError::StructuredData(format!("response must be a dictionary, got {}", other.type_name()))
        })?;
        let status = match body.remove(KEY_STATUS) {
            Some(Value::Integer(status)) => status,
            Some(other) => return Err(wrong_type(KEY_STATUS, "integer", &other)),
            None => return Err(missing(KEY_STATUS)),
        };
        Ok(Self { status, body })
    }

    /// Converts a failure status into its mapped error.
    ///
    /// # Errors
    ///
    /// Returns the [`error_for_status`] error for any non-success status.
    pub fn into_result(self) -> Result<Self, SbsError> {
        match error_for_status(self.status) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Removes and returns a required result key.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::StructuredData`] if the key is absent.
    pub fn take(&mut self, key: &str) -> Result<Value, SbsError> {
        self.body.remove(key).ok_or_else(|| missing(key))
    }

    /// Reads a required integer result key.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::StructuredData`] if the key is absent or not an integer.
    pub fn integer(&self, key: &str) -> Result<i64, SbsError> {
        match self.body.get(key) {
            Some(Value::Integer(i)) => Ok(*i),
            Some(other) => Err(wrong_type(key, "integer", other)),
            None => Err(missing(key)),
        }
    }

    /// Reads the optional `pngSize` announcement.
    ///
    /// `None` means the service supplied no payload.
    ///
    /// # Errors
    ///
    /// Returns [`SbsError::StructuredData`] if the key is present but not a
    /// non-negative integer.
    pub fn announced_png_size(&self) -> Result<Option<usize>, SbsError> {
        match self.body.get(KEY_PNG_SIZE) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(size)) => usize::try_from(*size).map(Some).map_err(|_| {
                SbsError::StructuredData(format!("{KEY_PNG_SIZE} must be non-negative, got {size}"))
            }),
            Some(other) => Err(wrong_type(KEY_PNG_SIZE, "integer", other)),
        }
    }
}

fn missing(key: &str) -> SbsError {
    SbsError::StructuredData(format!("missing key: {key}"))
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> SbsError {
    SbsError::StructuredData(format!(
        "key {key}: expected {expected}, got {}",
        got.type_name()
    ))
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Orientation of the device's user interface.
///
/// Values added by future service versions are kept as [`Unrecognized`]
/// rather than rejected.
///
/// [`Unrecognized`]: InterfaceOrientation::Unrecognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterfaceOrientation {
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
    Unrecognized(i64),
}

impl InterfaceOrientation {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => InterfaceOrientation::Unknown,
            1 => InterfaceOrientation::Portrait,
            2 => InterfaceOrientation::PortraitUpsideDown,
            3 => InterfaceOrientation::LandscapeRight,
            4 => InterfaceOrientation::LandscapeLeft,
            other => InterfaceOrientation::Unrecognized(other),
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            InterfaceOrientation::Unknown => 0,
            InterfaceOrientation::Portrait => 1,
            InterfaceOrientation::PortraitUpsideDown => 2,
            InterfaceOrientation::LandscapeRight => 3,
            InterfaceOrientation::LandscapeLeft => 4,
            InterfaceOrientation::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for InterfaceOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceOrientation::Unknown => f.write_str("unknown"),
            InterfaceOrientation::Portrait => f.write_str("portrait"),
            InterfaceOrientation::PortraitUpsideDown => f.write_str("portrait-upside-down"),
            InterfaceOrientation::LandscapeRight => f.write_str("landscape-right"),
            InterfaceOrientation::LandscapeLeft => f.write_str("landscape-left"),
            InterfaceOrientation::Unrecognized(raw) => write!(f, "unrecognized ({raw})"),
        }
    }
}

/// PNG bytes returned by the image commands.  Owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePayload {
    data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The payload for a successful response that carried no image.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
