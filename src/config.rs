//! Player configuration mapping.
//!
//! The host runtime hands us a flat map of string options; this module
//! turns it into a typed [`PlayerSettings`] value before any network
//! activity starts. There is no shared configuration singleton - the
//! settings value is built once and passed into session construction.

use std::collections::HashMap;

use crate::session::DEFAULT_ENDPOINTS;
use crate::types::AudioFormat;
use crate::{Error, Result};

/// Required option: human-readable device name shown in the controller app.
pub const KEY_RECEIVER_NAME: &str = "receiverName";
/// Optional option: requested stream bitrate as a string-encoded integer.
pub const KEY_AUDIO_BITRATE: &str = "audioBitrate";

/// Initial renderer volume. Always maximum; the controller app scales it.
pub const MAX_VOLUME: u8 = 255;

/// Typed settings for one renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    /// Name announced to the service and shown in controller apps.
    pub device_name: String,
    /// Audio quality tier requested for the session.
    pub format: AudioFormat,
    /// Initial volume (0-255).
    pub volume: u8,
    /// Access-point endpoints; one is picked at random per connect.
    pub endpoints: Vec<String>,
}

impl PlayerSettings {
    /// Map generic key/value options into typed settings.
    ///
    /// `receiverName` is required and missing it is a hard error.
    /// `audioBitrate` degrades gracefully: `"160"` selects the low tier,
    /// `"96"` the medium tier, and any other value - including ones that
    /// fail to parse as an integer - falls through to the high tier.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut options = HashMap::new();
    /// options.insert("receiverName".to_string(), "Kitchen".to_string());
    /// options.insert("audioBitrate".to_string(), "160".to_string());
    /// let settings = PlayerSettings::from_options(&options)?;
    /// assert_eq!(settings.format, AudioFormat::Low);
    /// ```
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let device_name = options
            .get(KEY_RECEIVER_NAME)
            .cloned()
            .ok_or_else(|| Error::Config(format!("missing required key `{KEY_RECEIVER_NAME}`")))?;

        let format = match options
            .get(KEY_AUDIO_BITRATE)
            .and_then(|s| s.parse::<u32>().ok())
        {
            Some(160) => AudioFormat::Low,
            Some(96) => AudioFormat::Medium,
            _ => AudioFormat::High,
        };

        Ok(Self {
            device_name,
            format,
            volume: MAX_VOLUME,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
        })
    }
}
