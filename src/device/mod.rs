//! Audio endpoint discovery.
//!
//! Enumeration produces immutable [`AudioDevice`] snapshots; it never opens
//! a stream. Render endpoints are listed alongside capture endpoints because
//! loopback capture opens them in capture direction.

#[cfg(feature = "cpal-audio")]
pub mod cpal_enumerator;

use crate::error::{AurisError, Result};
use serde::{Deserialize, Serialize};

/// Data-flow direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Records audio (microphones, monitor sources).
    Capture,
    /// Plays audio (speakers, headphones). Captured only via loopback.
    Render,
}

/// Physical transport of an endpoint, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    BuiltIn,
    Usb,
    Bluetooth,
    Hdmi,
    Virtual,
    Unknown,
}

/// Sample encoding reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    I16,
    F32,
}

/// Immutable snapshot of an audio endpoint at enumeration time.
///
/// IDs are stable for the lifetime of one snapshot but not across hot-plug;
/// a stale ID surfaces as `DeviceNotFound` when capture starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub direction: Direction,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub is_default: bool,
    pub transport: TransportKind,
}

/// Lists audio endpoints and answers loopback capability queries.
pub trait DeviceEnumerator: Send + Sync {
    /// Returns all capture and render endpoints visible to the backend.
    fn enumerate_devices(&self) -> Result<Vec<AudioDevice>>;

    /// Returns the system default endpoint for a direction, if any.
    fn default_device(&self, direction: Direction) -> Result<Option<AudioDevice>>;

    /// True when the backend can open this device for loopback capture.
    fn supports_loopback(&self, device: &AudioDevice) -> bool;

    /// Drops any cached enumeration so the next call hits the backend.
    fn refresh(&self) {}
}

/// Infers the physical transport from a device name.
pub fn infer_transport(name: &str) -> TransportKind {
    let lower = name.to_lowercase();
    if lower.contains("monitor") || lower.contains("loopback") || lower.contains("virtual") {
        TransportKind::Virtual
    } else if lower.contains("hdmi") || lower.contains("displayport") {
        TransportKind::Hdmi
    } else if lower.contains("usb") {
        TransportKind::Usb
    } else if lower.contains("bluetooth") || lower.contains("bluez") || lower.contains("airpods") {
        TransportKind::Bluetooth
    } else if lower.contains("built-in") || lower.contains("internal") {
        TransportKind::BuiltIn
    } else {
        TransportKind::Unknown
    }
}

/// Picks the best capture target from a snapshot.
///
/// Priority: default render with loopback support, any render with loopback,
/// default capture, any capture.
pub fn auto_select<'a>(
    devices: &'a [AudioDevice],
    enumerator: &dyn DeviceEnumerator,
) -> Option<&'a AudioDevice> {
    devices
        .iter()
        .find(|d| d.direction == Direction::Render && d.is_default && enumerator.supports_loopback(d))
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.direction == Direction::Render && enumerator.supports_loopback(d))
        })
        .or_else(|| {
            devices
                .iter()
                .find(|d| d.direction == Direction::Capture && d.is_default)
        })
        .or_else(|| devices.iter().find(|d| d.direction == Direction::Capture))
}

/// Picks a loopback-capable target, preferring the default render endpoint.
///
/// Unlike [`auto_select`] this never falls back to a plain microphone; use
/// it when the caller specifically wants playback audio.
pub fn require_loopback<'a>(
    devices: &'a [AudioDevice],
    enumerator: &dyn DeviceEnumerator,
) -> Result<&'a AudioDevice> {
    devices
        .iter()
        .find(|d| {
            d.direction == Direction::Render && d.is_default && enumerator.supports_loopback(d)
        })
        .or_else(|| devices.iter().find(|d| enumerator.supports_loopback(d)))
        .ok_or(AurisError::NoLoopbackDevices)
}

/// Serializes a device snapshot for UI/tooling consumption.
pub fn devices_to_json(devices: &[AudioDevice]) -> Result<String> {
    serde_json::to_string_pretty(devices)
        .map_err(|e| crate::error::AurisError::Other(format!("device list serialization: {}", e)))
}

/// Scripted enumerator for tests and offline runs.
pub struct MockDeviceEnumerator {
    devices: Vec<AudioDevice>,
    loopback_capable: Vec<String>,
    should_fail: bool,
}

impl MockDeviceEnumerator {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            loopback_capable: Vec::new(),
            should_fail: false,
        }
    }

    pub fn with_devices(mut self, devices: Vec<AudioDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Marks device IDs as loopback-capable.
    pub fn with_loopback_capable(mut self, ids: Vec<String>) -> Self {
        self.loopback_capable = ids;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockDeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for MockDeviceEnumerator {
    fn enumerate_devices(&self) -> Result<Vec<AudioDevice>> {
        if self.should_fail {
            return Err(crate::error::AurisError::Other(
                "mock enumeration failure".to_string(),
            ));
        }
        Ok(self.devices.clone())
    }

    fn default_device(&self, direction: Direction) -> Result<Option<AudioDevice>> {
        Ok(self
            .devices
            .iter()
            .find(|d| d.direction == direction && d.is_default)
            .cloned())
    }

    fn supports_loopback(&self, device: &AudioDevice) -> bool {
        self.loopback_capable.contains(&device.id)
    }
}
