//! Device enumeration backed by CPAL (Cross-Platform Audio Library).

use crate::defaults;
use crate::device::{AudioDevice, DeviceEnumerator, Direction, SampleFormat, infer_transport};
use crate::error::{AurisError, Result};
use crate::sys::with_suppressed_stderr;
use cpal::traits::{DeviceTrait, HostTrait};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Maps CPAL's sample format onto the snapshot representation.
///
/// Exotic integer widths are reported as I16; the capture engine converts
/// everything to f32 in software anyway.
fn map_sample_format(format: cpal::SampleFormat) -> SampleFormat {
    match format {
        cpal::SampleFormat::F32 | cpal::SampleFormat::F64 => SampleFormat::F32,
        _ => SampleFormat::I16,
    }
}

struct CacheEntry {
    taken_at: Instant,
    devices: Vec<AudioDevice>,
}

/// Enumerates endpoints through the default CPAL host.
///
/// Snapshots are cached for a short TTL; UI code tends to re-enumerate on
/// every repaint and backend probing is not cheap.
pub struct CpalDeviceEnumerator {
    cache: Mutex<Option<CacheEntry>>,
    ttl: Duration,
}

impl CpalDeviceEnumerator {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(defaults::DEVICE_CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(None),
            ttl,
        }
    }

    fn snapshot(&self) -> Result<Vec<AudioDevice>> {
        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| AurisError::Other("device cache lock poisoned".to_string()))?;
            if let Some(entry) = cache.as_ref()
                && entry.taken_at.elapsed() < self.ttl
            {
                return Ok(entry.devices.clone());
            }
        }

        let devices = enumerate_backend()?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| AurisError::Other("device cache lock poisoned".to_string()))?;
        *cache = Some(CacheEntry {
            taken_at: Instant::now(),
            devices: devices.clone(),
        });
        Ok(devices)
    }
}

impl Default for CpalDeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for CpalDeviceEnumerator {
    fn enumerate_devices(&self) -> Result<Vec<AudioDevice>> {
        self.snapshot()
    }

    fn default_device(&self, direction: Direction) -> Result<Option<AudioDevice>> {
        Ok(self
            .snapshot()?
            .into_iter()
            .find(|d| d.direction == direction && d.is_default))
    }

    fn supports_loopback(&self, device: &AudioDevice) -> bool {
        match device.direction {
            // WASAPI can open render endpoints as loopback capture streams;
            // other backends cannot.
            Direction::Render => cfg!(target_os = "windows"),
            // PulseAudio/PipeWire monitor sources are the loopback path on
            // Linux and show up as virtual capture endpoints.
            Direction::Capture => device.transport == crate::device::TransportKind::Virtual,
        }
    }

    fn refresh(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = None;
        }
    }
}

/// Queries the backend for all endpoints. No caching at this layer.
fn enumerate_backend() -> Result<Vec<AudioDevice>> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let inputs = host.input_devices().map_err(|e| AurisError::CaptureFailed {
            message: format!("Failed to enumerate input devices: {}", e),
        })?;
        for device in inputs {
            if let Some(snapshot) =
                describe_device(&device, Direction::Capture, default_input.as_deref())
            {
                devices.push(snapshot);
            }
        }

        let outputs = host
            .output_devices()
            .map_err(|e| AurisError::CaptureFailed {
                message: format!("Failed to enumerate output devices: {}", e),
            })?;
        for device in outputs {
            if let Some(snapshot) =
                describe_device(&device, Direction::Render, default_output.as_deref())
            {
                devices.push(snapshot);
            }
        }

        Ok(devices)
    })
}

/// Builds a snapshot for one endpoint. Devices that refuse to report a name
/// or default config are skipped rather than failing the whole enumeration.
fn describe_device(
    device: &cpal::Device,
    direction: Direction,
    default_name: Option<&str>,
) -> Option<AudioDevice> {
    let name = device.name().ok()?;
    let config = match direction {
        Direction::Capture => device.default_input_config().ok()?,
        Direction::Render => device.default_output_config().ok()?,
    };

    Some(AudioDevice {
        // CPAL exposes no stable IDs; names are the best handle available
        id: name.clone(),
        transport: infer_transport(&name),
        direction,
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
        sample_format: map_sample_format(config.sample_format()),
        is_default: default_name == Some(name.as_str()),
        name,
    })
}

/// Finds the CPAL device matching an enumeration ID, searching capture
/// endpoints first. Used by the capture engine at stream open.
pub(crate) fn find_device(id: &str) -> Result<(cpal::Device, Direction)> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(inputs) = host.input_devices() {
            for device in inputs {
                if device.name().is_ok_and(|name| name == id) {
                    return Ok((device, Direction::Capture));
                }
            }
        }
        if let Ok(outputs) = host.output_devices() {
            for device in outputs {
                if device.name().is_ok_and(|name| name == id) {
                    return Ok((device, Direction::Render));
                }
            }
        }

        Err(AurisError::DeviceNotFound {
            device: id.to_string(),
        })
    })
}

/// Returns the default capture device, falling back through the backend's
/// notion of "default".
pub(crate) fn default_capture_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();
        host.default_input_device()
            .ok_or_else(|| AurisError::DeviceNotFound {
                device: "default".to_string(),
            })
    })
}
