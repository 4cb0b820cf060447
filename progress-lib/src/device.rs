//! Mapping a host device identifier to an output device index.

use log::{debug, warn};
use rodio::cpal::traits::{DeviceTrait, HostTrait};

/// Answers which backend device index corresponds to a host device id.
/// `None` means "use the system default".
pub trait DeviceResolver: Send + Sync {
    fn resolve_device_index(&self, host_device_id: &str) -> Option<usize>;
}

/// Always picks the system default device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDevice;

impl DeviceResolver for DefaultDevice {
    fn resolve_device_index(&self, _host_device_id: &str) -> Option<usize> {
        None
    }
}

/// Matches the host id against output device names exactly.
///
/// There is no stable cross-platform device identity, so anything that does
/// not match a name verbatim resolves to the default device.
#[derive(Debug, Clone, Default)]
pub struct ExactNameResolver {
    names: Option<Vec<String>>,
}

impl ExactNameResolver {
    /// Enumerate the default host's output devices on every lookup.
    pub fn system() -> Self {
        Self { names: None }
    }

    /// Resolve against a fixed list, e.g. one supplied by a device monitor.
    pub fn with_names(names: Vec<String>) -> Self {
        Self { names: Some(names) }
    }
}

impl DeviceResolver for ExactNameResolver {
    fn resolve_device_index(&self, host_device_id: &str) -> Option<usize> {
        let index = match &self.names {
            Some(names) => position_of(names, host_device_id),
            None => position_of(&output_device_names(), host_device_id),
        };
        match index {
            Some(index) => debug!("device: '{}' is output device {}", host_device_id, index),
            None => warn!(
                "device: no output device named '{}', using the default device",
                host_device_id
            ),
        }
        index
    }
}

fn position_of(names: &[String], host_device_id: &str) -> Option<usize> {
    names.iter().position(|name| name == host_device_id)
}

/// Names of the default host's output devices, in backend index order.
/// Devices whose name cannot be read are listed as empty strings so indices
/// stay aligned.
pub fn output_device_names() -> Vec<String> {
    let host = rodio::cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices
            .map(|device| device.name().unwrap_or_default())
            .collect(),
        Err(err) => {
            warn!("device: enumerating output devices failed: {}", err);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec![
            "Speakers (Realtek Audio)".to_string(),
            "Headphones (USB)".to_string(),
        ]
    }

    #[test]
    fn default_device_never_resolves() {
        assert_eq!(DefaultDevice.resolve_device_index("Headphones (USB)"), None);
    }

    #[test]
    fn exact_name_resolves_to_its_index() {
        let resolver = ExactNameResolver::with_names(names());
        assert_eq!(resolver.resolve_device_index("Headphones (USB)"), Some(1));
        assert_eq!(resolver.resolve_device_index("Speakers (Realtek Audio)"), Some(0));
    }

    #[test]
    fn partial_or_differently_cased_names_do_not_match() {
        let resolver = ExactNameResolver::with_names(names());
        assert_eq!(resolver.resolve_device_index("Headphones"), None);
        assert_eq!(resolver.resolve_device_index("headphones (usb)"), None);
        assert_eq!(resolver.resolve_device_index(""), None);
    }
}
