//! Capture interface heuristic.
//!
//! Picks a plausible interface name for the capture tool when none was given.
//! The choice is never validated: a wrong guess surfaces as a capture warning,
//! not as a run failure.

use pnet::datalink::{self, NetworkInterface};

use crate::network::target::Scope;

#[cfg(target_os = "macos")]
const FALLBACK_LOOPBACK: &str = "lo0";
#[cfg(not(target_os = "macos"))]
const FALLBACK_LOOPBACK: &str = "lo";

#[cfg(target_os = "macos")]
const FALLBACK_EXTERNAL: &str = "en0";
#[cfg(not(target_os = "macos"))]
const FALLBACK_EXTERNAL: &str = "eth0";

/// Loopback interface for local targets, the platform's usual uplink otherwise.
pub fn default_capture_interface(scope: Scope) -> String {
    match scope {
        Scope::Local => loopback_name(&datalink::interfaces()),
        Scope::External => FALLBACK_EXTERNAL.to_string(),
    }
}

fn loopback_name(interfaces: &[NetworkInterface]) -> String {
    interfaces
        .iter()
        .find(|intf| intf.is_loopback())
        .map(|intf| intf.name.clone())
        .unwrap_or_else(|| FALLBACK_LOOPBACK.to_string())
}
