//! Cross-crate scenarios: a full run driven through `trafgen_core::session`
//! against loopback listeners.

#[cfg(test)]
mod session;
