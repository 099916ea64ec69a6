//! Wire-level helpers for the probes that build their own datagrams.

pub mod dns;
pub mod udp;
