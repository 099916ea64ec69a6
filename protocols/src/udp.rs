/// Filler byte of generated datagrams.
pub const PAYLOAD_FILL: u8 = b'A';

/// A payload of exactly `size` filler bytes, never shorter than one byte.
pub fn create_payload(size: usize) -> Vec<u8> {
    vec![PAYLOAD_FILL; size.max(1)]
}
