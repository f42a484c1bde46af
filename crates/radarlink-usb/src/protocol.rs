//! USB interface layout of radar boards

/// Interface class of the vendor interface carrying the board protocol
pub const VENDOR_CLASS: u8 = 0xFF;

/// Bulk OUT endpoint for control requests
pub const CONTROL_OUT_EP: u8 = 0x01;
/// Bulk IN endpoint for control responses
pub const CONTROL_IN_EP: u8 = 0x81;
/// Bulk IN endpoint streaming frames
pub const DATA_IN_EP: u8 = 0x82;

/// Largest control transfer the firmware accepts
pub const MAX_TRANSFER: usize = 4096;

/// Default control timeout in milliseconds
pub const USB_TIMEOUT_MS: u64 = 1000;

/// Length of one cancellable wait on an IN endpoint, in milliseconds
pub const SLICE_MS: u64 = 100;

/// Bytes in front of the data of every frame transfer (status word)
pub const FRAME_HEADER_LEN: usize = 4;

/// Round `len` up to whole packets; IN requests must be packet multiples
pub fn request_len(len: usize, max_packet: usize) -> usize {
    let max_packet = max_packet.max(1);
    len.max(1).div_ceil(max_packet) * max_packet
}

/// Parse a numeric option, accepting a `0x` prefix for hex
pub fn parse_u16(value: &str) -> Option<u16> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_len() {
        assert_eq!(request_len(0, 512), 512);
        assert_eq!(request_len(512, 512), 512);
        assert_eq!(request_len(513, 512), 1024);
        assert_eq!(request_len(10, 64), 64);
    }

    #[test]
    fn test_parse_u16() {
        assert_eq!(parse_u16("0x058b"), Some(0x058B));
        assert_eq!(parse_u16("0X251"), Some(0x0251));
        assert_eq!(parse_u16("1419"), Some(1419));
        assert_eq!(parse_u16("0x10000"), None);
        assert_eq!(parse_u16("abc"), None);
    }
}
