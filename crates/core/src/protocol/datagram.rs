/// Length of the opaque per-device header at the start of every datagram.
pub const DEVICE_HEADER_LEN: usize = 8;

/// Largest datagram the receive loop will accept in one call.
pub const MAX_DATAGRAM_LEN: usize = 65536;

/// Strip the device header and return the JPEG fragment.
///
/// The header is not validated. Returns `None` for datagrams shorter than
/// [`DEVICE_HEADER_LEN`]; an exactly header-sized datagram yields an empty
/// payload.
///
/// ```
/// use camstream::protocol::datagram::payload;
///
/// assert_eq!(payload(b"HHHHHHHH\xff\xd8"), Some(&b"\xff\xd8"[..]));
/// assert_eq!(payload(b"short"), None);
/// ```
pub fn payload(datagram: &[u8]) -> Option<&[u8]> {
    datagram.get(DEVICE_HEADER_LEN..)
}
