//! Courier wire convention: how a payload is laid out on the transport.
//!
//! A payload travels as a sequence of fragments, each at most
//! `max_fragment_size` bytes, followed by exactly one write carrying the
//! end-of-data mark. A receiver concatenates fragments until it observes
//! the mark. An empty payload is sent as the mark alone.
//!
//! Both ends must agree on the mark. It is never escaped, so payloads that
//! contain it as a whole fragment are ambiguous to the receiver.

use std::ops::Range;

/// Default transport write limit (the minimum BLE ATT payload).
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 20;

/// Default end-of-data mark, ASCII `EOD`.
pub const DEFAULT_END_OF_DATA_MARK: &[u8] = b"EOD";

/// Number of data fragments needed for a payload, not counting the mark.
///
/// A zero `max_fragment_size` is treated as 1.
pub fn fragment_count(payload_len: usize, max_fragment_size: usize) -> usize {
    payload_len.div_ceil(max_fragment_size.max(1))
}

/// Byte range of the fragment starting at `offset`.
///
/// Empty once `offset` reaches `payload_len`. A zero `max_fragment_size`
/// is treated as 1 so the range always makes progress.
pub fn fragment_range(payload_len: usize, offset: usize, max_fragment_size: usize) -> Range<usize> {
    let start = offset.min(payload_len);
    let len = max_fragment_size.max(1).min(payload_len - start);
    start..start + len
}

/// True if `fragment` is exactly the end-of-data mark.
pub fn is_end_of_data(fragment: &[u8], end_of_data_mark: &[u8]) -> bool {
    fragment == end_of_data_mark
}
