//! MPEG transport-stream container checks.
//!
//! Some upstreams prepend foreign bytes (typically a fake image header) to
//! otherwise valid `.ts` segments, which hardware-backed demuxers refuse to
//! open. A valid transport stream starts with a `0x47` sync byte repeated
//! every 188 bytes; these helpers detect misaligned payloads and strip the
//! leading garbage.

use bytes::Bytes;

/// TS packet sync byte.
pub const SYNC_BYTE: u8 = 0x47;

/// TS packet length in bytes.
pub const PACKET_SIZE: usize = 188;

/// Number of bytes a probe needs to judge alignment: two packet starts.
pub const PROBE_WINDOW: usize = 2 * PACKET_SIZE + 1;

/// Whether the payload starts on an aligned sync pattern.
///
/// Checks the second packet boundary too when enough data is available,
/// so a lone `0x47` in foreign bytes does not pass.
pub fn starts_aligned(data: &[u8]) -> bool {
    if data.first() != Some(&SYNC_BYTE) {
        return false;
    }
    if data.len() > PACKET_SIZE {
        return data[PACKET_SIZE] == SYNC_BYTE;
    }
    true
}

/// Offset of the first aligned sync run, if any.
///
/// An offset qualifies when the byte there is `0x47` and, if the window
/// is long enough to tell, the byte one packet later is too.
pub fn find_sync_offset(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&i| {
        data[i] == SYNC_BYTE
            && match data.get(i + PACKET_SIZE) {
                Some(&next) => next == SYNC_BYTE,
                None => true,
            }
    })
}

/// Drop any leading non-TS bytes, returning the payload from the first
/// aligned sync run. Payloads that are already aligned, or that contain
/// no sync run at all, come back unchanged.
pub fn strip_leading_garbage(data: Bytes) -> Bytes {
    if starts_aligned(&data) {
        return data;
    }
    match find_sync_offset(&data) {
        Some(offset) => data.slice(offset..),
        None => data,
    }
}
