#[cfg(windows)]
mod d3d11;

#[cfg(windows)]
pub use d3d11::*;

use crate::{Error, Result};

/// Fails when `len` bytes would overrun a buffer of `capacity` bytes.
pub fn check_fits(len: usize, capacity: usize) -> Result<()> {
    if len > capacity {
        return Err(Error::PayloadTooLarge { len, capacity });
    }
    Ok(())
}

/// Copies `payload` into the front of `dst`. Payloads larger than `dst` are
/// rejected and nothing is written.
pub fn copy_payload(dst: &mut [u8], payload: &[u8]) -> Result<()> {
    check_fits(payload.len(), dst.len())?;
    dst[..payload.len()].copy_from_slice(payload);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_size_payload_is_copied() {
        let mut dst = [0u8; 64];
        let payload = [7u8; 64];
        copy_payload(&mut dst, &payload).unwrap();
        assert_eq!(dst, payload);
    }

    #[test]
    fn oversized_payload_is_rejected_untouched() {
        let mut dst = [0u8; 64];
        let payload = [7u8; 65];
        let err = copy_payload(&mut dst, &payload).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadTooLarge {
                len: 65,
                capacity: 64
            }
        ));
        assert_eq!(dst, [0u8; 64]);
    }

    #[test]
    fn short_payload_fills_prefix() {
        let mut dst = [0u8; 4];
        copy_payload(&mut dst, &[1, 2]).unwrap();
        assert_eq!(dst, [1, 2, 0, 0]);
    }
}
