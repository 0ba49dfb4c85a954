use bytes::BytesMut;

use crate::channel::Channel;
use crate::error::{FrameError, Result};

/// A fixed-layout record on one of the link channels.
///
/// The wire size is fully determined by (channel, code) and includes the
/// leading type code. All multi-byte fields are big-endian.
///
/// ```text
/// ┌──────────────────┬──────────────────────────────────┐
/// │ Code (1B or 2B)  │ Fields (WIRE_SIZE - code width)  │
/// └──────────────────┴──────────────────────────────────┘
/// ```
pub trait WireMessage: Sized {
    /// Channel the record travels on.
    const CHANNEL: Channel;
    /// Leading type code.
    const CODE: u16;
    /// Total encoded size including the code.
    const WIRE_SIZE: usize;
    /// Record name for logs and errors.
    const NAME: &'static str;

    /// Append the fields that follow the type code.
    fn put_fields(&self, dst: &mut BytesMut);

    /// Read the fields that follow the type code.
    ///
    /// `src` holds exactly `WIRE_SIZE - code width` bytes.
    fn get_fields(src: &mut &[u8]) -> Self;
}

/// Encode `msg` (code and fields) onto the end of `dst`.
///
/// Returns the number of bytes written.
pub fn encode<M: WireMessage>(msg: &M, dst: &mut BytesMut) -> Result<usize> {
    let start = dst.len();
    dst.reserve(M::WIRE_SIZE);
    M::CHANNEL.put_code(M::CODE, dst);
    msg.put_fields(dst);

    let written = dst.len() - start;
    if written != M::WIRE_SIZE {
        dst.truncate(start);
        return Err(FrameError::EncodedSize {
            name: M::NAME,
            expected: M::WIRE_SIZE,
            actual: written,
        });
    }
    Ok(written)
}

/// Decode one `M` from the front of `src`.
///
/// Returns `Ok(None)` when the leading code belongs to another record type,
/// and `Ok(Some((msg, consumed)))` on success. A buffer shorter than the
/// record's fixed size is refused with [`FrameError::Truncated`]; bytes past
/// `M::WIRE_SIZE` are never read.
pub fn decode<M: WireMessage>(src: &[u8]) -> Result<Option<(M, usize)>> {
    let Some(code) = M::CHANNEL.peek_code(src) else {
        return Err(truncated::<M>(src.len()));
    };
    if code != M::CODE {
        return Ok(None);
    }
    if src.len() < M::WIRE_SIZE {
        return Err(truncated::<M>(src.len()));
    }

    let mut fields = &src[M::CHANNEL.code_width()..M::WIRE_SIZE];
    let msg = M::get_fields(&mut fields);
    Ok(Some((msg, M::WIRE_SIZE)))
}

fn truncated<M: WireMessage>(available: usize) -> FrameError {
    FrameError::Truncated {
        name: M::NAME,
        needed: M::WIRE_SIZE,
        available,
    }
}
