//! Inbound reply records (command/reply channel).

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::channel::{Channel, REPLY_ACK, REPLY_GET_CAMERA_PARAMETERS, REPLY_PING};
use crate::codec::WireMessage;

/// Acknowledgement of a previously sent command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplyAck {
    /// Code of the command being acknowledged.
    pub acked_code: u8,
    /// Zero on success.
    pub status: u8,
}

impl ReplyAck {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

impl WireMessage for ReplyAck {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = REPLY_ACK;
    const WIRE_SIZE: usize = 3;
    const NAME: &'static str = "ReplyAck";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u8(self.acked_code);
        dst.put_u8(self.status);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            acked_code: src.get_u8(),
            status: src.get_u8(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplyPing {
    pub sequence: u16,
    /// Vehicle uptime in seconds.
    pub uptime: u32,
}

impl WireMessage for ReplyPing {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = REPLY_PING;
    const WIRE_SIZE: usize = 7;
    const NAME: &'static str = "ReplyPing";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u16(self.sequence);
        dst.put_u32(self.uptime);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            sequence: src.get_u16(),
            uptime: src.get_u32(),
        }
    }
}

/// Current camera settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplyCameraParameters {
    pub camera: u8,
    /// Stream bitrate in bits per second.
    pub bitrate: u32,
    pub exposure: i16,
    pub white_balance: i16,
    pub hue: i16,
    pub framerate: u8,
    pub resolution: u8,
}

impl WireMessage for ReplyCameraParameters {
    const CHANNEL: Channel = Channel::CommandReply;
    const CODE: u16 = REPLY_GET_CAMERA_PARAMETERS;
    const WIRE_SIZE: usize = 14;
    const NAME: &'static str = "ReplyCameraParameters";

    fn put_fields(&self, dst: &mut BytesMut) {
        dst.put_u8(self.camera);
        dst.put_u32(self.bitrate);
        dst.put_i16(self.exposure);
        dst.put_i16(self.white_balance);
        dst.put_i16(self.hue);
        dst.put_u8(self.framerate);
        dst.put_u8(self.resolution);
    }

    fn get_fields(src: &mut &[u8]) -> Self {
        Self {
            camera: src.get_u8(),
            bitrate: src.get_u32(),
            exposure: src.get_i16(),
            white_balance: src.get_i16(),
            hue: src.get_i16(),
            framerate: src.get_u8(),
            resolution: src.get_u8(),
        }
    }
}
