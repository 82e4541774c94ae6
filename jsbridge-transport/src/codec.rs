use bytes::{Buf, BufMut, BytesMut};
use jsbridge_core::ProcessMessage;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FramedConfig {
    /// Largest accepted frame body in bytes, in either direction.
    pub max_frame_size: usize,
}

impl Default for FramedConfig {
    fn default() -> Self {
        FramedConfig {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Frames one [`ProcessMessage`] as
///
/// ```text
/// u32 BE  length of everything that follows
/// u16 BE  length of the message name
/// [u8]    message name, UTF-8
/// [u8]    argument list as JSON
/// ```
///
/// The name sits outside the JSON so a reader can route or drop a frame
/// without parsing its arguments.
#[derive(Debug, Clone)]
pub struct ProcessMessageCodec {
    max_frame_size: usize,
}

const LENGTH_PREFIX: usize = 4;
const NAME_PREFIX: usize = 2;

impl ProcessMessageCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn from_config(config: &FramedConfig) -> Self {
        Self::with_max_frame_size(config.max_frame_size)
    }
}

impl Default for ProcessMessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ProcessMessageCodec {
    type Item = ProcessMessage;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(prefix) = src.get(..LENGTH_PREFIX) else {
            return Ok(None);
        };
        let body_len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if body_len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(body_len));
        }
        if body_len < NAME_PREFIX {
            return Err(CodecError::Malformed("frame is shorter than its name header"));
        }
        if src.len() < LENGTH_PREFIX + body_len {
            src.reserve(LENGTH_PREFIX + body_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let mut body = src.split_to(body_len);
        let name_len = usize::from(body.get_u16());
        if name_len == 0 || name_len > body.len() {
            return Err(CodecError::Malformed("message name length is out of range"));
        }
        let name = std::str::from_utf8(&body.split_to(name_len))
            .map_err(|_| CodecError::Malformed("message name is not valid UTF-8"))?
            .to_owned();
        let arguments =
            serde_json::from_slice(&body).map_err(|e| CodecError::JsonError(format!("{}: {}", name, e)))?;
        Ok(Some(ProcessMessage { name, arguments }))
    }
}

impl Encoder<ProcessMessage> for ProcessMessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: ProcessMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let name = item.name.as_bytes();
        let name_len = u16::try_from(name.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or(CodecError::Malformed("message name length is out of range"))?;
        let arguments = serde_json::to_vec(&item.arguments).map_err(|e| CodecError::JsonError(e.to_string()))?;

        let body_len = NAME_PREFIX + name.len() + arguments.len();
        if body_len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(body_len));
        }
        let prefix = u32::try_from(body_len).map_err(|_| CodecError::FrameTooLarge(body_len))?;

        dst.reserve(LENGTH_PREFIX + body_len);
        dst.put_u32(prefix);
        dst.put_u16(name_len);
        dst.put_slice(name);
        dst.put_slice(&arguments);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Malformed frame: {0}")]
    Malformed(&'static str),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}
