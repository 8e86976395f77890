use borsh::BorshDeserialize;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use vigil_types::gossip::GossipMessage;

use crate::error::RelayError;

/// A peer connection carrying gossip frames.
///
/// Wire format: `[4-byte BE length][borsh GossipMessage]`. The length covers
/// the body only.
pub type GossipFramed<S> = Framed<S, LengthDelimitedCodec>;

/// Wrap a stream in the gossip framing, rejecting frames above `max`.
pub fn framed<S>(stream: S, max: usize) -> GossipFramed<S>
where
    S: AsyncRead + AsyncWrite,
{
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max)
        .new_framed(stream)
}

/// Serialize a gossip message into a frame body.
pub fn encode_message(msg: &GossipMessage, max: usize) -> Result<Bytes, RelayError> {
    let body = borsh::to_vec(msg).map_err(|e| RelayError::CodecError {
        reason: e.to_string(),
    })?;
    if body.len() > max {
        return Err(RelayError::FrameTooLarge {
            size: body.len(),
            max,
        });
    }
    Ok(Bytes::from(body))
}

/// Decode a frame body (length prefix already stripped).
pub fn decode_body(body: &[u8]) -> Result<GossipMessage, RelayError> {
    GossipMessage::try_from_slice(body).map_err(|e| RelayError::CodecError {
        reason: e.to_string(),
    })
}
