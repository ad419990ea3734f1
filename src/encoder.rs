//! Splits outbound messages into wire chunks.

use tracing::trace;

use crate::error::{Result, StreamuxError};
use crate::header::{Direction, EncodedHeader, FrameHeader, HeaderCodec};

/// Chunking encoder bound to one set of negotiated header widths.
#[derive(Debug, Clone, Copy)]
pub struct ChunkEncoder {
    codec: HeaderCodec,
    max_chunk_length: u32,
}

impl ChunkEncoder {
    /// `max_chunk_length` is clamped to what the length field can carry.
    pub fn new(codec: HeaderCodec, max_chunk_length: u32) -> Self {
        Self {
            codec,
            max_chunk_length: max_chunk_length.clamp(1, codec.max_payload_length()),
        }
    }

    pub fn codec(&self) -> &HeaderCodec {
        &self.codec
    }

    pub fn max_chunk_length(&self) -> u32 {
        self.max_chunk_length
    }

    /// Emit `payload` as one or more chunks through `emit(priority, header, payload)`.
    ///
    /// Chunks are greedy (every chunk but the last is `max_chunk_length` long)
    /// and only the last carries the termination flag. An empty payload is a
    /// single zero-length terminated chunk with no payload slice.
    /// Returns the number of chunks emitted.
    pub fn encode_message<F>(
        &self,
        priority: u16,
        id: u32,
        direction: Direction,
        payload: &[u8],
        mut emit: F,
    ) -> Result<usize>
    where
        F: FnMut(u16, &[u8], Option<&[u8]>),
    {
        // Validate the id before the first emission so nothing partial goes out.
        if id > self.codec.max_id() {
            return Err(StreamuxError::FieldOverflow {
                field: "id",
                value: id,
                bits: self.codec.id_bits(),
            });
        }
        let is_response = direction.is_response();

        if payload.is_empty() {
            let header = self.codec.encode(&FrameHeader::new(id, 0, is_response, true))?;
            trace!(id, ?direction, "encoded empty message");
            emit(priority, header.as_bytes(), None);
            return Ok(1);
        }

        let chunk_count = payload.len().div_ceil(self.max_chunk_length as usize);
        for (index, chunk) in payload.chunks(self.max_chunk_length as usize).enumerate() {
            let is_termination = index + 1 == chunk_count;
            let header = self.codec.encode(&FrameHeader::new(
                id,
                chunk.len() as u32,
                is_response,
                is_termination,
            ))?;
            trace!(id, ?direction, len = chunk.len(), is_termination, "encoded chunk");
            emit(priority, header.as_bytes(), Some(chunk));
        }
        Ok(chunk_count)
    }

    /// Header of a zero-length control frame.
    pub fn encode_control(&self, id: u32, is_response: bool, is_termination: bool) -> Result<EncodedHeader> {
        self.codec.encode(&FrameHeader::new(id, 0, is_response, is_termination))
    }
}
