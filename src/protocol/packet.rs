use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Payloads of exactly this size continue in the next packet
pub const MAX_PAYLOAD_LENGTH: usize = 0xFFFFFF;

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// Split `payload` into wire packets starting at `sequence_id`.
///
/// Returns the sequence id of the last packet written. A payload whose length is a
/// multiple of `MAX_PAYLOAD_LENGTH` is terminated by an empty packet.
pub fn write_packets(out: &mut Vec<u8>, payload: &[u8], mut sequence_id: u8) -> u8 {
    let mut chunks = payload.chunks(MAX_PAYLOAD_LENGTH);
    loop {
        let chunk = chunks.next().unwrap_or(&[]);
        out.extend_from_slice(PacketHeader::encode(chunk.len(), sequence_id).as_bytes());
        out.extend_from_slice(chunk);
        if chunk.len() < MAX_PAYLOAD_LENGTH {
            return sequence_id;
        }
        sequence_id = sequence_id.wrapping_add(1);
    }
}
