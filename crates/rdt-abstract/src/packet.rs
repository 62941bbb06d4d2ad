use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest payload a [`Message`] or [`Packet`] may carry.
pub const MAX_DATA_SIZE: usize = 20;

/// Value written into a header field when the channel corrupts it.
/// No window ever reaches this sequence number.
pub const CORRUPT_SENTINEL: u32 = 999_999;

/// Sum of the header fields and the character ordinals of `data`.
pub fn checksum(seqnum: u32, acknum: u32, data: &str) -> u64 {
    let payload: u64 = data.chars().map(|c| c as u64).sum();
    seqnum as u64 + acknum as u64 + payload
}

/// Build a packet whose checksum matches its contents.
pub fn make_packet(seqnum: u32, acknum: u32, data: &str) -> Packet {
    let payload = bounded(data);
    Packet {
        seqnum,
        acknum,
        checksum: checksum(seqnum, acknum, &payload),
        payload,
    }
}

fn bounded(data: &str) -> String {
    if data.chars().count() > MAX_DATA_SIZE {
        String::new()
    } else {
        data.to_string()
    }
}

/// A message handed down from layer 5 on the sending side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    data: String,
}

impl Message {
    /// Oversized data is replaced by an empty payload.
    pub fn new(data: impl AsRef<str>) -> Self {
        Self {
            data: bounded(data.as_ref()),
        }
    }

    /// The `index`-th synthetic message: one lowercase letter repeated to
    /// fill [`MAX_DATA_SIZE`], cycling through the alphabet.
    pub fn synthetic(index: u64) -> Self {
        let letter = (b'a' + (index % 26) as u8) as char;
        Self {
            data: std::iter::repeat_n(letter, MAX_DATA_SIZE).collect(),
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub seqnum: u32,
    pub acknum: u32,
    pub checksum: u64,
    pub payload: String,
}

impl Packet {
    /// Build a packet with an explicit (possibly wrong) checksum.
    pub fn new(seqnum: u32, acknum: u32, checksum: u64, payload: impl AsRef<str>) -> Self {
        Self {
            seqnum,
            acknum,
            checksum,
            payload: bounded(payload.as_ref()),
        }
    }

    /// True when the carried checksum does not match the contents.
    pub fn is_corrupt(&self) -> bool {
        self.checksum != checksum(self.seqnum, self.acknum, &self.payload)
    }

    /// Replace the first payload character with `'?'`.
    pub fn garble_payload(&mut self) {
        let rest: String = self.payload.chars().skip(1).collect();
        self.payload = format!("?{rest}");
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[seqnum {}, acknum {}, checksum {}, payload {}]",
            self.seqnum, self.acknum, self.checksum, self.payload
        )
    }
}
