//! Incremental UTF-8 decoding for chunked response bodies
//!
//! HTTP chunk boundaries are byte boundaries, not character boundaries:
//! a multi-byte code point can be split across chunks. The carry buffer
//! holds an incomplete trailing sequence until the next chunk arrives;
//! genuinely invalid bytes are replaced with U+FFFD so a corrupt chunk
//! cannot wedge the stream.

/// Stateful decoder turning byte chunks into text chunks.
#[derive(Debug, Default)]
pub struct Utf8Carry {
    carry: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next byte chunk, returning all completed text.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.carry) {
                Ok(_) => {
                    out.push_str(&String::from_utf8_lossy(&self.carry));
                    self.carry.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.carry[..valid]));
                    match e.error_len() {
                        // Invalid sequence: replace and continue decoding.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.carry.drain(..valid + len);
                        }
                        // Incomplete trailing sequence: keep for next chunk.
                        None => {
                            self.carry.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush any leftover bytes at end of stream.
    pub fn finish(&mut self) -> String {
        if self.carry.is_empty() {
            return String::new();
        }
        let text = String::from_utf8_lossy(&self.carry).into_owned();
        self.carry.clear();
        text
    }
}
