//! Loaded executable image and address-space conversion (§3.1, §3.2).

pub mod header;

pub use header::ExeHeader;

use crate::error::{AnalyzerError, Result};

/// A local address: an offset into the loaded text buffer.
/// `local = global - t_addr`.
pub type LocalAddr = u32;

/// A loaded PS-X EXE image: header plus the text+data body starting
/// at offset `header::HEADER_SIZE`. Retained for the lifetime of the
/// analyzer so delay-slot decoding can re-read arbitrary words.
pub struct Executable {
    pub header: ExeHeader,
    body: Vec<u8>,
}

impl Executable {
    /// Parses the header and retains the body bytes. `BadMagic` if the
    /// header doesn't start with the PS-X EXE magic tag.
    pub fn load(image: &[u8]) -> Result<Self> {
        let header = header::parse(image)?;
        let body = image[header::HEADER_SIZE..].to_vec();
        Ok(Executable { header, body })
    }

    /// Converts a global (absolute CPU-visible) address to a local
    /// offset into the text buffer. `AddressOutOfRange` outside
    /// `[t_addr, t_addr + t_size)`.
    pub fn to_local(&self, global: u32) -> Result<LocalAddr> {
        let lo = self.header.t_addr;
        let hi = self.header.t_addr.wrapping_add(self.header.t_size);
        if global < lo || global >= hi {
            return Err(AnalyzerError::AddressOutOfRange {
                addr: global,
                lo,
                hi,
            });
        }
        Ok(global - lo)
    }

    /// Converts a local offset back to a global address. Total for any
    /// `local`; callers are expected to only construct locals derived
    /// from `to_local` or from in-range arithmetic.
    pub fn to_global(&self, local: LocalAddr) -> u32 {
        self.header.t_addr.wrapping_add(local)
    }

    pub fn in_range(&self, local: LocalAddr) -> bool {
        local < self.header.t_size
    }

    /// Reads the 32-bit little-endian word at local address `addr`.
    /// Returns `None` if fewer than 4 bytes remain.
    pub fn read_word(&self, addr: LocalAddr) -> Option<u32> {
        let addr = addr as usize;
        let bytes = self.body.get(addr..addr + 4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn entry_local(&self) -> Result<LocalAddr> {
        self.to_local(self.header.pc0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_word(word: u32) -> Vec<u8> {
        let mut buf = vec![0u8; header::HEADER_SIZE];
        buf[0..8].copy_from_slice(header::MAGIC);
        buf[0x10..0x14].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x18..0x1C].copy_from_slice(&0x8001_0000u32.to_le_bytes());
        buf[0x1C..0x20].copy_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&word.to_le_bytes());
        buf
    }

    #[test]
    fn round_trips_addresses() {
        let exe = Executable::load(&image_with_word(0)).unwrap();
        assert_eq!(exe.to_local(0x8001_0000).unwrap(), 0);
        assert_eq!(exe.to_global(0), 0x8001_0000);
    }

    #[test]
    fn rejects_out_of_range() {
        let exe = Executable::load(&image_with_word(0)).unwrap();
        assert_eq!(
            exe.to_local(0x7FFF_FFFF).unwrap_err(),
            AnalyzerError::AddressOutOfRange {
                addr: 0x7FFF_FFFF,
                lo: 0x8001_0000,
                hi: 0x8001_0004,
            }
        );
    }

    #[test]
    fn reads_words() {
        let exe = Executable::load(&image_with_word(0xDEAD_BEEF)).unwrap();
        assert_eq!(exe.read_word(0), Some(0xDEAD_BEEF));
        assert_eq!(exe.read_word(1), None);
    }
}
