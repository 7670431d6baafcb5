//! Binary snapshot parsing and serialization.
//!
//! Layout, all little-endian: a 4-byte initial PC, registers x1..x31
//! (x0 is implicit and always zero), then memory fragments of the form
//! `addr:u32, size:u32, bytes[size]` until end of file.

use std::fs;
use std::path::Path;

use crate::error::SnapshotError;

pub const REGISTER_COUNT: usize = 32;

/// Parsed machine state image
pub struct Snapshot {
    pub pc: u32,
    /// Full register file; index 0 is kept at zero
    pub regs: [u32; REGISTER_COUNT],
    pub fragments: Vec<Fragment>,
}

/// One contiguous run of memory bytes
pub struct Fragment {
    pub addr: u32,
    pub bytes: Vec<u8>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], SnapshotError> {
        if len > self.bytes.len() - self.offset {
            return Err(SnapshotError::Truncated { what, offset: self.offset });
        }
        let slice = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, SnapshotError> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }
}

impl Snapshot {
    /// Parse a snapshot image. Fragments are kept in file order; later
    /// fragments overwrite earlier bytes when applied to memory.
    pub fn parse(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut reader = Reader { bytes, offset: 0 };

        let pc = reader.read_u32("initial PC")?;
        let mut regs = [0u32; REGISTER_COUNT];
        for reg in regs.iter_mut().skip(1) {
            *reg = reader.read_u32("register")?;
        }

        let mut fragments = Vec::new();
        while !reader.at_end() {
            let addr = reader.read_u32("fragment address")?;
            let size = reader.read_u32("fragment size")?;
            let bytes = reader.take(size as usize, "fragment payload")?.to_vec();
            fragments.push(Fragment { addr, bytes });
        }

        Ok(Self { pc, regs, fragments })
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = fs::read(path)
            .map_err(|err| SnapshotError::Read(path.to_path_buf(), err))?;
        Self::parse(&bytes)
    }
}

/// Serialize final machine state with a single memory fragment covering
/// the requested window
pub fn write(
    path: &Path,
    pc: u32,
    regs: &[u32; REGISTER_COUNT],
    start_addr: u32,
    window: &[u8],
) -> Result<(), SnapshotError> {
    let mut out = Vec::with_capacity(4 * REGISTER_COUNT + 4 + window.len());
    out.extend_from_slice(&pc.to_le_bytes());
    for reg in regs.iter().skip(1) {
        out.extend_from_slice(&reg.to_le_bytes());
    }
    out.extend_from_slice(&start_addr.to_le_bytes());
    out.extend_from_slice(&(window.len() as u32).to_le_bytes());
    out.extend_from_slice(window);

    fs::write(path, out).map_err(|err| SnapshotError::Write(path.to_path_buf(), err))
}
