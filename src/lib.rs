//! MIPS R3000 decoder and structural CFG reducer for PS-X EXE images.
//!
//! The pipeline runs in five stages (§2): [`exe`] loads and addresses
//! the image, [`decoder`] turns words into [`micro`] ops, [`reach`]
//! discovers reachable code and fuses it into basic blocks tagged by
//! owning function, [`graph`] folds those blocks into a structural
//! control-flow tree, and [`adapter`] exposes a read-only text
//! projection of the post-fusion block map. [`Analyzer`] ties the
//! first three stages together behind a single `build` call; the
//! structural graph and the text projection are each built on demand.

pub mod adapter;
pub mod debug;
pub mod decoder;
pub mod error;
pub mod exe;
pub mod graph;
pub mod micro;
pub mod reach;

pub use adapter::InstructionView;
pub use debug::DebugSource;
pub use error::{AnalyzerError, Result};
pub use exe::{Executable, ExeHeader, LocalAddr};

use reach::BlockMap;

/// Owns a loaded image and its decoded, fused, ownership-tagged block
/// map. Built once from raw bytes plus a debug-symbol source; every
/// read afterwards (`instructions`, `structural_graph`) is immutable,
/// so a built `Analyzer` is `Send + Sync` and safe to share behind an
/// `Arc` across threads (§5).
pub struct Analyzer {
    exe: Executable,
    blocks: BlockMap,
}

impl Analyzer {
    /// Parses the header, runs the full C2→C3 pipeline (decode,
    /// reverse edges, fuse, tag ownership, peephole), and returns a
    /// ready-to-query `Analyzer`. Fails only on the header-level errors
    /// in [`AnalyzerError`]; disassembly-time anomalies are tolerated
    /// and logged (§7).
    pub fn build(image: &[u8], debug: &dyn DebugSource) -> Result<Analyzer> {
        let exe = Executable::load(image)?;
        let blocks = reach::run(&exe, debug);
        Ok(Analyzer { exe, blocks })
    }

    pub fn header(&self) -> &ExeHeader {
        &self.exe.header
    }

    pub fn blocks(&self) -> &BlockMap {
        &self.blocks
    }

    /// The adapter projection (C5, §4.4): the first `length` blocks at
    /// global address >= `offset`. An `offset` below the text's load
    /// address scans from the start of the image; an `offset` at or
    /// past the end of the text yields an empty result — §7 has no
    /// fatal-vs-tolerated taxonomy for read-API bounds, this is just a
    /// read past the end of the data.
    pub fn instructions(&self, offset: u32, length: usize) -> Vec<InstructionView> {
        let local_offset = match self.exe.to_local(offset) {
            Ok(local) => local,
            Err(_) if offset < self.header().t_addr => 0,
            Err(_) => return Vec::new(),
        };
        adapter::instructions(&self.blocks, &self.exe, local_offset, length)
    }

    /// Builds the structural CFG (C4) for the function owning
    /// `function_entry` (a global address), reduced to a fixed point.
    pub fn structural_graph(&self, function_entry: u32) -> Result<graph::Graph> {
        let local_entry = self.exe.to_local(function_entry)?;
        let mut g = graph::build::build_function_graph(&self.blocks, local_entry);
        graph::reduce::reduce(&mut g);
        Ok(g)
    }
}
