use thiserror::Error;

/// Fatal failures surfaced to callers of the core pipeline.
///
/// Disassembly-time anomalies (`RecursiveDelaySlot`, `UnknownTarget`,
/// unsupported instructions) are not represented here: they are logged
/// via `tracing` and tolerated so a partial or malformed image still
/// yields a usable CFG. See `reach` and `decoder` for those call sites.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("missing or malformed PS-X EXE magic (expected \"PS-X EXE\")")]
    BadMagic,

    #[error("address {addr:#x} is outside the loaded text range [{lo:#x}, {hi:#x})")]
    AddressOutOfRange { addr: u32, lo: u32, hi: u32 },

    #[error("header truncated: need {needed} more byte(s)")]
    TruncatedHeader { needed: usize },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
