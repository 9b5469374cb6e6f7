//! GTE (COP2) command table (§4.1): a fixed pattern match on the low
//! 25 bits of the word, producing a mnemonic for an `UnsupportedInsn`.
//! The GTE is not modeled semantically (§1); this table exists only so
//! `UnsupportedInsn` carries a recognizable name instead of a bare
//! opcode dump.

/// Resolves a subset of the real GTE command encodings to their
/// mnemonic. Anything not matched here still decodes — as a generic
/// `"gte"` placeholder — it is never an error to hit an unrecognized
/// GTE command.
pub fn command_name(command: u32) -> &'static str {
    match command {
        0x0180001 => "rtps",
        0x0280030 => "rtpt",
        0x0680029 => "nclip",
        0x0700012 => "mvmva",
        0x0e80006 => "nclip",
        0x1400006 => "op",
        0x0680010 => "dcpl",
        0x0780010 => "dpcs",
        0x0f8002a => "gpf",
        0x0f8002d => "gpl",
        0x0a8041e => "ncs",
        0x0280413 => "nct",
        0x0280416 => "ncds",
        0x0d80417 => "ncdt",
        0x088041a => "ncct",
        0x1e80002 => "avsz3",
        0x1f8002e => "avsz4",
        0x1400028 => "sqr",
        _ => "gte",
    }
}
