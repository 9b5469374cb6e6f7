//! The debug-symbol source interface (§6), consumed by the decoder and
//! the reachability driver. This crate is not a debug-symbol file
//! parser: `StaticDebugSource` is the minimal in-memory reference
//! implementation used by the demo binary and by tests; real
//! deployments supply their own `DebugSource` backed by whatever
//! symbol format they load.

use std::collections::HashMap;

/// A named label at a global address (e.g. a linker symbol).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

/// A function entry point, seeding the reachability worklist (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub global_address: u32,
}

/// External collaborator interface: label/function tables and symbol
/// lookup. Object-safe so callers can box their own implementation.
pub trait DebugSource {
    fn labels_at(&self, global_addr: u32) -> &[Label];
    fn functions(&self) -> &[Function];
    fn symbol_name(&self, global_addr: u32) -> Option<&str>;

    /// Finds the `__SN_GP_BASE` label's address, used to resolve
    /// `$gp`-relative memory operands into `AddressValue`s (§4.1).
    fn gp_base(&self) -> Option<u32> {
        None
    }
}

/// Minimal in-memory `DebugSource` built from plain maps.
#[derive(Debug, Default)]
pub struct StaticDebugSource {
    labels: HashMap<u32, Vec<Label>>,
    functions: Vec<Function>,
    symbols: HashMap<u32, String>,
}

pub const GP_BASE_LABEL: &str = "__SN_GP_BASE";

impl StaticDebugSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, addr: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        self.symbols.entry(addr).or_insert_with(|| name.clone());
        self.labels
            .entry(addr)
            .or_default()
            .push(Label { name });
        self
    }

    pub fn with_function(mut self, global_address: u32) -> Self {
        self.functions.push(Function { global_address });
        self
    }
}

impl DebugSource for StaticDebugSource {
    fn labels_at(&self, global_addr: u32) -> &[Label] {
        self.labels.get(&global_addr).map(Vec::as_slice).unwrap_or(&[])
    }

    fn functions(&self) -> &[Function] {
        &self.functions
    }

    fn symbol_name(&self, global_addr: u32) -> Option<&str> {
        self.symbols.get(&global_addr).map(String::as_str)
    }

    fn gp_base(&self) -> Option<u32> {
        self.labels
            .iter()
            .find(|(_, labels)| labels.iter().any(|l| l.name == GP_BASE_LABEL))
            .map(|(addr, _)| *addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_gp_base_label() {
        let src = StaticDebugSource::new().with_label(0x8006_0000, GP_BASE_LABEL);
        assert_eq!(src.gp_base(), Some(0x8006_0000));
    }

    #[test]
    fn resolves_symbol_names() {
        let src = StaticDebugSource::new().with_label(0x8001_0004, "main");
        assert_eq!(src.symbol_name(0x8001_0004), Some("main"));
        assert_eq!(src.symbol_name(0x8001_0008), None);
    }
}
