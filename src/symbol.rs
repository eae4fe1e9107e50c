use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Reserved symbol, rebound to the address of the line being assembled.
pub const CURRENT_ADDRESS: &str = "$";

/// Symbol table of label -> memory address, built incrementally during assembly.
///
/// Labels are case-insensitive and keep their definition order.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    map: FxMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Rebind `$` to `addr`.
    pub fn set_current(&mut self, addr: u16) {
        self.map.insert(CURRENT_ADDRESS.to_string(), addr & 0xFFF);
    }

    /// Bind `name` to `addr`. A label can only be bound once; the existing address is
    /// returned as the error otherwise.
    pub fn define(&mut self, name: &str, addr: u16) -> Result<(), u16> {
        let key = name.to_ascii_uppercase();
        if let Some(existing) = self.map.get(&key) {
            return Err(*existing);
        }
        self.map.insert(key, addr & 0xFFF);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.map.get(&name.to_ascii_uppercase()).copied()
    }

    /// Labels in definition order, excluding `$`.
    pub fn labels(&self) -> impl Iterator<Item = (&str, u16)> {
        self.map
            .iter()
            .filter(|(name, _)| name.as_str() != CURRENT_ADDRESS)
            .map(|(name, addr)| (name.as_str(), *addr))
    }
}

/// One of the 16 general purpose registers `V0`-`VF`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    /// Flag register, written by arithmetic, shifts and `DRW`.
    pub const VF: Register = Register(0xF);

    pub fn new(idx: u8) -> Option<Self> {
        (idx < 16).then_some(Register(idx))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:X}", self.0)
    }
}
