//! Byte order of files and buffers.

use serde::{Deserialize, Serialize};

/// Byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    /// Most-significant byte first (big endian).
    Msb,
    /// Least-significant byte first (little endian).
    Lsb,
}

impl Endian {
    /// Byte order of the machine running this code.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Msb
        } else {
            Self::Lsb
        }
    }

    /// The other byte order.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Msb => Self::Lsb,
            Self::Lsb => Self::Msb,
        }
    }

    /// Whether data in this byte order must be swapped on this machine.
    #[inline]
    pub fn needs_swap(self) -> bool {
        self != Self::native()
    }
}

impl Default for Endian {
    fn default() -> Self {
        Self::native()
    }
}

impl std::fmt::Display for Endian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Msb => write!(f, "MSB"),
            Self::Lsb => write!(f, "LSB"),
        }
    }
}
