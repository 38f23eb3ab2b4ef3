//! Page types.

use std::fmt;

/// Types of pages in Strata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum PageType {
    /// Free page (allocated but not yet initialized).
    #[default]
    Free = 0,
    /// Data page (stores objects of one file).
    Data = 1,
    /// Catalog page (stores file entries).
    Catalog = 2,
}

impl PageType {
    /// Creates a PageType from a raw byte value.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Free),
            1 => Some(Self::Data),
            2 => Some(Self::Catalog),
            _ => None,
        }
    }

    /// Returns true if this page can contain objects.
    #[inline]
    #[must_use]
    pub const fn is_data_page(self) -> bool {
        matches!(self, Self::Data)
    }

    /// Returns true if this is a free page.
    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free => write!(f, "Free"),
            Self::Data => write!(f, "Data"),
            Self::Catalog => write!(f, "Catalog"),
        }
    }
}
