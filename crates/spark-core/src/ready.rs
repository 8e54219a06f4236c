//! Interest and readiness bitsets.
//!
//! Named `Interest`/`ReadyOps` rather than re-exporting `mio::Interest`
//! directly so that `spark-core` (which every other crate, including
//! `spark-transport-tls`, depends on) never has to pull in `mio` itself —
//! only `spark-reactor` does the `mio` translation.

use std::ops::{BitOr, BitOrAssign};

macro_rules! bitset {
    ($name:ident { $($variant:ident = $bit:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(u8);

        impl $name {
            pub const NONE: Self = Self(0);
            $(pub const $variant: Self = Self($bit);)+

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn bits(self) -> u8 {
                self.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitset!(Interest {
    ACCEPTABLE = 0b0001,
    CONNECTABLE = 0b0010,
    READABLE = 0b0100,
    WRITABLE = 0b1000,
});

bitset!(ReadyOps {
    ACCEPTABLE = 0b0001,
    CONNECTABLE = 0b0010,
    READABLE = 0b0100,
    WRITABLE = 0b1000,
});

impl Interest {
    /// Whether this interest set is satisfied by the given readiness.
    pub const fn satisfied_by(self, ready: ReadyOps) -> bool {
        self.0 & ready.0 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_combination_and_satisfaction() {
        let interest = Interest::READABLE | Interest::WRITABLE;
        assert!(interest.contains(Interest::READABLE));
        assert!(interest.contains(Interest::WRITABLE));
        assert!(!interest.contains(Interest::ACCEPTABLE));

        let ready = ReadyOps::READABLE;
        assert!(interest.satisfied_by(ready));

        let write_only = Interest::WRITABLE;
        assert!(!write_only.satisfied_by(ready));
    }

    #[test]
    fn insert_and_remove() {
        let mut interest = Interest::NONE;
        interest.insert(Interest::READABLE);
        interest.insert(Interest::WRITABLE);
        assert!(interest.contains(Interest::READABLE | Interest::WRITABLE));
        interest.remove(Interest::WRITABLE);
        assert!(!interest.contains(Interest::WRITABLE));
        assert!(interest.contains(Interest::READABLE));
    }
}
