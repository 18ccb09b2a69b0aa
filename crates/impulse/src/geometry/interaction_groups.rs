use serde::{Deserialize, Serialize};

/// Pairwise interaction filter made of 16 membership bits and 16 filter bits.
///
/// Two groups interact when each one's memberships intersect the other's
/// filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionGroups {
    /// Groups this collider belongs to.
    pub memberships: u16,
    /// Groups this collider may interact with.
    pub filter: u16,
}

impl InteractionGroups {
    /// Creates a group from explicit bits.
    pub const fn new(memberships: u16, filter: u16) -> Self {
        Self {
            memberships,
            filter,
        }
    }

    /// Member of every group, interacts with every group.
    pub const fn all() -> Self {
        Self::new(u16::MAX, u16::MAX)
    }

    /// Member of no group, interacts with nothing.
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    /// Unpacks the `memberships << 16 | filter` encoding.
    pub const fn from_bits(bits: u32) -> Self {
        Self::new((bits >> 16) as u16, (bits & 0xffff) as u16)
    }

    /// Packs into the `memberships << 16 | filter` encoding.
    pub const fn to_bits(self) -> u32 {
        ((self.memberships as u32) << 16) | self.filter as u32
    }

    /// Returns a copy with the given memberships.
    pub const fn with_memberships(mut self, memberships: u16) -> Self {
        self.memberships = memberships;
        self
    }

    /// Returns a copy with the given filter.
    pub const fn with_filter(mut self, filter: u16) -> Self {
        self.filter = filter;
        self
    }

    /// Returns true if the two groups allow an interaction.
    pub const fn test(self, other: Self) -> bool {
        (self.memberships & other.filter) != 0 && (other.memberships & self.filter) != 0
    }
}

impl Default for InteractionGroups {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_packing() {
        let groups = InteractionGroups::new(0b0101, 0b0011);
        assert_eq!(groups.to_bits(), 0x0005_0003);
        assert_eq!(InteractionGroups::from_bits(0x0005_0003), groups);
    }

    #[test]
    fn test_compatibility_is_symmetric() {
        let a = InteractionGroups::new(0b01, 0b10);
        let b = InteractionGroups::new(0b10, 0b01);
        let c = InteractionGroups::new(0b10, 0b10);

        assert!(a.test(b));
        assert!(b.test(a));
        // One-sided acceptance is not enough.
        assert!(!a.test(c));
        assert!(!c.test(a));
        assert!(!InteractionGroups::none().test(InteractionGroups::all()));
        assert!(InteractionGroups::all().test(InteractionGroups::all()));
    }
}
