//! Element type bitmask.
//!
//! The type of an element is a bitmask combining its category (node, link,
//! or one of the three connector kinds) with category-specific qualifier
//! bits. The numeric values are load-bearing: serialized segments store the
//! raw bits, so they must stay stable.
//!
//! Qualifier bits above `0x40` are interpreted per category: for connectors
//! they carry positivity/permanency, for nodes they carry the node subtype.
//! The shared values mirror the original storage format.

use bitflags::bitflags;

bitflags! {
    /// Element type bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ElementType: u32 {
        /// Node element.
        const NODE          = 0x1;
        /// Link element (carries external byte content).
        const LINK          = 0x2;
        /// Undirected edge connector.
        const EDGE_COMMON   = 0x4;
        /// Directed common arc connector.
        const ARC_COMMON    = 0x8;
        /// Directed access arc connector.
        const ARC_ACCESS    = 0x10;

        /// Constant element.
        const CONST         = 0x20;
        /// Variable element.
        const VAR           = 0x40;

        /// Positive access arc.
        const ARC_POS       = 0x80;
        /// Negative access arc.
        const ARC_NEG       = 0x100;
        /// Fuzzy access arc.
        const ARC_FUZ       = 0x200;

        /// Temporary access arc.
        const ARC_TEMP      = 0x400;
        /// Permanent access arc.
        const ARC_PERM      = 0x800;

        /// Tuple node subtype (shares bits with the arc qualifiers; the
        /// category decides the interpretation).
        const NODE_TUPLE    = 0x80;
        /// Structure node subtype.
        const NODE_STRUCT   = 0x100;
        /// Role-relation node subtype.
        const NODE_ROLE     = 0x200;
        /// Non-role-relation node subtype.
        const NODE_NOROLE   = 0x400;
        /// Class node subtype.
        const NODE_CLASS    = 0x800;
        /// Abstract node subtype.
        const NODE_ABSTRACT = 0x1000;
        /// Material node subtype.
        const NODE_MATERIAL = 0x2000;
    }
}

impl ElementType {
    /// Any connector category bit.
    pub const ARC_MASK: Self = Self::from_bits_truncate(
        Self::EDGE_COMMON.bits() | Self::ARC_COMMON.bits() | Self::ARC_ACCESS.bits(),
    );

    /// Any element category bit. Two types belong to the same category iff
    /// their projections onto this mask are equal.
    pub const ELEMENT_MASK: Self =
        Self::from_bits_truncate(Self::NODE.bits() | Self::LINK.bits() | Self::ARC_MASK.bits());

    /// Constancy qualifier bits.
    pub const CONSTANCY_MASK: Self =
        Self::from_bits_truncate(Self::CONST.bits() | Self::VAR.bits());

    /// Constant node.
    pub const NODE_CONST: Self = Self::from_bits_truncate(Self::NODE.bits() | Self::CONST.bits());
    /// Variable node.
    pub const NODE_VAR: Self = Self::from_bits_truncate(Self::NODE.bits() | Self::VAR.bits());
    /// Constant link.
    pub const LINK_CONST: Self = Self::from_bits_truncate(Self::LINK.bits() | Self::CONST.bits());
    /// Constant undirected edge.
    pub const EDGE_CONST: Self =
        Self::from_bits_truncate(Self::EDGE_COMMON.bits() | Self::CONST.bits());
    /// Constant positive permanent access arc, the workhorse connector type.
    pub const ARC_CONST_POS_PERM: Self = Self::from_bits_truncate(
        Self::ARC_ACCESS.bits() | Self::CONST.bits() | Self::ARC_POS.bits() | Self::ARC_PERM.bits(),
    );

    /// Returns true if the node category bit is set.
    #[inline]
    pub const fn is_node(&self) -> bool {
        self.intersects(Self::NODE)
    }

    /// Returns true if the link category bit is set.
    #[inline]
    pub const fn is_link(&self) -> bool {
        self.intersects(Self::LINK)
    }

    /// Returns true for any connector (arc or edge).
    #[inline]
    pub const fn is_connector(&self) -> bool {
        self.intersects(Self::ARC_MASK)
    }

    /// Returns true for an undirected edge.
    #[inline]
    pub const fn is_edge(&self) -> bool {
        self.contains(Self::EDGE_COMMON)
    }

    /// Filter semantics: an element type matches a filter iff every bit of
    /// the filter is present in the element type. The element may carry
    /// additional bits.
    #[inline]
    pub const fn matches_filter(&self, filter: ElementType) -> bool {
        filter.bits() & self.bits() == filter.bits()
    }

    /// A subtype change must preserve the element category.
    #[inline]
    pub const fn subtype_change_allowed(&self, new: ElementType) -> bool {
        self.bits() & Self::ELEMENT_MASK.bits() == new.bits() & Self::ELEMENT_MASK.bits()
    }
}
