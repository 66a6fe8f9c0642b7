//! A tagged pointer is a pointer (concretely a memory address) with
//! additional data folded into the address itself, taking advantage of the
//! alignment of the pointed-to type.
//!
//! The variant implemented here discriminates between two states with a
//! single bit: a well-aligned pointer to `P` (low bit clear) or an inline
//! integer value shifted left by one (low bit set). This is the encoding the
//! tree uses for leaves, which are never allocated: the stored value rides in
//! the reference word itself.

use std::{fmt, mem::align_of, ptr::NonNull};

/// A non-null word that is either a pointer to `P` or a tagged inline value.
///
/// The pointee type must have an alignment of at least 2 so that the low bit
/// of every real pointer is guaranteed to be zero; this is checked at compile
/// time when the type is instantiated. Inline values must fit in the
/// remaining `usize::BITS - 1` bits.
#[repr(transparent)]
pub struct TaggedPointer<P>(NonNull<P>);

impl<P> TaggedPointer<P> {
    /// The ABI-required minimum alignment of the `P` type.
    pub const ALIGNMENT: usize = align_of::<P>();
    /// The largest value that can be stored inline alongside the tag bit.
    pub const MAX_VALUE: usize = usize::MAX >> 1;
    /// Number of low pointer bits freed by the alignment of `P`.
    ///
    /// The constant evaluates to a compile error for any pointee type whose
    /// alignment cannot spare the tag bit.
    pub const NUM_BITS: u32 = {
        let num_bits = Self::ALIGNMENT.trailing_zeros();

        assert!(
            num_bits >= 1,
            "need the alignment of the pointed-to type to free the tag bit"
        );

        num_bits
    };
    /// The bit that marks a word as an inline value instead of a pointer.
    const VALUE_TAG: usize = 0b1;

    /// Create a tagged word holding a pointer to `P`.
    ///
    /// # Panics
    ///
    ///  - Panics if the given `pointer` is not aligned according to the
    ///    minimum alignment required for the `P` type.
    pub fn from_ptr(pointer: NonNull<P>) -> Self {
        // Referencing NUM_BITS forces the compile-time alignment assertion to
        // be evaluated for this instantiation of the type.
        let _ = Self::NUM_BITS;

        let ptr_addr = sptr::Strict::addr(pointer.as_ptr());

        assert_eq!(
            ptr_addr & Self::VALUE_TAG,
            0,
            "this pointer was not aligned"
        );

        TaggedPointer(pointer)
    }

    /// Create a tagged word holding an inline value.
    ///
    /// # Panics
    ///
    ///  - Panics if the given `value` does not fit in
    ///    [`MAX_VALUE`][Self::MAX_VALUE].
    pub fn from_value(value: usize) -> Self {
        let _ = Self::NUM_BITS;

        assert!(
            value <= Self::MAX_VALUE,
            "value [{value}] does not fit in a tagged pointer"
        );

        let value_addr = (value << 1) | Self::VALUE_TAG;

        // The word carries no provenance because it does not point anywhere.
        let raw_ptr = sptr::invalid_mut::<P>(value_addr);

        // SAFETY: `value_addr` has the low bit set, so it is never zero.
        TaggedPointer(unsafe { NonNull::new_unchecked(raw_ptr) })
    }

    /// Return `true` if this word holds an inline value.
    pub fn is_value(self) -> bool {
        (sptr::Strict::addr(self.0.as_ptr()) & Self::VALUE_TAG) != 0
    }

    /// Return the pointer this word holds, or `None` for an inline value.
    pub fn to_ptr(self) -> Option<NonNull<P>> {
        if self.is_value() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Return the inline value this word holds, or `None` for a pointer.
    pub fn to_value(self) -> Option<usize> {
        if self.is_value() {
            Some(sptr::Strict::addr(self.0.as_ptr()) >> 1)
        } else {
            None
        }
    }
}

impl<P> From<NonNull<P>> for TaggedPointer<P> {
    fn from(pointer: NonNull<P>) -> Self {
        Self::from_ptr(pointer)
    }
}

impl<P> std::hash::Hash for TaggedPointer<P> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<P> Eq for TaggedPointer<P> {}

impl<P> PartialEq for TaggedPointer<P> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<P> Clone for TaggedPointer<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for TaggedPointer<P> {}

impl<P> fmt::Debug for TaggedPointer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_value() {
            Some(value) => f.debug_tuple("TaggedPointer::Value").field(&value).finish(),
            None => f
                .debug_tuple("TaggedPointer::Ptr")
                .field(&self.0.as_ptr())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_round_trip() {
        let pointee = Box::into_raw(Box::new(0u32));
        let tagged = TaggedPointer::from_ptr(NonNull::new(pointee).unwrap());

        assert!(!tagged.is_value());
        assert_eq!(tagged.to_value(), None);
        assert_eq!(tagged.to_ptr().unwrap().as_ptr(), pointee);

        unsafe {
            drop(Box::from_raw(pointee));
        }
    }

    #[test]
    fn value_round_trip() {
        for value in [0usize, 1, 42, TaggedPointer::<u32>::MAX_VALUE] {
            let tagged = TaggedPointer::<u32>::from_value(value);

            assert!(tagged.is_value());
            assert_eq!(tagged.to_value(), Some(value));
            assert_eq!(tagged.to_ptr(), None);
        }
    }

    #[test]
    #[should_panic = "does not fit in a tagged pointer"]
    fn oversized_value() {
        let _ = TaggedPointer::<u32>::from_value(usize::MAX);
    }

    #[test]
    fn zero_value_is_distinct_from_any_pointer() {
        let tagged = TaggedPointer::<u64>::from_value(0);

        assert!(tagged.is_value());
        assert_eq!(tagged.to_value(), Some(0));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn alignment_and_limit_values() {
        assert_eq!(TaggedPointer::<u16>::ALIGNMENT, 2);
        assert_eq!(TaggedPointer::<u16>::NUM_BITS, 1);
        assert_eq!(TaggedPointer::<u64>::NUM_BITS, 3);
        assert_eq!(TaggedPointer::<u64>::MAX_VALUE, (1usize << 63) - 1);
    }
}
