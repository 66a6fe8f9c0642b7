//! Module containing copies of Rust standard library unstable functions for
//! use outside of the nightly distribution.

/// Assuming all the elements are initialized, get a slice to them.
///
/// # Safety
///
/// It is up to the caller to guarantee that the `MaybeUninit<T>` elements
/// really are in an initialized state. Calling this when the content is not
/// yet fully initialized causes undefined behavior.
///
/// See [`assume_init_ref`][std::mem::MaybeUninit::assume_init_ref] for more
/// details and examples.
///
/// **This is a unstable API copied from the Rust standard library, tracking
/// issue is [#63569][issue-63569]**
///
/// [issue-63569]: https://github.com/rust-lang/rust/issues/63569
#[inline]
pub const unsafe fn maybe_uninit_slice_assume_init_ref<T>(
    slice: &[std::mem::MaybeUninit<T>],
) -> &[T] {
    // SAFETY: casting `slice` to a `*const [T]` is safe since the caller
    // guarantees that `slice` is initialized, and `MaybeUninit` is guaranteed
    // to have the same layout as `T`. The pointer obtained is valid since it
    // refers to memory owned by `slice` which is a reference and thus
    // guaranteed to be valid for reads.
    unsafe { &*(slice as *const [std::mem::MaybeUninit<T>] as *const [T]) }
}
