//! Util.
//!
//! This module contains things that don't fit elsewhere.

/// Returns `if_true` when `condition` holds, `if_false` otherwise.
#[inline]
pub(crate) fn select<T>(condition: bool, if_true: T, if_false: T) -> T {
    if condition { if_true } else { if_false }
}
