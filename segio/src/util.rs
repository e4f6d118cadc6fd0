// SPDX-License-Identifier: Apache-2.0

use std::ops::Range;
use crate::{Error, OperationKind, Result};

/// Checks that `count` bytes starting at `offset` fall within `len` bytes,
/// returning the checked range.
pub(crate) fn check_range(len: usize, offset: usize, count: usize) -> Result<Range<usize>> {
	match offset.checked_add(count) {
		Some(end) if end <= len => Ok(offset..end),
		_ => Err(Error::out_of_bounds(OperationKind::Unknown))
	}
}
