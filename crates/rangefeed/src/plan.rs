#![forbid(unsafe_code)]

use rangefeed_net::RangeSpec;

use crate::error::LoaderError;

/// Inclusive byte range of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// An inclusive range always spans at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl From<ByteRange> for RangeSpec {
    fn from(range: ByteRange) -> Self {
        RangeSpec::new(range.start, Some(range.end))
    }
}

/// Fixed segmentation over a resource of known size.
///
/// Derived once after content-length discovery and immutable for the
/// session. Every segment spans `[i * segment_size,
/// min((i + 1) * segment_size - 1, total_bytes - 1)]` inclusive, so the
/// ranges concatenate to the full resource without gap or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segmentation {
    total_bytes: u64,
    segment_size: u64,
    total_segments: u64,
}

impl Segmentation {
    /// # Errors
    ///
    /// `EmptyResource` when `total_bytes` is zero, `InvalidSegmentLength`
    /// when `segment_size` is zero.
    pub fn plan(total_bytes: u64, segment_size: u64) -> Result<Self, LoaderError> {
        if segment_size == 0 {
            return Err(LoaderError::InvalidSegmentLength);
        }
        if total_bytes == 0 {
            return Err(LoaderError::EmptyResource);
        }
        Ok(Self {
            total_bytes,
            segment_size,
            total_segments: total_bytes.div_ceil(segment_size),
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn segment_size(&self) -> u64 {
        self.segment_size
    }

    pub fn total_segments(&self) -> u64 {
        self.total_segments
    }

    /// Byte range of the segment at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= total_segments`.
    pub fn range(&self, index: u64) -> ByteRange {
        assert!(index < self.total_segments, "segment index out of range");
        let start = index * self.segment_size;
        let end = (start + self.segment_size - 1).min(self.total_bytes - 1);
        ByteRange { start, end }
    }

    /// True for the segment whose range ends at the last byte.
    pub fn is_terminal(&self, index: u64) -> bool {
        index + 1 == self.total_segments
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::exact_multiple(3000, 1000, 3)]
    #[case::trailing_partial(2500, 1000, 3)]
    #[case::single_exact(1000, 1000, 1)]
    #[case::single_small(999, 1000, 1)]
    #[case::one_byte(1, 1000, 1)]
    #[case::byte_segments(5, 1, 5)]
    fn test_total_segments(
        #[case] total_bytes: u64,
        #[case] segment_size: u64,
        #[case] expected: u64,
    ) {
        let plan = Segmentation::plan(total_bytes, segment_size).unwrap();
        assert_eq!(plan.total_segments(), expected);
    }

    #[test]
    fn test_ranges_for_trailing_partial() {
        let plan = Segmentation::plan(2500, 1000).unwrap();
        assert_eq!(plan.range(0), ByteRange { start: 0, end: 999 });
        assert_eq!(
            plan.range(1),
            ByteRange {
                start: 1000,
                end: 1999
            }
        );
        assert_eq!(
            plan.range(2),
            ByteRange {
                start: 2000,
                end: 2499
            }
        );
    }

    #[test]
    fn test_single_segment_range() {
        let plan = Segmentation::plan(1000, 1000).unwrap();
        assert_eq!(plan.range(0), ByteRange { start: 0, end: 999 });
        assert!(plan.is_terminal(0));
    }

    #[rstest]
    #[case(2500, 1000)]
    #[case(3000, 1000)]
    #[case(1, 1)]
    #[case(7, 3)]
    fn test_ranges_cover_resource_without_overlap(
        #[case] total_bytes: u64,
        #[case] segment_size: u64,
    ) {
        let plan = Segmentation::plan(total_bytes, segment_size).unwrap();

        let mut expected_start = 0;
        for index in 0..plan.total_segments() {
            let range = plan.range(index);
            assert_eq!(range.start, expected_start);
            expected_start = range.end + 1;
        }
        assert_eq!(expected_start, total_bytes);
    }

    #[test]
    fn test_empty_resource_refused() {
        let result = Segmentation::plan(0, 1000);
        assert!(matches!(result, Err(LoaderError::EmptyResource)));
    }

    #[test]
    fn test_zero_segment_size_refused() {
        let result = Segmentation::plan(1000, 0);
        assert!(matches!(result, Err(LoaderError::InvalidSegmentLength)));
    }

    #[test]
    fn test_terminal_detection() {
        let plan = Segmentation::plan(2500, 1000).unwrap();
        assert!(!plan.is_terminal(0));
        assert!(!plan.is_terminal(1));
        assert!(plan.is_terminal(2));
    }

    #[test]
    fn test_range_spec_conversion() {
        let range = ByteRange {
            start: 1000,
            end: 1999,
        };
        let spec: RangeSpec = range.into();
        assert_eq!(spec.to_header_value(), "bytes=1000-1999");
    }
}
