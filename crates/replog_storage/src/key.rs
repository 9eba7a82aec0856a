//! Ordered tuple keys.
//!
//! Keys are built from segments whose byte encoding sorts the same way as
//! the segment values:
//!
//! - text is escaped (`0x00` becomes `0x00 0xFF`) and terminated by
//!   `0x00 0x01`, so a segment never matches as a prefix of a longer one
//! - unsigned integers are fixed-width big-endian
//!
//! A key built from the first `n` segments of another key is a byte prefix
//! of it, which is what [`RangeQuery::prefix`](crate::RangeQuery::prefix)
//! relies on.

const ESCAPE: u8 = 0x00;
const ESCAPED_NUL: u8 = 0xFF;
const TERMINATOR: u8 = 0x01;

/// Builder for ordered, prefix-friendly tuple keys.
///
/// ```rust
/// use replog_storage::KeyBuilder;
///
/// let a = KeyBuilder::new().text("log").uint(2).build();
/// let b = KeyBuilder::new().text("log").uint(10).build();
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyBuilder {
    bytes: Vec<u8>,
}

impl KeyBuilder {
    /// Creates an empty key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text segment.
    #[must_use]
    pub fn text(mut self, segment: &str) -> Self {
        for &b in segment.as_bytes() {
            if b == ESCAPE {
                self.bytes.push(ESCAPE);
                self.bytes.push(ESCAPED_NUL);
            } else {
                self.bytes.push(b);
            }
        }
        self.bytes.push(ESCAPE);
        self.bytes.push(TERMINATOR);
        self
    }

    /// Appends an unsigned integer segment.
    #[must_use]
    pub fn uint(mut self, value: u64) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Returns the encoded bytes built so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the builder and returns the encoded key.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn text_segment_is_not_prefix_of_longer_segment() {
        let short = KeyBuilder::new().text("item").build();
        let long = KeyBuilder::new().text("items").build();
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn nested_segments_share_prefix() {
        let parent = KeyBuilder::new().text("store").text("seq").build();
        let child = KeyBuilder::new().text("store").text("seq").uint(7).build();
        assert!(child.starts_with(&parent));
    }

    #[test]
    fn nul_bytes_are_escaped() {
        let key = KeyBuilder::new().text("a\0b").build();
        assert_eq!(key, vec![b'a', 0x00, 0xFF, b'b', 0x00, 0x01]);
    }

    proptest! {
        #[test]
        fn uint_order_is_preserved(a: u64, b: u64) {
            let ka = KeyBuilder::new().text("s").uint(a).build();
            let kb = KeyBuilder::new().text("s").uint(b).build();
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        #[test]
        fn text_order_is_preserved(a in "[a-z\\x00]{0,8}", b in "[a-z\\x00]{0,8}") {
            let ka = KeyBuilder::new().text(&a).uint(1).build();
            let kb = KeyBuilder::new().text(&b).uint(1).build();
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), ka.cmp(&kb));
        }
    }
}
