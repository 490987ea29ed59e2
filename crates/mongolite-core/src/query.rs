//! Skip/limit windowing over a collection

use bson::Document;

/// The contiguous window `[skip, skip + limit)` of `documents`, clamped to
/// its length. A `limit` of 0 means no limit. A `skip` past the end gives
/// an empty slice.
pub fn select(documents: &[Document], skip: usize, limit: usize) -> &[Document] {
    let start = skip.min(documents.len());
    let end = if limit == 0 {
        documents.len()
    } else {
        start.saturating_add(limit).min(documents.len())
    };
    &documents[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use proptest::prelude::*;

    fn numbered(n: usize) -> Vec<Document> {
        (0..n).map(|i| doc! { "i": i as i64 }).collect()
    }

    #[test]
    fn test_no_skip_no_limit_returns_everything() {
        let docs = numbered(3);
        assert_eq!(select(&docs, 0, 0), &docs[..]);
    }

    #[test]
    fn test_zero_limit_keeps_last_element() {
        let docs = numbered(4);
        assert_eq!(select(&docs, 1, 0), &docs[1..]);
    }

    #[test]
    fn test_skip_and_limit() {
        let docs = numbered(5);
        assert_eq!(select(&docs, 1, 1), &docs[1..2]);
        assert_eq!(select(&docs, 3, 10), &docs[3..]);
    }

    #[test]
    fn test_skip_past_end() {
        let docs = numbered(2);
        assert!(select(&docs, 2, 0).is_empty());
        assert!(select(&docs, 7, 3).is_empty());
        assert!(select(&[], 0, 0).is_empty());
    }

    #[test]
    fn test_huge_limit_does_not_overflow() {
        let docs = numbered(3);
        assert_eq!(select(&docs, 2, usize::MAX), &docs[2..]);
    }

    proptest! {
        #[test]
        fn prop_matches_slice_law(n in 0usize..40, skip in 0usize..50, limit in 0usize..50) {
            let docs = numbered(n);
            let result = select(&docs, skip, limit);

            if skip >= n {
                prop_assert!(result.is_empty());
            } else {
                let end = if limit > 0 { n.min(skip + limit) } else { n };
                prop_assert_eq!(result, &docs[skip..end]);
            }
        }
    }
}
