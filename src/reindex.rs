//! Face record re-indexing.
//!
//! A face record carries up to three slash-separated index fields per
//! vertex (`position/texcoord/normal`, any field may be empty, indices are
//! 1-based and may be negative meaning relative-from-end). Re-indexing
//! rewrites every absolute index from global numbering to partition-local
//! numbering through a caller-supplied resolver (the router resolves
//! against its ledger and carries shared declarations into the partition as
//! needed); relative indices are copied unchanged.
//!
//! A triplet with more than three fields, a non-integer field, or an index
//! of zero is structural corruption of the source and aborts the pass.

use crate::error::{Result, SplitError};
use crate::ledger::IndexKind;

const TRIPLET_KINDS: [IndexKind; 3] = [IndexKind::Vertex, IndexKind::Texcoord, IndexKind::Normal];

/// Rewrite one face record (the remainder after the `f ` prefix), mapping
/// each absolute index through `resolve`. Returns the complete output
/// record including the `f` token.
pub fn reindex_face<F>(rest: &str, line_no: u64, mut resolve: F) -> Result<String>
where
    F: FnMut(IndexKind, u64) -> Result<u64>,
{
    let malformed = || SplitError::MalformedFace {
        line: line_no,
        text: format!("f {rest}"),
    };

    let mut out = String::with_capacity(rest.len() + 8);
    out.push('f');
    for triplet in rest.split_whitespace() {
        out.push(' ');
        let mut fields = triplet.split('/');
        for (slot, field) in fields.by_ref().take(3).enumerate() {
            if slot > 0 {
                out.push('/');
            }
            if field.is_empty() {
                continue;
            }
            let global: i64 = field.parse().map_err(|_| malformed())?;
            if global == 0 {
                return Err(malformed());
            }
            if global < 0 {
                // Relative indices stay valid under partitioning as long
                // as the referenced declarations land in the same
                // partition; copied unchanged.
                out.push_str(field);
            } else {
                let local = resolve(TRIPLET_KINDS[slot], global as u64)?;
                out.push_str(&local.to_string());
            }
        }
        if fields.next().is_some() {
            return Err(malformed());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolver subtracting fixed per-kind bases, for exercising the
    /// parser in isolation.
    fn based(v: u64, vt: u64, vn: u64) -> impl FnMut(IndexKind, u64) -> Result<u64> {
        move |kind, global| {
            let base = match kind {
                IndexKind::Vertex => v,
                IndexKind::Texcoord => vt,
                IndexKind::Normal => vn,
            };
            Ok(global - base)
        }
    }

    #[test]
    fn test_full_triplets_remapped_per_kind() {
        let out = reindex_face("11/21/31 12/22/32 13/23/33", 1, based(10, 20, 30)).unwrap();
        assert_eq!(out, "f 1/1/1 2/2/2 3/3/3");
    }

    #[test]
    fn test_empty_fields_preserved() {
        assert_eq!(
            reindex_face("5//3 6//4 7//5", 1, based(4, 0, 2)).unwrap(),
            "f 1//1 2//2 3//3"
        );
        assert_eq!(reindex_face("5 6 7", 1, based(4, 0, 0)).unwrap(), "f 1 2 3");
        assert_eq!(reindex_face("5/9 6/10", 1, based(4, 8, 0)).unwrap(), "f 1/1 2/2");
    }

    #[test]
    fn test_negative_indices_bypass_resolver() {
        let out = reindex_face("-3/-3/-3 -2/-2/-2 -1/-1/-1", 1, |_, _| {
            panic!("resolver must not see relative indices")
        })
        .unwrap();
        assert_eq!(out, "f -3/-3/-3 -2/-2/-2 -1/-1/-1");
    }

    #[test]
    fn test_mixed_absolute_and_relative() {
        let out = reindex_face("7 -1 8", 1, based(6, 0, 0)).unwrap();
        assert_eq!(out, "f 1 -1 2");
    }

    #[test]
    fn test_too_many_fields_is_fatal() {
        let err = reindex_face("1/2/3/4 5 6", 7, |_, g| Ok(g)).unwrap_err();
        match err {
            SplitError::MalformedFace { line, text } => {
                assert_eq!(line, 7);
                assert_eq!(text, "f 1/2/3/4 5 6");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_integer_field_is_fatal() {
        let err = reindex_face("1/a/3 4 5", 2, |_, g| Ok(g)).unwrap_err();
        assert!(matches!(err, SplitError::MalformedFace { .. }));
    }

    #[test]
    fn test_zero_index_is_fatal() {
        let err = reindex_face("0 1 2", 3, |_, g| Ok(g)).unwrap_err();
        assert!(matches!(err, SplitError::MalformedFace { .. }));
    }

    #[test]
    fn test_resolver_errors_propagate() {
        let err = reindex_face("1 2 3", 4, |_, _| {
            Err(SplitError::LedgerUnopened("nowhere".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, SplitError::LedgerUnopened(_)));
    }
}
