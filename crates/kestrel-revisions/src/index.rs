//! Gap detection over a dense version sequence.
//!
//! Spec §4.3 allows a revision append to fail independently of the FSM
//! commit it followed; the minimum requirement is that such a miss is
//! *detectable* by scanning for gaps in the [1, max] version sequence
//! (spec §8 invariant 1, "Dense versioning").

use kestrel_types::Version;

/// Given the sorted set of versions present for a single `(project, key)`,
/// returns every version missing from the dense `[1, max]` run, or an
/// empty vec if the sequence has no gaps.
///
/// An empty `versions` input returns no gaps (there is nothing to be dense
/// about yet).
pub fn find_gaps(versions: &[Version]) -> Vec<Version> {
    let Some(&max) = versions.iter().max() else {
        return Vec::new();
    };

    let present: std::collections::HashSet<u64> = versions.iter().map(|v| v.as_u64()).collect();
    (1..=max.as_u64())
        .filter(|v| !present.contains(v))
        .map(Version::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_sequence_has_no_gaps() {
        let versions: Vec<Version> = (1..=5).map(Version::new).collect();
        assert!(find_gaps(&versions).is_empty());
    }

    #[test]
    fn missing_middle_version_is_reported() {
        let versions = vec![Version::new(1), Version::new(2), Version::new(4)];
        assert_eq!(find_gaps(&versions), vec![Version::new(3)]);
    }

    #[test]
    fn empty_input_has_no_gaps() {
        assert!(find_gaps(&[]).is_empty());
    }
}
