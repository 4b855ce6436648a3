//! LCS-based sequence diff over row hashes.
//!
//! The diff reports which positions of the old sequence were removed and
//! which positions of the new sequence were added. The reconciler only uses
//! it as a "did anything change" signal; patch values always come from the
//! original entries.

use crate::flatten::DiffElement;
use crate::hash::get_row_hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diff of two hash sequences. `remove` is keyed by position in the old
/// sequence, `add` by position in the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringDiff {
    pub add: BTreeMap<usize, String>,
    pub remove: BTreeMap<usize, String>,
}

impl StringDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Diff of two flattened entry lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub add: BTreeMap<usize, DiffElement>,
    pub remove: BTreeMap<usize, DiffElement>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Longest common subsequence of two hash sequences.
pub fn get_lcs(past: &[String], present: &[String]) -> Vec<String> {
    // Common prefix and suffix never need the quadratic table.
    let prefix = past
        .iter()
        .zip(present.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = past[prefix..]
        .iter()
        .rev()
        .zip(present[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old = &past[prefix..past.len() - suffix];
    let new = &present[prefix..present.len() - suffix];

    let mut out = Vec::with_capacity(prefix + suffix + old.len().min(new.len()));
    out.extend_from_slice(&past[..prefix]);
    out.extend(lcs_table(old, new));
    out.extend_from_slice(&past[past.len() - suffix..]);
    out
}

fn lcs_table(old: &[String], new: &[String]) -> Vec<String> {
    if old.is_empty() || new.is_empty() {
        return Vec::new();
    }
    let width = new.len() + 1;
    // lengths[i * width + j] = LCS length of old[i..] and new[j..]
    let mut lengths = vec![0u32; (old.len() + 1) * width];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lengths[i * width + j] = if old[i] == new[j] {
                lengths[(i + 1) * width + j + 1] + 1
            } else {
                lengths[(i + 1) * width + j].max(lengths[i * width + j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(lengths[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            out.push(old[i].clone());
            i += 1;
            j += 1;
        } else if lengths[(i + 1) * width + j] >= lengths[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Positions not covered by `lcs` while walking `sequence` in order.
fn unmatched(sequence: &[String], lcs: &[String]) -> BTreeMap<usize, String> {
    let mut out = BTreeMap::new();
    let mut cursor = 0;
    for (i, hash) in sequence.iter().enumerate() {
        if cursor < lcs.len() && *hash == lcs[cursor] {
            cursor += 1;
        } else {
            out.insert(i, hash.clone());
        }
    }
    out
}

/// Diff two hash sequences.
pub fn get_array_string_diff(past: &[String], present: &[String]) -> StringDiff {
    let lcs = get_lcs(past, present);
    StringDiff {
        remove: unmatched(past, &lcs),
        add: unmatched(present, &lcs),
    }
}

/// Diff two flattened entry lists by row hash.
pub fn get_diff(before: &[DiffElement], after: &[DiffElement]) -> Diff {
    let past: Vec<String> = before.iter().map(get_row_hash).collect();
    let present: Vec<String> = after.iter().map(get_row_hash).collect();
    let diff = get_array_string_diff(&past, &present);
    Diff {
        add: diff
            .add
            .into_keys()
            .map(|i| (i, after[i].clone()))
            .collect(),
        remove: diff
            .remove
            .into_keys()
            .map(|i| (i, before[i].clone()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seq(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Drop removed positions, then insert added ones at their new positions.
    fn apply(past: &[String], diff: &StringDiff) -> Vec<String> {
        let mut out: Vec<String> = past
            .iter()
            .enumerate()
            .filter(|(i, _)| !diff.remove.contains_key(i))
            .map(|(_, h)| h.clone())
            .collect();
        for (i, hash) in &diff.add {
            out.insert(*i, hash.clone());
        }
        out
    }

    #[test]
    fn lcs_basic() {
        let lcs = get_lcs(&seq(&["a", "b", "c", "d"]), &seq(&["b", "x", "d"]));
        assert_eq!(lcs, seq(&["b", "d"]));
    }

    #[test]
    fn lcs_with_shared_prefix_and_suffix() {
        let lcs = get_lcs(
            &seq(&["p", "a", "b", "s"]),
            &seq(&["p", "b", "c", "s"]),
        );
        assert_eq!(lcs, seq(&["p", "b", "s"]));
    }

    #[test]
    fn diff_of_identical_is_empty() {
        let a = seq(&["a", "b", "c"]);
        assert!(get_array_string_diff(&a, &a).is_empty());
        assert!(get_array_string_diff(&[], &[]).is_empty());
    }

    #[test]
    fn diff_positions() {
        let diff = get_array_string_diff(&seq(&["a", "b", "c"]), &seq(&["a", "c", "d"]));
        assert_eq!(diff.remove, BTreeMap::from([(1, "b".to_string())]));
        assert_eq!(diff.add, BTreeMap::from([(2, "d".to_string())]));
    }

    #[test]
    fn diff_elements_use_original_values() {
        let before = vec![
            DiffElement::new("$(p)", json!({"title": "a"})),
            DiffElement::new("$(p).x", json!({"n": 1})),
        ];
        let after = vec![
            DiffElement::new("$(p)", json!({"title": "a"})),
            DiffElement::new("$(p).x", json!({"n": 2})),
        ];
        let diff = get_diff(&before, &after);
        assert_eq!(diff.remove.get(&1), Some(&before[1]));
        assert_eq!(diff.add.get(&1), Some(&after[1]));
        assert!(get_diff(&before, &before).is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_seq() -> impl Strategy<Value = Vec<String>> {
            proptest::collection::vec("[a-e]", 0..24)
        }

        proptest! {
            #[test]
            fn prop_diff_self_is_empty(a in arb_seq()) {
                prop_assert!(get_array_string_diff(&a, &a).is_empty());
            }

            #[test]
            fn prop_diff_reconstructs_present(a in arb_seq(), b in arb_seq()) {
                let diff = get_array_string_diff(&a, &b);
                prop_assert_eq!(apply(&a, &diff), b);
            }

            #[test]
            fn prop_lcs_is_subsequence_of_both(a in arb_seq(), b in arb_seq()) {
                let lcs = get_lcs(&a, &b);
                prop_assert_eq!(unmatched(&a, &lcs).len(), a.len() - lcs.len());
                prop_assert_eq!(unmatched(&b, &lcs).len(), b.len() - lcs.len());
            }
        }
    }
}
