//! Property tests for tool-usage set algebra.

use parity_core::ToolUsageComparison;
use proptest::prelude::*;

fn tool_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z_]{1,8}", 0..8)
}

proptest! {
    #[test]
    fn jaccard_is_symmetric(a in tool_names(), b in tool_names()) {
        let ab = ToolUsageComparison::new(&a, &b).jaccard;
        let ba = ToolUsageComparison::new(&b, &a).jaccard;
        prop_assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn jaccard_of_self_is_one(a in tool_names()) {
        prop_assert_eq!(ToolUsageComparison::new(&a, &a).jaccard, 1.0);
    }

    #[test]
    fn jaccard_is_bounded(a in tool_names(), b in tool_names()) {
        let j = ToolUsageComparison::new(&a, &b).jaccard;
        prop_assert!((0.0..=1.0).contains(&j));
    }

    #[test]
    fn zero_iff_disjoint_and_non_empty(a in tool_names(), b in tool_names()) {
        let cmp = ToolUsageComparison::new(&a, &b);
        let disjoint_non_empty = cmp.shared.is_empty()
            && !(cmp.subject_tools.is_empty() && cmp.reference_tools.is_empty());
        prop_assert_eq!(cmp.jaccard == 0.0, disjoint_non_empty);
    }

    #[test]
    fn gap_iff_reference_has_exclusive_tools(a in tool_names(), b in tool_names()) {
        let cmp = ToolUsageComparison::new(&a, &b);
        let exclusive = cmp.reference_tools.iter().any(|t| !cmp.subject_tools.contains(t));
        prop_assert_eq!(cmp.has_tool_gap(), exclusive);
    }

    #[test]
    fn case_is_ignored(a in tool_names()) {
        let upper: Vec<String> = a.iter().map(|t| t.to_uppercase()).collect();
        let cmp = ToolUsageComparison::new(&a, &upper);
        prop_assert_eq!(cmp.jaccard, 1.0);
        prop_assert!(!cmp.has_tool_gap());
    }
}

#[test]
fn both_empty_is_one() {
    let empty: Vec<&str> = Vec::new();
    assert_eq!(ToolUsageComparison::new(&empty, &empty).jaccard, 1.0);
}
