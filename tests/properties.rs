//! Property tests for slugs, anchor assignment, tables of contents and uids

use std::collections::HashSet;

use doc_anchors::domain::{
    assign_heading_ids, build_minitoc, resolve, slug, DocUid, Document, FALLBACK_SLUG,
};
use proptest::prelude::*;

/// A heading as (level, text, existing id)
type HeadingSpec = (u8, String, Option<String>);

fn arb_heading() -> impl Strategy<Value = HeadingSpec> {
    (
        1u8..=6,
        // Small vocabulary so collisions are common
        prop_oneof![
            Just("Intro".to_string()),
            Just("Setup".to_string()),
            Just("Café Thé".to_string()),
            Just("!!!".to_string()),
            Just(String::new()),
            "[A-Za-z0-9 ]{1,20}",
        ],
        proptest::option::weighted(0.4, arb_existing_id()),
    )
}

/// Authored ids: mostly slug-like, some with spaces, symbols, case or non-ASCII
fn arb_existing_id() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,5}(-2)?",
        "[A-Za-z0-9 ?#&;._-]{1,12}",
        "[^\"<>\\p{C}]{1,10}",
    ]
}

fn render_html(headings: &[HeadingSpec]) -> String {
    headings
        .iter()
        .map(|(level, text, id)| match id {
            Some(id) => format!("<h{0} id=\"{1}\">{2}</h{0}>\n<p>body</p>\n", level, id, text),
            None => format!("<h{0}>{1}</h{0}>\n<p>body</p>\n", level, text),
        })
        .collect()
}

fn is_url_safe(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !token.starts_with('-')
        && !token.ends_with('-')
        && !token.contains("--")
}

// =============================================================================
// Slug
// =============================================================================

proptest! {
    #[test]
    fn slug_is_deterministic(text in "\\PC{0,80}", max in 0usize..80) {
        prop_assert_eq!(slug(&text, max), slug(&text, max));
    }

    #[test]
    fn slug_is_url_safe_and_bounded(text in "\\PC{0,120}", max in 0usize..80) {
        let token = slug(&text, max);

        prop_assert!(is_url_safe(&token), "not url-safe: {:?}", token);
        prop_assert!(max == 0 || token.len() <= max || token == FALLBACK_SLUG);
    }

    #[test]
    fn slug_is_stable_on_its_own_output(text in "[A-Za-z0-9 ,.&-]{0,60}") {
        let token = slug(&text, 0);
        prop_assert_eq!(slug(&token, 0), token.clone());
    }
}

// =============================================================================
// Anchor assignment
// =============================================================================

proptest! {
    #[test]
    fn assigned_anchors_are_unique(headings in prop::collection::vec(arb_heading(), 0..24)) {
        let document = Document::parse(&render_html(&headings)).unwrap();
        let assigned = assign_heading_ids(&document);

        let mut seen = HashSet::new();
        for heading in assigned.headings() {
            let anchor = heading.anchor();
            prop_assert!(anchor.is_some());
            let anchor = anchor.unwrap_or_default();
            prop_assert!(is_url_safe(anchor), "not url-safe: {:?}", anchor);
            prop_assert!(seen.insert(anchor.to_lowercase()), "duplicate anchor {:?}", anchor);
        }
        prop_assert_eq!(seen.len(), headings.len());
    }

    #[test]
    fn assignment_is_idempotent(headings in prop::collection::vec(arb_heading(), 0..16)) {
        let document = Document::parse(&render_html(&headings)).unwrap();
        let once = assign_heading_ids(&document);
        let twice = assign_heading_ids(&once);

        prop_assert_eq!(once.render(), twice.render());
    }
}

// =============================================================================
// Table of contents
// =============================================================================

proptest! {
    #[test]
    fn minitoc_is_idempotent(headings in prop::collection::vec(arb_heading(), 0..16)) {
        let document = Document::parse(&render_html(&headings)).unwrap();
        let first = build_minitoc(&document).render();

        let reparsed = Document::parse(&first).unwrap();
        let second = build_minitoc(&reparsed).render();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn built_minitoc_always_resolves(headings in prop::collection::vec(arb_heading(), 0..24)) {
        let document = Document::parse(&render_html(&headings)).unwrap();
        let built = build_minitoc(&document);

        prop_assert!(built.toc_block().is_some());
        prop_assert!(resolve(&built).is_empty());
    }
}

// =============================================================================
// Document uids
// =============================================================================

proptest! {
    #[test]
    fn uid_order_follows_timestamp(
        t1 in 0u64..(1 << 48),
        t2 in 0u64..(1 << 48),
        r1 in 0u128..(1 << 80),
        r2 in 0u128..(1 << 80),
    ) {
        prop_assume!(t1 < t2);
        let a = DocUid::from_parts(t1, r1);
        let b = DocUid::from_parts(t2, r2);

        prop_assert!(a.as_str() < b.as_str());
        prop_assert_eq!(a.timestamp_ms(), t1);
        prop_assert_eq!(a.as_str().parse::<DocUid>().unwrap(), a.clone());
    }
}
