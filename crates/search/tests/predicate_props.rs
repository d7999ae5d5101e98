// crates/search/tests/predicate_props.rs
//! Property tests for predicate construction and fingerprint canonicality.

use finone_search::types::{Logic, MatchType, SearchRequest};
use finone_search::{build_predicate, SEARCHABLE_FIELDS};
use proptest::prelude::*;

fn arb_field() -> impl Strategy<Value = String> {
    prop::sample::select(SEARCHABLE_FIELDS.to_vec()).prop_map(str::to_string)
}

fn arb_value() -> impl Strategy<Value = String> {
    // Printable-ish values including LIKE metacharacters and whitespace runs.
    "[a-zA-Z0-9%_\\\\ ]{1,20}"
}

fn arb_logic() -> impl Strategy<Value = Logic> {
    prop_oneof![Just(Logic::And), Just(Logic::Or)]
}

fn arb_match_type() -> impl Strategy<Value = MatchType> {
    prop_oneof![Just(MatchType::Partial), Just(MatchType::Full)]
}

proptest! {
    /// Field order never changes the fingerprint or the generated SQL.
    #[test]
    fn fingerprint_stable_under_field_permutation(
        mut fields in prop::collection::vec(arb_field(), 1..5),
        value in arb_value(),
        logic in arb_logic(),
        match_type in arb_match_type(),
    ) {
        prop_assume!(!value.trim().is_empty());
        let forward = SearchRequest {
            query: value.clone(),
            fields: fields.clone(),
            logic,
            match_type,
            ..SearchRequest::default()
        };
        fields.reverse();
        let reversed = SearchRequest { fields, ..forward.clone() };

        let a = build_predicate(&forward).unwrap();
        let b = build_predicate(&reversed).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a.clause(), b.clause());
        prop_assert_eq!(a.params(), b.params());
    }

    /// Field-name case never changes the fingerprint.
    #[test]
    fn fingerprint_stable_under_key_case(
        field in arb_field(),
        value in arb_value(),
    ) {
        prop_assume!(!value.trim().is_empty());
        let lower = SearchRequest {
            field_queries: [(field.clone(), value.clone())].into_iter().collect(),
            ..SearchRequest::default()
        };
        let upper = SearchRequest {
            field_queries: [(field.to_uppercase(), value)].into_iter().collect(),
            ..SearchRequest::default()
        };
        let lower_pred = build_predicate(&lower).unwrap();
        let upper_pred = build_predicate(&upper).unwrap();
        prop_assert_eq!(
            lower_pred.fingerprint(),
            upper_pred.fingerprint()
        );
    }

    /// Pagination fields never leak into the fingerprint.
    #[test]
    fn fingerprint_excludes_pagination(
        value in arb_value(),
        limit in 0u64..20_000,
        offset in 0u64..1_000_000,
    ) {
        prop_assume!(!value.trim().is_empty());
        let base = SearchRequest { query: value, ..SearchRequest::default() };
        let paged = SearchRequest { limit, offset, ..base.clone() };
        let base_pred = build_predicate(&base).unwrap();
        let paged_pred = build_predicate(&paged).unwrap();
        prop_assert_eq!(
            base_pred.fingerprint(),
            paged_pred.fingerprint()
        );
    }

    /// Partial-match parameters are always wrapped in wildcards with every
    /// LIKE metacharacter in the user value escaped.
    #[test]
    fn partial_params_are_escaped_and_wrapped(value in arb_value()) {
        prop_assume!(!value.trim().is_empty());
        let request = SearchRequest { query: value, ..SearchRequest::default() };
        let predicate = build_predicate(&request).unwrap();
        for param in predicate.params() {
            if param.chars().all(|c| c.is_ascii_digit()) {
                continue; // the pincode equality param is unwrapped
            }
            prop_assert!(param.starts_with('%') && param.ends_with('%'));
            let inner = &param[1..param.len() - 1];
            // Every metacharacter must be preceded by a backslash.
            let mut chars = inner.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    let escaped = chars.next();
                    prop_assert!(matches!(escaped, Some('%' | '_' | '\\')));
                } else {
                    prop_assert!(!matches!(c, '%' | '_'));
                }
            }
        }
    }

    /// The SQL text never embeds the user value — only `?` placeholders.
    #[test]
    fn clause_never_contains_user_input(value in "[a-z]{8,16}") {
        let request = SearchRequest { query: value.clone(), ..SearchRequest::default() };
        let predicate = build_predicate(&request).unwrap();
        prop_assert!(!predicate.clause().contains(&value));
        let placeholders = predicate.clause().matches('?').count();
        prop_assert_eq!(placeholders, predicate.params().len());
    }
}
