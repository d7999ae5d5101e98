// crates/search/src/predicate.rs
//! Predicate construction.
//!
//! A [`SearchRequest`] normalizes into one [`Predicate`]: a parameterized
//! SQL fragment (only `?` placeholders — user input never lands in the SQL
//! text) plus a canonical fingerprint used as the search-within key. The
//! count and page queries share the same fragment, which is what guarantees
//! `total_count` and `results` describe the same set.

use crate::types::{Logic, MatchType, SearchRequest};
use crate::{SearchError, SearchResult};
use std::collections::BTreeMap;

/// The indexable columns a request may predicate on.
pub const SEARCHABLE_FIELDS: &[&str] = &[
    "mobile", "name", "fname", "address", "alt", "circle", "email", "master_id",
];

/// A composed WHERE fragment with its ordered parameters and fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clause: String,
    params: Vec<String>,
    fingerprint: String,
}

impl Predicate {
    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Conjoin with a refinement (search-within). Parameter order follows
    /// clause order: all of `self`'s params, then `other`'s.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut params = self.params;
        params.extend(other.params);
        Predicate {
            clause: format!("({} AND {})", self.clause, other.clause),
            params,
            fingerprint: format!("{}>>{}", self.fingerprint, other.fingerprint),
        }
    }
}

/// Trim and collapse internal whitespace runs to single spaces.
fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape LIKE metacharacters before wrapping the value in `%` wildcards.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// The first token of exactly six digits, if any. Pincodes are materialized
/// on write, so matching one through the exact Bloom index is far cheaper
/// than a substring scan over `address`.
pub fn extract_pincode(value: &str) -> Option<String> {
    let mut run = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            run.push(c);
            let run_continues = chars.peek().map(|n| n.is_ascii_digit()).unwrap_or(false);
            if !run_continues {
                if run.len() == 6 {
                    return Some(run);
                }
                run.clear();
            }
        } else {
            run.clear();
        }
    }
    None
}

fn validate_field(field: &str) -> SearchResult<String> {
    let normalized = field.trim().to_ascii_lowercase();
    if SEARCHABLE_FIELDS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(SearchError::InvalidQuery(format!(
            "unknown search field {field:?}"
        )))
    }
}

/// One per-field comparison, pushing its parameter.
fn field_comparison(
    field: &str,
    value: &str,
    match_type: MatchType,
    params: &mut Vec<String>,
) -> String {
    match match_type {
        MatchType::Partial => {
            params.push(format!("%{}%", escape_like(value)));
            format!("{field} ILIKE ?")
        }
        MatchType::Full => {
            params.push(value.to_string());
            format!("{field} = ?")
        }
    }
}

fn match_type_tag(match_type: MatchType) -> &'static str {
    match match_type {
        MatchType::Partial => "partial",
        MatchType::Full => "full",
    }
}

/// Build the predicate for a request, applying the precedence rules:
///
/// 1. Non-empty `field_queries` wins; `fields` and `query` are ignored.
/// 2. Otherwise `fields` + `query` predicate each listed field.
/// 3. Otherwise a bare `query` becomes a disjunction over every field.
/// 4. Nothing to match on is an error.
pub fn build_predicate(req: &SearchRequest) -> SearchResult<Predicate> {
    let query = normalize(&req.query);

    if !req.field_queries.is_empty() {
        // Canonicalize: lowercase field names, normalized values, sorted by
        // field. Duplicate keys differing only in case collapse here.
        let mut entries: BTreeMap<String, String> = BTreeMap::new();
        for (field, value) in &req.field_queries {
            let field = validate_field(field)?;
            let value = normalize(value);
            if value.is_empty() {
                return Err(SearchError::InvalidQuery(format!(
                    "empty value for field {field:?}"
                )));
            }
            entries.insert(field, value);
        }

        let mut params = Vec::new();
        let parts: Vec<String> = entries
            .iter()
            .map(|(field, value)| field_comparison(field, value, req.match_type, &mut params))
            .collect();
        let logic = if parts.len() == 1 { Logic::And } else { req.logic };
        let clause = format!("({})", parts.join(&format!(" {} ", logic.sql())));
        let pairs: Vec<String> = entries
            .iter()
            .map(|(field, value)| format!("{field}={value}"))
            .collect();
        let fingerprint = format!(
            "v1|{}|{}|fq|{}",
            logic.sql(),
            match_type_tag(req.match_type),
            pairs.join("&")
        );
        return Ok(Predicate {
            clause,
            params,
            fingerprint,
        });
    }

    if query.is_empty() {
        return Err(SearchError::InvalidQuery(
            "query or field_queries is required".into(),
        ));
    }

    // Field list: the request's (validated, deduplicated, sorted) or, for a
    // bare query, every indexable field. A bare query is always a
    // disjunction regardless of the requested logic.
    let (fields, logic) = if req.fields.is_empty() {
        (
            SEARCHABLE_FIELDS.iter().map(|f| f.to_string()).collect(),
            Logic::Or,
        )
    } else {
        let mut fields: Vec<String> = req
            .fields
            .iter()
            .map(|f| validate_field(f))
            .collect::<SearchResult<_>>()?;
        fields.sort();
        fields.dedup();
        let logic = if fields.len() == 1 { Logic::And } else { req.logic };
        (fields, logic)
    };

    let mut params = Vec::new();
    let parts: Vec<String> = fields
        .iter()
        .map(|field| field_comparison(field, &query, req.match_type, &mut params))
        .collect();
    let mut clause = format!("({})", parts.join(&format!(" {} ", logic.sql())));

    // A 6-digit token also matches the materialized pincode column,
    // disjunctively, to exploit the exact Bloom index.
    if let Some(pincode) = extract_pincode(&query) {
        clause = format!("({clause} OR pincode = ?)");
        params.push(pincode);
    }

    let field_tag = if req.fields.is_empty() {
        "*".to_string()
    } else {
        fields.join(",")
    };
    let fingerprint = format!(
        "v1|{}|{}|q={}|f={}",
        logic.sql(),
        match_type_tag(req.match_type),
        query,
        field_tag
    );

    Ok(Predicate {
        clause,
        params,
        fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn req(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            ..SearchRequest::default()
        }
    }

    #[test]
    fn bare_query_fans_out_over_all_fields() {
        let p = build_predicate(&req("singh")).unwrap();
        for field in SEARCHABLE_FIELDS {
            assert!(p.clause().contains(&format!("{field} ILIKE ?")));
        }
        assert!(p.clause().contains(" OR "));
        assert!(!p.clause().contains(" AND "));
        assert_eq!(p.params().len(), SEARCHABLE_FIELDS.len());
        assert!(p.params().iter().all(|v| v == "%singh%"));
    }

    #[test]
    fn fielded_query_uses_requested_logic() {
        let mut r = req("singh");
        r.fields = vec!["name".into(), "fname".into()];
        r.logic = Logic::And;
        let p = build_predicate(&r).unwrap();
        assert_eq!(p.clause(), "(fname ILIKE ? AND name ILIKE ?)");
        assert_eq!(p.params(), ["%singh%", "%singh%"]);
    }

    #[test]
    fn field_queries_take_precedence() {
        let mut r = req("ignored");
        r.fields = vec!["address".into()];
        r.field_queries = [("name".to_string(), "singh".to_string())]
            .into_iter()
            .collect();
        let p = build_predicate(&r).unwrap();
        assert_eq!(p.clause(), "(name ILIKE ?)");
        assert_eq!(p.params(), ["%singh%"]);
    }

    #[test]
    fn full_match_is_equality() {
        let mut r = req("9876543210");
        r.fields = vec!["mobile".into()];
        r.match_type = MatchType::Full;
        let p = build_predicate(&r).unwrap();
        assert_eq!(p.clause(), "(mobile = ?)");
        assert_eq!(p.params(), ["9876543210"]);
    }

    #[test]
    fn empty_request_rejected() {
        assert!(matches!(
            build_predicate(&req("   ")),
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[test]
    fn unknown_field_rejected() {
        let mut r = req("x");
        r.fields = vec!["password".into()];
        assert!(build_predicate(&r).is_err());
    }

    #[test]
    fn like_metacharacters_escaped() {
        let mut r = req("100%_done\\x");
        r.fields = vec!["name".into()];
        let p = build_predicate(&r).unwrap();
        assert_eq!(p.params(), ["%100\\%\\_done\\\\x%"]);
    }

    #[test]
    fn whitespace_collapsed() {
        let mut r = req("  rahul   kumar  ");
        r.fields = vec!["name".into()];
        let p = build_predicate(&r).unwrap();
        assert_eq!(p.params(), ["%rahul kumar%"]);
    }

    #[test]
    fn six_digit_token_adds_pincode_disjunct() {
        let p = build_predicate(&req("110001")).unwrap();
        assert!(p.clause().ends_with("OR pincode = ?)"));
        assert_eq!(p.params().last().unwrap(), "110001");

        // Seven digits is not a pincode.
        let p = build_predicate(&req("1100011")).unwrap();
        assert!(!p.clause().contains("pincode"));
    }

    #[test]
    fn pincode_token_extraction() {
        assert_eq!(extract_pincode("flat 4, 110001 delhi"), Some("110001".into()));
        assert_eq!(extract_pincode("9876543210"), None);
        assert_eq!(extract_pincode("12345"), None);
        assert_eq!(extract_pincode("a123456b"), Some("123456".into()));
        assert_eq!(extract_pincode("560001 and 110001"), Some("560001".into()));
        assert_eq!(extract_pincode(""), None);
    }

    #[test]
    fn fingerprint_ignores_field_order_and_key_case() {
        let mut a = req("singh");
        a.fields = vec!["name".into(), "fname".into()];
        let mut b = req("singh");
        b.fields = vec!["FNAME".into(), "name".into()];
        assert_eq!(
            build_predicate(&a).unwrap().fingerprint(),
            build_predicate(&b).unwrap().fingerprint()
        );

        let mut c = SearchRequest::default();
        c.field_queries = [
            ("Name".to_string(), "singh".to_string()),
            ("circle".to_string(), "delhi".to_string()),
        ]
        .into_iter()
        .collect();
        let mut d = SearchRequest::default();
        d.field_queries = [
            ("circle".to_string(), "delhi".to_string()),
            ("name".to_string(), "singh".to_string()),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            build_predicate(&c).unwrap().fingerprint(),
            build_predicate(&d).unwrap().fingerprint()
        );
    }

    #[test]
    fn fingerprint_excludes_pagination() {
        let mut a = req("singh");
        a.limit = 500;
        let mut b = req("singh");
        b.offset = 1000;
        assert_eq!(
            build_predicate(&a).unwrap().fingerprint(),
            build_predicate(&b).unwrap().fingerprint()
        );
    }

    #[test]
    fn single_field_logic_is_normalized() {
        let mut a = req("singh");
        a.fields = vec!["name".into()];
        a.logic = Logic::Or;
        let mut b = a.clone();
        b.logic = Logic::And;
        assert_eq!(
            build_predicate(&a).unwrap().fingerprint(),
            build_predicate(&b).unwrap().fingerprint()
        );
    }

    #[test]
    fn conjunction_concatenates_params_in_clause_order() {
        let outer = build_predicate(&req("singh")).unwrap();
        let mut refine = req("delhi");
        refine.fields = vec!["circle".into()];
        let refine = build_predicate(&refine).unwrap();

        let outer_params = outer.params().len();
        let combined = outer.and(refine);
        assert!(combined.clause().starts_with("(("));
        assert!(combined.clause().contains(" AND (circle ILIKE ?)"));
        assert_eq!(combined.params().len(), outer_params + 1);
        assert_eq!(combined.params().last().unwrap(), "%delhi%");
    }
}
