//! Case-insensitive subsequence scorer used to rank workspace symbol
//! search results. Pure and deterministic; safe to call from any
//! number of query threads.

const MATCH_BASE: i64 = 10;
const RUN_BONUS: i64 = 20;
const START_BONUS: i64 = 20;
const SEPARATOR_BONUS: i64 = 10;
const CAMEL_BONUS: i64 = 10;
const GAP_PENALTY: i64 = 3;
const LENGTH_PENALTY: i64 = 1;

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.' | ':' | '/' | ' ')
}

/// Score `query` against `candidate`. `None` means no match: some
/// character of the query does not appear in the candidate in order.
/// Higher scores are better; an empty query matches everything.
///
/// The score rewards contiguous runs, matches at the start of the
/// candidate, after separators, and on camelCase boundaries, and
/// penalizes candidate length and gaps between matched characters.
pub fn fuzzy_match(query: &str, candidate: &str) -> Option<i64> {
    let mut score: i64 = -(candidate.chars().count() as i64) * LENGTH_PENALTY;
    let mut pattern = query.chars().map(|c| c.to_ascii_lowercase());
    let Some(mut wanted) = pattern.next() else {
        return Some(score);
    };

    let mut prev_matched = false;
    let mut prev_char: Option<char> = None;
    let mut gap: i64 = 0;
    let mut done = false;

    for (i, c) in candidate.chars().enumerate() {
        if done {
            break;
        }
        if c.to_ascii_lowercase() == wanted {
            score += MATCH_BASE;
            score -= gap * GAP_PENALTY;
            gap = 0;

            if prev_matched {
                score += RUN_BONUS;
            }
            if i == 0 {
                score += START_BONUS;
            } else if let Some(p) = prev_char {
                if is_separator(p) {
                    score += SEPARATOR_BONUS;
                } else if p.is_lowercase() && c.is_uppercase() {
                    score += CAMEL_BONUS;
                }
            }

            prev_matched = true;
            match pattern.next() {
                Some(next) => wanted = next,
                None => done = true,
            }
        } else {
            if prev_matched || gap > 0 {
                gap += 1;
            }
            prev_matched = false;
        }
        prev_char = Some(c);
    }

    if done { Some(score) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsequence_in_order_matches() {
        assert!(fuzzy_match("abc", "aXbXc").is_some());
        assert!(fuzzy_match("abc", "acb").is_none());
        assert!(fuzzy_match("abc", "ab").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(fuzzy_match("fb", "FooBar").is_some());
        assert!(fuzzy_match("FOOBAR", "foobar").is_some());
    }

    #[test]
    fn exact_match_outranks_embedded_match() {
        let exact = fuzzy_match("foo", "foo").unwrap();
        let embedded = fuzzy_match("foo", "xfooy").unwrap();
        assert!(exact >= embedded);
    }

    #[test]
    fn contiguous_run_outranks_scattered_match() {
        let run = fuzzy_match("map", "remap").unwrap();
        let scattered = fuzzy_match("map", "m_a_p").unwrap();
        assert!(run > scattered);
    }

    #[test]
    fn word_boundary_hits_outrank_mid_word_hits() {
        let camel = fuzzy_match("fb", "fooBar").unwrap();
        let buried = fuzzy_match("fb", "foxxbx").unwrap();
        assert!(camel > buried);

        let sep = fuzzy_match("fb", "foo_bar").unwrap();
        assert!(sep > buried);
    }

    #[test]
    fn empty_query_matches_anything() {
        assert!(fuzzy_match("", "whatever").is_some());
        assert!(fuzzy_match("", "").is_some());
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = fuzzy_match("idx", "IndexingPipeline");
        let b = fuzzy_match("idx", "IndexingPipeline");
        assert_eq!(a, b);
    }
}
