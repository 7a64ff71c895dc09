//! Cheap token estimation shared by the chunker and the context assembler.
//!
//! One word is counted as 0.75 tokens' worth of text, i.e. a text of `n`
//! whitespace-separated words is estimated at `floor(4n / 3)` tokens.

/// Estimated token count for a run of `words` words.
pub fn tokens_for_words(words: usize) -> usize {
    (words / 3).saturating_mul(4).saturating_add(words % 3 * 4 / 3)
}

/// Largest word count whose estimate fits in `budget` tokens.
///
/// `floor(4n / 3) <= budget` holds exactly when `n <= (3 * budget + 2) / 4`.
#[allow(clippy::cast_possible_truncation)]
pub fn words_within(budget: usize) -> usize {
    ((3 * budget as u128 + 2) / 4) as usize
}

pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_words(text.split_whitespace().count())
}

/// Byte spans `(start, end)` of every whitespace-delimited word in `text`.
pub fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        match (ch.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Longest prefix of `text` ending on a word boundary whose estimate fits in
/// `budget` tokens.
pub fn truncate_to_tokens(text: &str, budget: usize) -> &str {
    let spans = word_spans(text);
    if tokens_for_words(spans.len()) <= budget {
        return text;
    }
    let keep = words_within(budget);
    match keep.checked_sub(1).and_then(|last| spans.get(last)) {
        Some(&(_, end)) => &text[..end],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_matches_word_heuristic() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one"), 1);
        assert_eq!(estimate_tokens("one two three"), 4);
        assert_eq!(estimate_tokens("The sky is blue."), 5);
    }

    #[test]
    fn words_within_is_the_inverse_bound() {
        for budget in 0..200 {
            let n = words_within(budget);
            assert!(tokens_for_words(n) <= budget);
            assert!(tokens_for_words(n + 1) > budget);
        }
    }

    #[test]
    fn words_within_returns_for_huge_budgets() {
        let n = words_within(usize::MAX);
        assert_eq!(n, usize::MAX / 4 * 3 + 2);
        assert!(tokens_for_words(n) > tokens_for_words(n - 1));
        assert_eq!(truncate_to_tokens("alpha beta", usize::MAX), "alpha beta");
    }

    #[test]
    fn word_spans_handle_unicode_and_runs_of_space() {
        let text = "  héllo   wörld\n\nend";
        let spans = word_spans(text);
        let words: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(words, vec!["héllo", "wörld", "end"]);
    }

    #[test]
    fn truncate_keeps_whole_words_within_budget() {
        let text = "alpha beta gamma delta epsilon";
        let cut = truncate_to_tokens(text, 4);
        assert_eq!(cut, "alpha beta gamma");
        assert!(estimate_tokens(cut) <= 4);
        assert_eq!(truncate_to_tokens(text, 100), text);
    }
}
