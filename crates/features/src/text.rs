//! Word tokenizer, sentence splitter and chunk packing.

/// Abbreviations that end with a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "approx", "co", "corp", "dr", "e.g", "etc", "i.e", "inc", "jr", "ltd", "mr", "mrs", "ms",
    "sr", "st", "u.k", "u.s", "vs",
];

/// Abbreviations only when a number follows, as in `No. 1`.
const NUMBER_ABBREVIATIONS: &[&str] = &["no", "nos"];

fn is_apostrophe(c: char) -> bool {
    c == '\'' || c == '\u{2019}'
}

/// Words of `text`: maximal alphanumeric runs, inner apostrophes allowed.
pub fn words(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c.is_alphanumeric() {
            start.get_or_insert(i);
            continue;
        }
        let inner = is_apostrophe(c)
            && start.is_some()
            && chars.peek().is_some_and(|&(_, next)| next.is_alphanumeric());
        if inner {
            continue;
        }
        if let Some(s) = start.take() {
            out.push(&text[s..i]);
        }
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    out
}

pub fn word_count(text: &str) -> usize {
    words(text).len()
}

fn ends_with_abbreviation(before: &str, after: &str) -> bool {
    let last = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let mut chars = last.chars();
    // single-letter initial
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_alphabetic() {
            return true;
        }
    }
    if NUMBER_ABBREVIATIONS.contains(&last.as_str()) {
        return after.trim_start().starts_with(|c: char| c.is_ascii_digit());
    }
    ABBREVIATIONS.contains(&last.as_str())
}

/// Split at `.`, `?` or `!` (plus any closing quotes or brackets) followed by
/// whitespace or the end of text. Sentences are returned trimmed.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '?' | '!') {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < chars.len() && matches!(chars[j].1, '.' | '?' | '!') {
            j += 1;
        }
        while j < chars.len() && matches!(chars[j].1, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}') {
            j += 1;
        }
        let end = chars.get(j).map(|&(p, _)| p).unwrap_or(text.len());
        let at_break = j == chars.len() || chars[j].1.is_whitespace();
        let abbreviated = c == '.' && j == i + 1 && ends_with_abbreviation(&text[start..pos], &text[end..]);
        if at_break && !abbreviated {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
        i = j;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// A classifier input: whole sentences joined by spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Word tokens, used as the aggregation weight.
    pub tokens: usize,
}

/// Pack consecutive sentences greedily into chunks of at most `max_tokens`
/// words. A sentence longer than the limit becomes a chunk of its own.
/// Sentences without words are dropped.
pub fn pack_chunks<'a>(sentences: impl IntoIterator<Item = &'a str>, max_tokens: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    fn close(current: &mut Vec<&str>, tokens: &mut usize, chunks: &mut Vec<Chunk>) {
        if !current.is_empty() {
            chunks.push(Chunk {
                text: current.join(" "),
                tokens: *tokens,
            });
            current.clear();
            *tokens = 0;
        }
    }

    for sentence in sentences {
        let tokens = word_count(sentence);
        if tokens == 0 {
            continue;
        }
        if current_tokens + tokens > max_tokens {
            close(&mut current, &mut current_tokens, &mut chunks);
        }
        current.push(sentence);
        current_tokens += tokens;
        if current_tokens >= max_tokens {
            close(&mut current, &mut current_tokens, &mut chunks);
        }
    }
    close(&mut current, &mut current_tokens, &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        assert_eq!(words("We're up 12% (year-over-year)."), vec!["We're", "up", "12", "year", "over", "year"]);
        assert_eq!(words("  'quoted' "), vec!["quoted"]);
        assert_eq!(words("company\u{2019}s outlook"), vec!["company\u{2019}s", "outlook"]);
        assert!(words(" -- ").is_empty());
    }

    #[test]
    fn test_split_sentences() {
        let text = "Revenue was $4.2 billion. Mr. Smith joined Acme Inc. in May! Did margins grow? \"Yes.\" Done";
        assert_eq!(
            split_sentences(text),
            vec![
                "Revenue was $4.2 billion.",
                "Mr. Smith joined Acme Inc. in May!",
                "Did margins grow?",
                "\"Yes.\"",
                "Done",
            ]
        );
    }

    #[test]
    fn test_no_ends_a_sentence_unless_numbered() {
        assert_eq!(split_sentences("The answer is no. We are fine."), vec!["The answer is no.", "We are fine."]);
        assert_eq!(split_sentences("Plant No. 3 reopened. Output rose."), vec![
            "Plant No. 3 reopened.",
            "Output rose.",
        ]);
    }

    #[test]
    fn test_initials_and_ellipsis() {
        assert_eq!(split_sentences("John J. Smith spoke. Then... we paused."), vec![
            "John J. Smith spoke.",
            "Then...",
            "we paused.",
        ]);
    }

    #[test]
    fn test_pack_greedy_within_limit() {
        let sentences = ["one two three.", "four five.", "six seven eight nine.", "ten."];
        let chunks = pack_chunks(sentences, 5);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three. four five.", "six seven eight nine. ten."]);
        assert!(chunks.iter().all(|c| c.tokens <= 5));
        assert_eq!(chunks.iter().map(|c| c.tokens).sum::<usize>(), 10);
    }

    #[test]
    fn test_oversized_sentence_is_own_chunk() {
        let sentences = ["short one.", "this sentence is far too long for the limit.", "tail."];
        let chunks = pack_chunks(sentences, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].tokens, 9);
        assert_eq!(chunks[2].text, "tail.");
    }

    #[test]
    fn test_pack_skips_wordless_sentences() {
        let chunks = pack_chunks(["...", "ok."], 10);
        assert_eq!(chunks, vec![Chunk { text: "ok.".into(), tokens: 1 }]);
    }
}
