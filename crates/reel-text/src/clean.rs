//! Input text normalization shared by the segmentation strategies.

/// Punctuation retained in cleaned narration text.
const KEPT_PUNCTUATION: &str = ".,!?;:()-\"'";

/// Normalize whitespace and strip unsupported punctuation.
///
/// Runs of spaces and tabs collapse to one space; blank lines are kept as
/// paragraph breaks so the paragraph strategy still has boundaries to work
/// with. Characters outside letters, digits, whitespace, and
/// [`KEPT_PUNCTUATION`] are removed.
pub fn clean_text(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCTUATION.contains(*c))
        .collect();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in filtered.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n\n")
}

/// Split text into sentences on terminal punctuation.
///
/// A `.`, `!`, or `?` ends a sentence when the next non-whitespace
/// character starts a new one (uppercase or digit) or the text ends.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        current.push(c);

        if matches!(c, '.' | '!' | '?') {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            let boundary = match next {
                None => true,
                Some(n) => n.is_uppercase() || n.is_ascii_digit() || *n == '"',
            };
            if boundary {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean_text("hello    world\tagain"), "hello world again");
    }

    #[test]
    fn test_clean_strips_unsupported_punctuation() {
        assert_eq!(clean_text("costs $5 & 10% [today]"), "costs 5 10 today");
        assert_eq!(clean_text("Keep: commas, dots. Done!"), "Keep: commas, dots. Done!");
    }

    #[test]
    fn test_clean_preserves_paragraph_breaks() {
        let cleaned = clean_text("first  para\nsame para\n\nsecond para");
        assert_eq!(cleaned, "first para same para\n\nsecond para");
    }

    #[test]
    fn test_clean_empty() {
        assert_eq!(clean_text("   \n\t "), "");
    }

    #[test]
    fn test_split_sentences_basic() {
        let sentences = split_sentences(
            "The sun rose over the quiet city. A lone bicycle rider pedaled down Main Street.",
        );
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "The sun rose over the quiet city.");
    }

    #[test]
    fn test_split_sentences_keeps_abbreviation_like_runs() {
        // Lowercase after a period is not treated as a boundary.
        let sentences = split_sentences("He visited e.g. the park. Then he left.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_split_sentences_trailing_fragment() {
        let sentences = split_sentences("One full sentence. and a dangling tail");
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].contains("dangling tail"));
    }
}
