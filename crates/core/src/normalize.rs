use regex::Regex;
use std::sync::OnceLock;

fn hyphen_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w)-\n(\w)").unwrap())
}

fn lone_newline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A single \n that is not part of a blank-line paragraph break.
    RE.get_or_init(|| Regex::new(r"([^\n])\n([^\n])").unwrap())
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").unwrap())
}

/// Soft cleanup for text extracted from PDFs, applied before any chunking or
/// embedding. Removes extraction noise (broken hyphenation, stray line
/// breaks, non-breaking spaces) while keeping paragraph structure intact.
///
/// Idempotent: applying it to its own output is a no-op.
pub fn clean_extracted_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let t = text.replace('\r', "\n").replace('\t', " ");

    // Rejoin words hyphen-split across a line break.
    let t = hyphen_break_re().replace_all(&t, "$1$2");

    // Collapse lone newlines into spaces without touching blank-line
    // paragraph breaks. The regex consumes the char after the newline, so
    // overlapping matches ("a\nb\nc") need a second pass.
    let t = lone_newline_re().replace_all(&t, "$1 $2");
    let t = lone_newline_re().replace_all(&t, "$1 $2");

    let t = t.replace('\u{a0}', " ");
    let t = space_run_re().replace_all(&t, " ");

    t.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::clean_extracted_text;

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(clean_extracted_text(""), "");
    }

    #[test]
    fn rejoins_hyphen_broken_words() {
        let input = "la declara-\nción trimestral";
        assert_eq!(clean_extracted_text(input), "la declaración trimestral");
    }

    #[test]
    fn collapses_lone_newlines_but_keeps_paragraph_breaks() {
        let input = "primera línea\nsegunda línea\n\nsegundo párrafo";
        assert_eq!(
            clean_extracted_text(input),
            "primera línea segunda línea\n\nsegundo párrafo"
        );
    }

    #[test]
    fn handles_consecutive_lone_newlines() {
        let input = "a\nb\nc\nd";
        assert_eq!(clean_extracted_text(input), "a b c d");
    }

    #[test]
    fn replaces_tabs_nbsp_and_space_runs() {
        let input = "Modelo\t036\u{a0}de   alta";
        assert_eq!(clean_extracted_text(input), "Modelo 036 de alta");
    }

    #[test]
    fn carriage_returns_become_paragraph_breaks_when_doubled() {
        let input = "uno\r\rdos";
        assert_eq!(clean_extracted_text(input), "uno\n\ndos");
    }

    #[test]
    fn is_idempotent_on_sampled_texts() {
        let samples = [
            "",
            "texto simple",
            "la declara-\nción y el mo-\ndelo",
            "línea\nsuelta\n\npárrafo nuevo\n\notro  más",
            "Modelo\t036\u{a0}alta   censal\r\ncon saltos",
        ];
        for sample in samples {
            let once = clean_extracted_text(sample);
            let twice = clean_extracted_text(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }
}
