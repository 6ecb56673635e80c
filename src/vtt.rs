use std::sync::LazyLock;

use regex::Regex;

static INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Flatten WebVTT subtitle content into a single line of prose.
///
/// Header and metadata lines, cue timings, and numeric cue identifiers are
/// dropped. Inline tags such as `<c>` or `<00:00:01.000>` are stripped and a
/// line identical to the one before it is emitted only once, which removes the
/// repetition produced by rolling auto-captions. Stray angle brackets are
/// dropped and whitespace is collapsed, so normalizing the result again is a
/// no-op. Malformed input never fails; the worst case is an empty string.
pub fn normalize(content: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || is_header(line) || line.contains("-->") || is_cue_number(line) {
            continue;
        }

        let stripped = INLINE_TAG.replace_all(line, "");
        let stripped = stripped
            .replace(['<', '>'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if stripped.is_empty() || is_header(&stripped) || is_cue_number(&stripped) {
            continue;
        }

        if lines.last() == Some(&stripped) {
            continue;
        }
        lines.push(stripped);
    }

    lines.join(" ")
}

fn is_header(line: &str) -> bool {
    line.starts_with("WEBVTT") || line.starts_with("Kind:") || line.starts_with("Language:")
}

fn is_cue_number(line: &str) -> bool {
    line.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLLING: &str = "WEBVTT
Kind: captions
Language: en

1
00:00:00.000 --> 00:00:02.000 align:start position:0%
hello<00:00:00.500><c> world</c>

2
00:00:02.000 --> 00:00:02.010 align:start position:0%
hello world

3
00:00:02.010 --> 00:00:04.000 align:start position:0%
hello world
<b>this is</b> a test
";

    #[test]
    fn test_strips_headers_timings_and_tags() {
        assert_eq!(normalize(ROLLING), "hello world this is a test");
    }

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let input = "00:00:00.000 --> 00:00:01.000\nsame line\n\n00:00:01.000 --> 00:00:02.000\nsame line\n";
        assert_eq!(normalize(input), "same line");
    }

    #[test]
    fn test_non_consecutive_duplicates_kept() {
        let input = "a\nb\na";
        assert_eq!(normalize(input), "a b a");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(ROLLING);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_clean_text_unchanged() {
        assert_eq!(normalize("already clean prose"), "already clean prose");
    }

    #[test]
    fn test_only_metadata_yields_empty() {
        let input = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:00.000 --> 00:00:01.000\n<c></c>\n\n";
        assert_eq!(normalize(input), "");
    }

    #[test]
    fn test_malformed_input_does_not_panic() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<<<>>>\n-->\n"), "");
    }

    #[test]
    fn test_numeric_caption_inside_tags_is_stable() {
        let input = "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.000\n<c>2020</c>\n";
        let once = normalize(input);
        assert_eq!(once, "");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_header_revealed_by_tag_stripping_is_dropped() {
        assert_eq!(normalize("<c>WEBVTT</c>\nhello"), "hello");
    }

    #[test]
    fn test_stray_angle_brackets_are_stable() {
        let input = "00:00:00.000 --> 00:00:01.000\n5 < 6\n\n00:00:01.000 --> 00:00:02.000\n7 > 3\n";
        let once = normalize(input);
        assert_eq!(once, "5 6 7 3");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_idempotent_on_awkward_inputs() {
        let inputs = [
            "a  b\n\tc",
            "x <\n> y",
            "Kind: x\n<i>Language: y</i>\n12<b>34</b>\nend",
            "one\n<b>one</b>\ntwo",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {input:?}");
        }
    }
}
