//! Turning a free-text request into search terms.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "but", "by", "can", "code",
    "could", "do", "does", "file", "files", "find", "for", "from", "get", "has", "have", "how",
    "i", "in", "into", "is", "it", "its", "look", "me", "my", "need", "of", "on", "or", "please",
    "search", "should", "show", "that", "the", "their", "there", "these", "this", "to", "use",
    "used", "using", "want", "was", "what", "when", "where", "which", "who", "why", "will",
    "with", "would", "you", "your",
];

/// Language names that imply an extension. First entry wins for aliases.
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("rust", "rs"),
    ("python", "py"),
    ("typescript", "ts"),
    ("javascript", "js"),
    ("golang", "go"),
    ("java", "java"),
    ("kotlin", "kt"),
    ("swift", "swift"),
    ("ruby", "rb"),
    ("php", "php"),
    ("csharp", "cs"),
    ("cpp", "cpp"),
    ("c++", "cpp"),
    ("scala", "scala"),
    ("haskell", "hs"),
    ("elixir", "ex"),
    ("lua", "lua"),
    ("dart", "dart"),
    ("markdown", "md"),
    ("yaml", "yaml"),
    ("json", "json"),
    ("toml", "toml"),
    ("html", "html"),
    ("css", "css"),
    ("sql", "sql"),
    ("bash", "sh"),
    ("shell", "sh"),
    ("vue", "vue"),
    ("svelte", "svelte"),
];

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|'([^']+)'|`([^`]+)`"#).expect("valid regex"));
static FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*\.[A-Za-z][A-Za-z0-9]{0,7}$").expect("valid regex")
});
static EXPLICIT_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*?\.([A-Za-z][A-Za-z0-9]{0,7})$").expect("valid regex"));
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").expect("valid regex"));
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word.to_lowercase().as_str())
}

/// Whether a keyword is worth handing to grep: long, meaningful and shaped
/// like an identifier.
pub fn is_content_term(keyword: &str) -> bool {
    keyword.chars().count() > 3 && !is_stop_word(keyword) && IDENTIFIER.is_match(keyword)
}

fn trim_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')' | '?' | '!' | '[' | ']'))
}

/// Split `parseHTTPRequest` or `parse_http_request` into lower-cased parts.
pub fn split_identifier(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = c.is_uppercase()
            && i > 0
            && (chars[i - 1].is_lowercase()
                || chars[i - 1].is_ascii_digit()
                || (chars[i - 1].is_uppercase()
                    && chars.get(i + 1).is_some_and(|next| next.is_lowercase())));
        if boundary && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts.into_iter().map(|p| p.to_lowercase()).collect()
}

/// A bare separator or single-letter segments (`/`, `a/b`) say nothing
/// about which file is wanted.
fn has_named_segment(token: &str) -> bool {
    token
        .split(['/', '\\'])
        .any(|segment| segment.chars().count() >= 2)
}

struct Collector {
    seen: HashSet<String>,
    keywords: Vec<String>,
}

impl Collector {
    fn push(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        if self.seen.insert(keyword.to_lowercase()) {
            self.keywords.push(keyword.to_string());
        }
    }
}

/// Keywords in first-seen order, de-duplicated case-insensitively.
///
/// Quoted phrases are kept verbatim. Path-like and filename-like tokens are
/// taken whole before the rest is tokenised, so `src/main.rs` is not lost to
/// punctuation splitting. Compound identifiers contribute both the original
/// token and its parts.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let mut collector = Collector {
        seen: HashSet::new(),
        keywords: Vec::new(),
    };

    for captures in QUOTED.captures_iter(query) {
        if let Some(phrase) = captures.iter().skip(1).flatten().next() {
            collector.push(phrase.as_str());
        }
    }
    let remainder = QUOTED.replace_all(query, " ");

    let mut generic = Vec::new();
    for raw in remainder.split_whitespace() {
        let token = trim_punctuation(raw).trim_end_matches('.');
        if token.is_empty() {
            continue;
        }
        if token.contains('/') || token.contains('\\') {
            if has_named_segment(token) {
                collector.push(token.trim_matches(['/', '\\']));
            }
        } else if FILENAME.is_match(token) {
            collector.push(token);
        } else {
            generic.push(token);
        }
    }

    for token in generic {
        for word in WORD.find_iter(token).map(|m| m.as_str()) {
            if word.chars().count() < 2 || is_stop_word(word) {
                continue;
            }
            collector.push(word);
            let parts = split_identifier(word);
            if parts.len() > 1 {
                for part in parts {
                    if part.chars().count() >= 2 && !is_stop_word(&part) {
                        collector.push(&part);
                    }
                }
            }
        }
    }

    collector.keywords
}

/// Extensions (without the dot) mentioned explicitly (`.ts`, `*.ts`) or
/// implied by a language name.
pub fn infer_extensions(query: &str) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    let mut add = |ext: &str| {
        let ext = ext.to_lowercase();
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    };

    for raw in query.split_whitespace() {
        let token = trim_punctuation(raw);
        if let Some(captures) = EXPLICIT_EXTENSION.captures(token) {
            add(&captures[1]);
            continue;
        }
        let word = token.trim_end_matches('.').to_lowercase();
        if let Some((_, ext)) = LANGUAGE_EXTENSIONS.iter().find(|(name, _)| *name == word) {
            add(ext);
        }
    }

    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_and_short_tokens_dropped() {
        assert_eq!(
            extract_keywords("where is the parser for a config"),
            vec!["parser", "config"]
        );
    }

    #[test]
    fn test_quoted_phrase_kept_verbatim() {
        let keywords = extract_keywords("find \"connection refused\" in logs");
        assert_eq!(keywords[0], "connection refused");
        assert!(keywords.contains(&"logs".to_string()));
        assert!(!keywords.contains(&"connection".to_string()));
    }

    #[test]
    fn test_paths_and_filenames_taken_whole() {
        let keywords = extract_keywords("check src/auth/login.ts and package.json, then tests");
        assert_eq!(keywords[0], "src/auth/login.ts");
        assert_eq!(keywords[1], "package.json");
        assert!(keywords.contains(&"tests".to_string()));
        assert!(!keywords.contains(&"json".to_string()));
    }

    #[test]
    fn test_bare_separators_dropped() {
        assert_eq!(extract_keywords("parser / lexer"), vec!["parser", "lexer"]);
        assert_eq!(extract_keywords("a/b \\ tokens"), vec!["tokens"]);
        assert_eq!(extract_keywords("look in src/"), vec!["src"]);
    }

    #[test]
    fn test_compound_identifiers_split() {
        let keywords = extract_keywords("getUserProfile and parse_http_request");
        assert_eq!(
            keywords,
            vec![
                "getUserProfile",
                "user",
                "profile",
                "parse_http_request",
                "parse",
                "http",
                "request"
            ]
        );
    }

    #[test]
    fn test_dedupe_preserves_first_seen() {
        assert_eq!(
            extract_keywords("Config config CONFIG loader"),
            vec!["Config", "loader"]
        );
    }

    #[test]
    fn test_split_identifier_acronyms() {
        assert_eq!(split_identifier("parseHTTPRequest"), vec!["parse", "http", "request"]);
        assert_eq!(split_identifier("snake_case_name"), vec!["snake", "case", "name"]);
        assert_eq!(split_identifier("plain"), vec!["plain"]);
    }

    #[test]
    fn test_infer_extensions() {
        assert_eq!(infer_extensions("the rust parser"), vec!["rs"]);
        assert_eq!(infer_extensions("all .ts and *.tsx files"), vec!["ts", "tsx"]);
        assert_eq!(infer_extensions("python or Python."), vec!["py"]);
        assert!(infer_extensions("login handler").is_empty());
    }

    #[test]
    fn test_content_terms() {
        assert!(is_content_term("parser"));
        assert!(is_content_term("user_id"));
        assert!(!is_content_term("api"));
        assert!(!is_content_term("would"));
        assert!(!is_content_term("src/main.rs"));
        assert!(!is_content_term("connection refused"));
    }
}
