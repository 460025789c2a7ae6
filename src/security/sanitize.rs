//! Credential sanitization and injection screening.
//!
//! [`sanitize`] is applied to identifiers and profile text before they
//! leave the client. Passwords are never sanitized: they are sent
//! verbatim so valid special characters survive.
//!
//! [`find_injection`] screens already-sanitized fields (and raw
//! passwords) for markers that have no business in a login form. A hit
//! fails the operation locally, before any network call.

use regex::Regex;
use std::sync::LazyLock;

/// Category of a rejected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    /// Script tags, `javascript:` URLs, inline event handlers.
    Markup,
    /// SQL comment, union, drop and tautology markers.
    Sql,
    /// Embedded NUL or other control bytes.
    ControlBytes,
}

/// A single screening hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionMatch {
    pub kind: InjectionKind,
    pub pattern_id: &'static str,
}

struct InjectionPattern {
    id: &'static str,
    pattern: Regex,
    kind: InjectionKind,
    /// Also applied to passwords. Markers that only matter inside markup
    /// are skipped there so ordinary passphrases are not rejected.
    screens_secrets: bool,
}

static INJECTION_PATTERNS: LazyLock<Vec<InjectionPattern>> = LazyLock::new(|| {
    vec![
        InjectionPattern {
            id: "script_tag",
            pattern: Regex::new(r"(?i)script\s*>|<\s*/?\s*script").unwrap(),
            kind: InjectionKind::Markup,
            screens_secrets: true,
        },
        InjectionPattern {
            id: "script_word",
            // `<` and `>` are gone after sanitizing, so match the bare tag word
            // when it is glued to other markup-ish text.
            pattern: Regex::new(r"(?i)\bscript\b.*(?:alert|src|eval)|\b(?:alert|eval)\s*\(").unwrap(),
            kind: InjectionKind::Markup,
            screens_secrets: false,
        },
        InjectionPattern {
            id: "javascript_url",
            pattern: Regex::new(r"(?i)(?:java|vb)script\s*:").unwrap(),
            kind: InjectionKind::Markup,
            screens_secrets: true,
        },
        InjectionPattern {
            id: "event_handler",
            pattern: Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap(),
            kind: InjectionKind::Markup,
            screens_secrets: false,
        },
        InjectionPattern {
            id: "sql_tautology",
            pattern: Regex::new(r#"(?i)['"]\s*or\b\s*['"]?\w+['"]?\s*=\s*['"]?\w+"#).unwrap(),
            kind: InjectionKind::Sql,
            screens_secrets: true,
        },
        InjectionPattern {
            id: "sql_statement",
            pattern: Regex::new(r"(?i)(?:;|')\s*(?:drop|delete|truncate|alter|insert|update)\s+\w+|union\s+(?:all\s+)?select").unwrap(),
            kind: InjectionKind::Sql,
            screens_secrets: true,
        },
        InjectionPattern {
            id: "sql_comment",
            pattern: Regex::new(r"'\s*(?:--|#|/\*)").unwrap(),
            kind: InjectionKind::Sql,
            screens_secrets: true,
        },
        InjectionPattern {
            id: "control_bytes",
            pattern: Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").unwrap(),
            kind: InjectionKind::ControlBytes,
            screens_secrets: true,
        },
    ]
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").unwrap());

/// Trim surrounding whitespace and strip `<` and `>`.
///
/// Complete `<...>` spans are dropped as a whole so a tag never survives
/// as a bare word; any stray bracket left over is removed on its own.
pub fn sanitize(input: &str) -> String {
    let without_tags = TAG.replace_all(input.trim(), "");
    without_tags
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_string()
}

/// First injection marker found in `input`, if any.
pub fn find_injection(input: &str) -> Option<InjectionMatch> {
    INJECTION_PATTERNS
        .iter()
        .find(|p| p.pattern.is_match(input))
        .map(|p| InjectionMatch {
            kind: p.kind,
            pattern_id: p.id,
        })
}

/// Screening for passwords: script, SQL and control-byte markers only.
pub fn find_secret_injection(input: &str) -> Option<InjectionMatch> {
    INJECTION_PATTERNS
        .iter()
        .filter(|p| p.screens_secrets)
        .find(|p| p.pattern.is_match(input))
        .map(|p| InjectionMatch {
            kind: p.kind,
            pattern_id: p.id,
        })
}

/// Quick check: does the input carry any injection marker?
pub fn contains_injection(input: &str) -> bool {
    find_injection(input).is_some()
}
