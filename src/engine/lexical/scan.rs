//! Line scanner for Python source.
//!
//! Produces a masked copy of every line with string and comment contents
//! blanked out (same character count, so columns line up), the identifier
//! tokens outside literals, and which lines start a logical statement.

/// Reserved words. Never reported as identifier tokens.
pub(super) const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub(super) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub(super) fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub(super) fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// An identifier occurrence outside strings and comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Token {
    pub name: String,
    /// 1-based.
    pub line: usize,
    /// 0-based, in characters.
    pub column: usize,
    /// Preceded by `.`: an attribute, not a plain name.
    pub attribute: bool,
}

#[derive(Debug, Clone)]
pub(super) struct ScannedSource {
    pub raw: Vec<String>,
    pub masked: Vec<String>,
    /// Line begins outside any string, bracket or backslash continuation.
    pub logical_start: Vec<bool>,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Code,
    Str { quote: char, triple: bool },
}

pub(super) fn scan(source: &str) -> ScannedSource {
    let raw: Vec<String> = source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();

    let mut masked = Vec::with_capacity(raw.len());
    let mut logical_start = Vec::with_capacity(raw.len());
    let mut tokens = Vec::new();
    let mut state = State::Code;
    let mut depth = 0usize;
    let mut continued = false;

    for (idx, line) in raw.iter().enumerate() {
        logical_start.push(matches!(state, State::Code) && depth == 0 && !continued);

        let chars: Vec<char> = line.chars().collect();
        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let current = state;
            match current {
                State::Str { quote, triple } => {
                    if c == '\\' {
                        out.push(' ');
                        if i + 1 < chars.len() {
                            out.push(' ');
                        }
                        i += 2;
                    } else if c == quote && (!triple || is_triple(&chars, i, quote)) {
                        let width = if triple { 3 } else { 1 };
                        out.extend(std::iter::repeat(quote).take(width));
                        i += width;
                        state = State::Code;
                    } else {
                        out.push(' ');
                        i += 1;
                    }
                }
                State::Code => {
                    if c == '#' {
                        out.extend(std::iter::repeat(' ').take(chars.len() - i));
                        break;
                    }
                    if c == '"' || c == '\'' {
                        let triple = is_triple(&chars, i, c);
                        let width = if triple { 3 } else { 1 };
                        out.extend(std::iter::repeat(c).take(width));
                        i += width;
                        state = State::Str { quote: c, triple };
                        continue;
                    }
                    if is_ident_start(c) {
                        let start = i;
                        while i < chars.len() && is_ident_char(chars[i]) {
                            i += 1;
                        }
                        let word: String = chars[start..i].iter().collect();
                        let string_prefix = chars.get(i).is_some_and(|n| *n == '"' || *n == '\'')
                            && is_string_prefix(&word);
                        if !string_prefix && !is_keyword(&word) {
                            tokens.push(Token {
                                attribute: preceded_by_dot(&chars, start),
                                name: word.clone(),
                                line: idx + 1,
                                column: start,
                            });
                        }
                        out.push_str(&word);
                        continue;
                    }
                    if c.is_ascii_digit() {
                        while i < chars.len() && (is_ident_char(chars[i]) || chars[i] == '.') {
                            out.push(chars[i]);
                            i += 1;
                        }
                        continue;
                    }
                    match c {
                        '(' | '[' | '{' => depth += 1,
                        ')' | ']' | '}' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    out.push(c);
                    i += 1;
                }
            }
        }

        // A single-quoted string cannot span lines.
        if let State::Str { triple: false, .. } = state {
            state = State::Code;
        }
        continued = matches!(state, State::Code) && out.trim_end().ends_with('\\');
        masked.push(out);
    }

    ScannedSource {
        raw,
        masked,
        logical_start,
        tokens,
    }
}

fn is_triple(chars: &[char], at: usize, quote: char) -> bool {
    chars.get(at + 1) == Some(&quote) && chars.get(at + 2) == Some(&quote)
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "b" | "u" | "f" | "rb" | "br" | "fr" | "rf"
    )
}

fn preceded_by_dot(chars: &[char], start: usize) -> bool {
    chars[..start]
        .iter()
        .rev()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| *c == '.')
}
