//! Bindings and scopes recovered from scanned source.
//!
//! A binding is any statement that introduces a name: `def`, `class`,
//! parameters, imports, assignments, `for` targets and `with`/`except`
//! aliases. Blocks follow indentation; a `def` or `class` opens one that
//! closes at the next logical line indented no deeper than its header.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::scan::{is_ident_char, scan, ScannedSource, Token};

static DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)").expect("valid regex")
});
static CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*class\s+([A-Za-z_]\w*)").expect("valid regex"));
static IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+(.+)$").expect("valid regex"));
static FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*from\s+(\.*[\w.]*)\s+import\s+(.+)$").expect("valid regex")
});
static FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:async\s+)?for\s+(.+?)\s+in\b").expect("valid regex")
});
static WITH_AS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:async\s+)?(?:with|except)\b.*\bas\s+([A-Za-z_]\w*)").expect("valid regex")
});
static ASSIGN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(?::[^=]*)?=([^=].*|)$")
        .expect("valid regex")
});
static SELF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*self\.([A-Za-z_]\w*)\s*(?::[^=]*)?=(?:[^=]|$)").expect("valid regex")
});
static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*").expect("valid regex"));

/// Alias chains longer than this are not followed.
const MAX_ALIAS_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Kind {
    Module,
    Class,
    Function,
    Param,
    Statement,
    Keyword,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Param => "param",
            Self::Statement => "statement",
            Self::Keyword => "keyword",
        }
    }
}

/// What a binding refers to beyond itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Target {
    /// `name = other`
    Alias(String),
    /// `import a.b` / `from a import b`
    Module(String),
}

#[derive(Debug, Clone)]
pub(super) struct Binding {
    pub name: String,
    pub kind: Kind,
    pub line: usize,
    pub column: usize,
    /// Index into `Analysis::blocks`.
    pub block: usize,
    pub full_name: String,
    pub description: String,
    pub docstring: String,
    pub target: Option<Target>,
}

#[derive(Debug, Clone)]
pub(super) struct Block {
    pub name: String,
    pub kind: Kind,
    indent: usize,
    /// Header line; the body starts on the next line.
    start_line: usize,
    end_line: usize,
    parent: usize,
}

/// The word under or just before a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Word {
    pub name: String,
    pub attribute: bool,
}

/// Where a binding leads once aliases and imports are followed.
#[derive(Debug)]
pub(super) enum Followed<'a> {
    Binding(&'a Binding),
    Module(&'a str),
    Builtin(&'a str),
}

#[derive(Debug)]
pub(super) struct Analysis {
    pub scanned: ScannedSource,
    pub blocks: Vec<Block>,
    pub bindings: Vec<Binding>,
    module_name: String,
}

/// Dotted module name for a file path; `__main__` without one.
pub(super) fn module_name(path: Option<&str>) -> String {
    path.and_then(|p| Path::new(p).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("__main__")
        .to_string()
}

impl Analysis {
    pub fn new(source: &str, path: Option<&str>) -> Self {
        let scanned = scan(source);
        let line_count = scanned.raw.len();
        let mut analysis = Self {
            scanned,
            blocks: vec![Block {
                name: String::new(),
                kind: Kind::Module,
                indent: 0,
                start_line: 0,
                end_line: line_count,
                parent: 0,
            }],
            bindings: Vec::new(),
            module_name: module_name(path),
        };
        analysis.collect();
        analysis
    }

    pub fn line_count(&self) -> usize {
        self.scanned.raw.len()
    }

    /// Character length of a 1-based line.
    pub fn line_len(&self, line: usize) -> Option<usize> {
        let idx = line.checked_sub(1)?;
        self.scanned.raw.get(idx).map(|l| l.chars().count())
    }

    fn collect(&mut self) {
        let mut open: Vec<usize> = Vec::new();
        let mut last_code_line = 0;

        for idx in 0..self.scanned.raw.len() {
            if !self.scanned.logical_start[idx] {
                continue;
            }
            let masked = self.scanned.masked[idx].clone();
            let trimmed = masked.trim_start();
            if trimmed.trim_end().is_empty() {
                continue;
            }
            let line = idx + 1;
            let indent = masked.chars().count() - trimmed.chars().count();

            while let Some(&top) = open.last() {
                if self.blocks[top].indent < indent {
                    break;
                }
                self.blocks[top].end_line = last_code_line;
                open.pop();
            }
            last_code_line = line;
            let current = open.last().copied().unwrap_or(0);

            if let Some(caps) = DEF.captures(&masked) {
                let name = &caps[1];
                let column = char_column(&masked, caps.get(1).map_or(0, |m| m.start()));
                let params = caps.get(2).map(|m| params_in(&masked, m.start(), m.as_str())).unwrap_or_default();
                let signature = format!(
                    "{name}({})",
                    params.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>().join(", ")
                );
                let doc = self.docstring_after(idx);
                let docstring = if doc.is_empty() {
                    signature
                } else {
                    format!("{signature}\n\n{doc}")
                };
                self.bind(name, Kind::Function, line, column, current, format!("def {name}"), docstring, None);

                let block = self.open_block(name, Kind::Function, indent, line, current);
                open.push(block);
                for (param, column) in params {
                    let description = format!("param {param}");
                    self.bind(&param, Kind::Param, line, column, block, description, String::new(), None);
                }
            } else if let Some(caps) = CLASS.captures(&masked) {
                let name = &caps[1];
                let column = char_column(&masked, caps.get(1).map_or(0, |m| m.start()));
                let doc = self.docstring_after(idx);
                self.bind(name, Kind::Class, line, column, current, format!("class {name}"), doc, None);
                open.push(self.open_block(name, Kind::Class, indent, line, current));
            } else if let Some(caps) = FROM_IMPORT.captures(&masked) {
                let module = caps[1].to_string();
                if let Some(items) = caps.get(2) {
                    for (offset, piece) in split_top_level(items.as_str()) {
                        self.bind_import(Some(&module), piece, items.start() + offset, line, idx, current);
                    }
                }
            } else if let Some(caps) = IMPORT.captures(&masked) {
                if let Some(items) = caps.get(1) {
                    for (offset, piece) in split_top_level(items.as_str()) {
                        self.bind_import(None, piece, items.start() + offset, line, idx, current);
                    }
                }
            } else if let Some(caps) = FOR.captures(&masked) {
                if let Some(targets) = caps.get(1) {
                    self.bind_targets(&masked, targets.start(), targets.as_str(), line, idx, current, None);
                }
            } else if let Some(caps) = WITH_AS.captures(&masked) {
                if let Some(alias) = caps.get(1) {
                    self.bind_targets(&masked, alias.start(), alias.as_str(), line, idx, current, None);
                }
            } else if let Some(caps) = SELF_ATTR.captures(&masked) {
                let class_block = self.blocks[current].parent;
                let in_method = self.blocks[current].kind == Kind::Function
                    && current != 0
                    && self.blocks[class_block].kind == Kind::Class;
                if let (true, Some(attr)) = (in_method, caps.get(1)) {
                    let column = char_column(&masked, attr.start());
                    let description = self.scanned.raw[idx].trim().to_string();
                    self.bind(attr.as_str(), Kind::Statement, line, column, class_block, description, String::new(), None);
                }
            } else if let Some(caps) = ASSIGN.captures(&masked) {
                let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                let alias = (IDENT.find(value).is_some_and(|m| m.as_str() == value)
                    && !super::scan::is_keyword(value))
                .then(|| Target::Alias(value.to_string()));
                if let Some(targets) = caps.get(1) {
                    self.bind_targets(&masked, targets.start(), targets.as_str(), line, idx, current, alias);
                }
            }
        }

        for block in open {
            self.blocks[block].end_line = self.line_count();
        }
    }

    fn open_block(&mut self, name: &str, kind: Kind, indent: usize, line: usize, parent: usize) -> usize {
        self.blocks.push(Block {
            name: name.to_string(),
            kind,
            indent,
            start_line: line,
            end_line: self.line_count(),
            parent,
        });
        self.blocks.len() - 1
    }

    #[allow(clippy::too_many_arguments)]
    fn bind(
        &mut self,
        name: &str,
        kind: Kind,
        line: usize,
        column: usize,
        block: usize,
        description: String,
        docstring: String,
        target: Option<Target>,
    ) {
        let full_name = match &target {
            Some(Target::Module(path)) => path.clone(),
            _ => {
                let mut parts = vec![self.module_name.clone()];
                parts.extend(self.scope_path(block));
                parts.push(name.to_string());
                parts.join(".")
            }
        };
        self.bindings.push(Binding {
            name: name.to_string(),
            kind,
            line,
            column,
            block,
            full_name,
            description,
            docstring,
            target,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_targets(
        &mut self,
        masked: &str,
        start: usize,
        text: &str,
        line: usize,
        idx: usize,
        block: usize,
        target: Option<Target>,
    ) {
        let description = self.scanned.raw[idx].trim().to_string();
        for ident in IDENT.find_iter(text) {
            if super::scan::is_keyword(ident.as_str()) {
                continue;
            }
            let column = char_column(masked, start + ident.start());
            self.bind(ident.as_str(), Kind::Statement, line, column, block, description.clone(), String::new(), target.clone());
        }
    }

    /// Bind one comma-separated item of an import statement.
    fn bind_import(&mut self, from: Option<&str>, piece: &str, start: usize, line: usize, idx: usize, block: usize) {
        let words: Vec<_> = IDENT.find_iter(piece).collect();
        let (bound, path_words) = match words.as_slice() {
            [] => return,
            [.., as_kw, alias] if as_kw.as_str() == "as" && words.len() >= 3 => (*alias, &words[..words.len() - 2]),
            [first, ..] => (*first, &words[..]),
        };
        let dotted = path_words.iter().map(|w| w.as_str()).collect::<Vec<_>>().join(".");
        let path = match from {
            None => dotted,
            Some(module) if module.is_empty() || module.ends_with('.') => format!("{module}{dotted}"),
            Some(module) => format!("{module}.{dotted}"),
        };
        // `import a.b` binds `a`, which refers to module `a`.
        let path = match (from, bound.as_str() == path_words[0].as_str()) {
            (None, true) => path_words[0].as_str().to_string(),
            _ => path,
        };
        let masked = self.scanned.masked[idx].clone();
        let column = char_column(&masked, start + bound.start());
        let description = self.scanned.raw[idx].trim().to_string();
        self.bind(bound.as_str(), Kind::Module, line, column, block, description, String::new(), Some(Target::Module(path)));
    }

    /// Names of the enclosing `def`/`class` blocks, outermost first.
    pub fn scope_path(&self, block: usize) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = block;
        while current != 0 {
            path.push(self.blocks[current].name.clone());
            current = self.blocks[current].parent;
        }
        path.reverse();
        path
    }

    /// Docstring of the body that starts after header line `idx`.
    fn docstring_after(&self, idx: usize) -> String {
        if !self.scanned.masked[idx].trim_end().ends_with(':') {
            return String::new();
        }
        let Some(body) = (idx + 1..self.scanned.raw.len())
            .find(|&j| self.scanned.logical_start[j] && !self.scanned.masked[j].trim().is_empty())
        else {
            return String::new();
        };

        let first = self.scanned.raw[body].trim_start();
        let first = first.trim_start_matches(['r', 'R', 'u', 'U']);
        let quote = ["\"\"\"", "'''", "\"", "'"]
            .into_iter()
            .find(|q| first.starts_with(q));
        let Some(quote) = quote else {
            return String::new();
        };

        let mut text = String::new();
        let mut rest = &first[quote.len()..];
        let mut line = body;
        loop {
            if let Some(end) = rest.find(quote) {
                text.push_str(&rest[..end]);
                break;
            }
            text.push_str(rest);
            line += 1;
            if quote.len() == 1 || line >= self.scanned.raw.len() {
                break;
            }
            text.push('\n');
            rest = &self.scanned.raw[line];
        }
        clean_doc(&text)
    }

    /// Innermost block whose body contains `line`.
    pub fn block_at(&self, line: usize) -> usize {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.start_line < line && line <= b.end_line)
            .max_by_key(|(_, b)| b.start_line)
            .map_or(0, |(idx, _)| idx)
    }

    /// Blocks whose names are visible from `block`, innermost first.
    /// Class bodies are only visible from directly inside them.
    fn scope_chain(&self, block: usize) -> Vec<usize> {
        let mut chain = vec![block];
        let mut current = block;
        while current != 0 {
            current = self.blocks[current].parent;
            if current == 0 || self.blocks[current].kind != Kind::Class {
                chain.push(current);
            }
        }
        chain
    }

    /// Bindings visible at `line`, innermost scope first, source order within a scope.
    pub fn visible(&self, line: usize) -> Vec<&Binding> {
        self.scope_chain(self.block_at(line))
            .into_iter()
            .flat_map(|block| self.bindings.iter().filter(move |b| b.block == block))
            .collect()
    }

    /// Bindings that live in a class body.
    pub fn members(&self) -> Vec<&Binding> {
        self.bindings
            .iter()
            .filter(|b| b.block != 0 && self.blocks[b.block].kind == Kind::Class)
            .collect()
    }

    /// The binding `name` refers to at `line` inside `block`: the nearest
    /// scope that binds it, then the last binding at or before `line`.
    pub fn lookup(&self, name: &str, line: usize, block: usize) -> Option<&Binding> {
        for scope in self.scope_chain(block) {
            let candidates: Vec<&Binding> = self
                .bindings
                .iter()
                .filter(|b| b.block == scope && b.name == name)
                .collect();
            if candidates.is_empty() {
                continue;
            }
            return candidates
                .iter()
                .rev()
                .find(|b| b.line <= line)
                .or_else(|| candidates.first())
                .copied();
        }
        None
    }

    /// Follow `x = y` aliases and imports from `binding`.
    pub fn follow<'a>(&'a self, mut binding: &'a Binding) -> Followed<'a> {
        for _ in 0..MAX_ALIAS_DEPTH {
            match &binding.target {
                Some(Target::Module(path)) => return Followed::Module(path),
                Some(Target::Alias(other)) => match self.lookup(other, binding.line, binding.block) {
                    Some(next) if !std::ptr::eq(next, binding) => binding = next,
                    Some(_) => break,
                    None => {
                        if super::builtin_kind(other).is_some() {
                            return Followed::Builtin(other);
                        }
                        break;
                    }
                },
                None => break,
            }
        }
        Followed::Binding(binding)
    }

    /// Word containing the cursor, or ending at it.
    pub fn word_at(&self, line: usize, column: usize) -> Option<Word> {
        let chars: Vec<char> = self.scanned.masked.get(line.checked_sub(1)?)?.chars().collect();
        let mut start = column.min(chars.len());
        while start > 0 && is_ident_char(chars[start - 1]) {
            start -= 1;
        }
        let mut end = column.min(chars.len());
        while end < chars.len() && is_ident_char(chars[end]) {
            end += 1;
        }
        if start == end || chars[start].is_ascii_digit() {
            return None;
        }
        Some(Word {
            name: chars[start..end].iter().collect(),
            attribute: chars[..start].iter().rev().find(|c| !c.is_whitespace()) == Some(&'.'),
        })
    }

    /// Identifier characters left of the cursor and whether they follow a `.`.
    /// `None` when the cursor sits in a string, a comment or a number.
    pub fn prefix_at(&self, line: usize, column: usize) -> Option<Word> {
        let idx = line.checked_sub(1)?;
        let masked: Vec<char> = self.scanned.masked.get(idx)?.chars().collect();
        let raw: Vec<char> = self.scanned.raw.get(idx)?.chars().collect();
        let column = column.min(masked.len());
        if column > 0 && masked[column - 1] != raw[column - 1] {
            return None;
        }
        let mut start = column;
        while start > 0 && is_ident_char(masked[start - 1]) {
            start -= 1;
        }
        if masked.get(start).is_some_and(|c| c.is_ascii_digit()) && start < column {
            return None;
        }
        Some(Word {
            name: masked[start..column].iter().collect(),
            attribute: start > 0 && masked[start - 1] == '.',
        })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.scanned.tokens
    }

    pub fn is_binding_site(&self, token: &Token) -> bool {
        self.bindings
            .iter()
            .any(|b| b.line == token.line && b.column == token.column)
    }
}

/// Byte offset in `line` to a character column.
fn char_column(line: &str, byte: usize) -> usize {
    line[..byte].chars().count()
}

/// Parameter names with their columns, from the text between `def f(` and `)`.
fn params_in(line: &str, start: usize, text: &str) -> Vec<(String, usize)> {
    split_top_level(text)
        .into_iter()
        .filter_map(|(offset, piece)| {
            let head = piece.split([':', '=']).next().unwrap_or("");
            let ident = IDENT.find(head)?;
            Some((ident.as_str().to_string(), char_column(line, start + offset + ident.start())))
        })
        .collect()
}

/// Split on commas outside brackets, keeping each piece's byte offset.
fn split_top_level(text: &str) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut begin = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push((begin, &text[begin..i]));
                begin = i + 1;
            }
            _ => {}
        }
    }
    pieces.push((begin, &text[begin..]));
    pieces
}

/// Trim a docstring and strip the common indentation of its continuation lines.
fn clean_doc(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or("").trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut out = vec![first];
    out.extend(rest.iter().map(|l| l.get(indent..).unwrap_or("").trim_end().to_string()));
    out.join("\n").trim().to_string()
}
