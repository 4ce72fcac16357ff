//! Built-in lexical engine for Python source.
//!
//! Works from the text of a single buffer: no imports are opened and no types
//! are inferred. Good enough for the binary to be useful on its own and to
//! exercise the server end to end; a real analyser plugs in through
//! [`AnalysisEngine`].
//!
//! Like the analysers it stands in for, it keeps process-wide settings that
//! requests may override for one call.

mod analysis;
mod scan;

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

use self::analysis::{Analysis, Binding, Followed, Kind, Target, Word};
use self::scan::KEYWORDS;
use super::{AnalysisEngine, Completion, Definition, EngineError, EngineSettings, NamesQuery, ScriptQuery};

static MODULE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*$").expect("valid regex")
});

/// Names always in scope.
const BUILTINS: &[(&str, Kind)] = &[
    ("abs", Kind::Function),
    ("all", Kind::Function),
    ("any", Kind::Function),
    ("bool", Kind::Class),
    ("bytes", Kind::Class),
    ("callable", Kind::Function),
    ("dict", Kind::Class),
    ("dir", Kind::Function),
    ("enumerate", Kind::Class),
    ("Exception", Kind::Class),
    ("filter", Kind::Class),
    ("float", Kind::Class),
    ("frozenset", Kind::Class),
    ("getattr", Kind::Function),
    ("hasattr", Kind::Function),
    ("int", Kind::Class),
    ("isinstance", Kind::Function),
    ("iter", Kind::Function),
    ("KeyError", Kind::Class),
    ("len", Kind::Function),
    ("list", Kind::Class),
    ("map", Kind::Class),
    ("max", Kind::Function),
    ("min", Kind::Function),
    ("next", Kind::Function),
    ("object", Kind::Class),
    ("open", Kind::Function),
    ("print", Kind::Function),
    ("range", Kind::Class),
    ("repr", Kind::Function),
    ("set", Kind::Class),
    ("sorted", Kind::Function),
    ("str", Kind::Class),
    ("sum", Kind::Function),
    ("super", Kind::Class),
    ("tuple", Kind::Class),
    ("type", Kind::Class),
    ("TypeError", Kind::Class),
    ("ValueError", Kind::Class),
    ("zip", Kind::Class),
];

fn builtin_kind(name: &str) -> Option<Kind> {
    BUILTINS.iter().find(|(n, _)| *n == name).map(|(_, kind)| *kind)
}

/// Recognised settings and their defaults. A value must keep the JSON type
/// of its default.
fn default_settings() -> EngineSettings {
    [
        ("case_insensitive_completion", json!(true)),
        ("add_bracket_after_function", json!(false)),
        ("no_completion_duplicates", json!(true)),
        ("cache_directory", json!("~/.cache/codelens")),
        ("use_filesystem_cache", json!(true)),
        ("fast_parser", json!(true)),
        ("dynamic_array_additions", json!(true)),
        ("dynamic_params", json!(true)),
        ("dynamic_params_for_other_modules", json!(true)),
        ("additional_dynamic_modules", json!([])),
        ("auto_import_modules", json!(["hashlib"])),
    ]
    .into_iter()
    .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list of strings",
        Value::Object(_) => "object",
    }
}

fn same_shape(default: &Value, value: &Value) -> bool {
    match (default, value) {
        (Value::Bool(_), Value::Bool(_)) | (Value::String(_), Value::String(_)) => true,
        (Value::Array(_), Value::Array(items)) => items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Lexical analysis engine with a global settings table.
#[derive(Debug, Clone)]
pub struct LexicalEngine {
    settings: EngineSettings,
    preloaded: BTreeSet<String>,
}

impl LexicalEngine {
    pub fn new() -> Self {
        Self {
            settings: default_settings(),
            preloaded: BTreeSet::new(),
        }
    }

    /// Modules warmed by `preload_modules`, sorted.
    pub fn preloaded_modules(&self) -> impl Iterator<Item = &str> {
        self.preloaded.iter().map(String::as_str)
    }

    fn flag(&self, name: &str) -> bool {
        self.settings.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    fn analyse(&self, source: &str, path: Option<&str>) -> Analysis {
        Analysis::new(source, path)
    }

    fn check_position(&self, analysis: &Analysis, query: &ScriptQuery) -> Result<(), EngineError> {
        let invalid = EngineError::InvalidPosition {
            line: query.line,
            column: query.column,
        };
        match analysis.line_len(query.line) {
            Some(len) if query.column <= len => Ok(()),
            _ => Err(invalid),
        }
    }

    fn matches_prefix(&self, name: &str, prefix: &str) -> bool {
        if self.flag("case_insensitive_completion") {
            name.to_lowercase().starts_with(&prefix.to_lowercase())
        } else {
            name.starts_with(prefix)
        }
    }

    /// Bindings the word at the cursor refers to, before following aliases.
    fn resolve<'a>(&self, analysis: &'a Analysis, query: &ScriptQuery, word: &Word) -> Vec<&'a Binding> {
        if word.attribute {
            return analysis
                .members()
                .into_iter()
                .filter(|b| b.name == word.name)
                .collect();
        }
        analysis
            .lookup(&word.name, query.line, analysis.block_at(query.line))
            .into_iter()
            .collect()
    }

    fn goto(&self, query: &ScriptQuery, follow_aliases: bool, follow_imports: bool) -> Result<Vec<Definition>, EngineError> {
        let analysis = self.analyse(&query.source, query.source_path.as_deref());
        self.check_position(&analysis, query)?;
        let module_path = query.source_path.as_deref();

        let Some(word) = analysis.word_at(query.line, query.column) else {
            return Ok(Vec::new());
        };
        let bindings = self.resolve(&analysis, query, &word);
        if bindings.is_empty() {
            if word.attribute {
                return Ok(Vec::new());
            }
            if KEYWORDS.contains(&word.name.as_str()) {
                return Ok(vec![keyword_definition(&word.name)]);
            }
            return Ok(builtin_kind(&word.name)
                .map(|kind| vec![builtin_definition(&word.name, kind)])
                .unwrap_or_default());
        }

        let definitions = bindings
            .into_iter()
            .map(|binding| {
                let followed = if follow_aliases {
                    analysis.follow(binding)
                } else {
                    Followed::Binding(binding)
                };
                match followed {
                    Followed::Binding(b) => match (&b.target, follow_imports) {
                        (Some(Target::Module(path)), true) => module_definition(path),
                        _ => local_definition(b, module_path),
                    },
                    Followed::Module(path) if follow_imports => module_definition(path),
                    Followed::Module(_) => local_definition(binding, module_path),
                    Followed::Builtin(name) => builtin_kind(name)
                        .map(|kind| builtin_definition(name, kind))
                        .unwrap_or_else(|| local_definition(binding, module_path)),
                }
            })
            .collect();
        Ok(definitions)
    }
}

impl Default for LexicalEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn local_definition(binding: &Binding, module_path: Option<&str>) -> Definition {
    Definition {
        module_path: module_path.map(str::to_string),
        name: binding.name.clone(),
        kind: binding.kind.as_str().to_string(),
        in_builtin_module: false,
        line: Some(binding.line),
        column: Some(binding.column),
        docstring: binding.docstring.clone(),
        description: binding.description.clone(),
        full_name: Some(binding.full_name.clone()),
        is_keyword: false,
    }
}

fn module_definition(path: &str) -> Definition {
    let name = path.rsplit('.').next().unwrap_or(path);
    Definition {
        module_path: None,
        name: name.to_string(),
        kind: Kind::Module.as_str().to_string(),
        in_builtin_module: false,
        line: None,
        column: None,
        docstring: String::new(),
        description: format!("module {path}"),
        full_name: Some(path.to_string()),
        is_keyword: false,
    }
}

fn builtin_definition(name: &str, kind: Kind) -> Definition {
    let description = match kind {
        Kind::Class => format!("class {name}"),
        _ => format!("def {name}"),
    };
    Definition {
        module_path: None,
        name: name.to_string(),
        kind: kind.as_str().to_string(),
        in_builtin_module: true,
        line: None,
        column: None,
        docstring: String::new(),
        description,
        full_name: Some(format!("builtins.{name}")),
        is_keyword: false,
    }
}

fn keyword_definition(name: &str) -> Definition {
    Definition {
        module_path: None,
        name: name.to_string(),
        kind: Kind::Keyword.as_str().to_string(),
        in_builtin_module: true,
        line: None,
        column: None,
        docstring: String::new(),
        description: format!("keyword {name}"),
        full_name: Some(name.to_string()),
        is_keyword: true,
    }
}

fn completion_from(definition: Definition) -> Completion {
    Completion {
        module_path: definition.module_path,
        name: definition.name,
        kind: definition.kind,
        line: definition.line,
        column: definition.column,
        docstring: definition.docstring,
        description: definition.description,
    }
}

/// Dunder names last, then private names, otherwise case-insensitive order.
fn completion_order(name: &str) -> (bool, bool, String) {
    (name.starts_with("__"), name.starts_with('_'), name.to_lowercase())
}

impl AnalysisEngine for LexicalEngine {
    fn settings(&self) -> EngineSettings {
        self.settings.clone()
    }

    fn apply_setting(&mut self, name: &str, value: &Value) -> Result<(), EngineError> {
        let default = default_settings()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSetting(name.to_string()))?;
        if !same_shape(&default, value) {
            return Err(EngineError::InvalidSettingValue {
                name: name.to_string(),
                expected: type_name(&default),
            });
        }
        self.settings.insert(name, value.clone());
        Ok(())
    }

    fn completions(&mut self, query: &ScriptQuery) -> Result<Vec<Completion>, EngineError> {
        let analysis = self.analyse(&query.source, query.source_path.as_deref());
        self.check_position(&analysis, query)?;
        let Some(prefix) = analysis.prefix_at(query.line, query.column) else {
            return Ok(Vec::new());
        };
        let module_path = query.source_path.as_deref();

        let mut candidates: Vec<Definition> = if prefix.attribute {
            analysis
                .members()
                .into_iter()
                .map(|b| local_definition(b, module_path))
                .collect()
        } else {
            let mut local: Vec<Definition> = analysis
                .visible(query.line)
                .into_iter()
                .map(|b| local_definition(b, module_path))
                .collect();
            local.extend(KEYWORDS.iter().map(|k| keyword_definition(k)));
            local.extend(BUILTINS.iter().map(|(name, kind)| builtin_definition(name, *kind)));
            local
        };

        candidates.retain(|d| self.matches_prefix(&d.name, &prefix.name));
        if self.flag("no_completion_duplicates") {
            let mut seen = HashSet::new();
            candidates.retain(|d| seen.insert(d.name.clone()));
        }
        candidates.sort_by_cached_key(|d| completion_order(&d.name));

        Ok(candidates.into_iter().map(completion_from).collect())
    }

    fn goto_definitions(&mut self, query: &ScriptQuery) -> Result<Vec<Definition>, EngineError> {
        self.goto(query, true, true)
    }

    fn goto_assignments(&mut self, query: &ScriptQuery, follow_imports: bool) -> Result<Vec<Definition>, EngineError> {
        self.goto(query, false, follow_imports)
    }

    fn usages(&mut self, query: &ScriptQuery) -> Result<Vec<Definition>, EngineError> {
        let analysis = self.analyse(&query.source, query.source_path.as_deref());
        self.check_position(&analysis, query)?;
        let Some(word) = analysis.word_at(query.line, query.column) else {
            return Ok(Vec::new());
        };
        let bindings = self.resolve(&analysis, query, &word);
        let Some(binding) = bindings.first() else {
            return Ok(Vec::new());
        };
        let module_path = query.source_path.as_deref();

        let usages = analysis
            .tokens()
            .iter()
            .filter(|t| t.name == word.name && t.attribute == word.attribute)
            .map(|t| Definition {
                line: Some(t.line),
                column: Some(t.column),
                description: analysis.scanned.raw[t.line - 1].trim().to_string(),
                ..local_definition(binding, module_path)
            })
            .collect();
        Ok(usages)
    }

    fn names(&mut self, query: &NamesQuery) -> Result<Vec<Definition>, EngineError> {
        let analysis = self.analyse(&query.source, query.path.as_deref());
        let module_path = query.path.as_deref();
        let mut names = Vec::new();

        if query.definitions {
            names.extend(
                analysis
                    .bindings
                    .iter()
                    .filter(|b| query.all_scopes || b.block == 0)
                    .map(|b| local_definition(b, module_path)),
            );
        }

        if query.references {
            for token in analysis.tokens() {
                if token.attribute || analysis.is_binding_site(token) {
                    continue;
                }
                let block = analysis.block_at(token.line);
                if !query.all_scopes && block != 0 {
                    continue;
                }
                let definition = match analysis.lookup(&token.name, token.line, block) {
                    Some(binding) => local_definition(binding, module_path),
                    None => Definition {
                        module_path: module_path.map(str::to_string),
                        name: token.name.clone(),
                        kind: Kind::Statement.as_str().to_string(),
                        in_builtin_module: false,
                        line: None,
                        column: None,
                        docstring: String::new(),
                        description: String::new(),
                        full_name: None,
                        is_keyword: false,
                    },
                };
                names.push(Definition {
                    line: Some(token.line),
                    column: Some(token.column),
                    description: analysis.scanned.raw[token.line - 1].trim().to_string(),
                    ..definition
                });
            }
        }

        names.sort_by_key(|d| (d.line, d.column));
        Ok(names)
    }

    fn preload_modules(&mut self, modules: &[String]) -> Result<(), EngineError> {
        if let Some(bad) = modules.iter().find(|m| !MODULE_NAME.is_match(m)) {
            return Err(EngineError::InvalidModuleName(bad.clone()));
        }
        self.preloaded.extend(modules.iter().cloned());
        tracing::debug!(modules = modules.len(), "Preloaded modules");
        Ok(())
    }
}
