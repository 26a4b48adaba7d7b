//! Best-effort scanner for query/mutation documents.
//!
//! Both the admission gateway and the document executor read request bodies
//! through this module: the gateway wants the de-duplicated set of top-level
//! field names (alias-resolved), the executor additionally wants each
//! invocation's argument literals.
//!
//! The scanner is deliberately not a full query-language parser. It
//! understands exactly as much syntax as it needs to find depth-1 field
//! invocations — aliases, argument lists, nested selection sets, fragment
//! spreads, directives, comments, block strings are skipped over — and it
//! fails OPEN: any text it cannot make sense of yields the fields collected
//! so far (possibly none), never an error. A request the gateway cannot
//! parse is a request it does not gate.

use serde_json::Value;
use std::collections::HashSet;

/// Operation class of a document, from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Read-class operation (also the default when no keyword is present).
    Query,
    /// Write-class operation.
    Mutation,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Mutation => write!(f, "mutation"),
        }
    }
}

/// An argument literal as written in the document.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// `$name` — resolved against the request's variables map.
    Variable(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// `null`.
    Null,
    /// Bare-word enum value.
    Enum(String),
    /// List literal.
    List(Vec<ArgValue>),
    /// Object literal.
    Object(Vec<(String, ArgValue)>),
}

/// One top-level field invocation.
#[derive(Debug, Clone)]
pub struct FieldInvocation {
    /// The alias, when the caller wrote `alias: field`.
    pub alias: Option<String>,
    /// The underlying field name (the rate key and dispatch key).
    pub name: String,
    /// Argument literals, in document order.
    pub args: Vec<(String, ArgValue)>,
}

impl FieldInvocation {
    /// The key this field's result is returned under: the alias when
    /// present, else the field name.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A scanned document: operation class plus the top-level invocations.
#[derive(Debug, Clone)]
pub struct Document {
    /// Query-class or mutation-class.
    pub kind: OperationKind,
    /// Depth-1 field invocations, in document order, duplicates kept
    /// (two aliases of one field are two invocations).
    pub fields: Vec<FieldInvocation>,
}

impl Document {
    /// Ordered, de-duplicated field names — the gateway's rate keys.
    #[must_use]
    pub fn unique_field_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// Scan a document. Never fails; see the module docs for the fail-open
/// contract.
#[must_use]
pub fn parse_document(text: &str) -> Document {
    let kind = operation_kind(text);
    let mut fields = Vec::new();

    let Some(open) = text.find('{') else {
        return Document { kind, fields };
    };

    let mut scanner = Scanner::new(&text[open + 1..]);
    loop {
        scanner.skip_trivia();
        match scanner.peek() {
            None | Some('}') => break,
            Some('.') => {
                // Fragment spread or inline fragment; not a field of its own.
                if !scanner.skip_fragment() {
                    break;
                }
            }
            Some(c) if is_name_start(c) => {
                let Some(invocation) = scanner.parse_field() else {
                    break;
                };
                fields.push(invocation);
            }
            Some(_) => break,
        }
    }

    Document { kind, fields }
}

/// Operation class from the leading keyword; query when absent.
fn operation_kind(text: &str) -> OperationKind {
    let head_end = text.find('{').unwrap_or(text.len());
    let head = text[..head_end].trim_start().to_ascii_lowercase();
    if head.starts_with("mutation") {
        OperationKind::Mutation
    } else {
        OperationKind::Query
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Skip whitespace, commas (separators), and `#` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn read_name(&mut self) -> Option<String> {
        let first = self.peek()?;
        if !is_name_start(first) {
            return None;
        }
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_name_continue(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Some(name)
    }

    /// Parse one depth-1 field: `[alias:] name [(args)] [@dir...] [{...}]`.
    fn parse_field(&mut self) -> Option<FieldInvocation> {
        let first = self.read_name()?;

        self.skip_trivia();
        let (alias, name) = if self.peek() == Some(':') {
            self.bump();
            self.skip_trivia();
            let real = self.read_name()?;
            (Some(first), real)
        } else {
            (None, first)
        };

        self.skip_trivia();
        let args = if self.peek() == Some('(') {
            self.parse_args()?
        } else {
            Vec::new()
        };

        self.skip_trivia();
        while self.peek() == Some('@') {
            self.skip_directive()?;
            self.skip_trivia();
        }

        if self.peek() == Some('{') {
            // Nested names are not separately rate-limited or dispatched.
            self.skip_selection_set()?;
        }

        Some(FieldInvocation { alias, name, args })
    }

    fn parse_args(&mut self) -> Option<Vec<(String, ArgValue)>> {
        debug_assert_eq!(self.peek(), Some('('));
        self.bump();
        let mut args = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    return Some(args);
                }
                Some(c) if is_name_start(c) => {
                    let key = self.read_name()?;
                    self.skip_trivia();
                    if self.bump() != Some(':') {
                        return None;
                    }
                    self.skip_trivia();
                    let value = self.parse_value()?;
                    args.push((key, value));
                }
                _ => return None,
            }
        }
    }

    fn parse_value(&mut self) -> Option<ArgValue> {
        match self.peek()? {
            '$' => {
                self.bump();
                Some(ArgValue::Variable(self.read_name()?))
            }
            '"' => Some(ArgValue::Str(self.parse_string()?)),
            '[' => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    if self.peek() == Some(']') {
                        self.bump();
                        return Some(ArgValue::List(items));
                    }
                    items.push(self.parse_value()?);
                }
            }
            '{' => {
                self.bump();
                let mut entries = Vec::new();
                loop {
                    self.skip_trivia();
                    if self.peek() == Some('}') {
                        self.bump();
                        return Some(ArgValue::Object(entries));
                    }
                    let key = self.read_name()?;
                    self.skip_trivia();
                    if self.bump() != Some(':') {
                        return None;
                    }
                    self.skip_trivia();
                    let value = self.parse_value()?;
                    entries.push((key, value));
                }
            }
            c if c == '-' || c.is_ascii_digit() => self.parse_number(),
            c if is_name_start(c) => {
                let word = self.read_name()?;
                Some(match word.as_str() {
                    "true" => ArgValue::Bool(true),
                    "false" => ArgValue::Bool(false),
                    "null" => ArgValue::Null,
                    _ => ArgValue::Enum(word),
                })
            }
            _ => None,
        }
    }

    fn parse_number(&mut self) -> Option<ArgValue> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
                // Exponent signs only follow e/E, but the loose grammar is
                // fine here: a malformed number fails the final parse.
                if c == '+' || c == '-' {
                    if !matches!(text.chars().last(), Some('e' | 'E')) {
                        break;
                    }
                } else {
                    is_float = true;
                }
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if is_float {
            text.parse().ok().map(ArgValue::Float)
        } else {
            text.parse().ok().map(ArgValue::Int)
        }
    }

    /// Parse a quoted string, starting at the opening `"`.
    fn parse_string(&mut self) -> Option<String> {
        debug_assert_eq!(self.peek(), Some('"'));
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump()? {
                '"' => return Some(out),
                '\\' => match self.bump()? {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000C}'),
                    'u' => {
                        let mut code = String::new();
                        for _ in 0..4 {
                            code.push(self.bump()?);
                        }
                        let n = u32::from_str_radix(&code, 16).ok()?;
                        out.push(char::from_u32(n)?);
                    }
                    _ => return None,
                },
                c => out.push(c),
            }
        }
    }

    /// Skip a braced selection set, starting at `{`, honoring nesting,
    /// strings, and comments.
    fn skip_selection_set(&mut self) -> Option<()> {
        debug_assert_eq!(self.peek(), Some('{'));
        let mut depth = 0usize;
        loop {
            match self.peek()? {
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return Some(());
                    }
                }
                '"' => {
                    self.parse_string()?;
                }
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip `...fragmentName` or `... on Type { ... }`.
    fn skip_fragment(&mut self) -> bool {
        while self.peek() == Some('.') {
            self.bump();
        }
        self.skip_trivia();
        let Some(name) = self.read_name() else {
            return false;
        };
        if name == "on" {
            self.skip_trivia();
            if self.read_name().is_none() {
                return false;
            }
        }
        self.skip_trivia();
        if self.peek() == Some('{') {
            return self.skip_selection_set().is_some();
        }
        true
    }

    /// Skip `@name` with an optional argument list.
    fn skip_directive(&mut self) -> Option<()> {
        debug_assert_eq!(self.peek(), Some('@'));
        self.bump();
        self.read_name()?;
        self.skip_trivia();
        if self.peek() == Some('(') {
            self.parse_args()?;
        }
        Some(())
    }
}

/// Resolve an argument literal into a JSON value, looking `$variables` up
/// in the request's variables map.
///
/// # Errors
///
/// Returns a message when a referenced variable is missing.
pub fn resolve_value(
    value: &ArgValue,
    variables: &serde_json::Map<String, Value>,
) -> Result<Value, String> {
    match value {
        ArgValue::Variable(name) => variables
            .get(name)
            .cloned()
            .ok_or_else(|| format!("variable ${name} is not provided")),
        ArgValue::Int(n) => Ok(Value::from(*n)),
        ArgValue::Float(f) => Ok(Value::from(*f)),
        ArgValue::Str(s) | ArgValue::Enum(s) => Ok(Value::from(s.clone())),
        ArgValue::Bool(b) => Ok(Value::from(*b)),
        ArgValue::Null => Ok(Value::Null),
        ArgValue::List(items) => items
            .iter()
            .map(|item| resolve_value(item, variables))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ArgValue::Object(entries) => {
            let mut map = serde_json::Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), resolve_value(item, variables)?);
            }
            Ok(Value::Object(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<String> {
        parse_document(text)
            .unique_field_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn alias_resolves_to_field_and_nesting_is_excluded() {
        let doc = parse_document("mutation{ a(x:1){y} b:c }");
        assert_eq!(doc.kind, OperationKind::Mutation);
        assert_eq!(doc.unique_field_names(), vec!["a", "c"]);
        assert_eq!(doc.fields[1].alias.as_deref(), Some("b"));
        assert_eq!(doc.fields[1].response_key(), "b");
    }

    #[test]
    fn defaults_to_query_without_keyword() {
        let doc = parse_document("{ getUser(id:\"u1\") { id coins } }");
        assert_eq!(doc.kind, OperationKind::Query);
        assert_eq!(doc.unique_field_names(), vec!["getUser"]);
    }

    #[test]
    fn named_operation_with_variable_definitions() {
        let doc = parse_document(
            "mutation Recharge($id: ID!, $amt: Int!) {\n  rechargeCoins(id: $id, amount: $amt) { id coins }\n}",
        );
        assert_eq!(doc.kind, OperationKind::Mutation);
        assert_eq!(doc.unique_field_names(), vec!["rechargeCoins"]);
        let args = &doc.fields[0].args;
        assert_eq!(args[0], ("id".into(), ArgValue::Variable("id".into())));
        assert_eq!(args[1], ("amount".into(), ArgValue::Variable("amt".into())));
    }

    #[test]
    fn argument_contents_never_leak_into_field_names() {
        // Strings, nested objects, and lists inside arguments stay there.
        assert_eq!(
            names("query{ search(filter:{min:1, tags:[\"a b\", \"}\"]}, q:\"x{y}\") other }"),
            vec!["search", "other"]
        );
    }

    #[test]
    fn duplicate_fields_dedupe_for_rate_keys_but_not_for_execution() {
        let doc = parse_document("{ a: getUser(id:\"u1\") b: getUser(id:\"u2\") }");
        assert_eq!(doc.unique_field_names(), vec!["getUser"]);
        assert_eq!(doc.fields.len(), 2);
        assert_eq!(doc.fields[0].response_key(), "a");
        assert_eq!(doc.fields[1].response_key(), "b");
    }

    #[test]
    fn whitespace_commas_and_comments_are_trivia() {
        assert_eq!(
            names("query {\n  # leading comment\n  one,, two\t\n three # trailing\n}"),
            vec!["one", "two", "three"]
        );
    }

    #[test]
    fn fragments_and_directives_are_skipped() {
        assert_eq!(
            names("{ ...accountFields real @include(if: $yes) ... on Thing { hidden } last }"),
            vec!["real", "last"]
        );
    }

    #[test]
    fn malformed_documents_fail_open() {
        assert_eq!(names(""), Vec::<String>::new());
        assert_eq!(names("not a document at all"), Vec::<String>::new());
        assert_eq!(names("query {"), Vec::<String>::new());
        // Valid prefix is kept, garbage after it is dropped.
        assert_eq!(names("{ good ???bad }"), vec!["good"]);
        assert_eq!(names("{ good broken( }"), vec!["good"]);
    }

    #[test]
    fn literal_values_parse() {
        let doc = parse_document(
            "{ op(i: 3, f: -1.5, s: \"hi\\n\", b: true, n: null, e: ASC, l: [1, 2], o: {k: \"v\"}) }",
        );
        let args = &doc.fields[0].args;
        assert_eq!(args[0].1, ArgValue::Int(3));
        assert_eq!(args[1].1, ArgValue::Float(-1.5));
        assert_eq!(args[2].1, ArgValue::Str("hi\n".into()));
        assert_eq!(args[3].1, ArgValue::Bool(true));
        assert_eq!(args[4].1, ArgValue::Null);
        assert_eq!(args[5].1, ArgValue::Enum("ASC".into()));
        assert_eq!(
            args[6].1,
            ArgValue::List(vec![ArgValue::Int(1), ArgValue::Int(2)])
        );
        assert_eq!(
            args[7].1,
            ArgValue::Object(vec![("k".into(), ArgValue::Str("v".into()))])
        );
    }

    #[test]
    fn resolve_value_substitutes_variables() {
        let mut variables = serde_json::Map::new();
        variables.insert("id".into(), Value::from("u1"));

        let resolved =
            resolve_value(&ArgValue::Variable("id".into()), &variables).unwrap();
        assert_eq!(resolved, Value::from("u1"));

        let err = resolve_value(&ArgValue::Variable("nope".into()), &variables).unwrap_err();
        assert!(err.contains("$nope"));

        let list = ArgValue::List(vec![ArgValue::Variable("id".into()), ArgValue::Int(2)]);
        assert_eq!(
            resolve_value(&list, &variables).unwrap(),
            serde_json::json!(["u1", 2])
        );
    }
}
