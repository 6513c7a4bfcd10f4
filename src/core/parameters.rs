//! Statement parameters
//!
//! A [`Parameters`] map binds placeholder names to values. Names are stored
//! without their sigil, so `@id`, `:id`, `$id` and `id` all address the same
//! parameter, which lets one map serve drivers with different placeholder
//! syntaxes.

use super::value::DatabaseValue;
use std::collections::HashMap;

/// Prefix used by [`build_parameter_map`] for generated names
pub const GENERATED_PARAMETER_PREFIX: &str = "param";

/// Ordered placeholder name -> value bindings for one statement execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    entries: Vec<(String, DatabaseValue)>,
}

impl Parameters {
    /// Create an empty parameter map
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing an existing binding in place
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<DatabaseValue>) {
        let key = normalize_name(name.as_ref());
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<DatabaseValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Value bound to `name`, with or without its sigil
    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        let key = normalize_name(name);
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Whether `name` is bound
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no bindings
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings in insertion order; names are returned without sigil
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values for `names`, in that order
    ///
    /// Fails with the first name that has no binding.
    pub fn resolve<'a, I>(&self, names: I) -> Result<Vec<DatabaseValue>, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| self.get(name).cloned().ok_or_else(|| name.to_string()))
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: AsRef<str>,
    V: Into<DatabaseValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl From<HashMap<String, String>> for Parameters {
    fn from(map: HashMap<String, String>) -> Self {
        let mut entries: Vec<_> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().collect()
    }
}

impl<K: AsRef<str>, V: Into<DatabaseValue>, const N: usize> From<[(K, V); N]> for Parameters {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Strip a leading `@`, `:` or `$` sigil
pub fn normalize_name(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix(&['@', ':', '$'][..]).unwrap_or(name).trim()
}

/// Build a map naming `values` `@param1`, `@param2`, ... in order
pub fn build_parameter_map<I, V>(values: I) -> Parameters
where
    I: IntoIterator<Item = V>,
    V: Into<DatabaseValue>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (format!("@{}{}", GENERATED_PARAMETER_PREFIX, i + 1), v))
        .collect()
}

/// A statement whose `@name` placeholders were replaced by `$1..$n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalStatement {
    /// Rewritten statement text
    pub sql: String,
    /// Parameter names; `names[i]` binds to `$i+1`
    pub names: Vec<String>,
}

/// Rewrite `@name` placeholders into positional `$n` ones
///
/// Each distinct name gets one position, repeated uses share it. String
/// literals, quoted identifiers, comments and dollar-quoted bodies are copied
/// untouched, as is any `@` not followed by an identifier (operators such as
/// `@>`).
pub fn rewrite_named_placeholders(sql: &str) -> PositionalStatement {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = find_sequence(&chars, i + 2, &['*', '/']).map_or(chars.len(), |p| p + 2);
                out.extend(&chars[i..end]);
                i = end;
            }
            '$' => match dollar_tag(&chars, i) {
                Some(tag_end) => {
                    let tag = &chars[i..tag_end];
                    let end = find_sequence(&chars, tag_end, tag).map_or(chars.len(), |p| p + tag.len());
                    out.extend(&chars[i..end]);
                    i = end;
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
            '@' if chars.get(i + 1).is_some_and(|ch| is_ident_start(*ch)) => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|ch| !is_ident_char(*ch))
                    .map_or(chars.len(), |p| start + p);
                let name: String = chars[start..end].iter().collect();
                let position = match names.iter().position(|n| *n == name) {
                    Some(p) => p + 1,
                    None => {
                        names.push(name);
                        names.len()
                    }
                };
                out.push('$');
                out.push_str(&position.to_string());
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    PositionalStatement { sql: out, names }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// End (exclusive) of the quoted run starting at `start`; doubled quotes escape
fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// End (exclusive) of a `$tag$` opener at `start`, if there is one
fn dollar_tag(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while let Some(&c) = chars.get(i) {
        if c == '$' {
            return Some(i + 1);
        }
        if !is_ident_char(c) {
            return None;
        }
        i += 1;
    }
    None
}

fn find_sequence(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if needle.is_empty() || from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| from + p)
}
