//! `CREATE TABLE` parser.
//!
//! Covers the pragmatic subset of Postgres and MySQL DDL that table
//! configurations are written in: one statement, column definitions with
//! inline constraints, and table-level constraint lines (which are skipped,
//! except that a table-level `PRIMARY KEY (..)` marks its columns).

use super::builder::finish;
use super::column::{Column, SqlType, TableSchema};
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

const CONSTRAINT_PREFIXES: &[&str] = &["PRIMARY", "FOREIGN", "UNIQUE", "CHECK", "CONSTRAINT"];

/// MySQL / Postgres index lines. These words are also legal column names, so
/// they only start a constraint when a parenthesized column list follows.
const INDEX_PREFIXES: &[&str] = &["KEY", "INDEX", "FULLTEXT", "SPATIAL", "EXCLUDE"];

/// Keywords that terminate a `DEFAULT <expr>` clause.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "NOT",
    "NULL",
    "PRIMARY",
    "UNIQUE",
    "CHECK",
    "REFERENCES",
    "CONSTRAINT",
    "COMMENT",
    "AUTO_INCREMENT",
    "GENERATED",
    "COLLATE",
    "ON",
];

fn table_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)CREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([^\s(]+)\s*\(",
        )
        .expect("static regex")
    })
}

/// Extra facts carried by a type token besides the type itself.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct TypeMods {
    pub auto_increment: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// Parses one `CREATE TABLE` statement into a schema.
pub fn parse_create_table(sql: &str) -> Result<TableSchema> {
    let caps = table_name_re()
        .captures(sql)
        .ok_or_else(|| Error::parse("expected CREATE TABLE <name> ( ... )"))?;
    let raw_name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let table_name = unquote(raw_name);

    let open = caps.get(0).map(|m| m.end() - 1).unwrap_or_default();
    let close = matching_paren(sql, open)
        .ok_or_else(|| Error::parse(format!("unbalanced parentheses in table '{}'", table_name)))?;
    let body = &sql[open + 1..close];

    let mut columns: Vec<Column> = Vec::new();
    let mut table_pk: Vec<String> = Vec::new();

    for def in split_top_level(body, ',') {
        let def = def.trim();
        if def.is_empty() {
            continue;
        }
        if is_constraint_line(def) {
            if let Some(cols) = table_primary_key(def) {
                table_pk.extend(cols);
            }
            continue;
        }
        columns.push(parse_column(def)?);
    }

    for pk in &table_pk {
        let col = columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(pk))
            .ok_or_else(|| {
                Error::parse(format!("PRIMARY KEY references unknown column '{}'", pk))
            })?;
        col.primary_key = true;
        col.not_null = true;
    }

    finish(table_name, columns)
}

fn parse_column(def: &str) -> Result<Column> {
    let tokens = split_tokens(def);
    if tokens.len() < 2 {
        return Err(Error::parse(format!("column definition '{}' has no type", def)));
    }
    let name = unquote(&tokens[0]);

    // Collect the (possibly multi-word) type.
    let (mut base, mut params, mut array) = split_type_token(&tokens[1]);
    let mut idx = 2;
    while idx < tokens.len() {
        let next = tokens[idx].to_lowercase();
        if next.starts_with('(') && params.is_none() {
            let (p, arr) = strip_array_suffix(&next);
            params = Some(p.trim_start_matches('(').trim_end_matches(')').to_string());
            array |= arr;
            idx += 1;
        } else if base == "double" && next == "precision" {
            base = "double precision".into();
            idx += 1;
        } else if base == "character" && next.starts_with("varying") {
            let (_, p, arr) = split_type_token(&next);
            base = "character varying".into();
            params = params.or(p);
            array |= arr;
            idx += 1;
        } else if (base == "timestamp" || base == "time")
            && (next == "with" || next == "without")
            && tokens.get(idx + 1).map(|t| t.eq_ignore_ascii_case("time")) == Some(true)
            && tokens
                .get(idx + 2)
                .map(|t| t.to_lowercase().starts_with("zone"))
                == Some(true)
        {
            base = format!("{} {} time zone", base, next);
            array |= tokens[idx + 2].ends_with("[]");
            idx += 3;
        } else if next == "unsigned" || next == "zerofill" || next == "array" {
            array |= next == "array";
            idx += 1;
        } else if next == "[]" {
            array = true;
            idx += 1;
        } else {
            break;
        }
    }

    let (sql_type, mods) = resolve_type(&base, params.as_deref()).map_err(|reason| {
        if reason.is_empty() {
            Error::UnsupportedType {
                column: name.clone(),
                type_name: base.clone(),
            }
        } else {
            Error::parse(format!("column '{}': {}", name, reason))
        }
    })?;

    let sql_type = if array {
        SqlType::Array(Box::new(sql_type))
    } else {
        sql_type
    };
    let mut column = Column::new(name, sql_type);
    column.length = mods.length;
    column.precision = mods.precision;
    column.scale = mods.scale;
    column.auto_increment = mods.auto_increment;

    apply_constraints(&mut column, &tokens[idx..]);
    Ok(column)
}

/// Reads inline constraints from the tokens following the type.
fn apply_constraints(column: &mut Column, tail: &[String]) {
    // keywords only; quoted literals cannot trigger a match
    let words: Vec<String> = tail
        .iter()
        .map(|t| {
            if t.starts_with('\'') {
                String::new()
            } else {
                t.to_uppercase()
            }
        })
        .collect();
    let has_pair = |a: &str, b: &str| words.windows(2).any(|w| w[0] == a && w[1] == b);

    if has_pair("NOT", "NULL") {
        column.not_null = true;
    }
    if has_pair("PRIMARY", "KEY") {
        column.primary_key = true;
        column.not_null = true;
    }
    if words.iter().any(|w| w == "UNIQUE") {
        column.unique = true;
    }
    if words
        .iter()
        .any(|w| w == "AUTO_INCREMENT" || w == "AUTOINCREMENT" || w == "IDENTITY")
    {
        column.auto_increment = true;
    }

    if let Some(pos) = words.iter().position(|w| w == "DEFAULT") {
        let mut expr: Vec<&str> = Vec::new();
        for (i, tok) in tail.iter().enumerate().skip(pos + 1) {
            // the first token is always part of the expression (`DEFAULT NULL`)
            if i > pos + 1 && DEFAULT_STOP_WORDS.contains(&words[i].as_str()) {
                break;
            }
            expr.push(tok.as_str());
        }
        if !expr.is_empty() {
            column.default_value = Some(expr.join(" "));
        }
    }

    if let Some(pos) = words.iter().position(|w| w == "COMMENT") {
        if let Some(text) = tail.get(pos + 1) {
            column.comment = Some(unquote_literal(text));
        }
    }
}

/// Maps a lower-case base type (and its parenthesized parameters) to a `SqlType`.
///
/// An empty error string means the type itself is unknown.
pub(crate) fn resolve_type(
    base: &str,
    params: Option<&str>,
) -> std::result::Result<(SqlType, TypeMods), String> {
    let base = base.trim().to_lowercase();
    let nums = parse_params(params)?;
    let mut mods = TypeMods::default();

    let sql_type = match base.as_str() {
        "tinyint" if nums.first() == Some(&1) => SqlType::Boolean,
        "smallint" | "int2" | "tinyint" => SqlType::SmallInt,
        "integer" | "int" | "int4" | "mediumint" => SqlType::Integer,
        "bigint" | "int8" => SqlType::BigInt,
        "smallserial" | "serial2" => {
            mods.auto_increment = true;
            SqlType::SmallInt
        }
        "serial" | "serial4" => {
            mods.auto_increment = true;
            SqlType::Integer
        }
        "bigserial" | "serial8" => {
            mods.auto_increment = true;
            SqlType::BigInt
        }
        "numeric" | "decimal" => {
            mods.precision = nums.first().copied();
            mods.scale = nums.get(1).copied().or(mods.precision.map(|_| 0));
            SqlType::Numeric
        }
        "real" | "float4" | "float" => SqlType::Real,
        "double precision" | "float8" | "double" => SqlType::Double,
        "text" | "tinytext" | "mediumtext" | "longtext" => SqlType::Text,
        "varchar" | "character varying" | "nvarchar" => {
            mods.length = nums.first().copied();
            SqlType::Varchar
        }
        "char" | "character" | "nchar" | "bpchar" => {
            mods.length = Some(nums.first().copied().unwrap_or(1));
            SqlType::Char
        }
        "bytea" | "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
            SqlType::Bytea
        }
        "boolean" | "bool" => SqlType::Boolean,
        "date" => SqlType::Date,
        "time" | "time without time zone" | "time with time zone" | "timetz" => SqlType::Time,
        "timestamp" | "timestamp without time zone" | "datetime" => SqlType::Timestamp,
        "timestamptz" | "timestamp with time zone" => SqlType::TimestampTz,
        "interval" => SqlType::Interval,
        "json" => SqlType::Json,
        "jsonb" => SqlType::Jsonb,
        "uuid" => SqlType::Uuid,
        _ => return Err(String::new()),
    };
    Ok((sql_type, mods))
}

fn parse_params(params: Option<&str>) -> std::result::Result<Vec<u32>, String> {
    let Some(params) = params else {
        return Ok(Vec::new());
    };
    params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u32>()
                .map_err(|_| format!("invalid type parameter '{}'", p))
        })
        .collect()
}

/// `varchar(50)[]` -> (`varchar`, Some(`50`), true)
fn split_type_token(token: &str) -> (String, Option<String>, bool) {
    let lower = token.to_lowercase();
    let (lower, array) = strip_array_suffix(&lower);
    match lower.find('(') {
        Some(i) => {
            let base = lower[..i].trim().to_string();
            let inner = lower[i + 1..].trim_end_matches(')').to_string();
            (base, Some(inner), array)
        }
        None => (lower.to_string(), None, array),
    }
}

fn strip_array_suffix(s: &str) -> (&str, bool) {
    let mut out = s;
    let mut array = false;
    while let Some(rest) = out.strip_suffix("[]") {
        out = rest;
        array = true;
    }
    (out, array)
}

fn is_constraint_line(def: &str) -> bool {
    if def.starts_with('"') || def.starts_with('`') {
        return false;
    }
    let first = def
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_uppercase();
    let is_index = INDEX_PREFIXES.contains(&first.as_str());
    if !is_index && !CONSTRAINT_PREFIXES.contains(&first.as_str()) {
        return false;
    }

    let tokens = split_tokens(def);
    // `key varchar(50)`: a column whose name happens to be a keyword
    if let Some(second) = tokens.get(1).filter(|t| !t.starts_with('(')) {
        let (base, params, _) = split_type_token(second);
        if resolve_type(&base, params.as_deref()).is_ok() {
            return false;
        }
    }
    if is_index {
        // KEY (a) | KEY idx (a) | FULLTEXT KEY idx (a) | EXCLUDE USING gist (...)
        return tokens.iter().take(4).any(|t| t.contains('('));
    }
    true
}

/// Column names of a table-level `PRIMARY KEY (a, b)` line, if this is one.
fn table_primary_key(def: &str) -> Option<Vec<String>> {
    let upper = def.to_uppercase();
    let at = upper.find("PRIMARY KEY")?;
    let open = at + def[at..].find('(')?;
    let close = matching_paren(def, open)?;
    Some(
        split_top_level(&def[open + 1..close], ',')
            .into_iter()
            .map(|c| unquote(c.trim()))
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

/// Index of the `)` balancing the `(` at `open`, skipping quoted text.
fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Splits on `sep` at paren depth zero, outside quotes.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                _ if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Whitespace tokenizer that keeps parenthesized groups and quoted text whole.
fn split_tokens(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in s.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                c if c.is_whitespace() && depth == 0 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Strips identifier quoting (`"x"`, `` `x` ``, `[x]`), including per schema part.
fn unquote(ident: &str) -> String {
    ident
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}

fn unquote_literal(text: &str) -> String {
    let t = text.trim();
    t.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| t.to_string())
}
