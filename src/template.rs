//! SQL templates with parameterized and raw substitution points.
//!
//! Two reference forms share one grammar and differ only in their opener:
//! `#{dotted.path}` renders as a driver placeholder with the resolved value
//! appended to the parameter list, while `!{dotted.path}` splices the
//! resolved value's literal string form directly into the SQL text.
//!
//! The raw form performs no escaping. It exists for identifiers (table and
//! column names) that standard SQL cannot parameterize; callers are
//! responsible for restricting which values reach it.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;

use crate::args::BindEnv;
use crate::error::SqlBinderError;
use crate::types::SqlValue;

/// Placeholder style of the target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `PostgreSQL`-style placeholders like `$1`.
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite`-style placeholders like `?1`.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl PlaceholderStyle {
    fn push(self, sql: &mut String, ordinal: usize) {
        match self {
            #[cfg(feature = "postgres")]
            PlaceholderStyle::Postgres => {
                let _ = write!(sql, "${ordinal}");
            }
            #[cfg(feature = "sqlite")]
            PlaceholderStyle::Sqlite => {
                let _ = write!(sql, "?{ordinal}");
            }
        }
    }
}

/// A dotted reference path, e.g. `model.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgPath {
    segments: Vec<String>,
}

impl ArgPath {
    /// The first segment, which must name a declared statement parameter.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ArgPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    Param(ArgPath),
    Raw(ArgPath),
}

/// Immutable parsed form of a SQL template string.
///
/// Parsing happens once at binding construction; rendering against a
/// [`BindEnv`] is deterministic and allocation-light.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a SQL template.
    ///
    /// Lone `#`, `!`, `{`, and `}` characters are plain SQL text; only the
    /// two-character openers `#{` and `!{` start a reference.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::TemplateSyntax`] on an unterminated
    /// reference, an empty path segment, or a character other than
    /// `[A-Za-z0-9_.]` inside a reference.
    pub fn parse(sql: &str) -> Result<Self, SqlBinderError> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut text = String::new();
        let mut chars = sql.char_indices().peekable();

        while let Some((start, ch)) = chars.next() {
            let is_opener =
                (ch == '#' || ch == '!') && matches!(chars.peek(), Some((_, '{')));
            if !is_opener {
                text.push(ch);
                continue;
            }
            chars.next(); // consume '{'

            let mut body = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                body.push(c);
            }
            let reference = || format!("{}{{{body}", ch);
            if !closed {
                return Err(SqlBinderError::TemplateSyntax(format!(
                    "unterminated reference '{}' at offset {start}",
                    reference()
                )));
            }
            let path = parse_path(&body).map_err(|detail| {
                SqlBinderError::TemplateSyntax(format!(
                    "invalid reference '{}}}' at offset {start}: {detail}",
                    reference()
                ))
            })?;

            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(if ch == '!' {
                Segment::Raw(path)
            } else {
                Segment::Param(path)
            });
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self {
            source: sql.to_string(),
            segments,
        })
    }

    /// The raw template string this was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Referenced paths, in source order, raw and parameterized alike.
    pub fn paths(&self) -> impl Iterator<Item = &ArgPath> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Param(p) | Segment::Raw(p) => Some(p),
            Segment::Text(_) => None,
        })
    }

    /// Render to executable SQL plus its positional parameters.
    ///
    /// Raw references are substituted in source order while the SQL text is
    /// being assembled, so raw text is final before the statement is handed
    /// to a driver; parameterized references become numbered placeholders
    /// and never appear as literal text. Resolved values are cached per path
    /// within one render.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::UnresolvedReference`] naming the first path
    /// that cannot be resolved against `env`.
    pub fn render(
        &self,
        style: PlaceholderStyle,
        env: &BindEnv<'_>,
    ) -> Result<(String, Vec<SqlValue>), SqlBinderError> {
        let mut sql = String::with_capacity(self.source.len());
        let mut params: Vec<SqlValue> = Vec::new();
        let mut cache: HashMap<&ArgPath, SqlValue> = HashMap::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(t) => sql.push_str(t),
                Segment::Param(path) => {
                    let value = resolve_cached(&mut cache, path, env)?;
                    params.push(value);
                    style.push(&mut sql, params.len());
                }
                Segment::Raw(path) => {
                    let value = resolve_cached(&mut cache, path, env)?;
                    let _ = write!(sql, "{value}");
                }
            }
        }
        Ok((sql, params))
    }
}

fn resolve_cached<'t>(
    cache: &mut HashMap<&'t ArgPath, SqlValue>,
    path: &'t ArgPath,
    env: &BindEnv<'_>,
) -> Result<SqlValue, SqlBinderError> {
    if let Some(hit) = cache.get(path) {
        return Ok(hit.clone());
    }
    let value = env.resolve(path.segments())?;
    cache.insert(path, value.clone());
    Ok(value)
}

fn parse_path(body: &str) -> Result<ArgPath, String> {
    if body.is_empty() {
        return Err("empty reference".to_string());
    }
    let mut segments = Vec::new();
    for segment in body.split('.') {
        if segment.is_empty() {
            return Err("empty path segment".to_string());
        }
        let mut cs = segment.chars();
        let first = cs.next().ok_or_else(|| "empty path segment".to_string())?;
        if !first.is_ascii_alphabetic() {
            return Err(format!("segment '{segment}' must start with a letter"));
        }
        if let Some(bad) = cs.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
            return Err(format!("unsupported character '{bad}' in segment '{segment}'"));
        }
        segments.push(segment.to_string());
    }
    Ok(ArgPath { segments })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[cfg(feature = "sqlite")]
    const STYLE: PlaceholderStyle = PlaceholderStyle::Sqlite;
    #[cfg(all(feature = "postgres", not(feature = "sqlite")))]
    const STYLE: PlaceholderStyle = PlaceholderStyle::Postgres;

    fn render(sql: &str, env: &BindEnv<'_>) -> (String, Vec<SqlValue>) {
        Template::parse(sql)
            .expect("template should parse")
            .render(STYLE, env)
            .expect("template should render")
    }

    #[test]
    fn parameterized_references_become_placeholders() {
        let a = 1i64;
        let b = "test";
        let c = 2.0f64;
        let env = BindEnv::new().arg("a", &a).arg("b", &b).arg("c", &c);
        let (sql, params) = render("  #{a} #{b} #{c}  ", &env);
        assert_eq!(sql, "  ?1 ?2 ?3  ");
        assert_eq!(
            params,
            vec![SqlValue::Int(1), SqlValue::Text("test".into()), SqlValue::Float(2.0)]
        );
    }

    #[test]
    fn raw_references_substitute_literal_text() {
        let tbl = "users";
        let env = BindEnv::new().arg("tbl", &tbl);
        let (sql, params) = render("SELECT * FROM !{tbl}", &env);
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn dotted_paths_resolve_nested_values() {
        let my_arg = json!({"my_arg_property": {"another_property": "test"}});
        let other = 5.4f64;
        let env = BindEnv::new().arg("my_arg", &my_arg).arg("my_other_arg", &other);
        let (sql, params) = render(
            "INSERT INTO my_table (#{my_arg.my_arg_property.another_property}, #{my_other_arg})",
            &env,
        );
        assert_eq!(sql, "INSERT INTO my_table (?1, ?2)");
        assert_eq!(params, vec![SqlValue::Text("test".into()), SqlValue::Float(5.4)]);
    }

    #[test]
    fn repeated_references_bind_each_occurrence() {
        let e = json!({"name": "hits", "value": 3});
        let env = BindEnv::new().arg("e", &e);
        let (sql, params) = render(
            "INSERT INTO stats VALUES (#{e.name}, #{e.value}) \
             ON CONFLICT (name) DO UPDATE SET value = #{e.value}",
            &env,
        );
        assert_eq!(
            sql,
            "INSERT INTO stats VALUES (?1, ?2) ON CONFLICT (name) DO UPDATE SET value = ?3"
        );
        assert_eq!(params.len(), 3);
        assert_eq!(params[1], params[2]);
    }

    #[test]
    fn lone_braces_and_markers_are_plain_text() {
        let arg = json!({"member": {"sub": "test"}});
        let another = "something";
        let env = BindEnv::new().arg("argument", &arg).arg("another", &another);
        let (sql, params) = render(
            "SELECT * FROM t WHERE a = #{argument.member.sub} AND \
             j @> '{\"some\": [{\"nested\": \"#{another}\"}]}' AND b != !{argument.member.sub}",
            &env,
        );
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE a = ?1 AND \
             j @> '{\"some\": [{\"nested\": \"?2\"}]}' AND b != test"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn render_is_deterministic() {
        let model = json!({"name": "widget"});
        let env = BindEnv::new().arg("model", &model);
        let template = Template::parse("UPDATE t SET name = #{model.name} WHERE n = #{model.name}")
            .expect("template should parse");
        let first = template.render(STYLE, &env).expect("render");
        let second = template.render(STYLE, &env).expect("render");
        assert_eq!(first, second);
    }

    #[test]
    fn unterminated_reference_is_rejected() {
        let err = Template::parse("SET mycol1 = #{myarg1 WHERE mycol2 = 3").unwrap_err();
        assert!(matches!(err, SqlBinderError::TemplateSyntax(_)), "{err}");
    }

    #[test]
    fn empty_and_nested_references_are_rejected() {
        for bad in [
            "INSERT INTO t VALUES (#{})",
            "INSERT INTO t VALUES (!{})",
            "INSERT INTO t VALUES (#{a..b})",
            "INSERT INTO t VALUES (#{#{marg}})",
            "INSERT INTO t VALUES (!{!{marg}})",
            "INSERT INTO t VALUES (#{my arg})",
        ] {
            let err = Template::parse(bad).unwrap_err();
            assert!(matches!(err, SqlBinderError::TemplateSyntax(_)), "{bad}");
        }
    }

    #[test]
    fn unresolved_reference_names_the_path() {
        let env = BindEnv::new();
        let err = Template::parse("SELECT #{missing.path}")
            .expect("template should parse")
            .render(STYLE, &env)
            .unwrap_err();
        match err {
            SqlBinderError::UnresolvedReference(p) => assert_eq!(p, "missing.path"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
