//! `.env` text import and export.

use common::{EnvVariable, VariableValue};

use crate::project::PlainVariable;

/// Parse `.env` content into plain variables.
///
/// Blank lines, `#` comments and lines without `=` are skipped. The line is
/// split on the first `=`; a value wrapped in matching single or double
/// quotes is unwrapped, and `\"` inside double quotes is unescaped.
pub fn parse(content: &str) -> Vec<EnvVariable> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some(EnvVariable {
                key: key.to_owned(),
                value: VariableValue::Plain(unquote(value.trim())),
                description: None,
            })
        })
        .collect()
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 {
        if let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            return inner.replace("\\\"", "\"");
        }
        if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
            return inner.to_owned();
        }
    }
    value.to_owned()
}

/// Render variables as `.env` text.
///
/// A description becomes a `# ...` line above its variable. Values containing
/// whitespace or `#` are double-quoted with `"` escaped. Entries are
/// separated by a blank line.
pub fn generate(variables: &[PlainVariable]) -> String {
    let mut out = String::new();
    for var in variables {
        if let Some(desc) = var.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str("# ");
            out.push_str(desc);
            out.push('\n');
        }
        out.push_str(&var.key);
        out.push('=');
        if var.value.contains([' ', '\t', '#', '\n', '\r']) {
            out.push('"');
            out.push_str(&var.value.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(&var.value);
        }
        out.push_str("\n\n");
    }
    out.trim_end_matches('\n').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(v: &EnvVariable) -> &str {
        match &v.value {
            VariableValue::Plain(s) => s,
            VariableValue::Encrypted(_) => panic!("unexpected envelope"),
        }
    }

    #[test]
    fn parse_skips_comments_and_junk() {
        let vars = parse("# header\n\nDB_URL=postgres://x\nnot a pair\n=orphan\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].key, "DB_URL");
        assert_eq!(plain(&vars[0]), "postgres://x");
    }

    #[test]
    fn parse_splits_on_first_equals_and_unquotes() {
        let vars = parse("A=b=c\nB=\"hello world\"\nC='single'\nD=\"say \\\"hi\\\"\"\n");
        assert_eq!(plain(&vars[0]), "b=c");
        assert_eq!(plain(&vars[1]), "hello world");
        assert_eq!(plain(&vars[2]), "single");
        assert_eq!(plain(&vars[3]), "say \"hi\"");
    }

    #[test]
    fn parse_keeps_lone_quote() {
        let vars = parse("A=\"\n");
        assert_eq!(plain(&vars[0]), "\"");
    }

    #[test]
    fn generate_quotes_and_describes() {
        let text = generate(&[
            PlainVariable {
                key: "A".into(),
                value: "plain".into(),
                description: Some("first".into()),
            },
            PlainVariable {
                key: "B".into(),
                value: "has space \"q\"".into(),
                description: None,
            },
        ]);
        assert_eq!(text, "# first\nA=plain\n\nB=\"has space \\\"q\\\"\"");
    }

    #[test]
    fn generate_keeps_trailing_whitespace_of_last_value() {
        let vars = vec![
            PlainVariable {
                key: "A".into(),
                value: "1".into(),
                description: None,
            },
            PlainVariable {
                key: "B".into(),
                value: "tabbed\t".into(),
                description: None,
            },
        ];
        let text = generate(&vars);
        assert!(text.ends_with("B=\"tabbed\t\""));
        assert_eq!(plain(&parse(&text)[1]), "tabbed\t");
    }

    #[test]
    fn generated_text_parses_back() {
        let vars = vec![PlainVariable {
            key: "MSG".into(),
            value: "a # b".into(),
            description: Some("note".into()),
        }];
        let parsed = parse(&generate(&vars));
        assert_eq!(parsed.len(), 1);
        assert_eq!(plain(&parsed[0]), "a # b");
    }
}
