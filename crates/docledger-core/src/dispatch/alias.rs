use serde::Deserialize;
use std::fmt;

///
/// Alias
///
/// Alternate operation name resolving to a canonical operation.
/// `bind` arguments are prepended to the caller's arguments, which lets a
/// legacy single-purpose name stand in for a parameterized operation.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "AliasRepr")]
pub struct Alias {
    pub op: String,
    pub bind: Vec<String>,
}

impl Alias {
    #[must_use]
    pub fn op(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            bind: Vec::new(),
        }
    }

    #[must_use]
    pub fn bound(op: impl Into<String>, bind: &[&str]) -> Self {
        Self {
            op: op.into(),
            bind: bind.iter().map(ToString::to_string).collect(),
        }
    }

    /// Caller arguments with the bound arguments in front.
    #[must_use]
    pub fn expand(&self, args: &[String]) -> Vec<String> {
        self.bind.iter().chain(args).cloned().collect()
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bind.is_empty() {
            write!(f, "{}", self.op)
        } else {
            write!(f, "{}({})", self.op, self.bind.join(", "))
        }
    }
}

// Config accepts either `name = "op"` or `name = { op = "...", bind = [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AliasRepr {
    Op(String),
    Bound {
        op: String,
        #[serde(default)]
        bind: Vec<String>,
    },
}

impl From<AliasRepr> for Alias {
    fn from(repr: AliasRepr) -> Self {
        match repr {
            AliasRepr::Op(op) => Self { op, bind: Vec::new() },
            AliasRepr::Bound { op, bind } => Self { op, bind },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn alias_deserializes_from_string_or_table() {
        let aliases: BTreeMap<String, Alias> = toml::from_str(
            r#"
            initStudent = "create"
            byOwner = { op = "query-by-field", bind = ["owner"] }
            "#,
        )
        .unwrap();

        assert_eq!(aliases["initStudent"], Alias::op("create"));
        assert_eq!(aliases["byOwner"], Alias::bound("query-by-field", &["owner"]));
    }

    #[test]
    fn expand_prepends_bound_arguments() {
        let alias = Alias::bound("update-by-index", &["owner"]);
        let args = vec!["red".to_string(), "jerry".to_string()];

        assert_eq!(alias.expand(&args), vec!["owner", "red", "jerry"]);
    }
}
