//! Tree-keyed configuration store. Passes and runtime variants consult
//! it with a slash-separated path; the last matching rule wins.

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct ConfigRule {
    pattern: String,
    key: String,
    value: ConfigValue,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigTree {
    rules: Vec<ConfigRule>,
}

impl ConfigTree {
    /// Registers a rule. Patterns are slash-separated; `*` matches one
    /// segment, `**` matches any number of segments.
    pub fn set(&mut self, pattern: impl Into<String>, key: impl Into<String>, value: ConfigValue) {
        self.rules.push(ConfigRule {
            pattern: pattern.into(),
            key: key.into(),
            value,
        });
    }

    pub fn query(&self, path: &str, key: &str) -> Option<&ConfigValue> {
        self.rules
            .iter()
            .rev()
            .find(|r| r.key == key && pattern_matches(&r.pattern, path))
            .map(|r| &r.value)
    }

    pub fn query_bool(&self, path: &str, key: &str, default: bool) -> bool {
        self.query(path, key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    fn rec(pat: &[&str], path: &[&str]) -> bool {
        match (pat.first(), path.first()) {
            (None, None) => true,
            (Some(&"**"), _) => {
                rec(&pat[1..], path) || (!path.is_empty() && rec(pat, &path[1..]))
            }
            (Some(&"*"), Some(_)) => rec(&pat[1..], &path[1..]),
            (Some(p), Some(s)) if p == s => rec(&pat[1..], &path[1..]),
            _ => false,
        }
    }
    let pat: Vec<&str> = pattern.split('/').collect();
    let segs: Vec<&str> = path.split('/').collect();
    rec(&pat, &segs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_matching_rule_wins() {
        let mut cfg = ConfigTree::default();
        cfg.set("**", "enabled", ConfigValue::Bool(true));
        cfg.set("postprocess/retiming", "enabled", ConfigValue::Bool(false));
        assert_eq!(
            cfg.query("postprocess/retiming", "enabled"),
            Some(&ConfigValue::Bool(false))
        );
        assert_eq!(
            cfg.query("postprocess/dce", "enabled"),
            Some(&ConfigValue::Bool(true))
        );
    }

    #[test]
    fn star_matches_one_segment() {
        let mut cfg = ConfigTree::default();
        cfg.set("a/*/c", "k", ConfigValue::Int(1));
        assert!(cfg.query("a/b/c", "k").is_some());
        assert!(cfg.query("a/b/b/c", "k").is_none());
        assert!(cfg.query("a/c", "k").is_none());
    }
}
