//! The access transformer text grammar.
//!
//! Each non-empty line is `modifier target`. The modifier is one of `public`,
//! `protected`, or `private`, optionally suffixed with `+f` or `-f`. The
//! target is a dotted class name, `Owner.field`, `Owner.method(desc)ret`, or
//! a wildcard `Owner.*` / `Owner.*()` covering every field or method of the
//! owner. `#` starts a comment. Any line that does not fit the grammar fails
//! the whole file.

use camino::Utf8Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{AccessChange, AtConfig, Finality, Visibility};

impl AtConfig {
    /// Reads one configuration file and merges its rules into `self`.
    pub fn load(&mut self, path: &Utf8Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        self.parse_rules(path.as_str(), &text)
    }

    /// Parses configuration text and merges its rules into `self`. `file` is
    /// used in error messages only.
    pub fn parse_rules(&mut self, file: &str, text: &str) -> Result<()> {
        let mut rules = 0usize;
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            self.parse_rule(line)
                .map_err(|detail| Error::Grammar {
                    file: file.to_owned(),
                    line: index + 1,
                    detail,
                })?;
            rules += 1;
        }
        debug!(file, rules, "access transformer configuration parsed");
        Ok(())
    }

    fn parse_rule(&mut self, line: &str) -> std::result::Result<(), String> {
        let mut tokens = line.split_whitespace();
        let modifier = tokens.next().ok_or("missing modifier")?;
        let target = tokens.next().ok_or("missing target")?;
        if let Some(extra) = tokens.next() {
            return Err(format!("unexpected trailing token `{extra}`"));
        }

        let change = parse_modifier(modifier)?;
        match parse_target(target)? {
            Target::Class(name) => self.add_class(name, change),
            Target::Field { owner, name } => self.add_field(owner, name, change),
            Target::Method { owner, key } => self.add_method(owner, key, change),
        }
        Ok(())
    }
}

enum Target {
    Class(String),
    Field {
        owner: String,
        /// `None` is the `*` wildcard.
        name: Option<String>,
    },
    Method {
        owner: String,
        /// `name(desc)ret`, or `None` for the `*()` wildcard.
        key: Option<String>,
    },
}

fn parse_modifier(token: &str) -> std::result::Result<AccessChange, String> {
    let (base, finality) = match token.strip_suffix("-f") {
        Some(base) => (base, Finality::Strip),
        None => match token.strip_suffix("+f") {
            Some(base) => (base, Finality::Set),
            None => (token, Finality::Keep),
        },
    };
    let visibility = match base {
        "public" => Visibility::Public,
        "protected" => Visibility::Protected,
        "private" => Visibility::Private,
        other => return Err(format!("unknown modifier `{other}`")),
    };
    Ok(AccessChange::new(visibility, finality))
}

fn parse_target(token: &str) -> std::result::Result<Target, String> {
    if let Some(paren) = token.find('(') {
        let signature = &token[paren..];
        let (owner, name) = token[..paren]
            .rsplit_once('.')
            .ok_or_else(|| format!("method target `{token}` has no owner"))?;
        if name.is_empty() {
            return Err(format!("method target `{token}` has an empty name"));
        }
        let owner = owner.replace('.', "/");
        if name == "*" {
            return Ok(Target::Method { owner, key: None });
        }
        if !signature.contains(')') {
            return Err(format!("method target `{token}` has an unterminated descriptor"));
        }
        Ok(Target::Method {
            owner,
            key: Some(format!("{name}{signature}")),
        })
    } else if let Some((owner, name)) = token.rsplit_once('.') {
        if name.is_empty() {
            return Err(format!("field target `{token}` has an empty name"));
        }
        let owner = owner.replace('.', "/");
        if name == "*" {
            return Ok(Target::Field { owner, name: None });
        }
        Ok(Target::Field {
            owner,
            name: Some(name.to_owned()),
        })
    } else {
        Ok(Target::Class(token.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_target_form() {
        let mut config = AtConfig::new();
        config
            .parse_rules(
                "test_at.cfg",
                "# header comment\n\
                 public aqz\n\
                 protected-f net.minecraft.block.Block.blockHardness\n\
                 public aqz.a(II)V # widen the worker\n\
                 private+f jm.*\n\
                 public jm.*()\n",
            )
            .unwrap();

        assert!(config.class_change("aqz").is_some());
        let field = config
            .field_change("net/minecraft/block/Block", "blockHardness")
            .unwrap();
        assert_eq!(field.visibility, Visibility::Protected);
        assert_eq!(field.finality, Finality::Strip);
        assert!(config.method_change("aqz", "a(II)V").is_some());
        assert!(config.field_change("jm", "anything").is_some());
        assert!(config.method_change("jm", "whatever()V").is_some());
    }

    #[test]
    fn bad_modifier_names_file_and_line() {
        let mut config = AtConfig::new();
        let err = config
            .parse_rules("broken.cfg", "public aqz\nfinal aqz.b\n")
            .unwrap_err();
        match err {
            Error::Grammar { file, line, .. } => {
                assert_eq!(file, "broken.cfg");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let mut config = AtConfig::new();
        assert!(config
            .parse_rules("broken.cfg", "public aqz stray\n")
            .is_err());
    }

    #[test]
    fn duplicate_rules_merge() {
        let mut config = AtConfig::new();
        config
            .parse_rules("a.cfg", "protected aqz.b\npublic-f aqz.b\n")
            .unwrap();
        let change = config.field_change("aqz", "b").unwrap();
        assert_eq!(change.visibility, Visibility::Public);
        assert_eq!(change.finality, Finality::Strip);
    }
}
