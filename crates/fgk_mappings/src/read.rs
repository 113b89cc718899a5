//! Parsers for the four legacy text formats.
//!
//! All of them share one policy: a malformed line is diagnosed and skipped,
//! never fatal. These files are decades old, hand-edited, and full of
//! comments and headers; losing a whole file to one bad line would be worse
//! than losing the line.

use std::io::BufRead;

use crate::error::Result;
use crate::members::{MemberEntry, Members, Side};
use crate::packages::Packages;
use crate::srg::{remap_descriptor, MethodKey, Srg};

/// Parse the verbose tagged dialect (`PK:`/`CL:`/`FD:`/`MD:` lines).
pub fn parse_srg<R: BufRead>(reader: R) -> Result<Srg> {
    let mut srg = Srg::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = strip_comment(&line);
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["PK:", old, new] => srg.add_package(*old, *new),
            ["CL:", old, new] => srg.add_class(*old, *new),
            ["FD:", old, new] => match (split_member_path(old), split_member_path(new)) {
                (Some((owner, old_name)), Some((_, new_name))) => {
                    srg.add_field(owner, old_name, new_name);
                }
                _ => skip(number, line, "field path without an owner"),
            },
            ["MD:", old, old_desc, new, new_desc] => {
                match (split_member_path(old), split_member_path(new)) {
                    (Some((owner, old_name)), Some((_, new_name))) => srg.add_method(
                        owner,
                        MethodKey::new(old_name, *old_desc),
                        MethodKey::new(new_name, *new_desc),
                    ),
                    _ => skip(number, line, "method path without an owner"),
                }
            }
            _ => skip(number, line, "unrecognized tag or token count"),
        }
    }
    Ok(srg)
}

/// Parse the terse dialect, where the token count per line decides the kind:
/// two tokens are a class (or, with trailing slashes, a package-prefix rule),
/// three a field, four a method.
///
/// A method line's remapped descriptor is not in the file; it is derived by
/// remapping the original descriptor through the class rules accumulated *so
/// far*. Class rules therefore have to precede the method lines that use
/// them — real files are written that way, and a reference to a class rule
/// that has not been read yet is simply left unmapped.
pub fn parse_csrg<R: BufRead>(reader: R) -> Result<Srg> {
    let mut srg = Srg::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = strip_comment(&line);
        if line.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [old, new] => {
                if let Some(old_package) = old.strip_suffix('/') {
                    let new_package = new.strip_suffix('/').unwrap_or(new);
                    let old_package = if old_package.is_empty() {
                        "."
                    } else {
                        old_package
                    };
                    srg.add_package(old_package, new_package);
                } else {
                    srg.add_class(*old, *new);
                }
            }
            [owner, old, new] => srg.add_field(*owner, *old, *new),
            [owner, name, desc, new_name] => {
                let new_desc = remap_descriptor(desc, |class| srg.classes.get(class).cloned());
                srg.add_method(
                    *owner,
                    MethodKey::new(*name, *desc),
                    MethodKey::new(*new_name, new_desc),
                );
            }
            _ => skip(number, line, "unrecognized token count"),
        }
    }
    Ok(srg)
}

/// Parse the member-rename CSV dialect (`name,finalName,side,comment`).
///
/// The comment column may be quoted, with doubled quotes as escapes. The
/// header line falls out naturally: its side column does not parse.
pub fn parse_member_csv<R: BufRead>(reader: R) -> Result<Members> {
    let mut members = Members::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_csv_line(&line);
        if fields.len() < 3 {
            skip(number, &line, "fewer than three columns");
            continue;
        }

        let Ok(side) = fields[2].trim().parse::<u8>().map(Side::try_from) else {
            if number == 0 {
                tracing::debug!(line = %line, "skipping member CSV header");
            } else {
                skip(number, &line, "side column is not an integer");
            }
            continue;
        };
        let Ok(side) = side else {
            skip(number, &line, "side column out of range");
            continue;
        };

        let comment = fields
            .get(3)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_owned);
        members.insert(
            fields[0].trim(),
            MemberEntry {
                name: fields[1].trim().to_owned(),
                side,
                comment,
            },
        );
    }
    Ok(members)
}

/// Parse the package CSV dialect (`simpleName,package`).
pub fn parse_package_csv<R: BufRead>(reader: R) -> Result<Packages> {
    let mut packages = Packages::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_csv_line(&line);
        if fields.len() < 2 {
            skip(number, &line, "fewer than two columns");
            continue;
        }
        if number == 0 && fields[0].trim() == "class" {
            continue;
        }
        packages.insert(fields[0].trim(), fields[1].trim());
    }
    Ok(packages)
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or(line).trim()
}

fn skip(number: usize, line: &str, reason: &str) {
    tracing::warn!(line = number + 1, content = %line, reason, "skipping malformed mapping line");
}

fn split_member_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('/')
}

/// Split one CSV line, honoring quoted fields with doubled-quote escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                ',' => fields.push(std::mem::take(&mut field)),
                '"' => in_quotes = true,
                _ => field.push(c),
            }
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_the_verbose_dialect() {
        let text = "\
# header comment
PK: . net/minecraft/src
CL: a net/minecraft/src/Foo
FD: a/c net/minecraft/src/Foo/field_1_c
MD: a/d (La;)V net/minecraft/src/Foo/func_2_d (Lnet/minecraft/src/Foo;)V
garbage line that is too short
";
        let srg = parse_srg(Cursor::new(text)).unwrap();
        assert_eq!(srg.map_class("a"), "net/minecraft/src/Foo");
        assert_eq!(srg.map_field("a", "c"), "field_1_c");
        assert_eq!(
            srg.map_method("a", &MethodKey::new("d", "(La;)V")),
            MethodKey::new("func_2_d", "(Lnet/minecraft/src/Foo;)V")
        );
        // The package rule fell through to unmapped classes.
        assert_eq!(srg.map_class("q"), "net/minecraft/src/q");
    }

    #[test]
    fn csrg_method_descriptor_is_derived_from_earlier_class_rules() {
        let text = "\
a net/minecraft/util/Foo
a d ()[Ljava/lang/String; func_1_d
a e (La;)La; func_2_e
";
        let srg = parse_csrg(Cursor::new(text)).unwrap();
        assert_eq!(
            srg.map_method("a", &MethodKey::new("e", "(La;)La;")),
            MethodKey::new(
                "func_2_e",
                "(Lnet/minecraft/util/Foo;)Lnet/minecraft/util/Foo;"
            )
        );
    }

    #[test]
    fn csrg_method_before_its_class_rule_stays_unmapped() {
        let text = "\
a d (La;)V func_1_d
a net/minecraft/util/Foo
";
        let srg = parse_csrg(Cursor::new(text)).unwrap();
        // The descriptor was derived before `a` had a class rule.
        assert_eq!(
            srg.map_method("a", &MethodKey::new("d", "(La;)V")),
            MethodKey::new("func_1_d", "(La;)V")
        );
    }

    #[test]
    fn csrg_package_rules_use_trailing_slashes() {
        let text = "net/minecraft/src/ net/minecraft/util/\n";
        let srg = parse_csrg(Cursor::new(text)).unwrap();
        assert_eq!(
            srg.map_class("net/minecraft/src/Foo"),
            "net/minecraft/util/Foo"
        );
    }

    #[test]
    fn member_csv_handles_quoted_comments() {
        let text = "\
searge,name,side,desc
field_1_c,maxHealth,2,\"The mob's health cap, in half-hearts; see \"\"hearts\"\".\"
func_2_d,tick,0,
";
        let members = parse_member_csv(Cursor::new(text)).unwrap();
        assert_eq!(members.len(), 2);

        let field = members.get("field_1_c").unwrap();
        assert_eq!(field.name, "maxHealth");
        assert_eq!(field.side, Side::Both);
        assert_eq!(
            field.comment.as_deref(),
            Some("The mob's health cap, in half-hearts; see \"hearts\".")
        );

        let method = members.get("func_2_d").unwrap();
        assert_eq!(method.side, Side::Client);
        assert_eq!(method.comment, None);
    }

    #[test]
    fn package_csv_skips_its_header() {
        let text = "class,package\nFoo,net/minecraft/util\n";
        let packages = parse_package_csv(Cursor::new(text)).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages.get("Foo"), Some("net/minecraft/util"));
    }
}
