//! Known-bad duplicate mappings.
//!
//! A handful of rows in the historical member data assign the same target
//! name twice, which trips duplicate-symbol faults much later in the
//! pipeline. The bad rows are empirically discovered, version-specific data;
//! they are kept here as a literal table and removed after parsing, not
//! derived from any rule. Edit the table when a new bad row is found.

use crate::srg::{MethodKey, Srg};

/// One denylisted mapping: removed only when the parsed table maps the
/// source to exactly `expected` (so a corrected upstream file is left alone).
#[derive(Debug, Clone, Copy)]
pub struct DenylistEntry {
    pub owner: &'static str,
    pub name: &'static str,
    /// Method descriptor; `None` marks a field row.
    pub desc: Option<&'static str>,
    pub expected: &'static str,
}

/// Duplicate rows observed in the wild.
pub const KNOWN_BAD_DUPLICATES: &[DenylistEntry] = &[
    DenylistEntry {
        owner: "afy",
        name: "a",
        desc: Some("(Lafu;IIII)V"),
        expected: "func_35199_a",
    },
    DenylistEntry {
        owner: "afy",
        name: "a",
        desc: Some("(Lafu;IIIIII)V"),
        expected: "func_35199_a",
    },
    DenylistEntry {
        owner: "jv",
        name: "b",
        desc: None,
        expected: "field_22062_b",
    },
    DenylistEntry {
        owner: "qd",
        name: "e",
        desc: None,
        expected: "field_22062_b",
    },
];

/// Remove every denylisted row present in `srg`. Returns how many were
/// removed; each removal is logged.
pub fn scrub(srg: &mut Srg) -> usize {
    let mut removed = 0;
    for entry in KNOWN_BAD_DUPLICATES {
        let hit = match entry.desc {
            None => srg.fields.get_mut(entry.owner).is_some_and(|table| {
                if table.get(entry.name).is_some_and(|new| new == entry.expected) {
                    table.remove(entry.name);
                    true
                } else {
                    false
                }
            }),
            Some(desc) => srg.methods.get_mut(entry.owner).is_some_and(|table| {
                let key = MethodKey::new(entry.name, desc);
                if table.get(&key).is_some_and(|new| new.name == entry.expected) {
                    table.remove(&key);
                    true
                } else {
                    false
                }
            }),
        };
        if hit {
            tracing::warn!(
                owner = entry.owner,
                name = entry.name,
                desc = entry.desc.unwrap_or("<field>"),
                expected = entry.expected,
                "removed known-bad duplicate mapping"
            );
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_only_exact_matches() {
        let mut srg = Srg::new();
        srg.add_field("jv", "b", "field_22062_b");
        srg.add_field("qd", "e", "somethingElse");
        srg.add_method(
            "afy",
            MethodKey::new("a", "(Lafu;IIII)V"),
            MethodKey::new("func_35199_a", "(Lx;IIII)V"),
        );

        assert_eq!(scrub(&mut srg), 2);
        assert!(srg.fields.get("jv").unwrap().get("b").is_none());
        // Different target name: row kept.
        assert_eq!(srg.map_field("qd", "e"), "somethingElse");
        assert!(srg.methods.get("afy").unwrap().is_empty());

        // Idempotent.
        assert_eq!(scrub(&mut srg), 0);
    }
}
