use std::collections::BTreeMap;

use crate::members::Members;
use crate::packages::Packages;

/// Identity of a method within its owning class.
///
/// The descriptor participates in equality; overloads are distinct mappings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodKey {
    pub name: String,
    pub desc: String,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }
}

/// A class/field/method rename table.
///
/// Field names are unique per owning class; methods are keyed by name plus
/// descriptor. `packages` holds package-prefix rules (the verbose dialect's
/// `PK:` lines), consulted as a fallback when a class has no exact mapping.
///
/// Tables are built once per source and then combined functionally: every
/// operation except [`merge_with`](Srg::merge_with) returns a new table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Srg {
    pub classes: BTreeMap<String, String>,
    pub packages: BTreeMap<String, String>,
    pub fields: BTreeMap<String, BTreeMap<String, String>>,
    pub methods: BTreeMap<String, BTreeMap<MethodKey, MethodKey>>,
}

impl Srg {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.packages.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
    }

    pub fn add_class(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.classes.insert(old.into(), new.into());
    }

    pub fn add_package(&mut self, old: impl Into<String>, new: impl Into<String>) {
        self.packages.insert(old.into(), new.into());
    }

    pub fn add_field(
        &mut self,
        owner: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) {
        self.fields
            .entry(owner.into())
            .or_default()
            .insert(old.into(), new.into());
    }

    pub fn add_method(&mut self, owner: impl Into<String>, old: MethodKey, new: MethodKey) {
        self.methods.entry(owner.into()).or_default().insert(old, new);
    }

    /// Map a class name; unmapped names fall back to a package-prefix rule,
    /// then to themselves.
    pub fn map_class(&self, name: &str) -> String {
        if let Some(mapped) = self.classes.get(name) {
            return mapped.clone();
        }
        let (package, simple) = split_class(name);
        let package_key = if package.is_empty() { "." } else { package };
        if let Some(new_package) = self.packages.get(package_key) {
            return join_class(new_package, simple);
        }
        name.to_owned()
    }

    pub fn map_field(&self, owner: &str, name: &str) -> String {
        self.fields
            .get(owner)
            .and_then(|table| table.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }

    pub fn map_method(&self, owner: &str, key: &MethodKey) -> MethodKey {
        self.methods
            .get(owner)
            .and_then(|table| table.get(key))
            .cloned()
            .unwrap_or_else(|| key.clone())
    }

    /// Remap every class reference embedded in a field or method descriptor.
    pub fn map_descriptor(&self, desc: &str) -> String {
        remap_descriptor(desc, |name| Some(self.map_class(name)))
    }

    /// Fold `other` into `self`; on key collisions `other` wins.
    pub fn merge_with(&mut self, other: &Srg) {
        self.classes
            .extend(other.classes.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.packages
            .extend(other.packages.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (owner, table) in &other.fields {
            self.fields
                .entry(owner.clone())
                .or_default()
                .extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        for (owner, table) in &other.methods {
            self.methods
                .entry(owner.clone())
                .or_default()
                .extend(table.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    pub fn merged(&self, other: &Srg) -> Srg {
        let mut merged = self.clone();
        merged.merge_with(other);
        merged
    }

    /// Swap source and target names. Member tables move under their mapped
    /// owners so lookups work from the renamed side.
    pub fn inverted(&self) -> Srg {
        let mut out = Srg::new();
        for (old, new) in &self.classes {
            out.classes.insert(new.clone(), old.clone());
        }
        for (old, new) in &self.packages {
            out.packages.insert(new.clone(), old.clone());
        }
        for (owner, table) in &self.fields {
            let new_owner = self.map_class(owner);
            let inverted = out.fields.entry(new_owner).or_default();
            for (old, new) in table {
                inverted.insert(new.clone(), old.clone());
            }
        }
        for (owner, table) in &self.methods {
            let new_owner = self.map_class(owner);
            let inverted = out.methods.entry(new_owner).or_default();
            for (old, new) in table {
                inverted.insert(new.clone(), old.clone());
            }
        }
        out
    }

    /// Rewrite the target side through a package table: class targets move
    /// package, method target descriptors are repackaged reference by
    /// reference. Source-side names are untouched.
    pub fn repackaged(&self, packages: &Packages) -> Srg {
        let mut out = self.clone();
        for target in out.classes.values_mut() {
            *target = packages.repackage_class(target);
        }
        for table in out.methods.values_mut() {
            for target in table.values_mut() {
                target.desc = packages.repackage_descriptor(&target.desc);
            }
        }
        out
    }

    /// Rewrite target member names through the intermediate-to-final rename
    /// tables. Names without an entry keep their intermediate form.
    pub fn renamed(&self, fields: &Members, methods: &Members) -> Srg {
        let mut out = self.clone();
        for table in out.fields.values_mut() {
            for target in table.values_mut() {
                if let Some(entry) = fields.get(target) {
                    *target = entry.name.clone();
                }
            }
        }
        for table in out.methods.values_mut() {
            for target in table.values_mut() {
                if let Some(entry) = methods.get(&target.name) {
                    target.name = entry.name.clone();
                }
            }
        }
        out
    }
}

/// Split an internal class name into package and simple name.
pub(crate) fn split_class(name: &str) -> (&str, &str) {
    match name.rfind('/') {
        Some(at) => (&name[..at], &name[at + 1..]),
        None => ("", name),
    }
}

pub(crate) fn join_class(package: &str, simple: &str) -> String {
    if package.is_empty() || package == "." {
        simple.to_owned()
    } else {
        format!("{package}/{simple}")
    }
}

/// Rewrite each `L...;` class reference in a descriptor through `lookup`.
/// A `None` result leaves the reference unchanged; a reference with no
/// terminator is copied verbatim.
pub fn remap_descriptor<F>(desc: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(desc.len());
    let mut rest = desc;
    while let Some(at) = rest.find('L') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];
        match tail.find(';') {
            Some(end) => {
                let name = &tail[1..end];
                match lookup(name) {
                    Some(mapped) => {
                        out.push('L');
                        out.push_str(&mapped);
                        out.push(';');
                    }
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Srg {
        let mut srg = Srg::new();
        srg.add_class("a", "net/minecraft/src/Foo");
        srg.add_class("b", "net/minecraft/src/Bar");
        srg.add_field("a", "c", "field_1_c");
        srg.add_method(
            "a",
            MethodKey::new("d", "(Lb;I)La;"),
            MethodKey::new(
                "func_2_d",
                "(Lnet/minecraft/src/Bar;I)Lnet/minecraft/src/Foo;",
            ),
        );
        srg
    }

    #[test]
    fn maps_descriptors_reference_by_reference() {
        let srg = sample();
        assert_eq!(
            srg.map_descriptor("([La;JLjava/lang/String;)Lb;"),
            "([Lnet/minecraft/src/Foo;JLjava/lang/String;)Lnet/minecraft/src/Bar;"
        );
    }

    #[test]
    fn unmapped_names_pass_through() {
        let srg = sample();
        assert_eq!(srg.map_class("zz"), "zz");
        assert_eq!(srg.map_field("a", "unknown"), "unknown");
        let key = MethodKey::new("x", "()V");
        assert_eq!(srg.map_method("zz", &key), key);
    }

    #[test]
    fn package_rules_are_a_fallback() {
        let mut srg = Srg::new();
        srg.add_package(".", "net/minecraft/src");
        srg.add_class("a", "net/minecraft/src/Foo");
        assert_eq!(srg.map_class("a"), "net/minecraft/src/Foo");
        assert_eq!(srg.map_class("q"), "net/minecraft/src/q");
    }

    #[test]
    fn later_merge_wins() {
        let mut first = sample();
        let mut second = Srg::new();
        second.add_class("a", "net/minecraft/src/Renamed");
        second.add_field("a", "e", "field_9_e");
        first.merge_with(&second);

        assert_eq!(first.map_class("a"), "net/minecraft/src/Renamed");
        assert_eq!(first.map_field("a", "c"), "field_1_c");
        assert_eq!(first.map_field("a", "e"), "field_9_e");
    }

    #[test]
    fn inversion_moves_members_under_new_owners() {
        let srg = sample();
        let inverted = srg.inverted();
        assert_eq!(inverted.map_class("net/minecraft/src/Foo"), "a");
        assert_eq!(
            inverted.map_field("net/minecraft/src/Foo", "field_1_c"),
            "c"
        );
        let key = MethodKey::new(
            "func_2_d",
            "(Lnet/minecraft/src/Bar;I)Lnet/minecraft/src/Foo;",
        );
        assert_eq!(
            inverted.map_method("net/minecraft/src/Foo", &key),
            MethodKey::new("d", "(Lb;I)La;")
        );
    }

    #[test]
    fn unterminated_reference_is_copied_verbatim() {
        let srg = sample();
        assert_eq!(srg.map_descriptor("(La"), "(La");
    }
}
