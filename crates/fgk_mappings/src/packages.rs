use std::collections::BTreeMap;

use crate::srg::{join_class, remap_descriptor, split_class};

/// Simple-class-name to target-package table.
///
/// Repackaging moves a class to a new package while keeping its simple name.
/// Inner classes are expected to move with their outer class; an inner class
/// the table forgot is auto-corrected by deriving its outer class's target
/// package, with a warning (the table is hand-maintained data and this is its
/// most common mistake).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Packages {
    targets: BTreeMap<String, String>,
}

impl Packages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn insert(&mut self, simple_name: impl Into<String>, package: impl Into<String>) {
        self.targets.insert(simple_name.into(), package.into());
    }

    pub fn get(&self, simple_name: &str) -> Option<&str> {
        self.targets.get(simple_name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.targets.iter()
    }

    pub fn merge_with(&mut self, other: &Packages) {
        self.targets
            .extend(other.targets.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Move a fully-qualified class into its target package, if it has one.
    pub fn repackage_class(&self, name: &str) -> String {
        let (_, simple) = split_class(name);
        if let Some(package) = self.targets.get(simple) {
            return join_class(package, simple);
        }

        // Inner class whose outer class moved but which has no row of its
        // own: derive the outer's package so the pair stays together.
        if let Some((outer_simple, _)) = simple.split_once('$') {
            if let Some(package) = self.targets.get(outer_simple) {
                tracing::warn!(
                    inner = name,
                    outer = outer_simple,
                    package = %package,
                    "inner class left behind by its outer class's move; deriving mapping"
                );
                return join_class(package, simple);
            }
        }

        name.to_owned()
    }

    /// Repackage every class reference embedded in a descriptor.
    pub fn repackage_descriptor(&self, desc: &str) -> String {
        remap_descriptor(desc, |name| {
            let moved = self.repackage_class(name);
            (moved != name).then_some(moved)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Packages {
        let mut packages = Packages::new();
        packages.insert("Foo", "net/minecraft/util");
        packages.insert("Bar", "net/minecraft/world");
        packages
    }

    #[test]
    fn keeps_simple_name_and_swaps_package() {
        let packages = sample();
        assert_eq!(
            packages.repackage_class("net/minecraft/src/Foo"),
            "net/minecraft/util/Foo"
        );
        assert_eq!(
            packages.repackage_class("net/minecraft/src/Other"),
            "net/minecraft/src/Other"
        );
    }

    #[test]
    fn derives_inner_class_moves_from_the_outer_class() {
        let packages = sample();
        assert_eq!(
            packages.repackage_class("net/minecraft/src/Foo$Inner"),
            "net/minecraft/util/Foo$Inner"
        );
    }

    #[test]
    fn repackages_each_descriptor_reference_independently() {
        let packages = sample();
        assert_eq!(
            packages.repackage_descriptor(
                "(Lnet/minecraft/src/Foo;[Lnet/minecraft/src/Bar;)Ljava/lang/String;"
            ),
            "(Lnet/minecraft/util/Foo;[Lnet/minecraft/world/Bar;)Ljava/lang/String;"
        );
    }
}
