//! Access transformer configurations.
//!
//! A configuration is a set of rules that widen the visibility of classes,
//! fields, and methods, and optionally add or strip the `final` flag. Rules
//! come from plain-text files; the whole configuration is then applied to
//! class bytes with [`AtConfig::transform`].

use std::collections::HashMap;

use fgk_classfile::AccessFlags;

pub mod error;
mod parse;
mod transform;

pub use error::{Error, Result};

/// Visibility levels, ordered weakest to strongest. Rules only ever upgrade:
/// applying `Protected` to a public member leaves it public.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

impl Visibility {
    pub fn of(flags: AccessFlags) -> Self {
        if flags.contains(AccessFlags::PUBLIC) {
            Visibility::Public
        } else if flags.contains(AccessFlags::PROTECTED) {
            Visibility::Protected
        } else if flags.contains(AccessFlags::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::Package
        }
    }

    fn mask_bits(self) -> u16 {
        match self {
            Visibility::Private => AccessFlags::PRIVATE.bits(),
            Visibility::Package => 0,
            Visibility::Protected => AccessFlags::PROTECTED.bits(),
            Visibility::Public => AccessFlags::PUBLIC.bits(),
        }
    }
}

/// What a rule does to the `final` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finality {
    /// Leave the flag as it is.
    #[default]
    Keep,
    /// `+f`: add the flag.
    Set,
    /// `-f`: strip the flag.
    Strip,
}

/// The effect of one (or several merged) access transformer rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessChange {
    pub visibility: Visibility,
    pub finality: Finality,
}

impl AccessChange {
    pub fn new(visibility: Visibility, finality: Finality) -> Self {
        Self { visibility, finality }
    }

    /// Applies this change to a flag word. Visibility never narrows.
    pub fn apply(self, flags: AccessFlags) -> AccessFlags {
        let mut out = flags;
        if self.visibility > Visibility::of(flags) {
            out = AccessFlags::from_bits_retain(
                (out.bits() & !AccessFlags::VISIBILITY_MASK) | self.visibility.mask_bits(),
            );
        }
        match self.finality {
            Finality::Keep => {}
            Finality::Set => out |= AccessFlags::FINAL,
            Finality::Strip => out &= !AccessFlags::FINAL,
        }
        out
    }

    /// Combines two rules hitting the same target. The stronger visibility
    /// wins; an explicit `-f` beats `+f`.
    fn merge(self, other: Self) -> Self {
        let finality = match (self.finality, other.finality) {
            (Finality::Strip, _) | (_, Finality::Strip) => Finality::Strip,
            (Finality::Set, _) | (_, Finality::Set) => Finality::Set,
            _ => Finality::Keep,
        };
        Self {
            visibility: self.visibility.max(other.visibility),
            finality,
        }
    }
}

/// Named and wildcard rules for the members of one owner class. A wildcard
/// rule covers every member of the owner and takes precedence over named
/// rules, so lookups consult it first.
#[derive(Debug, Default)]
struct MemberRules {
    wildcard: Option<AccessChange>,
    named: HashMap<String, AccessChange>,
}

impl MemberRules {
    fn lookup(&self, key: &str) -> Option<AccessChange> {
        self.wildcard.or_else(|| self.named.get(key).copied())
    }

    fn add(&mut self, key: Option<String>, change: AccessChange) {
        match key {
            None => merge_into(&mut self.wildcard, change),
            Some(key) => {
                let slot = self.named.entry(key).or_insert(change);
                *slot = slot.merge(change);
            }
        }
    }
}

fn merge_into(slot: &mut Option<AccessChange>, change: AccessChange) {
    *slot = Some(match *slot {
        Some(existing) => existing.merge(change),
        None => change,
    });
}

/// A parsed access transformer configuration. Owner names are stored in
/// internal (slash-separated) form; method keys are `name` plus descriptor.
#[derive(Debug, Default)]
pub struct AtConfig {
    classes: HashMap<String, AccessChange>,
    fields: HashMap<String, MemberRules>,
    methods: HashMap<String, MemberRules>,
}

impl AtConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    pub fn class_change(&self, name: &str) -> Option<AccessChange> {
        self.classes.get(name).copied()
    }

    pub fn field_change(&self, owner: &str, name: &str) -> Option<AccessChange> {
        self.fields.get(owner).and_then(|rules| rules.lookup(name))
    }

    pub fn method_change(&self, owner: &str, key: &str) -> Option<AccessChange> {
        self.methods.get(owner).and_then(|rules| rules.lookup(key))
    }

    /// Whether any rule names this class as owner or target, used to skip
    /// parsing classes the configuration cannot affect.
    pub fn targets_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
            || self.fields.contains_key(name)
            || self.methods.contains_key(name)
    }

    fn add_class(&mut self, name: String, change: AccessChange) {
        let slot = self.classes.entry(name).or_insert(change);
        *slot = slot.merge(change);
    }

    fn add_field(&mut self, owner: String, name: Option<String>, change: AccessChange) {
        self.fields.entry(owner).or_default().add(name, change);
    }

    fn add_method(&mut self, owner: String, key: Option<String>, change: AccessChange) {
        self.methods.entry(owner).or_default().add(key, change);
    }
}
