use std::collections::BTreeMap;

/// Which program variant a member belongs to, as encoded in the member CSV's
/// third column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client = 0,
    Server = 1,
    Both = 2,
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0 => Side::Client,
            1 => Side::Server,
            2 => Side::Both,
            other => return Err(other),
        })
    }
}

/// Final name, side and optional comment for one intermediate symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub name: String,
    pub side: Side,
    pub comment: Option<String>,
}

/// Intermediate symbolic name (`field_<id>_<suffix>` / `func_<id>_<suffix>`)
/// to final-name table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Members {
    entries: BTreeMap<String, MemberEntry>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbolic: &str) -> Option<&MemberEntry> {
        self.entries.get(symbolic)
    }

    pub fn insert(&mut self, symbolic: impl Into<String>, entry: MemberEntry) {
        self.entries.insert(symbolic.into(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MemberEntry)> {
        self.entries.iter()
    }

    /// Fold `other` into `self`; on collisions `other` wins.
    pub fn merge_with(&mut self, other: &Members) {
        self.entries
            .extend(other.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
