//! C12: the process-wide `GroupKey -> Group` registry (`spec.md` §4.12).

use std::sync::Arc;

use dashmap::DashMap;
use groupcache_common::endpoint::GroupKey;

use crate::group::Group;

/// Registration is idempotent: the first winning `new_group` call for a
/// given key is the one every later caller gets back.
#[derive(Default)]
pub struct Registry {
    groups: DashMap<GroupKey, Arc<Group>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `newGroup(name, getter, picker [, cache]) -> Group`: inserts-if-absent,
    /// returning the canonical instance either way.
    pub fn new_group(&self, key: GroupKey, build: impl FnOnce() -> Group) -> Arc<Group> {
        self.groups.entry(key).or_insert_with(|| Arc::new(build())).clone()
    }

    pub fn get_group(&self, key: &GroupKey) -> Option<Arc<Group>> {
        self.groups.get(key).map(|entry| entry.clone())
    }
}
