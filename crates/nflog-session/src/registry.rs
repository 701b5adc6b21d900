use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{Result, SessionError};
use crate::handler::LogHandler;

pub(crate) type BoxedHandler = Box<dyn LogHandler + Send>;

/// Token for one group bound in one session.
///
/// Handles are plain values; the registry that issued them decides whether
/// they are still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    session: u64,
    group: u16,
}

impl GroupHandle {
    /// Group number this handle subscribes to.
    pub fn group(&self) -> u16 {
        self.group
    }

    /// Id of the session that issued the handle.
    pub fn session_id(&self) -> u64 {
        self.session
    }
}

/// Registry slot for a bound group.
pub struct GroupEntry {
    handle: GroupHandle,
    handler: Option<BoxedHandler>,
}

impl GroupEntry {
    pub fn handle(&self) -> GroupHandle {
        self.handle
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    pub(crate) fn handler_mut(&mut self) -> Option<&mut BoxedHandler> {
        self.handler.as_mut()
    }
}

impl fmt::Debug for GroupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupEntry")
            .field("handle", &self.handle)
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

/// Group-id keyed map of the groups bound in one session.
///
/// The registry only tracks state; the kernel commands that must precede
/// an insert or a removal are the session's job.
#[derive(Debug)]
pub struct GroupRegistry {
    session: u64,
    groups: HashMap<u16, GroupEntry>,
}

impl GroupRegistry {
    /// Empty registry issuing handles for `session`.
    pub fn new(session: u64) -> Self {
        Self {
            session,
            groups: HashMap::new(),
        }
    }

    /// Register `group`. Fails with `Conflict` if it is already present.
    pub fn insert(&mut self, group: u16) -> Result<GroupHandle> {
        if self.groups.contains_key(&group) {
            return Err(SessionError::Conflict { group });
        }
        let handle = GroupHandle {
            session: self.session,
            group,
        };
        self.groups.insert(
            group,
            GroupEntry {
                handle,
                handler: None,
            },
        );
        debug!(group, session = self.session, "registered group");
        Ok(handle)
    }

    /// Remove the entry behind `handle`.
    pub fn remove(&mut self, handle: GroupHandle) -> Result<GroupEntry> {
        self.check(handle)?;
        self.groups
            .remove(&handle.group)
            .ok_or(SessionError::UnknownGroup {
                group: handle.group,
            })
    }

    pub fn find(&self, group: u16) -> Option<&GroupEntry> {
        self.groups.get(&group)
    }

    pub(crate) fn find_mut(&mut self, group: u16) -> Option<&mut GroupEntry> {
        self.groups.get_mut(&group)
    }

    /// Entry behind `handle`, if the handle is live.
    pub fn resolve(&self, handle: GroupHandle) -> Result<&GroupEntry> {
        self.check(handle)?;
        self.groups.get(&handle.group).ok_or(SessionError::UnknownGroup {
            group: handle.group,
        })
    }

    /// Install or clear the handler of a live group.
    pub(crate) fn set_handler(
        &mut self,
        handle: GroupHandle,
        handler: Option<BoxedHandler>,
    ) -> Result<()> {
        self.check(handle)?;
        let entry = self
            .groups
            .get_mut(&handle.group)
            .ok_or(SessionError::UnknownGroup {
                group: handle.group,
            })?;
        entry.handler = handler;
        Ok(())
    }

    /// Bound group ids in ascending order.
    pub fn groups(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.groups.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Drop every entry, invalidating all handles.
    pub fn clear(&mut self) {
        self.groups.clear();
    }

    fn check(&self, handle: GroupHandle) -> Result<()> {
        if handle.session != self.session {
            return Err(SessionError::StaleHandle);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_find() {
        let mut registry = GroupRegistry::new(1);
        let handle = registry.insert(5).expect("insert should succeed");
        assert_eq!(handle.group(), 5);
        assert_eq!(handle.session_id(), 1);
        assert_eq!(registry.find(5).map(GroupEntry::handle), Some(handle));
        assert!(!registry.find(5).expect("entry").has_handler());
    }

    #[test]
    fn duplicate_insert_conflicts_and_keeps_first() {
        let mut registry = GroupRegistry::new(1);
        let first = registry.insert(5).expect("insert should succeed");
        assert!(matches!(
            registry.insert(5),
            Err(SessionError::Conflict { group: 5 })
        ));
        assert_eq!(registry.resolve(first).expect("still live").handle(), first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn foreign_handle_is_stale() {
        let mut a = GroupRegistry::new(1);
        let mut b = GroupRegistry::new(2);
        let handle = a.insert(5).expect("insert should succeed");
        b.insert(5).expect("insert should succeed");
        assert!(matches!(b.resolve(handle), Err(SessionError::StaleHandle)));
        assert!(matches!(b.remove(handle), Err(SessionError::StaleHandle)));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn removed_handle_is_unknown() {
        let mut registry = GroupRegistry::new(1);
        let handle = registry.insert(5).expect("insert should succeed");
        registry.remove(handle).expect("remove should succeed");
        assert!(matches!(
            registry.resolve(handle),
            Err(SessionError::UnknownGroup { group: 5 })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn groups_are_sorted() {
        let mut registry = GroupRegistry::new(1);
        for group in [30, 1, 7] {
            registry.insert(group).expect("insert should succeed");
        }
        assert_eq!(registry.groups(), vec![1, 7, 30]);
        registry.clear();
        assert!(registry.groups().is_empty());
    }
}
