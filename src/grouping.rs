//! Partition of the cached notifications by repository.
//!
//! Groups appear in the order their first record is encountered while
//! scanning the (newest-first) record list. That is not necessarily the order
//! of each group's most recent update.

use indexmap::IndexMap;

use crate::cache::insertion_index;
use crate::types::Notification;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationGroup {
    pub key: String,
    pub notifications: Vec<Notification>,
    pub expanded: bool,
}

/// Where a record sat before it was taken out, so it can be put back exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub key: String,
    pub group_index: usize,
    pub index_in_group: usize,
    pub expanded: bool,
    /// The removal emptied and deleted the group.
    pub group_removed: bool,
}

/// One row of the flattened list: a group header, or a record inside an
/// expanded group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Group {
        key: String,
        count: usize,
        expanded: bool,
    },
    Notification(Notification),
}

impl ListEntry {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Self::Notification(n) => Some(n),
            Self::Group { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups {
    groups: IndexMap<String, NotificationGroup>,
}

impl Groups {
    /// Group `list`, all groups collapsed.
    pub fn from_notifications(list: &[Notification]) -> Self {
        let mut groups: IndexMap<String, NotificationGroup> = IndexMap::new();
        for n in list {
            groups
                .entry(n.group_key())
                .or_insert_with_key(|key| NotificationGroup {
                    key: key.clone(),
                    notifications: Vec::new(),
                    expanded: false,
                })
                .notifications
                .push(n.clone());
        }
        Self { groups }
    }

    /// Rebuild from a new record list, keeping the expanded flag of every
    /// group that still exists.
    pub fn regroup(&mut self, list: &[Notification]) {
        let mut next = Self::from_notifications(list);
        for group in next.groups.values_mut() {
            if let Some(old) = self.groups.get(&group.key) {
                group.expanded = old.expanded;
            }
        }
        *self = next;
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&NotificationGroup> {
        self.groups.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationGroup> {
        self.groups.values()
    }

    /// Flip a group's expanded flag. Returns `false` for an unknown key.
    pub fn toggle(&mut self, key: &str) -> bool {
        match self.groups.get_mut(key) {
            Some(group) => {
                group.expanded = !group.expanded;
                true
            }
            None => false,
        }
    }

    pub fn set_all_expanded(&mut self, expanded: bool) {
        for group in self.groups.values_mut() {
            group.expanded = expanded;
        }
    }

    /// Take a record out, deleting its group if that leaves it empty.
    pub fn remove(&mut self, id: &str) -> Option<(Placement, Notification)> {
        let (group_index, index_in_group) = self
            .groups
            .values()
            .enumerate()
            .find_map(|(gi, g)| g.notifications.iter().position(|n| n.id == id).map(|ni| (gi, ni)))?;

        let (_, group) = self.groups.get_index_mut(group_index)?;
        let notification = group.notifications.remove(index_in_group);
        let key = group.key.clone();
        let expanded = group.expanded;
        let group_removed = group.notifications.is_empty();
        if group_removed {
            self.groups.shift_remove_index(group_index);
        }

        Some((
            Placement {
                key,
                group_index,
                index_in_group,
                expanded,
                group_removed,
            },
            notification,
        ))
    }

    /// Undo [`Groups::remove`]: put `notification` back into its group by
    /// update time, recreating the group at its old position and with its
    /// old expanded flag if it was deleted.
    pub fn restore_at(&mut self, placement: &Placement, notification: Notification) {
        if let Some(group) = self.groups.get_mut(&placement.key) {
            if let Some(existing) = group.notifications.iter_mut().find(|n| n.id == notification.id) {
                *existing = notification;
                return;
            }
            let idx = insertion_index(&group.notifications, &notification, placement.index_in_group);
            group.notifications.insert(idx, notification);
            return;
        }

        let idx = placement.group_index.min(self.groups.len());
        self.groups.shift_insert(
            idx,
            placement.key.clone(),
            NotificationGroup {
                key: placement.key.clone(),
                notifications: vec![notification],
                expanded: placement.expanded,
            },
        );
    }

    /// Insert a record with no known placement: into its group by update
    /// time, or as a fresh expanded group at the end.
    pub fn insert(&mut self, notification: Notification) {
        let key = notification.group_key();
        if let Some(group) = self.groups.get_mut(&key) {
            if group.notifications.iter().any(|n| n.id == notification.id) {
                return;
            }
            let idx = insertion_index(&group.notifications, &notification, group.notifications.len());
            group.notifications.insert(idx, notification);
            return;
        }
        self.groups.insert(
            key.clone(),
            NotificationGroup {
                key,
                notifications: vec![notification],
                expanded: true,
            },
        );
    }

    /// Number of rows [`Groups::flatten`] would produce.
    pub fn flat_len(&self) -> usize {
        self.groups
            .values()
            .map(|g| 1 + if g.expanded { g.notifications.len() } else { 0 })
            .sum()
    }

    /// Header for every group, then its records when expanded.
    pub fn flatten(&self) -> Vec<ListEntry> {
        let mut out = Vec::with_capacity(self.flat_len());
        for group in self.groups.values() {
            out.push(ListEntry::Group {
                key: group.key.clone(),
                count: group.notifications.len(),
                expanded: group.expanded,
            });
            if group.expanded {
                out.extend(group.notifications.iter().cloned().map(ListEntry::Notification));
            }
        }
        out
    }

    /// Row at `index` of the flattened list, without building it.
    pub fn entry_at(&self, index: usize) -> Option<ListEntry> {
        let mut remaining = index;
        for group in self.groups.values() {
            if remaining == 0 {
                return Some(ListEntry::Group {
                    key: group.key.clone(),
                    count: group.notifications.len(),
                    expanded: group.expanded,
                });
            }
            remaining -= 1;
            if group.expanded {
                if let Some(n) = group.notifications.get(remaining) {
                    return Some(ListEntry::Notification(n.clone()));
                }
                remaining -= group.notifications.len();
            }
        }
        None
    }

    /// Flat index of the header of group `key`.
    pub fn header_index(&self, key: &str) -> Option<usize> {
        let mut idx = 0;
        for group in self.groups.values() {
            if group.key == key {
                return Some(idx);
            }
            idx += 1 + if group.expanded { group.notifications.len() } else { 0 };
        }
        None
    }
}
