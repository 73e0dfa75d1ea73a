use std::collections::HashMap;

use crate::native::AttendeeId;

const NAME_DELIMITER: char = '#';

/// Display name encoded in an external user id such as `c19587e7#Alice`:
/// everything after the first `#`. `None` when there is no delimiter.
pub fn display_name_from_external_id(external_user_id: &str) -> Option<&str> {
    external_user_id
        .split_once(NAME_DELIMITER)
        .map(|(_, name)| name)
}

/// Attendee id to display name, filled on first join and scoped to one
/// state machine. Entries are never overwritten while the cache lives.
#[derive(Debug, Clone, Default)]
pub struct DisplayNameCache {
    names: HashMap<AttendeeId, String>,
}

impl DisplayNameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache the name for `attendee_id` unless one is already known.
    pub fn remember(&mut self, attendee_id: &str, external_user_id: &str) {
        if self.names.contains_key(attendee_id) {
            return;
        }
        if let Some(name) = display_name_from_external_id(external_user_id) {
            self.names.insert(attendee_id.to_string(), name.to_string());
        }
    }

    pub fn get(&self, attendee_id: &str) -> Option<&str> {
        self.names.get(attendee_id).map(String::as_str)
    }

    /// Name to render: the cached display name, else the raw attendee id.
    pub fn display_name<'a>(&'a self, attendee_id: &'a str) -> &'a str {
        match self.get(attendee_id) {
            Some(name) if !name.is_empty() => name,
            _ => attendee_id,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_suffix_after_first_delimiter() {
        assert_eq!(display_name_from_external_id("c19587e7#Alice"), Some("Alice"));
        assert_eq!(display_name_from_external_id("id#Bob#Jr"), Some("Bob#Jr"));
        assert_eq!(display_name_from_external_id("no-delimiter"), None);
    }

    #[test]
    fn first_join_wins() {
        let mut cache = DisplayNameCache::new();
        cache.remember("c19587e7", "c19587e7#Alice");
        cache.remember("c19587e7", "c19587e7#Mallory");
        assert_eq!(cache.get("c19587e7"), Some("Alice"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_or_unnamed_attendee_renders_its_id() {
        let mut cache = DisplayNameCache::new();
        cache.remember("a1", "plain");
        cache.remember("a2", "a2#");
        assert_eq!(cache.display_name("a1"), "a1");
        assert_eq!(cache.display_name("a2"), "a2");
        assert_eq!(cache.display_name("ghost"), "ghost");
    }

    #[test]
    fn clear_forgets_names() {
        let mut cache = DisplayNameCache::new();
        cache.remember("a1", "a1#Alice");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.display_name("a1"), "a1");
    }
}
