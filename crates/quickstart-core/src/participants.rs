use std::collections::HashMap;

use crate::events::Uid;

/// Maps engine participant identities to numeric uids.
///
/// Identities that already are a non-zero `u32` keep that value; anything
/// else gets the next free uid. A uid stays assigned until `remove`.
#[derive(Debug, Clone)]
pub struct UidRegistry {
    by_identity: HashMap<String, Uid>,
    next: Uid,
}

impl UidRegistry {
    pub fn new() -> Self {
        Self {
            by_identity: HashMap::new(),
            next: 1,
        }
    }

    pub fn assign(&mut self, identity: &str) -> Uid {
        if let Some(uid) = self.by_identity.get(identity) {
            return *uid;
        }
        let uid = match identity.parse::<Uid>() {
            Ok(n) if n != 0 && !self.is_taken(n) => n,
            _ => self.next_free(),
        };
        self.by_identity.insert(identity.to_string(), uid);
        uid
    }

    pub fn get(&self, identity: &str) -> Option<Uid> {
        self.by_identity.get(identity).copied()
    }

    /// Every assigned uid, ascending.
    pub fn uids(&self) -> Vec<Uid> {
        let mut uids: Vec<Uid> = self.by_identity.values().copied().collect();
        uids.sort_unstable();
        uids
    }

    pub fn remove(&mut self, identity: &str) -> Option<Uid> {
        self.by_identity.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_identity.clear();
        self.next = 1;
    }

    fn is_taken(&self, uid: Uid) -> bool {
        self.by_identity.values().any(|u| *u == uid)
    }

    fn next_free(&mut self) -> Uid {
        loop {
            let candidate = self.next;
            self.next = self.next.checked_add(1).unwrap_or(1);
            if candidate != 0 && !self.is_taken(candidate) {
                return candidate;
            }
        }
    }
}

impl Default for UidRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_identity_keeps_value() {
        let mut reg = UidRegistry::new();
        assert_eq!(reg.assign("1234"), 1234);
        assert_eq!(reg.get("1234"), Some(1234));
    }

    #[test]
    fn names_get_sequential_uids() {
        let mut reg = UidRegistry::new();
        assert_eq!(reg.assign("alice"), 1);
        assert_eq!(reg.assign("bob"), 2);
        assert_eq!(reg.assign("alice"), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn taken_values_are_skipped() {
        let mut reg = UidRegistry::new();
        assert_eq!(reg.assign("1"), 1);
        assert_eq!(reg.assign("carol"), 2);
        // "2" is numeric but already used by carol.
        assert_eq!(reg.assign("2"), 3);
        assert_eq!(reg.assign("0"), 4);
    }

    #[test]
    fn remove_frees_identity() {
        let mut reg = UidRegistry::new();
        let uid = reg.assign("dave");
        assert_eq!(reg.uids(), vec![uid]);
        assert_eq!(reg.remove("dave"), Some(uid));
        assert_eq!(reg.get("dave"), None);
        assert!(reg.is_empty());
    }

    #[test]
    fn uids_are_sorted() {
        let mut reg = UidRegistry::new();
        reg.assign("900");
        reg.assign("erin");
        reg.assign("42");
        assert_eq!(reg.uids(), vec![1, 42, 900]);
    }

    #[test]
    fn clear_resets_counter() {
        let mut reg = UidRegistry::new();
        reg.assign("a");
        reg.assign("b");
        reg.clear();
        assert_eq!(reg.assign("c"), 1);
    }
}
