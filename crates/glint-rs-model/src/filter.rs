use std::collections::HashSet;
use std::hash::Hash;

/// Decides which entities of the full collection a projection exposes.
///
/// An entity stays visible once it has been shown, even if its hidden flag
/// flips later; it only goes away when the policy changes or the entity
/// leaves the store.
pub struct VisibilityFilter<'a, K> {
    pub show_hidden: bool,
    pub previously_visible: &'a HashSet<K>,
    /// Folder members, when a folder is open
    pub scope: Option<&'a HashSet<K>>,
}

impl<'a, K: Eq + Hash> VisibilityFilter<'a, K> {
    pub fn is_visible(&self, key: &K, hidden: bool) -> bool {
        let passes_policy = self.show_hidden || !hidden || self.previously_visible.contains(key);
        let in_scope = self.scope.map_or(true, |members| members.contains(key));
        passes_policy && in_scope
    }

    /// Keep the visible entities, preserving input order
    pub fn apply<T, FK, FH>(&self, items: Vec<T>, key_of: FK, is_hidden: FH) -> Vec<T>
    where
        FK: Fn(&T) -> K,
        FH: Fn(&T) -> bool,
    {
        items
            .into_iter()
            .filter(|item| self.is_visible(&key_of(item), is_hidden(item)))
            .collect()
    }
}
