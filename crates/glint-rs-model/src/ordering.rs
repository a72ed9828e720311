use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use glint_rs_config::SortMode;

use crate::snapshot::Snapshot;

/// Total order over one pass's visible entities.
///
/// Default mode sorts by case-insensitive name. Custom mode sorts by
/// position in the persisted order; entities missing from it go last, by
/// name. With section grouping on, the section id is compared first in
/// both modes.
#[derive(Debug, Clone, Copy)]
pub struct OrderingPolicy<'a> {
    pub mode: SortMode,
    pub custom_order: &'a [String],
    pub group_sections: bool,
}

/// What the comparator sees of one entity
#[derive(Debug)]
struct Rank<'s> {
    section: u8,
    position: Option<usize>,
    name: &'s str,
}

impl<'a> OrderingPolicy<'a> {
    fn uses_custom_order(&self) -> bool {
        self.mode == SortMode::Custom && !self.custom_order.is_empty()
    }

    fn compare(&self, a: &Rank<'_>, b: &Rank<'_>) -> Ordering {
        if self.group_sections && a.section != b.section {
            return a.section.cmp(&b.section);
        }

        if self.uses_custom_order() {
            match (a.position, b.position) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.name.cmp(b.name),
            }
        } else {
            a.name.cmp(b.name)
        }
    }

    /// Stable-sort `items` using only `snapshot`.
    ///
    /// Items without a snapshot entry sort after every classified item.
    pub fn sort<T, K, I, F>(&self, items: Vec<T>, key_of: F, snapshot: &Snapshot<K, I>) -> Vec<T>
    where
        K: Eq + Hash + Display,
        F: Fn(&T) -> K,
    {
        // A key listed twice keeps its first position.
        let mut positions: HashMap<&str, usize> = HashMap::new();
        if self.uses_custom_order() {
            for (index, key) in self.custom_order.iter().enumerate() {
                positions.entry(key.as_str()).or_insert(index);
            }
        }

        let mut ranked: Vec<(Rank<'_>, T)> = items
            .into_iter()
            .map(|item| {
                let key = key_of(&item);
                let rank = match snapshot.get(&key) {
                    Some(entry) => Rank {
                        section: entry.class.section,
                        position: positions.get(key.to_string().as_str()).copied(),
                        name: entry.class.sort_key.as_str(),
                    },
                    None => Rank { section: u8::MAX, position: None, name: "" },
                };
                (rank, item)
            })
            .collect();

        ranked.sort_by(|(a, _), (b, _)| self.compare(a, b));
        ranked.into_iter().map(|(_, item)| item).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Classification, SnapshotEntry};

    fn snapshot(entries: &[(&str, u8, &str)]) -> Snapshot<String, ()> {
        entries
            .iter()
            .map(|(key, section, name)| {
                (
                    key.to_string(),
                    SnapshotEntry { class: Classification::new(*section, "", name), item: () },
                )
            })
            .collect()
    }

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn policy(mode: SortMode, custom_order: &[String], group_sections: bool) -> OrderingPolicy<'_> {
        OrderingPolicy { mode, custom_order, group_sections }
    }

    #[test]
    fn test_default_mode_is_alphabetical() {
        let snap = snapshot(&[("a", 0, "Zeta"), ("b", 0, "Apple"), ("c", 0, "Mango")]);
        let sorted = policy(SortMode::Default, &[], false).sort(keys(&["a", "b", "c"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["b", "c", "a"]));
    }

    #[test]
    fn test_alphabetical_ignores_case() {
        let snap = snapshot(&[("a", 0, "beta"), ("b", 0, "Alpha"), ("c", 0, "ALPINE")]);
        let sorted = policy(SortMode::Default, &[], false).sort(keys(&["a", "b", "c"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["b", "c", "a"]));
    }

    #[test]
    fn test_custom_order_puts_unlisted_last() {
        let snap = snapshot(&[("a", 0, "Zeta"), ("b", 0, "Apple"), ("c", 0, "Mango")]);
        let order = keys(&["c", "a"]);
        let sorted = policy(SortMode::Custom, &order, false).sort(keys(&["a", "b", "c"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["c", "a", "b"]));
    }

    #[test]
    fn test_unlisted_entries_sort_by_name() {
        let snap = snapshot(&[("a", 0, "Zeta"), ("b", 0, "Apple"), ("c", 0, "Mango"), ("d", 0, "Kiwi")]);
        let order = keys(&["gone", "c"]);
        let sorted = policy(SortMode::Custom, &order, false).sort(keys(&["a", "b", "c", "d"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["c", "b", "d", "a"]));
    }

    #[test]
    fn test_empty_custom_order_falls_back_to_alphabetical() {
        let snap = snapshot(&[("a", 0, "Zeta"), ("b", 0, "Apple")]);
        let sorted = policy(SortMode::Custom, &[], false).sort(keys(&["a", "b"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["b", "a"]));
    }

    #[test]
    fn test_sections_group_before_order() {
        let snap = snapshot(&[("a", 2, "Apple"), ("b", 0, "Zeta"), ("c", 1, "Mango"), ("d", 0, "Kiwi")]);
        let sorted = policy(SortMode::Default, &[], true).sort(keys(&["a", "b", "c", "d"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["d", "b", "c", "a"]));

        let order = keys(&["a", "b", "c", "d"]);
        let sorted = policy(SortMode::Custom, &order, true).sort(keys(&["a", "b", "c", "d"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["b", "d", "c", "a"]));
    }

    #[test]
    fn test_equal_keys_keep_input_order() {
        let snap = snapshot(&[("x1", 0, "Same"), ("x2", 0, "same"), ("x3", 0, "SAME")]);
        let input = keys(&["x3", "x1", "x2"]);

        let sorted = policy(SortMode::Default, &[], true).sort(input.clone(), |k| k.clone(), &snap);
        assert_eq!(sorted, input);

        let order = keys(&["other"]);
        let sorted = policy(SortMode::Custom, &order, false).sort(input.clone(), |k| k.clone(), &snap);
        assert_eq!(sorted, input);
    }

    #[test]
    fn test_duplicate_custom_entries_use_first_position() {
        let snap = snapshot(&[("a", 0, "A"), ("b", 0, "B")]);
        let order = keys(&["b", "a", "b"]);
        let sorted = policy(SortMode::Custom, &order, false).sort(keys(&["a", "b"]), |k| k.clone(), &snap);
        assert_eq!(sorted, keys(&["b", "a"]));
    }

    #[test]
    fn test_numeric_keys_match_persisted_strings() {
        let snap: Snapshot<u32, ()> = [(10u32, "Ten"), (2, "Two"), (7, "Seven")]
            .into_iter()
            .map(|(id, name)| (id, SnapshotEntry { class: Classification::new(0, "", name), item: () }))
            .collect();
        let order = keys(&["7", "10"]);
        let sorted = policy(SortMode::Custom, &order, false).sort(vec![2u32, 10, 7], |id| *id, &snap);
        assert_eq!(sorted, vec![7, 10, 2]);
    }
}
