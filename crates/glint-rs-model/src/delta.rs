use std::collections::HashSet;
use std::hash::Hash;

/// One row of a visible projection
#[derive(Debug, Clone, PartialEq)]
pub struct Row<K, I> {
    pub key: K,
    pub section: u8,
    pub item: I,
}

/// Row contents that can report which observable fields changed
pub trait FieldDiff {
    type Field: Copy;

    /// Fields whose value differs between `self` and `newer`
    fn changed_fields(&self, newer: &Self) -> Vec<Self::Field>;
}

/// Smallest notification set that turns the previous projection into the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta<F> {
    /// Membership, grouping or order changed; the observer must re-read everything
    Reset,
    /// Same rows in the same order; only these `(index, field)` pairs changed
    Patch(Vec<(usize, F)>),
}

impl<F> Delta<F> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Delta::Patch(changes) if changes.is_empty())
    }
}

/// Compare two projections.
///
/// Membership changes, section changes (with grouping on) and any other
/// reorder all produce [`Delta::Reset`]; otherwise each row is compared
/// field by field.
pub fn diff<K, I>(
    previous: &[Row<K, I>],
    next: &[Row<K, I>],
    group_sections: bool,
) -> Delta<I::Field>
where
    K: Eq + Hash,
    I: FieldDiff,
{
    if previous.len() != next.len() {
        return Delta::Reset;
    }

    let old_keys: HashSet<&K> = previous.iter().map(|row| &row.key).collect();
    let new_keys: HashSet<&K> = next.iter().map(|row| &row.key).collect();
    if old_keys != new_keys {
        return Delta::Reset;
    }

    if group_sections {
        let sections_moved = previous.iter().any(|old| {
            next.iter()
                .find(|row| row.key == old.key)
                .is_some_and(|row| row.section != old.section)
        });
        if sections_moved {
            return Delta::Reset;
        }
    }

    if previous.iter().zip(next).any(|(old, new)| old.key != new.key) {
        return Delta::Reset;
    }

    let changes = previous
        .iter()
        .zip(next)
        .enumerate()
        .flat_map(|(index, (old, new))| {
            old.item
                .changed_fields(&new.item)
                .into_iter()
                .map(move |field| (index, field))
        })
        .collect();
    Delta::Patch(changes)
}

/// Move a single row the way `Vec::remove` + `Vec::insert` would
pub fn move_row<T>(rows: &mut Vec<T>, from: usize, to: usize) {
    let row = rows.remove(from);
    rows.insert(to, row);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        running: bool,
        name: &'static str,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Field {
        Running,
        Name,
    }

    impl FieldDiff for Item {
        type Field = Field;

        fn changed_fields(&self, newer: &Self) -> Vec<Field> {
            let mut fields = Vec::new();
            if self.running != newer.running {
                fields.push(Field::Running);
            }
            if self.name != newer.name {
                fields.push(Field::Name);
            }
            fields
        }
    }

    fn row(key: u32, section: u8, name: &'static str, running: bool) -> Row<u32, Item> {
        Row { key, section, item: Item { running, name } }
    }

    #[test]
    fn test_identical_projection_is_empty_patch() {
        let rows = vec![row(1, 0, "a", false), row(2, 0, "b", false)];
        let delta = diff(&rows, &rows.clone(), true);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_membership_change_resets() {
        let before = vec![row(1, 0, "a", false), row(2, 0, "b", false)];
        let added = vec![row(1, 0, "a", false), row(2, 0, "b", false), row(3, 0, "c", false)];
        let swapped = vec![row(1, 0, "a", false), row(3, 0, "c", false)];

        assert_eq!(diff(&before, &added, false), Delta::Reset);
        assert_eq!(diff(&before, &swapped, false), Delta::Reset);
    }

    #[test]
    fn test_section_change_resets_only_when_grouping() {
        let before = vec![row(1, 0, "a", false), row(2, 1, "b", false)];
        let after = vec![row(1, 0, "a", false), row(2, 2, "b", false)];

        assert_eq!(diff(&before, &after, true), Delta::Reset);
        assert!(diff(&before, &after, false).is_empty());
    }

    #[test]
    fn test_reorder_resets() {
        let before = vec![row(1, 0, "a", false), row(2, 0, "b", false)];
        let after = vec![row(2, 0, "b", false), row(1, 0, "a", false)];
        assert_eq!(diff(&before, &after, false), Delta::Reset);
    }

    #[test]
    fn test_field_changes_are_targeted() {
        let before = vec![row(1, 0, "a", true), row(2, 0, "b", false), row(3, 0, "c", false)];
        let after = vec![row(1, 0, "a", false), row(2, 0, "b", false), row(3, 0, "C", true)];

        assert_eq!(
            diff(&before, &after, false),
            Delta::Patch(vec![(0, Field::Running), (2, Field::Running), (2, Field::Name)])
        );
    }

    #[test]
    fn test_move_row() {
        let mut rows = vec!['a', 'b', 'c'];
        move_row(&mut rows, 0, 2);
        assert_eq!(rows, vec!['b', 'c', 'a']);
        move_row(&mut rows, 2, 0);
        assert_eq!(rows, vec!['a', 'b', 'c']);
    }
}
