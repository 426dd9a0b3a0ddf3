//! Dense integer ordering of siblings.
//!
//! Every structural change rewrites the position of every sibling in the
//! affected list, so a settled list always reads `0..n-1`.

use chrono::{DateTime, Utc};

pub trait Positioned {
    fn position(&self) -> i32;

    fn set_position(&mut self, position: i32);

    /// Secondary ordering for rows that share a position.
    fn tie_break(&self) -> (DateTime<Utc>, &str);
}

/// Assign `position = index` to every element.
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i32);
    }
}

/// Remove the element at `from` and reinsert it at `to`, shifting the
/// elements in between.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}

/// True when positions read exactly `0..n-1` in sequence order.
pub fn is_dense<T: Positioned>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| item.position() == index as i32)
}

/// Position for a sibling appended to the end of the list.
pub fn next_position<T: Positioned>(items: &[T]) -> i32 {
    items
        .iter()
        .map(|item| item.position() + 1)
        .max()
        .unwrap_or(0)
        .max(items.len() as i32)
}

/// Sort into display order. Duplicate positions are tolerated and fall back
/// to creation time, then id.
pub fn sort_by_position<T: Positioned>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.tie_break().cmp(&b.tie_break()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Clone)]
    struct Item {
        id: String,
        position: i32,
        created_at: DateTime<Utc>,
    }

    impl Positioned for Item {
        fn position(&self) -> i32 {
            self.position
        }

        fn set_position(&mut self, position: i32) {
            self.position = position;
        }

        fn tie_break(&self) -> (DateTime<Utc>, &str) {
            (self.created_at, &self.id)
        }
    }

    fn item(id: &str, position: i32, second: u32) -> Item {
        Item {
            id: id.to_string(),
            position,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap(),
        }
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn test_renumber_closes_gaps() {
        let mut items = vec![item("a", 3, 0), item("b", 7, 1), item("c", 7, 2)];
        renumber(&mut items);
        assert!(is_dense(&items));
        assert_eq!(ids(&items), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_item_matches_remove_then_insert() {
        for from in 0..5 {
            for to in 0..5 {
                let mut moved: Vec<usize> = (0..5).collect();
                move_item(&mut moved, from, to);

                let mut expected: Vec<usize> = (0..5).collect();
                let value = expected.remove(from);
                expected.insert(to, value);

                assert_eq!(moved, expected, "from {} to {}", from, to);
            }
        }
    }

    #[test]
    fn test_move_item_out_of_range_is_ignored() {
        let mut items = vec![1, 2, 3];
        move_item(&mut items, 5, 0);
        assert_eq!(items, vec![1, 2, 3]);

        move_item(&mut items, 0, 10);
        assert_eq!(items, vec![2, 3, 1]);
    }

    #[test]
    fn test_sort_tolerates_duplicate_positions() {
        let mut items = vec![item("late", 1, 5), item("first", 0, 9), item("early", 1, 1)];
        sort_by_position(&mut items);
        assert_eq!(ids(&items), vec!["first", "early", "late"]);
        assert!(!is_dense(&items));
    }

    #[test]
    fn test_next_position() {
        assert_eq!(next_position::<Item>(&[]), 0);
        assert_eq!(next_position(&[item("a", 0, 0), item("b", 1, 0)]), 2);
        assert_eq!(next_position(&[item("a", 4, 0)]), 5);
    }
}
