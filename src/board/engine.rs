//! Reorder/move engine.
//!
//! Pure functions over [`BoardSnapshot`]: a drag gesture produces a new
//! snapshot for rendering, and on drop a [`PositionPlan`] describing every
//! row whose position or column changed.

use tracing::debug;

use super::model::BoardSnapshot;
use super::position::{move_item, renumber};

/// The item being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    Task(String),
    Column(String),
}

/// What the dragged item is currently over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Task(String),
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPosition {
    pub column_id: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPosition {
    pub task_id: String,
    pub column_id: String,
    pub position: i32,
}

/// Rows to rewrite after a drop. Each list holds every sibling of an
/// affected collection, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionPlan {
    pub board_id: String,
    pub columns: Vec<ColumnPosition>,
    pub tasks: Vec<TaskPosition>,
}

impl PositionPlan {
    pub fn new(board_id: impl Into<String>) -> Self {
        PositionPlan {
            board_id: board_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len() + self.tasks.len()
    }
}

/// Apply one drag-over transition. Returns `None` when the combination has
/// no defined transition or nothing would change.
pub fn apply_drag(
    snapshot: &BoardSnapshot,
    active: &DragItem,
    over: &DropTarget,
) -> Option<BoardSnapshot> {
    match (active, over) {
        (DragItem::Task(active_id), DropTarget::Task(over_id)) => {
            if active_id == over_id {
                return None;
            }
            task_over_task(snapshot, active_id, over_id)
        }
        (DragItem::Task(active_id), DropTarget::Column(column_id)) => {
            task_over_column(snapshot, active_id, column_id)
        }
        (DragItem::Column(active_id), DropTarget::Column(over_id)) => {
            if active_id == over_id {
                return None;
            }
            column_over_column(snapshot, active_id, over_id)
        }
        (DragItem::Column(_), DropTarget::Task(_)) => None,
    }
}

fn task_over_task(snapshot: &BoardSnapshot, active_id: &str, over_id: &str) -> Option<BoardSnapshot> {
    let (source, from) = snapshot.locate_task(active_id)?;
    let (dest, to) = snapshot.locate_task(over_id)?;
    let mut next = snapshot.clone();

    if source == dest {
        let tasks = &mut next.columns[source].tasks;
        move_item(tasks, from, to);
        renumber(tasks);
        debug!(task = active_id, from, to, "reordered task within column");
    } else {
        let mut task = next.columns[source].tasks.remove(from);
        task.column_id = next.columns[dest].column.id.clone();
        next.columns[dest].tasks.insert(to, task);
        renumber(&mut next.columns[source].tasks);
        renumber(&mut next.columns[dest].tasks);
        debug!(task = active_id, to, "moved task into another column");
    }

    Some(next)
}

fn task_over_column(snapshot: &BoardSnapshot, active_id: &str, column_id: &str) -> Option<BoardSnapshot> {
    let (source, from) = snapshot.locate_task(active_id)?;
    let dest = snapshot.column_index(column_id)?;
    if source == dest {
        return None;
    }

    let mut next = snapshot.clone();
    let mut task = next.columns[source].tasks.remove(from);
    task.column_id = column_id.to_string();
    next.columns[dest].tasks.push(task);
    renumber(&mut next.columns[source].tasks);
    renumber(&mut next.columns[dest].tasks);
    debug!(task = active_id, column = column_id, "appended task to column");

    Some(next)
}

fn column_over_column(snapshot: &BoardSnapshot, active_id: &str, over_id: &str) -> Option<BoardSnapshot> {
    let from = snapshot.column_index(active_id)?;
    let to = snapshot.column_index(over_id)?;

    let mut next = snapshot.clone();
    move_item(&mut next.columns, from, to);
    renumber(&mut next.columns);
    debug!(column = active_id, from, to, "reordered column");

    Some(next)
}

/// Every row of `current` whose collection changed since `origin`.
///
/// A column list that changed order is emitted in full; a task list that
/// gained, lost or reordered tasks is emitted in full.
pub fn plan_changes(origin: &BoardSnapshot, current: &BoardSnapshot) -> PositionPlan {
    let mut plan = PositionPlan::new(current.board.id.clone());

    if origin.column_ids() != current.column_ids() {
        plan.columns = current
            .columns
            .iter()
            .enumerate()
            .map(|(index, entry)| ColumnPosition {
                column_id: entry.column.id.clone(),
                position: index as i32,
            })
            .collect();
    }

    for entry in &current.columns {
        if origin.task_ids(&entry.column.id) == current.task_ids(&entry.column.id) {
            continue;
        }
        plan.tasks.extend(entry.tasks.iter().enumerate().map(|(index, task)| TaskPosition {
            task_id: task.id.clone(),
            column_id: entry.column.id.clone(),
            position: index as i32,
        }));
    }

    plan
}

/// Single-step drop: the resulting snapshot and the rows to persist.
pub fn plan_drop(
    snapshot: &BoardSnapshot,
    active: &DragItem,
    over: &DropTarget,
) -> Option<(BoardSnapshot, PositionPlan)> {
    let next = apply_drag(snapshot, active, over)?;
    let plan = plan_changes(snapshot, &next);
    Some((next, plan))
}

/// An in-progress gesture: the snapshot at drag start plus the optimistic
/// snapshot after every drag-over event so far.
#[derive(Debug, Clone)]
pub struct DragSession {
    active: DragItem,
    origin: BoardSnapshot,
    current: BoardSnapshot,
    last_over: Option<DropTarget>,
}

impl DragSession {
    /// Start dragging `active`. Returns `None` if the item is not on the board.
    pub fn start(snapshot: BoardSnapshot, active: DragItem) -> Option<Self> {
        let present = match &active {
            DragItem::Task(id) => snapshot.locate_task(id).is_some(),
            DragItem::Column(id) => snapshot.column_index(id).is_some(),
        };
        if !present {
            return None;
        }

        Some(DragSession {
            active,
            current: snapshot.clone(),
            origin: snapshot,
            last_over: None,
        })
    }

    pub fn active(&self) -> &DragItem {
        &self.active
    }

    pub fn origin(&self) -> &BoardSnapshot {
        &self.origin
    }

    pub fn current(&self) -> &BoardSnapshot {
        &self.current
    }

    /// Handle a drag-over event. Transitions are not idempotent, so an
    /// event for the same target as the previous one is ignored. Returns
    /// whether the optimistic snapshot changed.
    pub fn over(&mut self, target: DropTarget) -> bool {
        if self.last_over.as_ref() == Some(&target) {
            return false;
        }
        let next = apply_drag(&self.current, &self.active, &target);
        self.last_over = Some(target);
        match next {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }

    /// End the gesture on `target`, returning the final optimistic snapshot
    /// and the rows to persist.
    pub fn finish(mut self, target: DropTarget) -> (BoardSnapshot, PositionPlan) {
        self.over(target);
        let plan = plan_changes(&self.origin, &self.current);
        (self.current, plan)
    }

    /// Abandon the gesture, returning the snapshot it started from.
    pub fn cancel(self) -> BoardSnapshot {
        self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::snapshot;
    use crate::board::position::is_dense;

    fn task(id: &str) -> DragItem {
        DragItem::Task(id.to_string())
    }

    fn column(id: &str) -> DragItem {
        DragItem::Column(id.to_string())
    }

    fn over_task(id: &str) -> DropTarget {
        DropTarget::Task(id.to_string())
    }

    fn over_column(id: &str) -> DropTarget {
        DropTarget::Column(id.to_string())
    }

    fn assert_dense(snapshot: &BoardSnapshot) {
        assert!(is_dense(&snapshot.columns));
        for entry in &snapshot.columns {
            assert!(is_dense(&entry.tasks), "column {} not dense", entry.column.id);
            for task in &entry.tasks {
                assert_eq!(task.column_id, entry.column.id);
            }
        }
    }

    #[test]
    fn test_task_over_task_same_column() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &[])]);

        let next = apply_drag(&board, &task("t1"), &over_task("t2")).unwrap();

        assert_eq!(next.task_ids("A"), vec!["t2", "t1"]);
        assert_eq!(next.task("t2").unwrap().position, 0);
        assert_eq!(next.task("t1").unwrap().position, 1);
        assert_dense(&next);
    }

    #[test]
    fn test_same_column_move_matches_remove_and_insert() {
        let ids = ["t0", "t1", "t2", "t3", "t4"];
        let board = snapshot(&[("A", &ids[..])]);

        for from in 0..ids.len() {
            for to in 0..ids.len() {
                if from == to {
                    continue;
                }
                let next = apply_drag(&board, &task(ids[from]), &over_task(ids[to])).unwrap();

                let mut expected = ids.to_vec();
                let moved = expected.remove(from);
                expected.insert(to, moved);

                assert_eq!(next.task_ids("A"), expected, "from {} to {}", from, to);
                assert_dense(&next);
            }
        }
    }

    #[test]
    fn test_task_over_task_other_column() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &["u1", "u2"])]);

        let next = apply_drag(&board, &task("t1"), &over_task("u2")).unwrap();

        assert_eq!(next.task_ids("A"), vec!["t2"]);
        assert_eq!(next.task_ids("B"), vec!["u1", "t1", "u2"]);
        assert_eq!(next.task("t1").unwrap().column_id, "B");
        assert_dense(&next);
    }

    #[test]
    fn test_task_over_empty_column_appends() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &[])]);

        let next = apply_drag(&board, &task("t1"), &over_column("B")).unwrap();

        assert_eq!(next.task_ids("A"), vec!["t2"]);
        assert_eq!(next.task_ids("B"), vec!["t1"]);
        assert_eq!(next.task("t2").unwrap().position, 0);
        assert_eq!(next.task("t1").unwrap().position, 0);
        assert_eq!(next.task("t1").unwrap().column_id, "B");
    }

    #[test]
    fn test_task_over_column_appends_to_end() {
        let board = snapshot(&[("A", &["t1"]), ("B", &["u1", "u2"])]);

        let next = apply_drag(&board, &task("t1"), &over_column("B")).unwrap();

        assert_eq!(next.task_ids("B"), vec!["u1", "u2", "t1"]);
        assert_eq!(next.task("t1").unwrap().position, 2);
        assert!(next.task_ids("A").is_empty());
    }

    #[test]
    fn test_task_over_own_column_is_noop() {
        let board = snapshot(&[("A", &["t1", "t2"])]);
        assert!(apply_drag(&board, &task("t1"), &over_column("A")).is_none());
    }

    #[test]
    fn test_column_reorder_is_permutation() {
        let board = snapshot(&[("A", &["t1"]), ("B", &[]), ("C", &["u1"])]);

        let next = apply_drag(&board, &column("A"), &over_column("C")).unwrap();

        assert_eq!(next.column_ids(), vec!["B", "C", "A"]);
        let mut before = board.column_ids();
        let mut after = next.column_ids();
        before.sort();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(next.task_ids("A"), vec!["t1"]);
        assert_dense(&next);
    }

    #[test]
    fn test_noop_and_unhandled_combinations() {
        let board = snapshot(&[("A", &["t1"]), ("B", &[])]);

        assert!(apply_drag(&board, &task("t1"), &over_task("t1")).is_none());
        assert!(apply_drag(&board, &column("A"), &over_column("A")).is_none());
        assert!(apply_drag(&board, &column("A"), &over_task("t1")).is_none());
        assert!(apply_drag(&board, &task("missing"), &over_column("B")).is_none());
        assert!(apply_drag(&board, &task("t1"), &over_column("missing")).is_none());
    }

    #[test]
    fn test_plan_same_column_renumbers_column_only() {
        let board = snapshot(&[("A", &["t1", "t2", "t3"]), ("B", &["u1"])]);

        let (_, plan) = plan_drop(&board, &task("t3"), &over_task("t1")).unwrap();

        assert!(plan.columns.is_empty());
        let rows: Vec<(&str, &str, i32)> = plan
            .tasks
            .iter()
            .map(|row| (row.task_id.as_str(), row.column_id.as_str(), row.position))
            .collect();
        assert_eq!(rows, vec![("t3", "A", 0), ("t1", "A", 1), ("t2", "A", 2)]);
    }

    #[test]
    fn test_plan_cross_column_renumbers_both_columns() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &["u1"]), ("C", &["v1"])]);

        let (_, plan) = plan_drop(&board, &task("t1"), &over_task("u1")).unwrap();

        assert!(plan.columns.is_empty());
        let rows: Vec<(&str, &str, i32)> = plan
            .tasks
            .iter()
            .map(|row| (row.task_id.as_str(), row.column_id.as_str(), row.position))
            .collect();
        assert_eq!(rows, vec![("t2", "A", 0), ("t1", "B", 0), ("u1", "B", 1)]);
    }

    #[test]
    fn test_plan_column_reorder() {
        let board = snapshot(&[("A", &["t1"]), ("B", &[])]);

        let (_, plan) = plan_drop(&board, &column("B"), &over_column("A")).unwrap();

        assert!(plan.tasks.is_empty());
        assert_eq!(
            plan.columns,
            vec![
                ColumnPosition { column_id: "B".into(), position: 0 },
                ColumnPosition { column_id: "A".into(), position: 1 },
            ]
        );
        assert_eq!(plan.board_id, board.board.id);
    }

    #[test]
    fn test_session_ignores_repeated_target() {
        let board = snapshot(&[("A", &["t1", "t2", "t3"])]);
        let mut session = DragSession::start(board, task("t1")).unwrap();

        assert!(session.over(over_task("t2")));
        assert!(!session.over(over_task("t2")));
        assert_eq!(session.current().task_ids("A"), vec!["t2", "t1", "t3"]);

        assert!(session.over(over_task("t3")));
        assert_eq!(session.current().task_ids("A"), vec!["t2", "t3", "t1"]);
    }

    #[test]
    fn test_session_plan_spans_all_drag_over_events() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &["u1"]), ("C", &[])]);
        let mut session = DragSession::start(board, task("t1")).unwrap();

        session.over(over_task("u1"));
        session.over(over_column("C"));
        let (next, plan) = session.finish(over_column("C"));

        assert_eq!(next.task_ids("A"), vec!["t2"]);
        assert_eq!(next.task_ids("B"), vec!["u1"]);
        assert_eq!(next.task_ids("C"), vec!["t1"]);

        let touched: Vec<&str> = plan.tasks.iter().map(|row| row.task_id.as_str()).collect();
        assert_eq!(touched, vec!["t2", "t1"]);
    }

    #[test]
    fn test_session_cancel_restores_origin() {
        let board = snapshot(&[("A", &["t1", "t2"])]);
        let mut session = DragSession::start(board.clone(), task("t1")).unwrap();
        session.over(over_task("t2"));

        assert_ne!(session.current(), &board);
        assert_eq!(session.cancel(), board);
    }

    #[test]
    fn test_session_requires_known_item() {
        let board = snapshot(&[("A", &["t1"])]);
        assert!(DragSession::start(board.clone(), task("nope")).is_none());
        assert!(DragSession::start(board, column("nope")).is_none());
    }

    #[test]
    fn test_drop_back_on_origin_produces_empty_plan() {
        let board = snapshot(&[("A", &["t1", "t2"]), ("B", &[])]);
        let mut session = DragSession::start(board, task("t1")).unwrap();

        session.over(over_column("B"));
        session.over(over_task("t2"));
        let (next, plan) = session.finish(over_task("t2"));

        assert_eq!(next.task_ids("A"), vec!["t1", "t2"]);
        assert!(next.task_ids("B").is_empty());
        assert!(plan.is_empty());
    }
}
