pub mod engine;
pub mod model;
pub mod position;
pub mod view;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use engine::{
    apply_drag, plan_changes, plan_drop, ColumnPosition, DragItem, DragSession, DropTarget,
    PositionPlan, TaskPosition,
};
pub use model::{Board, BoardSnapshot, Column, ColumnWithTasks, Task};
pub use view::{BoardView, ViewState};
