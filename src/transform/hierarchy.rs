//! Task hierarchy reconstruction from outline levels.
//!
//! Tasks sort by `task_index`; an ancestor stack keyed by `outline_level`
//! finds each task's parent. The emitted order is the sorted order, so row
//! creation proceeds parent-before-child by construction.

use crate::source::models::ProjectTask;

/// One task in emission order with the index (into the same vector) of its
/// parent, if any.
#[derive(Debug)]
pub struct OrderedTask<'a> {
    pub task: &'a ProjectTask,
    pub parent: Option<usize>,
}

/// Order tasks for loading and resolve each task's nearest ancestor.
///
/// Outline levels may skip (0 → 2); the parent is the nearest preceding task
/// with a strictly lower level. A level-0 task (or one with no such
/// ancestor) is a root.
pub fn order_tasks(tasks: &[ProjectTask]) -> Vec<OrderedTask<'_>> {
    let mut sorted: Vec<&ProjectTask> = tasks.iter().collect();
    sorted.sort_by_key(|t| t.task_index);

    let mut out: Vec<OrderedTask> = Vec::with_capacity(sorted.len());
    // (outline_level, index into out)
    let mut stack: Vec<(u32, usize)> = Vec::new();

    for task in sorted {
        while stack
            .last()
            .is_some_and(|(level, _)| *level >= task.outline_level)
        {
            stack.pop();
        }
        let parent = stack.last().map(|(_, idx)| *idx);
        let idx = out.len();
        out.push(OrderedTask { task, parent });
        stack.push((task.outline_level, idx));
    }
    out
}
