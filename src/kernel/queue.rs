use std::collections::VecDeque;

use super::{Pid, ProcessState, ProcessTable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueNode {
    pub id: Pid,
    pub priority: f32,
    /// Display copy of the PCB state; the table stays authoritative.
    pub cached_state: ProcessState,
}

/// Ordered list of process ids, used both as the ready queue and as the
/// list of all live processes.
///
/// Missing ids and empty queues are never errors: removals are no-ops and
/// searches return `None`. Inserting an id that is already present is
/// refused.
#[derive(Debug, Default)]
pub struct ProcessQueue {
    nodes: VecDeque<QueueNode>,
}

impl ProcessQueue {
    pub fn new() -> ProcessQueue {
        ProcessQueue {
            nodes: VecDeque::new(),
        }
    }

    /// Inserts keeping priorities in descending order. Equal priorities
    /// keep their arrival order.
    pub fn insert_sorted(&mut self, id: Pid, priority: f32, state: ProcessState) -> bool {
        if self.contains(id) {
            return false;
        }

        let position = self
            .nodes
            .iter()
            .position(|node| node.priority < priority)
            .unwrap_or(self.nodes.len());

        self.nodes.insert(
            position,
            QueueNode {
                id,
                priority,
                cached_state: state,
            },
        );
        true
    }

    pub fn insert_at_end(&mut self, id: Pid, priority: f32, state: ProcessState) -> bool {
        if self.contains(id) {
            return false;
        }

        self.nodes.push_back(QueueNode {
            id,
            priority,
            cached_state: state,
        });
        true
    }

    /// Removes the first node with `id`.
    pub fn remove(&mut self, id: Pid) -> Option<QueueNode> {
        let position = self.nodes.iter().position(|node| node.id == id)?;
        self.nodes.remove(position)
    }

    /// Drops every node whose process is no longer live in `table`.
    /// Returns the evicted ids.
    pub fn evict_dead(&mut self, table: &ProcessTable) -> Vec<Pid> {
        let mut evicted = Vec::new();

        self.nodes.retain(|node| {
            let alive = table.is_alive(node.id);
            if !alive {
                evicted.push(node.id);
            }
            alive
        });

        evicted
    }

    pub fn search(&self, id: Pid) -> Option<&QueueNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn set_cached_state(&mut self, id: Pid, state: ProcessState) {
        if let Some(node) = self.nodes.iter_mut().find(|node| node.id == id) {
            node.cached_state = state;
        }
    }

    pub fn contains(&self, id: Pid) -> bool {
        self.search(id).is_some()
    }

    pub fn front(&self) -> Option<&QueueNode> {
        self.nodes.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueNode> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> Vec<Pid> {
        self.nodes.iter().map(|node| node.id).collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
