//! The trace tree rendered by a waterfall: spans linked by parent id,
//! flattened depth-first into the rows the list shows.

use std::collections::{HashMap, HashSet};

use crate::virtual_list::VirtualItem;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(transparent))]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// One span as delivered by a trace source. Timestamps are in milliseconds.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct SpanRecord {
    pub id: NodeId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<NodeId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub op: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub description: String,
    pub start_ms: f64,
    pub duration_ms: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub errors: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub performance_issues: Vec<f64>,
}

/// A visible row.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceNode {
    pub id: NodeId,
    pub depth: usize,
    /// `[start, duration]` in milliseconds.
    pub space: [f64; 2],
    pub op: String,
    pub description: String,
    pub errors: Vec<f64>,
    pub performance_issues: Vec<f64>,
    pub has_children: bool,
    pub expanded: bool,
}

impl TraceNode {
    pub fn end(&self) -> f64 {
        self.space[0] + self.space[1]
    }

    /// Span extent widened to cover its error and performance-issue icons,
    /// each `icon_width_ms` wide and centered on its timestamp.
    pub fn icon_timestamps(&self, icon_width_ms: f64) -> (f64, f64) {
        let half = icon_width_ms / 2.0;
        let mut min = self.space[0];
        let mut max = self.end();
        for timestamp in self.errors.iter().chain(&self.performance_issues) {
            min = min.min(timestamp - half);
            max = max.max(timestamp + half);
        }
        (min, max)
    }

    pub fn label(&self) -> String {
        match (self.op.is_empty(), self.description.is_empty()) {
            (false, false) => format!("{} - {}", self.op, self.description),
            (false, true) => self.op.clone(),
            (true, false) => self.description.clone(),
            (true, true) => format!("{}", self.id),
        }
    }
}

impl VirtualItem for TraceNode {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id
    }
}

#[cfg(feature = "serde")]
#[derive(Debug, thiserror::Error)]
pub enum TraceLoadError {
    #[error("invalid trace JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trace has no spans")]
    Empty,
}

#[derive(Clone, Debug, Default)]
pub struct TraceTree {
    records: Vec<SpanRecord>,
    roots: Vec<usize>,
    children: Vec<Vec<usize>>,
    collapsed: HashSet<NodeId>,
    list: Vec<TraceNode>,
    generation: u64,
}

impl TraceTree {
    pub fn from_spans(records: Vec<SpanRecord>) -> Self {
        let index: HashMap<NodeId, usize> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.id, idx))
            .collect();

        let mut roots = Vec::new();
        let mut children = vec![Vec::new(); records.len()];
        for (idx, record) in records.iter().enumerate() {
            match record.parent.and_then(|parent| index.get(&parent).copied()) {
                Some(parent) if parent != idx => children[parent].push(idx),
                _ => roots.push(idx),
            }
        }

        let by_start = |a: &usize, b: &usize| {
            records[*a]
                .start_ms
                .total_cmp(&records[*b].start_ms)
                .then_with(|| records[*a].id.cmp(&records[*b].id))
        };
        roots.sort_by(by_start);
        for list in &mut children {
            list.sort_by(by_start);
        }

        // Parent links that loop never reach a root; hang those spans off the top level.
        let mut reachable = vec![false; records.len()];
        let mut stack: Vec<usize> = roots.clone();
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut reachable[idx], true) {
                continue;
            }
            stack.extend(children[idx].iter().copied());
        }
        for idx in 0..records.len() {
            if !reachable[idx] {
                log::warn!("span {} is part of a parent cycle", records[idx].id);
                for list in &mut children {
                    list.retain(|child| *child != idx);
                }
                roots.push(idx);
                let mut stack = vec![idx];
                while let Some(idx) = stack.pop() {
                    if std::mem::replace(&mut reachable[idx], true) {
                        continue;
                    }
                    stack.extend(children[idx].iter().copied());
                }
            }
        }
        roots.sort_by(by_start);

        let mut tree = TraceTree {
            records,
            roots,
            children,
            collapsed: HashSet::new(),
            list: Vec::new(),
            generation: 0,
        };
        tree.rebuild();
        tree
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, TraceLoadError> {
        #[derive(serde::Deserialize)]
        struct Document {
            spans: Vec<SpanRecord>,
        }

        let document: Document = serde_json::from_str(json)?;
        if document.spans.is_empty() {
            return Err(TraceLoadError::Empty);
        }
        Ok(Self::from_spans(document.spans))
    }

    /// Visible rows in display order.
    pub fn list(&self) -> &[TraceNode] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Bumped whenever the visible rows change.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `[start, duration]` covering every span, or `None` for an empty tree.
    pub fn trace_space(&self) -> Option<[f64; 2]> {
        let start = self
            .records
            .iter()
            .map(|record| record.start_ms)
            .reduce(f64::min)?;
        let end = self
            .records
            .iter()
            .map(|record| record.start_ms + record.duration_ms)
            .reduce(f64::max)?;
        Some([start, (end - start).max(0.0)])
    }

    /// Collapses or expands the subtree below `id`. Returns the new expanded state.
    pub fn toggle_expanded(&mut self, id: NodeId) -> Option<bool> {
        let node = self.list.iter().find(|node| node.id == id)?;
        if !node.has_children {
            return None;
        }
        let expanded = if self.collapsed.remove(&id) {
            true
        } else {
            self.collapsed.insert(id);
            false
        };
        self.rebuild();
        Some(expanded)
    }

    fn rebuild(&mut self) {
        let mut list = Vec::with_capacity(self.records.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|idx| (*idx, 0)).collect();
        while let Some((idx, depth)) = stack.pop() {
            let record = &self.records[idx];
            let expanded = !self.collapsed.contains(&record.id);
            list.push(TraceNode {
                id: record.id,
                depth,
                space: [record.start_ms, record.duration_ms],
                op: record.op.clone(),
                description: record.description.clone(),
                errors: record.errors.clone(),
                performance_issues: record.performance_issues.clone(),
                has_children: !self.children[idx].is_empty(),
                expanded,
            });
            if expanded {
                stack.extend(self.children[idx].iter().rev().map(|child| (*child, depth + 1)));
            }
        }
        self.list = list;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(id: u64, parent: Option<u64>, start_ms: f64, duration_ms: f64) -> SpanRecord {
        SpanRecord {
            id: NodeId(id),
            parent: parent.map(NodeId),
            op: format!("op.{id}"),
            start_ms,
            duration_ms,
            ..Default::default()
        }
    }

    #[test]
    fn flattens_depth_first_by_start_time() {
        let tree = TraceTree::from_spans(vec![
            span(1, None, 0.0, 100.0),
            span(3, Some(1), 50.0, 10.0),
            span(2, Some(1), 10.0, 10.0),
            span(4, Some(2), 12.0, 2.0),
        ]);
        let order: Vec<(u64, usize)> = tree.list().iter().map(|n| (n.id.0, n.depth)).collect();
        assert_eq!(order, vec![(1, 0), (2, 1), (4, 2), (3, 1)]);
        assert_eq!(tree.trace_space(), Some([0.0, 100.0]));
    }

    #[test]
    fn collapse_hides_descendants() {
        let mut tree = TraceTree::from_spans(vec![
            span(1, None, 0.0, 100.0),
            span(2, Some(1), 10.0, 10.0),
            span(4, Some(2), 12.0, 2.0),
        ]);
        let generation = tree.generation();
        assert_eq!(tree.toggle_expanded(NodeId(2)), Some(false));
        assert_eq!(tree.len(), 2);
        assert!(tree.generation() > generation);
        assert_eq!(tree.toggle_expanded(NodeId(2)), Some(true));
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.toggle_expanded(NodeId(4)), None);
    }

    #[test]
    fn orphans_and_cycles_become_roots() {
        let tree = TraceTree::from_spans(vec![
            span(1, Some(99), 0.0, 10.0),
            span(2, Some(3), 5.0, 1.0),
            span(3, Some(2), 6.0, 1.0),
        ]);
        assert_eq!(tree.len(), 3);
        assert!(tree.list().iter().any(|n| n.id == NodeId(1) && n.depth == 0));
    }

    #[test]
    fn icon_timestamps_cover_errors() {
        let mut record = span(1, None, 10.0, 10.0);
        record.errors = vec![25.0];
        record.performance_issues = vec![9.0];
        let tree = TraceTree::from_spans(vec![record]);
        assert_eq!(tree.list()[0].icon_timestamps(2.0), (8.0, 26.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn loads_json_documents() {
        let tree = TraceTree::from_json(
            r#"{"spans":[{"id":1,"start_ms":0,"duration_ms":5,"op":"http"},
                         {"id":2,"parent":1,"start_ms":1,"duration_ms":2}]}"#,
        )
        .unwrap();
        assert_eq!(tree.len(), 2);
        assert!(matches!(
            TraceTree::from_json(r#"{"spans":[]}"#),
            Err(TraceLoadError::Empty)
        ));
    }
}
