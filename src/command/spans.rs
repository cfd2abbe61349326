use std::collections::HashMap;

use parking_lot::Mutex;

use crate::geometry::{Region, Span};

#[derive(Debug, Default)]
struct SpanLog {
    /// Insertion order
    order: Vec<Span>,
    rows: HashMap<i32, Vec<Span>>,
}

/// Spans committed by a fill, shared between the fill's worker tasks.
///
/// Doubles as the visited set. One coarse lock guards both the log and the
/// per-row index; the cost is small next to the color lookups of the walks.
#[derive(Debug, Default)]
pub struct SpanSet {
    log: Mutex<SpanLog>,
}

impl SpanSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits `span` unless it overlaps a span already in the set.
    ///
    /// Returns whether the span was added. Check and insert happen under one
    /// lock, so concurrent callers never commit overlapping spans.
    pub fn insert(&self, span: Span) -> bool {
        if span.width <= 0 {
            return false;
        }
        let mut log = self.log.lock();
        let row = log.rows.entry(span.y).or_default();
        if row.iter().any(|existing| existing.overlaps(&span)) {
            return false;
        }
        row.push(span);
        log.order.push(span);
        true
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let log = self.log.lock();
        log.rows
            .get(&y)
            .is_some_and(|row| row.iter().any(|span| span.contains(x, y)))
    }

    pub fn len(&self) -> usize {
        self.log.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All spans in insertion order
    pub fn snapshot(&self) -> Vec<Span> {
        self.log.lock().order.clone()
    }

    /// Spans inserted after the first `start`
    pub fn since(&self, start: usize) -> Vec<Span> {
        let log = self.log.lock();
        log.order.get(start..).map(<[Span]>::to_vec).unwrap_or_default()
    }

    /// Bounding box of every span, `None` when empty
    pub fn bounds(&self) -> Option<Region> {
        let log = self.log.lock();
        log.order
            .iter()
            .map(Span::region)
            .reduce(|bounds, region| bounds.union(&region))
    }
}
