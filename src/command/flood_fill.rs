//! Border-seeking flood fill.
//!
//! The fill avoids per-cell recursion and tries to visit each row once. It
//! trades some correctness for speed on very large regions:
//!
//! 1. The clicked row is committed as the first span.
//! 2. A northward and a southward walk climb the clicked column until they hit
//!    a border, then walk back toward the clicked row. Every row on the way back
//!    is fanned east and west to its borders and committed as a span. While
//!    fanning, the cell one row further out (above when walking back from the
//!    north, below when walking back from the south) is probed; an open cell that
//!    is not yet filled starts a new row, which is committed at once and walked
//!    from its midpoint.
//! 3. The seed row and both walks run as separate tasks on the worker pool and
//!    share one [`SpanSet`].
//! 4. Once they are all done, spans are visited from the highest row down and
//!    the row below each one is checked for open cells the fan-out missed. Each
//!    gap found starts one more southward walk.
//! 5. Every span is written in one pass.
//!
//! An interior shape that shares a row with the clicked cell can still hide
//! the region on its far side; the repair pass narrows that case but does not
//! close it.

use std::sync::Arc;

use egui::Color32;

use super::{Command, CommandError, CommandResult, SpanSet};
use crate::artboard::{Artboard, ArtboardRef, RegionSnapshot};
use crate::geometry::{Region, Span};
use crate::workers::Workers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    North,
    South,
}

impl Heading {
    fn step(self) -> i32 {
        match self {
            Heading::North => 1,
            Heading::South => -1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Walk {
    x: i32,
    y: i32,
    heading: Heading,
}

/// Read-only view of the artboard for one branch of the fill.
struct Scan<'a> {
    board: &'a Artboard,
    target: Option<Color32>,
    spans: &'a SpanSet,
}

impl Scan<'_> {
    /// Off-grid cells and cells not matching the clicked color stop the fill.
    /// An empty cell is a color of its own: clicking an empty cell fills only
    /// empty cells, and clicking a colored one never spills into empty ones.
    fn is_border(&self, x: i32, y: i32) -> bool {
        !self.board.contains(x, y) || self.board.highest_ranking_color(x, y) != self.target
    }

    fn is_filled(&self, x: i32, y: i32) -> bool {
        !self.board.contains(x, y) || self.spans.contains(x, y)
    }

    fn eastern_border(&self, mut x: i32, y: i32) -> i32 {
        while !self.is_border(x, y) {
            x += 1;
        }
        x
    }

    fn western_border(&self, mut x: i32, y: i32) -> i32 {
        while !self.is_border(x, y) {
            x -= 1;
        }
        x
    }

    /// The border-to-border run through `(x, y)`, which must not be a border.
    fn row_run(&self, x: i32, y: i32) -> Span {
        Span::between(self.western_border(x, y) + 1, self.eastern_border(x, y) - 1, y)
    }

    fn seed_row(&self, x: i32, y: i32) {
        if !self.is_border(x, y) {
            self.spans.insert(self.row_run(x, y));
        }
    }

    /// Runs `first` and every walk it spawns, without recursing.
    fn run(&self, first: Walk) {
        let mut pending = vec![first];
        while let Some(walk) = pending.pop() {
            self.walk(walk, &mut pending);
        }
    }

    fn walk(&self, walk: Walk, pending: &mut Vec<Walk>) {
        if self.is_border(walk.x, walk.y) {
            return;
        }
        let step = walk.heading.step();
        let mut far = walk.y;
        while !self.is_border(walk.x, far + step) {
            far += step;
        }

        let mut y = far;
        loop {
            let east = self.fan(walk.x, y, 1, walk.heading, pending);
            let west = self.fan(walk.x - 1, y, -1, walk.heading, pending);
            self.spans.insert(Span::between(west, east, y));
            if y == walk.y {
                break;
            }
            y -= step;
        }
    }

    /// Moves along row `y` from `start` by `dx` until a border, probing the next
    /// row out for unfilled cells. Returns the last cell before the border.
    fn fan(&self, start: i32, y: i32, dx: i32, heading: Heading, pending: &mut Vec<Walk>) -> i32 {
        let probe_y = y + heading.step();
        let mut x = start;
        while !self.is_border(x, y) {
            if !self.is_filled(x, probe_y) && !self.is_border(x, probe_y) {
                let run = self.row_run(x, probe_y);
                if self.spans.insert(run) {
                    pending.push(Walk {
                        x: run.midpoint(),
                        y: probe_y,
                        heading,
                    });
                }
            }
            x += dx;
        }
        x - dx
    }

    /// Checks the row below every span, highest rows first, and walks south
    /// from any gap. Spans added by those walks are checked as well.
    fn repair(&self) {
        let mut ordered = self.spans.snapshot();
        ordered.sort_by(|a, b| b.y.cmp(&a.y));

        let mut next = 0;
        while let Some(span) = ordered.get(next).copied() {
            next += 1;
            let below = span.y - 1;
            for x in span.x..span.end() {
                if self.is_filled(x, below) || self.is_border(x, below) {
                    continue;
                }
                let mark = self.spans.len();
                let run = self.row_run(x, below);
                if self.spans.insert(run) {
                    log::debug!("Flood fill repairing gap below row {} at {:?}", span.y, run);
                    self.run(Walk {
                        x: run.midpoint(),
                        y: below,
                        heading: Heading::South,
                    });
                    ordered.extend(self.spans.since(mark));
                }
            }
        }
    }
}

/// Fills the 4-connected region of the clicked color with a new color.
///
/// Reads colors through the artboard's layer stack and writes into the layer
/// that was active when the command was built. The first execution computes
/// the fill; later executions restore the cached result.
#[derive(Debug)]
pub struct FloodFill {
    artboard: ArtboardRef,
    workers: Workers,
    color: Color32,
    x: i32,
    y: i32,
    layer: usize,
    clicked: Option<Color32>,
    spans: Vec<Span>,
    prior: Option<RegionSnapshot>,
    filled: Option<RegionSnapshot>,
    applied: bool,
}

type Branch = Box<dyn FnOnce() + Send + 'static>;

impl FloodFill {
    pub fn new(artboard: ArtboardRef, workers: Workers, color: Color32, x: i32, y: i32) -> Result<Self, CommandError> {
        let (clicked, layer) = {
            let board = artboard.read();
            if !board.contains(x, y) {
                return Err(CommandError::InvalidArgument(format!(
                    "({}, {}) is outside the {}x{} artboard",
                    x,
                    y,
                    board.width(),
                    board.height()
                )));
            }
            (board.highest_ranking_color(x, y), board.active_layer())
        };

        Ok(Self {
            artboard,
            workers,
            color,
            x,
            y,
            layer,
            clicked,
            spans: Vec::new(),
            prior: None,
            filled: None,
            applied: false,
        })
    }

    /// The color found at the clicked cell when the command was built
    pub fn clicked_color(&self) -> Option<Color32> {
        self.clicked
    }

    /// Spans committed by the first execution
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Bounding box of the fill, known after the first execution
    pub fn affected_region(&self) -> Option<Region> {
        self.prior.as_ref().and_then(RegionSnapshot::region)
    }

    fn branch(&self, spans: &Arc<SpanSet>, walk: Option<Walk>) -> Branch {
        let artboard = self.artboard.clone();
        let spans = spans.clone();
        let target = self.clicked;
        let (x, y) = (self.x, self.y);
        Box::new(move || {
            let board = artboard.read();
            let scan = Scan {
                board: &board,
                target,
                spans: &spans,
            };
            match walk {
                Some(walk) => scan.run(walk),
                None => scan.seed_row(x, y),
            }
        })
    }

    /// Seed row, northward walk and southward walk, in that order.
    fn branches(&self, spans: &Arc<SpanSet>) -> Vec<Branch> {
        let (x, y) = (self.x, self.y);
        vec![
            self.branch(spans, None),
            self.branch(spans, Some(Walk { x, y, heading: Heading::North })),
            self.branch(spans, Some(Walk { x, y, heading: Heading::South })),
        ]
    }

    fn collect_spans(&self, branches: impl FnOnce(&Self, &Arc<SpanSet>) -> Vec<Branch>) -> Arc<SpanSet> {
        let spans = Arc::new(SpanSet::new());
        let tasks = branches(self, &spans);

        // A failed branch has already been logged; whatever it committed stays.
        let failed = self
            .workers
            .fork_join(tasks)
            .iter()
            .filter(|result| result.is_err())
            .count();
        if failed > 0 {
            log::warn!(
                "Flood fill at ({}, {}) continues with {} failed branches",
                self.x,
                self.y,
                failed
            );
        }

        let board = self.artboard.read();
        Scan {
            board: &board,
            target: self.clicked,
            spans: &spans,
        }
        .repair();
        spans
    }

    fn fill_with(&mut self, branches: impl FnOnce(&Self, &Arc<SpanSet>) -> Vec<Branch>) -> CommandResult {
        if let Some(filled) = &self.filled {
            self.artboard
                .write()
                .with_layer(self.layer, |board| board.restore(filled))?;
            self.applied = true;
            return Ok(());
        }

        let spans = self.collect_spans(branches);
        self.spans = spans.snapshot();
        let bounds = spans.bounds().unwrap_or(Region::EMPTY);

        let (color, committed) = (self.color, &self.spans);
        let (prior, filled) = self.artboard.write().with_layer(self.layer, |board| {
            let prior = board.snapshot(bounds);
            for span in committed {
                board.fill(span.region(), color);
            }
            (prior, board.snapshot(bounds))
        })?;
        self.prior = Some(prior);
        self.filled = Some(filled);
        self.applied = true;

        log::debug!(
            "Flood fill at ({}, {}) committed {} spans over {:?}",
            self.x,
            self.y,
            self.spans.len(),
            bounds
        );
        Ok(())
    }
}

impl Command for FloodFill {
    fn name(&self) -> &'static str {
        "flood fill"
    }

    fn execute(&mut self) -> CommandResult {
        self.fill_with(Self::branches)
    }

    fn undo(&mut self) -> CommandResult {
        if !self.applied {
            return Err(CommandError::NotExecuted(self.name()));
        }
        let prior = self.prior.as_ref().ok_or(CommandError::NotExecuted("flood fill"))?;
        self.artboard
            .write()
            .with_layer(self.layer, |board| board.restore(prior))?;
        self.applied = false;
        Ok(())
    }

    fn requires_render_thread(&self) -> bool {
        true
    }
}
