use egui::Color32;

use super::{Command, CommandError, CommandResult};
use crate::artboard::{ArtboardRef, RegionSnapshot};
use crate::geometry::Region;

fn clip_to(artboard: &ArtboardRef, region: Region) -> Result<(Region, usize), CommandError> {
    let board = artboard.read();
    let clipped = region.clipped(board.width(), board.height()).ok_or_else(|| {
        CommandError::InvalidArgument(format!(
            "{:?} lies outside the {}x{} artboard",
            region,
            board.width(),
            board.height()
        ))
    })?;
    Ok((clipped, board.active_layer()))
}

/// Fill a rectangle of the active layer with one color
pub struct PaintRegion {
    artboard: ArtboardRef,
    layer: usize,
    region: Region,
    color: Color32,
    prior: RegionSnapshot,
    applied: bool,
}

impl PaintRegion {
    /// `region` is clipped to the artboard. One that misses the artboard
    /// entirely is rejected.
    pub fn new(artboard: ArtboardRef, region: Region, color: Color32) -> Result<Self, CommandError> {
        let (region, layer) = clip_to(&artboard, region)?;
        let prior = artboard.read().snapshot(region);
        Ok(Self {
            artboard,
            layer,
            region,
            color,
            prior,
            applied: false,
        })
    }

    /// The painted rectangle after clipping
    pub fn region(&self) -> Region {
        self.region
    }
}

impl Command for PaintRegion {
    fn name(&self) -> &'static str {
        "paint region"
    }

    fn execute(&mut self) -> CommandResult {
        let (region, color) = (self.region, self.color);
        self.artboard
            .write()
            .with_layer(self.layer, |board| board.fill(region, color))?;
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        if !self.applied {
            return Err(CommandError::NotExecuted(self.name()));
        }
        let prior = &self.prior;
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

/// Remove every value of the active layer inside a rectangle
pub struct EraseRegion {
    artboard: ArtboardRef,
    layer: usize,
    region: Region,
    /// Captured by the first execution
    prior: Option<RegionSnapshot>,
    applied: bool,
}

impl EraseRegion {
    pub fn new(artboard: ArtboardRef, region: Region) -> Result<Self, CommandError> {
        let (region, layer) = clip_to(&artboard, region)?;
        Ok(Self {
            artboard,
            layer,
            region,
            prior: None,
            applied: false,
        })
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl Command for EraseRegion {
    fn name(&self) -> &'static str {
        "erase region"
    }

    fn execute(&mut self) -> CommandResult {
        let region = self.region;
        let prior = &mut self.prior;
        self.artboard.write().with_layer(self.layer, |board| {
            if prior.is_none() {
                *prior = Some(board.snapshot(region));
            }
            board.clear(region);
        })?;
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        let prior = self
            .prior
            .as_ref()
            .filter(|_| self.applied)
            .ok_or(CommandError::NotExecuted("erase region"))?;
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

/// Show a hidden layer or hide a visible one
pub struct ToggleLayerVisibility {
    artboard: ArtboardRef,
    layer: usize,
    applied: bool,
}

impl ToggleLayerVisibility {
    pub fn new(artboard: ArtboardRef, layer: usize) -> Result<Self, CommandError> {
        artboard.read().check_layer(layer)?;
        Ok(Self {
            artboard,
            layer,
            applied: false,
        })
    }
}

impl Command for ToggleLayerVisibility {
    fn name(&self) -> &'static str {
        "toggle layer visibility"
    }

    fn execute(&mut self) -> CommandResult {
        let visible = self.artboard.write().toggle_layer_visibility(self.layer)?;
        log::debug!("Layer {} is now {}", self.layer, if visible { "visible" } else { "hidden" });
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        if !self.applied {
            return Err(CommandError::NotExecuted(self.name()));
        }
        self.artboard.write().toggle_layer_visibility(self.layer)?;
        self.applied = false;
        Ok(())
    }
}

type Action = Box<dyn FnMut() -> CommandResult + Send>;

/// A command built from closures, for one-off edits and scripted actions.
pub struct ClosureCommand {
    name: &'static str,
    execute: Action,
    undo: Option<Action>,
    render_thread: bool,
    applied: bool,
}

impl ClosureCommand {
    pub fn new(
        name: &'static str,
        execute: impl FnMut() -> CommandResult + Send + 'static,
        undo: impl FnMut() -> CommandResult + Send + 'static,
    ) -> Self {
        Self {
            name,
            execute: Box::new(execute),
            undo: Some(Box::new(undo)),
            render_thread: false,
            applied: false,
        }
    }

    /// A command that runs once and never enters the history.
    pub fn transient(name: &'static str, execute: impl FnMut() -> CommandResult + Send + 'static) -> Self {
        Self {
            name,
            execute: Box::new(execute),
            undo: None,
            render_thread: false,
            applied: false,
        }
    }

    pub fn on_render_thread(mut self) -> Self {
        self.render_thread = true;
        self
    }
}

impl Command for ClosureCommand {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self) -> CommandResult {
        (self.execute)()?;
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        let undo = self.undo.as_mut().ok_or(CommandError::NotUndoable(self.name))?;
        if !self.applied {
            return Err(CommandError::NotExecuted(self.name));
        }
        undo()?;
        self.applied = false;
        Ok(())
    }

    fn requires_render_thread(&self) -> bool {
        self.render_thread
    }

    fn is_transient(&self) -> bool {
        self.undo.is_none()
    }
}
