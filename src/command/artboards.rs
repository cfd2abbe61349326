//! Commands that add artboards to or take them out of the project.
//!
//! Each one owns an artboard that may be reachable only through the history,
//! so all three implement [`OwnsResources`].

use uuid::Uuid;

use super::{Command, CommandError, CommandResult, OwnsResources, ReleaseState, ShutdownCases};
use crate::artboard::{ArtboardError, ArtboardRef};
use crate::project::ProjectRef;

/// Adds a blank artboard to the project.
///
/// The artboard is allocated on the first execution and re-added on redo.
/// Once this command falls off the redo stack the artboard can never come back,
/// so its buffers are freed.
pub struct CreateArtboard {
    project: ProjectRef,
    width: i32,
    height: i32,
    artboard: Option<ArtboardRef>,
    /// Whether the last execution made the new artboard current
    made_current: bool,
    applied: bool,
    state: ReleaseState,
}

impl CreateArtboard {
    pub fn new(project: ProjectRef, width: i32, height: i32) -> Result<Self, CommandError> {
        if width <= 0 || height <= 0 {
            return Err(ArtboardError::InvalidDimensions { width, height }.into());
        }
        Ok(Self {
            project,
            width,
            height,
            artboard: None,
            made_current: false,
            applied: false,
            state: ReleaseState::default(),
        })
    }

    /// The created artboard, once the command has executed
    pub fn artboard(&self) -> Option<ArtboardRef> {
        self.artboard.clone()
    }
}

impl Command for CreateArtboard {
    fn name(&self) -> &'static str {
        "create artboard"
    }

    fn execute(&mut self) -> CommandResult {
        if self.state.is_released() {
            return Err(CommandError::Released(self.name()));
        }

        let mut project = self.project.lock();
        let artboard = match &self.artboard {
            Some(artboard) => {
                project.add(artboard.clone());
                artboard.clone()
            }
            None => {
                let artboard = project.create_artboard(self.width, self.height)?;
                self.artboard = Some(artboard.clone());
                artboard
            }
        };

        self.made_current = project.current().is_none();
        if self.made_current {
            let id = artboard.read().id();
            project.set_current(Some(id));
        }
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        let artboard = self
            .artboard
            .as_ref()
            .filter(|_| self.applied)
            .ok_or(CommandError::NotExecuted("create artboard"))?;
        let id = artboard.read().id();
        self.project.lock().remove(id);
        self.applied = false;
        Ok(())
    }

    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        Some(self)
    }
}

impl OwnsResources for CreateArtboard {
    fn shutdown_cases(&self) -> ShutdownCases {
        ShutdownCases::OnRedoEviction
    }

    fn release_native_resources(&mut self) {
        let artboard = &mut self.artboard;
        self.state.release(|| {
            if let Some(artboard) = artboard.take() {
                artboard.write().release();
            }
        });
    }

    fn is_released(&self) -> bool {
        self.state.is_released()
    }
}

/// Adds a deep copy of an artboard right after the original.
pub struct DuplicateArtboard {
    project: ProjectRef,
    source_id: Uuid,
    source: ArtboardRef,
    copy: Option<ArtboardRef>,
    applied: bool,
    state: ReleaseState,
}

impl DuplicateArtboard {
    pub fn new(project: ProjectRef, source_id: Uuid) -> Result<Self, CommandError> {
        let source = project
            .lock()
            .get(source_id)
            .ok_or(CommandError::UnknownArtboard(source_id))?;
        Ok(Self {
            project,
            source_id,
            source,
            copy: None,
            applied: false,
            state: ReleaseState::default(),
        })
    }

    pub fn copy(&self) -> Option<ArtboardRef> {
        self.copy.clone()
    }
}

impl Command for DuplicateArtboard {
    fn name(&self) -> &'static str {
        "duplicate artboard"
    }

    fn execute(&mut self) -> CommandResult {
        if self.state.is_released() {
            return Err(CommandError::Released(self.name()));
        }

        let copy = match &self.copy {
            Some(copy) => copy.clone(),
            None => {
                let copy = self.source.read().deep_copy().into_ref();
                log::info!("Duplicated artboard {} as {}", self.source_id, copy.read().id());
                self.copy = Some(copy.clone());
                copy
            }
        };

        let mut project = self.project.lock();
        let index = project
            .index_of(self.source_id)
            .map_or(project.len(), |index| index + 1);
        project.insert(index, copy);
        self.applied = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        let copy = self
            .copy
            .as_ref()
            .filter(|_| self.applied)
            .ok_or(CommandError::NotExecuted("duplicate artboard"))?;
        let id = copy.read().id();
        self.project.lock().remove(id);
        self.applied = false;
        Ok(())
    }

    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        Some(self)
    }
}

impl OwnsResources for DuplicateArtboard {
    fn shutdown_cases(&self) -> ShutdownCases {
        ShutdownCases::OnRedoEviction
    }

    fn release_native_resources(&mut self) {
        let copy = &mut self.copy;
        self.state.release(|| {
            if let Some(copy) = copy.take() {
                copy.write().release();
            }
        });
    }

    fn is_released(&self) -> bool {
        self.state.is_released()
    }
}

/// Takes an artboard out of the project.
///
/// Undo puts it back at its old position. Once the command falls off the undo
/// stack the removal is permanent and the artboard's buffers are freed. A
/// command that never managed to remove its artboard does not own it and frees
/// nothing.
pub struct RemoveArtboard {
    project: ProjectRef,
    id: Uuid,
    artboard: ArtboardRef,
    /// Position the artboard was removed from, set while the removal is applied
    index: Option<usize>,
    was_current: bool,
    /// Set by the first successful execution
    owns_artboard: bool,
    state: ReleaseState,
}

impl RemoveArtboard {
    pub fn new(project: ProjectRef, id: Uuid) -> Result<Self, CommandError> {
        let artboard = project.lock().get(id).ok_or(CommandError::UnknownArtboard(id))?;
        Ok(Self {
            project,
            id,
            artboard,
            index: None,
            was_current: false,
            owns_artboard: false,
            state: ReleaseState::default(),
        })
    }
}

impl Command for RemoveArtboard {
    fn name(&self) -> &'static str {
        "remove artboard"
    }

    fn execute(&mut self) -> CommandResult {
        if self.state.is_released() {
            return Err(CommandError::Released(self.name()));
        }

        let mut project = self.project.lock();
        self.was_current = project.current() == Some(self.id);
        let (index, _) = project
            .remove(self.id)
            .ok_or(CommandError::UnknownArtboard(self.id))?;
        self.index = Some(index);
        self.owns_artboard = true;
        Ok(())
    }

    fn undo(&mut self) -> CommandResult {
        let index = self.index.take().ok_or(CommandError::NotExecuted("remove artboard"))?;
        let mut project = self.project.lock();
        project.insert(index, self.artboard.clone());
        if self.was_current {
            project.set_current(Some(self.id));
        }
        Ok(())
    }

    fn resources(&mut self) -> Option<&mut dyn OwnsResources> {
        Some(self)
    }
}

impl OwnsResources for RemoveArtboard {
    fn shutdown_cases(&self) -> ShutdownCases {
        ShutdownCases::OnUndoEviction
    }

    fn release_native_resources(&mut self) {
        let (artboard, owned) = (&self.artboard, self.owns_artboard);
        self.state.release(|| {
            if owned {
                artboard.write().release();
            }
        });
    }

    fn is_released(&self) -> bool {
        self.state.is_released()
    }
}
