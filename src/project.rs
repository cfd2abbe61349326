use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::artboard::{Artboard, ArtboardError, ArtboardRef};

/// Shared handle to the project, captured by commands that add or remove artboards
pub type ProjectRef = Arc<Mutex<Project>>;

/// The artboards currently part of the document, plus which one is current.
#[derive(Debug, Default)]
pub struct Project {
    artboards: Vec<ArtboardRef>,
    current: Option<Uuid>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_ref(self) -> ProjectRef {
        Arc::new(Mutex::new(self))
    }

    /// Allocates a new artboard and appends it to the project
    pub fn create_artboard(&mut self, width: i32, height: i32) -> Result<ArtboardRef, ArtboardError> {
        let artboard = Artboard::new(width, height)?.into_ref();
        log::info!("Created {}x{} artboard {}", width, height, artboard.read().id());
        self.artboards.push(artboard.clone());
        Ok(artboard)
    }

    /// Appends an existing artboard. Adding one that is already present is a no-op.
    pub fn add(&mut self, artboard: ArtboardRef) {
        let id = artboard.read().id();
        if self.index_of(id).is_none() {
            self.artboards.push(artboard);
        }
    }

    /// Inserts an artboard at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, artboard: ArtboardRef) {
        let id = artboard.read().id();
        if self.index_of(id).is_none() {
            let index = index.min(self.artboards.len());
            self.artboards.insert(index, artboard);
        }
    }

    /// Removes an artboard, returning where it was. Clears `current` if it pointed at it.
    pub fn remove(&mut self, id: Uuid) -> Option<(usize, ArtboardRef)> {
        let index = self.index_of(id)?;
        let artboard = self.artboards.remove(index);
        if self.current == Some(id) {
            self.current = None;
        }
        Some((index, artboard))
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.artboards.iter().position(|artboard| artboard.read().id() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index_of(id).is_some()
    }

    pub fn get(&self, id: Uuid) -> Option<ArtboardRef> {
        self.index_of(id).map(|index| self.artboards[index].clone())
    }

    pub fn artboards(&self) -> &[ArtboardRef] {
        &self.artboards
    }

    pub fn len(&self) -> usize {
        self.artboards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artboards.is_empty()
    }

    pub fn current(&self) -> Option<Uuid> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<Uuid>) {
        self.current = id.filter(|id| self.contains(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_clears_current() {
        let mut project = Project::new();
        let board = project.create_artboard(4, 4).unwrap();
        let id = board.read().id();
        project.set_current(Some(id));
        assert_eq!(project.current(), Some(id));

        let (index, _) = project.remove(id).unwrap();
        assert_eq!(index, 0);
        assert_eq!(project.current(), None);
        assert!(project.remove(id).is_none());
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut project = Project::new();
        let a = project.create_artboard(2, 2).unwrap();
        let b = project.create_artboard(2, 2).unwrap();
        let a_id = a.read().id();
        project.remove(a_id);
        project.insert(0, a.clone());
        project.insert(0, a);
        assert_eq!(project.len(), 2);
        assert_eq!(project.index_of(a_id), Some(0));
        assert_eq!(project.index_of(b.read().id()), Some(1));
    }
}
