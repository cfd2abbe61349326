use std::sync::Arc;

use egui::Color32;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::Region;

/// Errors raised by artboard operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtboardError {
    #[error("Invalid artboard dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
    #[error("Layer index {index} out of range ({count} layers)")]
    LayerOutOfRange { index: usize, count: usize },
    #[error("Cell ({x}, {y}) is outside the artboard")]
    OutOfBounds { x: i32, y: i32 },
}

/// Shared handle to an artboard, read concurrently by fill workers
pub type ArtboardRef = Arc<RwLock<Artboard>>;

/// A single layer of cells. `None` means the layer holds no value at that cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub visible: bool,
    cells: Vec<Option<Color32>>,
}

impl Layer {
    fn new(name: &str, cell_count: usize) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            cells: vec![None; cell_count],
        }
    }
}

/// The saved contents of a rectangle of the active layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionSnapshot {
    region: Option<Region>,
    cells: Vec<Option<Color32>>,
}

impl RegionSnapshot {
    /// The clipped region this snapshot covers, if any
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Color32> {
        let region = self.region?;
        if !region.contains(x, y) {
            return None;
        }
        let index = ((y - region.y) * region.width + (x - region.x)) as usize;
        self.cells[index]
    }
}

/// A grid of layered cells.
///
/// Layers are ranked by position: the last layer is the highest ranking.
/// Reads and writes through [`Artboard::get`], [`Artboard::put`] and friends
/// target the active layer.
#[derive(Debug)]
pub struct Artboard {
    id: Uuid,
    width: i32,
    height: i32,
    layers: Vec<Layer>,
    active_layer: usize,
    released: bool,
}

impl Artboard {
    /// Creates an artboard with a single empty layer
    pub fn new(width: i32, height: i32) -> Result<Self, ArtboardError> {
        if width <= 0 || height <= 0 {
            return Err(ArtboardError::InvalidDimensions { width, height });
        }
        let cell_count = width as usize * height as usize;
        Ok(Self {
            id: Uuid::new_v4(),
            width,
            height,
            layers: vec![Layer::new("Layer 0", cell_count)],
            active_layer: 0,
            released: false,
        })
    }

    pub fn into_ref(self) -> ArtboardRef {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.contains(x, y)
            .then(|| (y * self.width + x) as usize)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn add_layer(&mut self, name: &str) -> usize {
        let cell_count = if self.released { 0 } else { self.width as usize * self.height as usize };
        self.layers.push(Layer::new(name, cell_count));
        self.layers.len() - 1
    }

    pub fn active_layer(&self) -> usize {
        self.active_layer
    }

    pub fn set_active_layer(&mut self, index: usize) -> Result<(), ArtboardError> {
        self.check_layer(index)?;
        self.active_layer = index;
        Ok(())
    }

    pub fn check_layer(&self, index: usize) -> Result<(), ArtboardError> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(ArtboardError::LayerOutOfRange { index, count: self.layers.len() })
        }
    }

    /// Runs `edit` with layer `index` active, then switches back to the previously
    /// active layer.
    pub fn with_layer<R>(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut Artboard) -> R,
    ) -> Result<R, ArtboardError> {
        self.check_layer(index)?;
        let active = self.active_layer;
        self.active_layer = index;
        let result = edit(self);
        self.active_layer = active;
        Ok(result)
    }

    pub fn toggle_layer_visibility(&mut self, index: usize) -> Result<bool, ArtboardError> {
        self.check_layer(index)?;
        let layer = &mut self.layers[index];
        layer.visible = !layer.visible;
        Ok(layer.visible)
    }

    /// The value of the highest ranking visible layer that holds one at `(x, y)`.
    pub fn highest_ranking_color(&self, x: i32, y: i32) -> Option<Color32> {
        let index = self.index(x, y)?;
        self.layers
            .iter()
            .rev()
            .filter(|layer| layer.visible)
            .find_map(|layer| layer.cells.get(index).copied().flatten())
    }

    /// Value of the active layer at `(x, y)`
    pub fn get(&self, x: i32, y: i32) -> Option<Color32> {
        let index = self.index(x, y)?;
        self.layers[self.active_layer].cells.get(index).copied().flatten()
    }

    pub fn put(&mut self, x: i32, y: i32, color: Color32) {
        self.set(x, y, Some(color));
    }

    pub fn remove(&mut self, x: i32, y: i32) {
        self.set(x, y, None);
    }

    fn set(&mut self, x: i32, y: i32, value: Option<Color32>) {
        if let Some(index) = self.index(x, y) {
            if let Some(cell) = self.layers[self.active_layer].cells.get_mut(index) {
                *cell = value;
            }
        }
    }

    /// Writes `color` over `region` of the active layer, clipped to the grid.
    pub fn fill(&mut self, region: Region, color: Color32) {
        self.write_region(region, Some(color));
    }

    /// Removes every value of the active layer inside `region`, clipped to the grid.
    pub fn clear(&mut self, region: Region) {
        self.write_region(region, None);
    }

    fn write_region(&mut self, region: Region, value: Option<Color32>) {
        let Some(region) = region.clipped(self.width, self.height) else {
            return;
        };
        let width = self.width;
        let cells = &mut self.layers[self.active_layer].cells;
        for y in region.y..region.top() {
            let start = (y * width + region.x) as usize;
            let end = start + region.width as usize;
            if let Some(row) = cells.get_mut(start..end) {
                row.fill(value);
            }
        }
    }

    /// Copies the active layer's contents over `region`, clipped to the grid.
    pub fn snapshot(&self, region: Region) -> RegionSnapshot {
        let Some(region) = region.clipped(self.width, self.height) else {
            return RegionSnapshot::default();
        };
        let cells = region.cells().map(|(x, y)| self.get(x, y)).collect();
        RegionSnapshot { region: Some(region), cells }
    }

    /// Writes a snapshot back into the active layer. Cells that held no value
    /// when the snapshot was taken are removed.
    pub fn restore(&mut self, snapshot: &RegionSnapshot) {
        let Some(region) = snapshot.region else {
            return;
        };
        for ((x, y), value) in region.cells().zip(snapshot.cells.iter()) {
            self.set(x, y, *value);
        }
    }

    /// Deep copy with a fresh identity
    pub fn deep_copy(&self) -> Artboard {
        Artboard {
            id: Uuid::new_v4(),
            width: self.width,
            height: self.height,
            layers: self.layers.clone(),
            active_layer: self.active_layer,
            released: self.released,
        }
    }

    /// Frees the cell buffers. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        for layer in &mut self.layers {
            layer.cells = Vec::new();
        }
        self.released = true;
        log::debug!("Released artboard {}", self.id);
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Composites the visible layer stack. Cells without a value are transparent.
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let color = self
                .highest_ranking_color(x as i32, y as i32)
                .unwrap_or(Color32::TRANSPARENT);
            image::Rgba(color.to_array())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimensions() {
        assert_eq!(
            Artboard::new(0, 4).unwrap_err(),
            ArtboardError::InvalidDimensions { width: 0, height: 4 }
        );
    }

    #[test]
    fn test_highest_ranking_color_skips_hidden_layers() {
        let mut board = Artboard::new(4, 4).unwrap();
        board.put(1, 1, Color32::RED);
        let top = board.add_layer("top");
        board.set_active_layer(top).unwrap();
        board.put(1, 1, Color32::BLUE);

        assert_eq!(board.highest_ranking_color(1, 1), Some(Color32::BLUE));
        board.toggle_layer_visibility(top).unwrap();
        assert_eq!(board.highest_ranking_color(1, 1), Some(Color32::RED));
        assert_eq!(board.highest_ranking_color(2, 2), None);
        assert_eq!(board.highest_ranking_color(-1, 2), None);
    }

    #[test]
    fn test_snapshot_restore_removes_empty_cells() {
        let mut board = Artboard::new(5, 5).unwrap();
        board.put(0, 0, Color32::GREEN);
        let before = board.snapshot(Region::new(-1, -1, 3, 3));
        assert_eq!(before.region(), Some(Region::new(0, 0, 2, 2)));

        board.fill(Region::new(0, 0, 5, 5), Color32::RED);
        board.restore(&before);

        assert_eq!(board.get(0, 0), Some(Color32::GREEN));
        assert_eq!(board.get(1, 1), None);
        // outside the snapshot keeps the fill
        assert_eq!(board.get(3, 3), Some(Color32::RED));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut board = Artboard::new(3, 3).unwrap();
        board.put(1, 1, Color32::WHITE);
        board.release();
        board.release();
        assert!(board.is_released());
        assert_eq!(board.get(1, 1), None);
    }

    #[test]
    fn test_rgba_image_composite() {
        let mut board = Artboard::new(2, 1).unwrap();
        board.put(1, 0, Color32::RED);
        let image = board.to_rgba_image();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, Color32::RED.to_array());
    }
}
