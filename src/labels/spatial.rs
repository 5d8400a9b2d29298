use crate::geometry::Aabb;
use glam::Vec2;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
struct GridItem {
    extent: Aabb,
    owner: usize,
}

/// Uniform grid over the viewport used as the broad phase of label
/// collision. Boxes reaching past the viewport are clamped into the border
/// cells so they still collide with each other.
#[derive(Debug, Clone)]
pub struct CollisionGrid {
    cell: Vec2,
    cols: i32,
    rows: i32,
    /// Maps cell `iy * cols + ix` to indices into `items`.
    cells: Vec<Vec<usize>>,
    items: Vec<GridItem>,
}

impl Default for CollisionGrid {
    fn default() -> Self {
        Self::new(Vec2::new(256.0, 256.0), 256.0)
    }
}

impl CollisionGrid {
    pub fn new(screen: Vec2, cell_target: f32) -> Self {
        let mut grid = Self {
            cell: Vec2::ONE,
            cols: 1,
            rows: 1,
            cells: Vec::new(),
            items: Vec::new(),
        };
        grid.resize(screen, cell_target);
        grid
    }

    /// Split the viewport into roughly `cell_target`-sized cells and drop
    /// all boxes.
    pub fn resize(&mut self, screen: Vec2, cell_target: f32) {
        let target = cell_target.max(16.0);
        let screen = screen.max(Vec2::ONE);
        self.cols = ((screen.x / target).ceil() as i32).max(1);
        self.rows = ((screen.y / target).ceil() as i32).max(1);
        self.cell = Vec2::new(screen.x / self.cols as f32, screen.y / self.rows as f32);
        let count = (self.cols * self.rows) as usize;
        self.cells.resize_with(count, Vec::new);
        self.clear();
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.cols, self.rows)
    }

    pub fn cell_size(&self) -> Vec2 {
        self.cell
    }

    fn cell_range(&self, extent: &Aabb) -> (i32, i32, i32, i32) {
        let x0 = ((extent.min.x / self.cell.x).floor() as i32).clamp(0, self.cols - 1);
        let y0 = ((extent.min.y / self.cell.y).floor() as i32).clamp(0, self.rows - 1);
        let x1 = ((extent.max.x / self.cell.x).floor() as i32).clamp(0, self.cols - 1);
        let y1 = ((extent.max.y / self.cell.y).floor() as i32).clamp(0, self.rows - 1);
        (x0, y0, x1, y1)
    }

    /// Add a box owned by `owner` (an index the caller resolves back to a label).
    pub fn insert(&mut self, extent: Aabb, owner: usize) {
        let idx = self.items.len();
        self.items.push(GridItem { extent, owner });
        let (x0, y0, x1, y1) = self.cell_range(&extent);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                self.cells[(iy * self.cols + ix) as usize].push(idx);
            }
        }
    }

    /// Owners of boxes whose extent overlaps `extent`, each reported once.
    pub fn query(&self, extent: &Aabb) -> impl Iterator<Item = usize> + '_ {
        let (x0, y0, x1, y1) = self.cell_range(extent);
        let extent = *extent;
        let mut seen = HashSet::new();
        (y0..=y1)
            .flat_map(move |iy| (x0..=x1).map(move |ix| (iy * self.cols + ix) as usize))
            .flat_map(move |cell| self.cells[cell].iter().copied())
            .filter(move |idx| seen.insert(*idx))
            .map(move |idx| self.items[idx])
            .filter(move |item| item.extent.intersects(&extent))
            .map(|item| item.owner)
    }

    /// Screen rectangles of all cells, row by row.
    pub fn cell_rects(&self) -> Vec<Aabb> {
        let mut rects = Vec::with_capacity(self.cells.len());
        for iy in 0..self.rows {
            for ix in 0..self.cols {
                let min = Vec2::new(ix as f32 * self.cell.x, iy as f32 * self.cell.y);
                rects.push(Aabb::new(min, min + self.cell));
            }
        }
        rects
    }
}
