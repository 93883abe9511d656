//! Static tile grid and world-space queries
//!
//! Anything outside the grid reads as solid, so the world has implicit walls
//! on every side and lookups never fail.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Tile codes as stored in stage layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    Solid,
    /// Non-colliding marker (chests)
    Interactive,
}

impl Tile {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Tile::Empty),
            1 => Some(Tile::Solid),
            2 => Some(Tile::Interactive),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Tile::Empty => 0,
            Tile::Solid => 1,
            Tile::Interactive => 2,
        }
    }

    #[inline]
    pub fn is_solid(self) -> bool {
        self == Tile::Solid
    }
}

/// Immutable rows x cols grid, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Build a grid from raw tile codes, rejecting empty, ragged or unknown input
    pub fn from_codes(codes: &[Vec<u8>]) -> SimResult<Self> {
        let rows = codes.len();
        let cols = codes.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(SimError::EmptyGrid { rows, cols });
        }

        let mut tiles = Vec::with_capacity(rows * cols);
        for (row, line) in codes.iter().enumerate() {
            if line.len() != cols {
                return Err(SimError::RaggedGrid {
                    row,
                    expected: cols,
                    found: line.len(),
                });
            }
            for (col, &code) in line.iter().enumerate() {
                let tile = Tile::from_code(code).ok_or(SimError::UnknownTile { row, col, code })?;
                tiles.push(tile);
            }
        }

        Ok(Self { rows, cols, tiles })
    }

    /// Parse a grid from a JSON array of arrays of tile codes
    pub fn from_json(json: &str) -> SimResult<Self> {
        let codes: Vec<Vec<u8>> = serde_json::from_str(json)?;
        Self::from_codes(&codes)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Tile at (row, col); out-of-range reads as solid
    pub fn get(&self, row: i32, col: i32) -> Tile {
        if row < 0 || col < 0 {
            return Tile::Solid;
        }
        let (r, c) = (row as usize, col as usize);
        if r >= self.rows || c >= self.cols {
            return Tile::Solid;
        }
        self.tiles[r * self.cols + c]
    }

    /// A row's tiles (empty out of range)
    pub fn row(&self, row: usize) -> &[Tile] {
        if row >= self.rows {
            return &[];
        }
        &self.tiles[row * self.cols..(row + 1) * self.cols]
    }
}

/// A tile grid placed in world space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileWorld {
    pub grid: TileGrid,
    pub tile_size: f32,
}

impl TileWorld {
    pub fn new(grid: TileGrid, tile_size: f32) -> Self {
        Self { grid, tile_size }
    }

    #[inline]
    pub fn is_solid(&self, row: i32, col: i32) -> bool {
        self.grid.get(row, col).is_solid()
    }

    #[inline]
    pub fn tile(&self, row: i32, col: i32) -> Tile {
        self.grid.get(row, col)
    }

    pub fn width(&self) -> f32 {
        self.grid.cols() as f32 * self.tile_size
    }

    pub fn height(&self) -> f32 {
        self.grid.rows() as f32 * self.tile_size
    }

    /// Tile index containing a world coordinate
    #[inline]
    pub fn index_of(&self, coord: f32) -> i32 {
        (coord / self.tile_size).floor() as i32
    }

    /// Clamp a left edge so a body of width `w` stays inside the world
    pub fn clamp_x(&self, x: f32, w: f32) -> f32 {
        x.clamp(0.0, (self.width() - w).max(0.0))
    }

    /// Top y for a body of height `h` standing on the ground in column `col`
    ///
    /// Scans bottom-up for the first empty cell over a solid one; falls back
    /// to the row above the bottom when the column has no such pair.
    pub fn ground_y(&self, col: i32, h: f32) -> f32 {
        let rows = self.grid.rows() as i32;
        let col = col.clamp(0, self.grid.cols() as i32 - 1);
        for r in (0..rows - 1).rev() {
            if !self.is_solid(r, col) && self.is_solid(r + 1, col) {
                return (r + 1) as f32 * self.tile_size - h;
            }
        }
        (rows - 1) as f32 * self.tile_size - h
    }

    /// True if the cell is empty with solid ground directly below
    pub fn is_standable(&self, row: i32, col: i32) -> bool {
        self.tile(row, col) == Tile::Empty && self.is_solid(row + 1, col)
    }
}
