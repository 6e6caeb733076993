//! Atlas page layout and compositing.
//!
//! A page arranges square cells in a grid. Each cell holds one material's tile:
//! a content box inset by `padding` on every side, with the padding filled by
//! replicating the content's border pixels so bilinear filtering at the tile
//! edge never reaches a neighbour.
//!
//! Tile indices run left to right, bottom to top in UV space (UV origin is the
//! bottom-left corner). Image row 0 is the top, so pixel rects are flipped.

use glam::Vec2;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AtlasError
// ---------------------------------------------------------------------------

/// Errors returned during atlas layout and generation.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Layout parameters cannot produce a usable page.
    #[error("invalid atlas layout: {0}")]
    InvalidLayout(String),

    /// A tile index beyond the page grid.
    #[error("tile {tile} is outside the page grid ({capacity} tiles)")]
    TileOutOfRange {
        /// Requested tile.
        tile: usize,
        /// Tiles on the page.
        capacity: usize,
    },

    /// Tile content does not match the content box.
    #[error("tile content is {got}x{got_h}, expected {expected}x{expected}")]
    ContentSize {
        /// Supplied width.
        got: u32,
        /// Supplied height.
        got_h: u32,
        /// Content box edge.
        expected: u32,
    },

    /// The requested page holds no materials.
    #[error("page {0} of the group has no materials")]
    EmptyPage(usize),

    /// The group's shader could not be resolved.
    #[error("shader '{0}' is missing")]
    MissingShader(String),

    /// Creating an atlas or material asset failed.
    #[error(transparent)]
    Asset(#[from] matpack_scene::AssetError),
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Grid for `n` tiles: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`, with
/// `cols` clamped to `max_grid` and `rows` recomputed. `n = 0` yields `(1, 1)`.
pub fn calculate_optimal_grid(n: usize, max_grid: u32) -> (u32, u32) {
    let n = n.max(1) as u32;
    let max_grid = max_grid.max(1);
    let mut cols = (n as f64).sqrt().ceil() as u32;
    if cols * cols < n {
        cols += 1;
    }
    cols = cols.min(max_grid);
    let rows = n.div_ceil(cols);
    (cols, rows)
}

/// Pixel rectangle in image space (row 0 at the top).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// UV affine transform `uv' = uv * scale + offset` mapping `[0, 1]²` onto one
/// tile's content box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileUv {
    /// Scale.
    pub scale: Vec2,
    /// Offset.
    pub offset: Vec2,
}

impl TileUv {
    /// Maps a source UV into the tile.
    pub fn apply(&self, uv: Vec2) -> Vec2 {
        uv * self.scale + self.offset
    }

    /// Maps a tile UV back to the source UV.
    pub fn invert(&self, uv: Vec2) -> Vec2 {
        (uv - self.offset) / self.scale
    }
}

// ---------------------------------------------------------------------------
// AtlasLayout
// ---------------------------------------------------------------------------

/// Resolved geometry of one atlas page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasLayout {
    /// Width and height of the page texture.
    pub atlas_size: u32,
    /// Grid columns.
    pub cols: u32,
    /// Grid rows.
    pub rows: u32,
    /// Cell edge in pixels.
    pub cell: u32,
    /// Border on each side of the content box.
    pub padding: u32,
    /// Content box edge in pixels.
    pub content: u32,
}

impl AtlasLayout {
    /// Lays out a page of `tiles` materials.
    ///
    /// The page shrinks to `max(cols, rows) * cell`, clamped to
    /// `[cell, max_size]`. Padding that leaves no content is dropped to 0.
    pub fn for_page(
        tiles: usize,
        cell: u32,
        padding: u32,
        max_size: u32,
        max_grid: u32,
    ) -> Result<Self, AtlasError> {
        if cell == 0 {
            return Err(AtlasError::InvalidLayout("cell size is 0".to_string()));
        }
        if max_size < cell {
            return Err(AtlasError::InvalidLayout(format!(
                "atlas size {max_size} is smaller than the cell size {cell}"
            )));
        }
        let (cols, rows) = calculate_optimal_grid(tiles, max_grid);
        let atlas_size = (cols.max(rows) * cell).clamp(cell, max_size);
        let padding = if cell > padding * 2 { padding } else { 0 };
        Ok(Self {
            atlas_size,
            cols,
            rows,
            cell,
            padding,
            content: cell - padding * 2,
        })
    }

    /// Tiles the grid can hold.
    pub fn capacity(&self) -> usize {
        (self.cols * self.rows) as usize
    }

    /// `(gx, gy)` grid coordinates of `tile`, `gy` counted from the bottom.
    pub fn grid_position(&self, tile: usize) -> Result<(u32, u32), AtlasError> {
        if tile >= self.capacity() {
            return Err(AtlasError::TileOutOfRange {
                tile,
                capacity: self.capacity(),
            });
        }
        let tile = tile as u32;
        Ok((tile % self.cols, tile / self.cols))
    }

    /// Content box of `tile` in image space.
    pub fn content_rect(&self, tile: usize) -> Result<TileRect, AtlasError> {
        let (gx, gy) = self.grid_position(tile)?;
        let uv_bottom = gy * self.cell + self.padding;
        let top = self
            .atlas_size
            .checked_sub(uv_bottom + self.content)
            .ok_or_else(|| {
                AtlasError::InvalidLayout(format!(
                    "tile {tile} row {gy} does not fit a {} px page",
                    self.atlas_size
                ))
            })?;
        Ok(TileRect {
            x: gx * self.cell + self.padding,
            y: top,
            width: self.content,
            height: self.content,
        })
    }

    /// UV transform mapping a mesh's `[0, 1]²` UVs onto `tile`.
    ///
    /// `scale = content / size`, `offset = (g * cell + padding) / size`.
    pub fn uv_transform(&self, tile: usize) -> Result<TileUv, AtlasError> {
        let (gx, gy) = self.grid_position(tile)?;
        let size = self.atlas_size as f32;
        let scale = self.content as f32 / size;
        Ok(TileUv {
            scale: Vec2::splat(scale),
            offset: Vec2::new(
                (gx * self.cell + self.padding) as f32 / size,
                (gy * self.cell + self.padding) as f32 / size,
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// AtlasCanvas
// ---------------------------------------------------------------------------

/// Accumulates tiles into one page image.
pub struct AtlasCanvas {
    layout: AtlasLayout,
    image: RgbaImage,
    written: usize,
}

impl AtlasCanvas {
    /// Creates a transparent-black page.
    pub fn new(layout: AtlasLayout) -> Self {
        Self {
            image: RgbaImage::new(layout.atlas_size, layout.atlas_size),
            layout,
            written: 0,
        }
    }

    /// Writes `content` into `tile` and bleeds its border into the padding.
    pub fn write_tile(&mut self, tile: usize, content: &RgbaImage) -> Result<(), AtlasError> {
        let rect = self.layout.content_rect(tile)?;
        if content.width() != rect.width || content.height() != rect.height {
            return Err(AtlasError::ContentSize {
                got: content.width(),
                got_h: content.height(),
                expected: rect.width,
            });
        }
        image::imageops::replace(&mut self.image, content, rect.x as i64, rect.y as i64);
        extend_edges(&mut self.image, rect, self.layout.padding);
        self.written += 1;
        Ok(())
    }

    /// Fills `tile`'s content box and padding with one color.
    pub fn fill_tile(&mut self, tile: usize, color: Rgba<u8>) -> Result<(), AtlasError> {
        let rect = self.layout.content_rect(tile)?;
        let content = RgbaImage::from_pixel(rect.width, rect.height, color);
        self.write_tile(tile, &content)
    }

    /// Tiles written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Page layout.
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Returns the finished page image.
    pub fn finish(self) -> RgbaImage {
        self.image
    }
}

/// Replicates the border pixels of `rect` outward by `padding` pixels.
///
/// Edge rows and columns are duplicated; each `padding x padding` corner block
/// is a flat fill of the matching corner pixel. Writes are clipped to the image.
pub fn extend_edges(image: &mut RgbaImage, rect: TileRect, padding: u32) {
    if padding == 0 || rect.width == 0 || rect.height == 0 {
        return;
    }
    let (w, h) = image.dimensions();
    let left = rect.x;
    let top = rect.y;
    let right = rect.x + rect.width - 1;
    let bottom = rect.y + rect.height - 1;

    for y in top..=bottom {
        let l = *image.get_pixel(left, y);
        let r = *image.get_pixel(right, y);
        for d in 1..=padding {
            if let Some(x) = left.checked_sub(d) {
                image.put_pixel(x, y, l);
            }
            if right + d < w {
                image.put_pixel(right + d, y, r);
            }
        }
    }

    for x in left..=right {
        let t = *image.get_pixel(x, top);
        let b = *image.get_pixel(x, bottom);
        for d in 1..=padding {
            if let Some(y) = top.checked_sub(d) {
                image.put_pixel(x, y, t);
            }
            if bottom + d < h {
                image.put_pixel(x, bottom + d, b);
            }
        }
    }

    let corners = [
        (left, top, -1i64, -1i64),
        (right, top, 1, -1),
        (left, bottom, -1, 1),
        (right, bottom, 1, 1),
    ];
    for (cx, cy, sx, sy) in corners {
        let color = *image.get_pixel(cx, cy);
        for dy in 1..=padding as i64 {
            for dx in 1..=padding as i64 {
                let x = cx as i64 + sx * dx;
                let y = cy as i64 + sy * dy;
                if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
                    image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
