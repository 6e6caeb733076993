//! Scratch render targets for tile resampling.
//!
//! A [`ScratchTarget`] is a float RGBA buffer borrowed from a [`ScratchPool`]
//! for the duration of one tile-sample call. Dropping the guard hands the
//! buffer back, so a build never holds more targets than tiles in flight.

use std::cell::{Cell, RefCell};

use image::{Rgba, RgbaImage};

/// Reusable float buffers owned by one build.
#[derive(Debug, Default)]
pub struct ScratchPool {
    free: RefCell<Vec<Vec<[f32; 4]>>>,
    live: Cell<usize>,
    allocations: Cell<usize>,
}

impl ScratchPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows a zeroed `width x height` target.
    pub fn acquire(&self, width: u32, height: u32) -> ScratchTarget<'_> {
        let len = width as usize * height as usize;
        let mut free = self.free.borrow_mut();
        let mut pixels = match free.iter().position(|b| b.capacity() >= len) {
            Some(i) => free.swap_remove(i),
            None => {
                self.allocations.set(self.allocations.get() + 1);
                Vec::with_capacity(len)
            }
        };
        pixels.clear();
        pixels.resize(len, [0.0; 4]);
        self.live.set(self.live.get() + 1);
        ScratchTarget {
            pool: self,
            width,
            height,
            pixels,
        }
    }

    /// Targets currently borrowed.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    /// Buffers allocated over the pool's lifetime.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    fn release(&self, pixels: Vec<[f32; 4]>) {
        self.live.set(self.live.get().saturating_sub(1));
        self.free.borrow_mut().push(pixels);
    }
}

/// A borrowed scratch buffer, returned to its pool on drop.
pub struct ScratchTarget<'a> {
    pool: &'a ScratchPool,
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl ScratchTarget<'_> {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reads one pixel.
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Writes one pixel.
    pub fn put(&mut self, x: u32, y: u32, value: [f32; 4]) {
        self.pixels[(y * self.width + x) as usize] = value;
    }

    /// Quantizes to 8 bits, passing RGB through `encode` (alpha is stored
    /// linearly).
    pub fn read_back(&self, encode: impl Fn(f32) -> f32) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b, a] = self.get(x, y);
            Rgba([
                crate::color::unit_to_u8(encode(r)),
                crate::color::unit_to_u8(encode(g)),
                crate::color::unit_to_u8(encode(b)),
                crate::color::unit_to_u8(a),
            ])
        })
    }
}

impl Drop for ScratchTarget<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.pixels));
    }
}
