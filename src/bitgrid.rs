//! Dense membership grid over raster pixel space.
//!
//! One bit per pixel, packed row-major into 64-bit words. Reads outside the
//! grid return non-member, so tracing can walk the border without special
//! cases.

const WORD: usize = 64;

/// Bit-packed boolean raster: `true` = member (data) pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct BitGrid {
    width: usize,
    height: usize,
    words: Vec<u64>,
}

/// Neighbour offsets in cyclic compass order, y down:
/// N, NE, E, SE, S, SW, W, NW.
const COMPASS: [(i64, i64); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

impl BitGrid {
    /// An all-clear grid.
    pub fn new(width: usize, height: usize) -> Self {
        let words = (width * height).div_ceil(WORD);
        BitGrid {
            width,
            height,
            words: vec![0; words],
        }
    }

    /// Build a grid from a membership predicate over `(x, y)`.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut grid = BitGrid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    grid.set(x, y, true);
                }
            }
        }
        grid
    }

    /// Mask of the pixels of an 8-bit raster equal to `value`.
    pub fn for_class(raster: &[u8], width: usize, height: usize, value: u8) -> Self {
        BitGrid::from_fn(width, height, |x, y| raster[y * width + x] == value)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Membership at `(x, y)`; anything outside the grid is non-member.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        let idx = y as usize * self.width + x as usize;
        (self.words[idx / WORD] >> (idx % WORD)) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        let idx = y * self.width + x;
        let bit = 1u64 << (idx % WORD);
        if value {
            self.words[idx / WORD] |= bit;
        } else {
            self.words[idx / WORD] &= !bit;
        }
    }

    /// Number of member pixels.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Flip every pixel.
    pub fn invert(&mut self) {
        for w in &mut self.words {
            *w = !*w;
        }
        // Keep the padding bits of the last word clear so `count` stays exact.
        let used = self.width * self.height % WORD;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << used) - 1;
            }
        }
    }

    /// Clear member pixels that lack two consecutive member neighbours.
    ///
    /// Neighbours are visited in the cycle N, NE, E, SE, S, SW, W, NW; a
    /// pixel survives only if some adjacent pair in that cycle (NW→N
    /// included) is entirely member. Two member neighbours that are not
    /// adjacent in the cycle do not save a pixel. All pixels are tested
    /// against the grid as it was before the pass.
    pub fn erode(&mut self) {
        let before = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                if !before.get(x as i64, y as i64) {
                    continue;
                }
                let ring: [bool; 8] =
                    COMPASS.map(|(dx, dy)| before.get(x as i64 + dx, y as i64 + dy));
                let keep = (0..8).any(|i| ring[i] && ring[(i + 1) % 8]);
                if !keep {
                    self.set(x, y, false);
                }
            }
        }
    }

    /// Build a grid from rows of text: `#` is member, anything else is not.
    #[cfg(test)]
    pub(crate) fn from_ascii(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        BitGrid::from_fn(width, height, |x, y| rows[y].as_bytes().get(x) == Some(&b'#'))
    }
}

impl std::fmt::Debug for BitGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BitGrid {}x{}", self.width, self.height)?;
        for y in 0..self.height {
            let row: String = (0..self.width)
                .map(|x| if self.get(x as i64, y as i64) { '#' } else { '.' })
                .collect();
            writeln!(f, "{}", row)?;
        }
        Ok(())
    }
}
