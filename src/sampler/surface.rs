/// RGBA pixel buffer the sample targets read from.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 4]>,
}

impl Surface {
    /// New surfaces are fully transparent until painted.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Reallocates the buffer, dropping whatever was painted.
    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Surface::new(width, height);
    }

    pub fn fill(&mut self, [r, g, b]: [u8; 3]) {
        self.pixels.fill([r, g, b, 255]);
    }

    /// Paints every row with the same run of column colours. Ignored when
    /// `columns` does not match the surface width.
    pub fn fill_columns(&mut self, columns: &[[u8; 4]]) {
        if self.width == 0 || columns.len() != self.width {
            return;
        }

        for row in self.pixels.chunks_exact_mut(self.width) {
            row.copy_from_slice(columns);
        }
    }

    /// Pixel under a target position. Positions on the far edge (x == width)
    /// read the last column. Returns `None` for empty surfaces and positions
    /// outside the surface.
    pub fn pixel(&self, x: f32, y: f32) -> Option<[u8; 4]> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        if x > self.width as f32 || y > self.height as f32 {
            return None;
        }

        let col = (x as usize).min(self.width - 1);
        let row = (y as usize).min(self.height - 1);

        self.pixels.get(row * self.width + col).copied()
    }
}
