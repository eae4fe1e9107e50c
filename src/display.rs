/// Display width in pixels.
pub const WIDTH: usize = 64;
/// Display height in pixels.
pub const HEIGHT: usize = 32;
/// Size of the packed 1-bit-per-pixel bitmap.
pub const BITMAP_SIZE: usize = WIDTH * HEIGHT / 8;
/// Size of the expanded RGBA buffer.
pub const BUFFER_SIZE: usize = WIDTH * HEIGHT * 4;

/// Monochrome 64x32 screen.
///
/// Drawing only ever touches the packed bitmap and raises the dirty flag. The RGBA buffer is
/// rebuilt from the bitmap on demand through [`Display::update`].
pub struct Display {
    /// Pixel `n = y * WIDTH + x` lives in byte `n / 8`, bit `n % 8`
    bitmap: [u8; BITMAP_SIZE],
    buffer: Box<[u8; BUFFER_SIZE]>,
    dirty: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

impl Display {
    pub fn new() -> Self {
        Display {
            bitmap: [0; BITMAP_SIZE],
            buffer: Box::new([0; BUFFER_SIZE]),
            dirty: true,
        }
    }

    fn locate(x: usize, y: usize) -> (usize, u8) {
        let pixel = (y % HEIGHT) * WIDTH + (x % WIDTH);
        (pixel / 8, 1 << (pixel % 8))
    }

    /// State of the pixel at `(x, y)`; coordinates wrap.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let (byte, bit) = Self::locate(x, y);
        self.bitmap[byte] & bit != 0
    }

    /// Flip the pixel at `(x, y)` if `on` is set. Returns true if a lit pixel was turned off.
    pub fn xor_pixel(&mut self, x: usize, y: usize, on: bool) -> bool {
        if !on {
            return false;
        }
        let (byte, bit) = Self::locate(x, y);
        let collided = self.bitmap[byte] & bit != 0;
        self.bitmap[byte] ^= bit;
        collided
    }

    /// XOR an 8-pixel-wide sprite onto the screen with its top left corner at `(x, y)`,
    /// wrapping on both axes. Returns true on collision.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: &[u8]) -> bool {
        let mut collided = false;
        for (dy, row) in rows.iter().enumerate() {
            for dx in 0..8 {
                let on = row & (0x80 >> dx) != 0;
                collided |= self.xor_pixel(x + dx, y + dy, on);
            }
        }
        self.dirty = true;
        collided
    }

    pub fn clear(&mut self) {
        self.bitmap = [0; BITMAP_SIZE];
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the RGBA buffer if the bitmap changed since the last call.
    ///
    /// Returns whether the buffer was rebuilt.
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        for (pixel, rgba) in self.buffer.chunks_exact_mut(4).enumerate() {
            let lit = self.bitmap[pixel / 8] & (1 << (pixel % 8)) != 0;
            let color = if lit { 255 } else { 0 };
            rgba.copy_from_slice(&[color, color, color, 255]);
        }
        self.dirty = false;
        true
    }

    /// RGBA bytes, row-major, as of the last [`Display::update`].
    pub fn buffer(&self) -> &[u8] {
        &self.buffer[..]
    }

    pub fn bitmap(&self) -> &[u8; BITMAP_SIZE] {
        &self.bitmap
    }

    /// Text rendering, one line per row, `#` for lit pixels.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((WIDTH + 1) * HEIGHT);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                out.push(if self.pixel(x, y) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_xor_and_collision() {
        let mut display = Display::new();
        assert!(!display.draw_sprite(0, 0, &[0xFF]));
        assert!((0..8).all(|x| display.pixel(x, 0)));
        assert!(!display.pixel(8, 0));

        assert!(display.draw_sprite(0, 0, &[0xFF]));
        assert!((0..8).all(|x| !display.pixel(x, 0)));
    }

    #[test]
    fn blank_bits_never_collide() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0xF0]);
        // Overlaps only where the second sprite is clear
        assert!(!display.draw_sprite(0, 0, &[0x0F]));
        assert!((0..8).all(|x| display.pixel(x, 0)));
    }

    #[test]
    fn wraps_on_both_axes() {
        let mut display = Display::new();
        display.draw_sprite(62, 31, &[0xC0 | 0x20, 0x80]);
        assert!(display.pixel(62, 31));
        assert!(display.pixel(63, 31));
        assert!(display.pixel(0, 31));
        assert!(display.pixel(62, 0));
        assert_eq!(display.bitmap().iter().map(|b| b.count_ones()).sum::<u32>(), 4);
    }

    #[test]
    fn bitmap_is_lsb_first() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0x80]);
        display.draw_sprite(9, 1, &[0x80]);
        assert_eq!(display.bitmap()[0], 0x01);
        // Pixel 73 is byte 9, bit 1
        assert_eq!(display.bitmap()[9], 0x02);
    }

    #[test]
    fn lazy_buffer() {
        let mut display = Display::new();
        assert!(display.update());
        assert!(!display.update());
        assert_eq!(&display.buffer()[..4], &[0, 0, 0, 255]);

        display.draw_sprite(1, 0, &[0x80]);
        assert!(display.is_dirty());
        // Untouched until the next update
        assert_eq!(&display.buffer()[4..8], &[0, 0, 0, 255]);
        assert!(display.update());
        assert_eq!(&display.buffer()[4..8], &[255, 255, 255, 255]);
        assert!(!display.is_dirty());

        display.clear();
        assert!(display.is_dirty());
        display.update();
        assert!(display.buffer().chunks(4).all(|px| px == [0, 0, 0, 255]));
    }

    #[test]
    fn render_text() {
        let mut display = Display::new();
        display.draw_sprite(0, 0, &[0xA0]);
        let text = display.render();
        assert_eq!(text.lines().count(), HEIGHT);
        assert!(text.starts_with("#.#....."));
    }
}
