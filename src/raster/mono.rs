use crate::foundation::error::{LaminaError, LaminaResult};

/// 1-bit bitmap; rows are padded to whole bytes and the leftmost pixel is the high bit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MonoBitmap {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> LaminaResult<Self> {
        let expect = Self::raster_for(width) * height as usize;
        if data.len() != expect {
            return Err(LaminaError::range(format!(
                "{width}x{height} bitmap needs {expect} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a bitmap from text rows where `#` marks a set pixel.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> LaminaResult<Self> {
        let width = rows.first().map_or(0, |r| r.as_ref().chars().count());
        let raster = Self::raster_for(width as u32);
        let mut data = vec![0u8; raster * rows.len()];
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.chars().count() != width {
                return Err(LaminaError::range(format!("bitmap row {y} is ragged")));
            }
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    data[y * raster + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        Self::new(width as u32, rows.len() as u32, data)
    }

    fn raster_for(width: u32) -> usize {
        (width as usize).div_ceil(8)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn raster(&self) -> usize {
        Self::raster_for(self.width)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.raster() + x as usize / 8] & (0x80 >> (x % 8)) != 0
    }

    /// Calls `emit(x0, x1)` for each run of set pixels in row `y`.
    pub fn spans(&self, y: u32, mut emit: impl FnMut(u32, u32)) {
        let mut x = 0;
        while x < self.width {
            if !self.get(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x < self.width && self.get(x, y) {
                x += 1;
            }
            emit(start, x);
        }
    }

    /// Rows `y0..y0 + n` as a bitmap of their own.
    pub fn rows(&self, y0: u32, n: u32) -> LaminaResult<Self> {
        let end = y0
            .checked_add(n)
            .filter(|&e| e <= self.height)
            .ok_or_else(|| LaminaError::range(format!("rows {y0}+{n} outside bitmap")))?;
        let r = self.raster();
        Self::new(
            self.width,
            end - y0,
            self.data[y0 as usize * r..end as usize * r].to_vec(),
        )
    }
}
