use serde::{Deserialize, Serialize};

use crate::foundation::core::IntRect;
use crate::foundation::error::{LaminaError, LaminaResult};

/// Placement and layout of an axis-aligned 8-bit image drawn 1:1 in device space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Samples per pixel: 1 (gray), 3 (RGB) or 4 (CMYK).
    pub n_comps: u8,
}

impl ImageHeader {
    pub fn validate(&self) -> LaminaResult<()> {
        if !matches!(self.n_comps, 1 | 3 | 4) {
            return Err(LaminaError::range(format!(
                "images carry 1, 3 or 4 components, not {}",
                self.n_comps
            )));
        }
        if self.width == 0 || self.height == 0 || self.width > i32::MAX as u32 {
            return Err(LaminaError::range(format!(
                "image size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn rect(&self) -> IntRect {
        IntRect::from_xywh(self.x, self.y, self.width as i32, self.height as i32)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * usize::from(self.n_comps)
    }
}

/// Tracks how many rows of an image have been supplied.
#[derive(Clone, Debug)]
pub struct ImageCursor {
    header: ImageHeader,
    next_row: u32,
}

impl ImageCursor {
    pub fn new(header: ImageHeader) -> LaminaResult<Self> {
        header.validate()?;
        Ok(Self {
            header,
            next_row: 0,
        })
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn next_row(&self) -> u32 {
        self.next_row
    }

    pub fn is_complete(&self) -> bool {
        self.next_row >= self.header.height
    }

    /// Hands each of the `n_rows` rows in `rows` to `row_fn` with its device y.
    pub fn feed(
        &mut self,
        rows: &[u8],
        n_rows: u32,
        mut row_fn: impl FnMut(i32, &[u8]),
    ) -> LaminaResult<()> {
        let row_bytes = self.header.row_bytes();
        if rows.len() != row_bytes * n_rows as usize {
            return Err(LaminaError::range(format!(
                "{n_rows} image rows need {} bytes, got {}",
                row_bytes * n_rows as usize,
                rows.len()
            )));
        }
        if self.next_row.saturating_add(n_rows) > self.header.height {
            return Err(LaminaError::range("more image rows than the image height"));
        }
        for (i, row) in rows.chunks_exact(row_bytes).enumerate() {
            row_fn(self.header.y + (self.next_row as usize + i) as i32, row);
        }
        self.next_row += n_rows;
        Ok(())
    }
}
