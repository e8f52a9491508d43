//! Fixed-width scalar encoding for log records.

use serde::{Deserialize, Serialize};

use crate::color::ColorIndex;
use crate::foundation::error::{LaminaError, LaminaResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

macro_rules! put_scalar {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty) {
            match self.order {
                ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
                ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
            }
        }
    };
}

macro_rules! get_scalar {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> LaminaResult<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes: [u8; N] = self
                .take(N)?
                .try_into()
                .map_err(|_| LaminaError::range("short scalar"))?;
            Ok(match self.order {
                ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                ByteOrder::Big => <$ty>::from_be_bytes(bytes),
            })
        }
    };
}

/// Appends scalars to a byte buffer in the configured order.
#[derive(Debug)]
pub struct Encoder {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Encoder {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    put_scalar!(put_u32, u32);
    put_scalar!(put_i32, i32);
    put_scalar!(put_u64, u64);
    put_scalar!(put_f32, f32);
    put_scalar!(put_f64, f64);

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes the low `n_bytes` bytes of a packed color, most significant first.
    pub fn put_color(&mut self, color: ColorIndex, n_bytes: usize) {
        for i in (0..n_bytes).rev() {
            self.buf.push((color.0 >> (8 * i)) as u8);
        }
    }
}

/// Reads scalars back; running past the end is a `Range` error.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self {
            data,
            pos: 0,
            order,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> LaminaResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.data.len())
            .ok_or_else(|| {
                LaminaError::range(format!(
                    "record truncated: need {n} bytes at {}, {} left",
                    self.pos,
                    self.remaining()
                ))
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn get_u8(&mut self) -> LaminaResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> LaminaResult<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(LaminaError::range(format!("bool byte {v}"))),
        }
    }

    get_scalar!(get_u32, u32);
    get_scalar!(get_i32, i32);
    get_scalar!(get_u64, u64);
    get_scalar!(get_f32, f32);
    get_scalar!(get_f64, f64);

    pub fn get_color(&mut self, n_bytes: usize) -> LaminaResult<ColorIndex> {
        let mut v = 0u64;
        for &b in self.take(n_bytes)? {
            v = (v << 8) | u64::from(b);
        }
        Ok(ColorIndex(v))
    }
}
