//! TIFF and PNG predictors applied after LZW/Flate (and friends).

use crate::error::{PdfError, Result};
use crate::model::objects::PDFDict;

/// Predictor settings from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl PredictorParams {
    /// `None` when the dictionary asks for no prediction (`/Predictor` 1 or absent).
    pub fn from_dict(parms: &PDFDict) -> Option<Self> {
        let int = |key: &str, default: i64| {
            parms
                .get(key)
                .and_then(|v| v.as_int().ok())
                .unwrap_or(default)
        };
        let count = |key: &str, default: i64| usize::try_from(int(key, default).max(1)).unwrap_or(1);
        let predictor = int("Predictor", 1);
        if predictor <= 1 {
            return None;
        }
        Some(Self {
            predictor,
            colors: count("Colors", 1),
            bits_per_component: count("BitsPerComponent", 8),
            columns: count("Columns", 1),
        })
    }

    /// Bytes in one row of samples, excluding any PNG tag byte.
    ///
    /// `None` when the row size does not fit in `usize`.
    pub fn row_bytes(&self) -> Option<usize> {
        self.colors
            .checked_mul(self.bits_per_component)?
            .checked_mul(self.columns)
            .map(|bits| bits.div_ceil(8))
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors.saturating_mul(self.bits_per_component) / 8).max(1)
    }
}

/// Undo the prediction described by `params`.
///
/// A row size that overflows or is larger than the data itself is
/// [`PdfError::CorruptStream`].
pub fn apply_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let row_bytes = params
        .row_bytes()
        .filter(|&n| n > 0 && n <= data.len())
        .ok_or_else(|| {
            PdfError::CorruptStream(format!(
                "predictor row of {} columns x {} colors x {} bits does not fit {} bytes",
                params.columns,
                params.colors,
                params.bits_per_component,
                data.len()
            ))
        })?;
    match params.predictor {
        2 => apply_tiff_predictor(data, row_bytes, params),
        10..=15 => apply_png_predictor(data, row_bytes, params),
        other => Err(PdfError::CorruptStream(format!("unknown predictor {other}"))),
    }
}

/// TIFF predictor 2: horizontal differencing per component.
fn apply_tiff_predictor(data: &[u8], row_bytes: usize, params: &PredictorParams) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    match params.bits_per_component {
        8 => {
            let bpp = params.colors;
            for row in out.chunks_mut(row_bytes) {
                for i in bpp..row.len() {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
        }
        16 => {
            let stride = params.colors * 2;
            for row in out.chunks_mut(row_bytes) {
                let mut i = stride;
                while i + 1 < row.len() {
                    let prev = u16::from_be_bytes([row[i - stride], row[i - stride + 1]]);
                    let cur = u16::from_be_bytes([row[i], row[i + 1]]);
                    row[i..i + 2].copy_from_slice(&cur.wrapping_add(prev).to_be_bytes());
                    i += 2;
                }
            }
        }
        bits => {
            tracing::debug!(bits, "TIFF predictor for this depth left as stored");
        }
    }
    Ok(out)
}

/// PNG predictors: every row carries a leading filter-type byte.
fn apply_png_predictor(data: &[u8], row_bytes: usize, params: &PredictorParams) -> Result<Vec<u8>> {
    let bpp = params.bytes_per_pixel();
    let row_size = row_bytes + 1;

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];
    let mut current_row = vec![0u8; row_bytes];

    // a trailing partial row is dropped
    for row in data.chunks_exact(row_size) {
        let filter_type = row[0];
        let row_data = &row[1..];

        match filter_type {
            0 => current_row.copy_from_slice(row_data),
            1 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_bytes {
                    current_row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp {
                        u16::from(current_row[i - bpp])
                    } else {
                        0
                    };
                    let above = u16::from(prev_row[i]);
                    current_row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    current_row[i] = row_data[i].wrapping_add(paeth_predictor(left, above, upper_left));
                }
            }
            other => {
                return Err(PdfError::CorruptStream(format!(
                    "invalid PNG predictor row tag {other}"
                )));
            }
        }

        result.extend_from_slice(&current_row);
        std::mem::swap(&mut prev_row, &mut current_row);
    }

    Ok(result)
}

const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
