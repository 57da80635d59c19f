//! In-memory raster grid with band statistics and viewport resampling.

use crate::error::{KartaError, Result};
use crate::types::BBox;

/// One band of cell values, row-major, row 0 at the top of the coverage.
#[derive(Debug, Clone)]
pub struct Band {
    values: Vec<f64>,
}

impl Band {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Min and max over the band, ignoring nodata cells and NaNs. `None`
    /// when no valid cell exists.
    pub fn min_max(&self, nodata: f64) -> Option<(f64, f64)> {
        let mut out: Option<(f64, f64)> = None;
        for &v in &self.values {
            if v.is_nan() || v == nodata {
                continue;
            }
            out = Some(match out {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }
        out
    }
}

/// A georeferenced grid: pixel dimensions, coordinate-space coverage, a
/// nodata marker, and one or more value bands.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    width: usize,
    height: usize,
    bbox: BBox,
    nodata: f64,
    bands: Vec<Band>,
}

impl RasterGrid {
    /// # Errors
    ///
    /// `InvalidInput` for zero dimensions, no bands, or a band whose length
    /// does not match `width * height`.
    pub fn new(
        width: usize,
        height: usize,
        bbox: BBox,
        nodata: f64,
        bands: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(KartaError::InvalidInput(format!(
                "raster dimensions must be positive, got {width} x {height}"
            )));
        }
        if bands.is_empty() {
            return Err(KartaError::InvalidInput("raster needs at least one band".into()));
        }
        for (i, band) in bands.iter().enumerate() {
            if band.len() != width * height {
                return Err(KartaError::InvalidInput(format!(
                    "band {i} has {} cells, expected {}",
                    band.len(),
                    width * height
                )));
            }
        }
        Ok(Self {
            width,
            height,
            bbox,
            nodata,
            bands: bands.into_iter().map(|values| Band { values }).collect(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Cell value at pixel position, `None` outside the grid.
    pub fn value(&self, band: usize, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.bands.get(band).map(|b| b.values[row * self.width + col])
    }

    /// Whether a value is this grid's nodata marker.
    pub fn is_nodata(&self, v: f64) -> bool {
        v.is_nan() || v == self.nodata
    }

    /// Nearest-neighbor resample into a `width x height` grid covering
    /// `window`. Cells outside this grid's coverage come out as nodata.
    pub fn resample(&self, width: usize, height: usize, window: &BBox) -> Result<RasterGrid> {
        if width == 0 || height == 0 {
            return Err(KartaError::InvalidInput(format!(
                "resample dimensions must be positive, got {width} x {height}"
            )));
        }
        let cell_w = self.bbox.width() / self.width as f64;
        let cell_h = self.bbox.height() / self.height as f64;

        let mut bands: Vec<Vec<f64>> = vec![Vec::with_capacity(width * height); self.bands.len()];
        for row in 0..height {
            // row 0 samples the top of the window
            let y = window.max_y() - (row as f64 + 0.5) * window.height() / height as f64;
            for col in 0..width {
                let x = window.min_x() + (col as f64 + 0.5) * window.width() / width as f64;
                let src = self.source_cell(x, y, cell_w, cell_h);
                for (i, out) in bands.iter_mut().enumerate() {
                    out.push(match src {
                        Some((sc, sr)) => self.bands[i].values[sr * self.width + sc],
                        None => self.nodata,
                    });
                }
            }
        }
        RasterGrid::new(width, height, *window, self.nodata, bands)
    }

    fn source_cell(&self, x: f64, y: f64, cell_w: f64, cell_h: f64) -> Option<(usize, usize)> {
        if !self.bbox.contains_point(x, y) {
            return None;
        }
        let col = ((x - self.bbox.min_x()) / cell_w) as usize;
        let row = ((self.bbox.max_y() - y) / cell_h) as usize;
        Some((col.min(self.width - 1), row.min(self.height - 1)))
    }
}
