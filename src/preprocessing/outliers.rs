//! Обработка выбросов методом IQR

use ndarray::{Array1, ArrayView1};

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::preprocessing::statistics::quantile_sorted;
use crate::types::ColumnBounds;

pub const IQR_MULTIPLIER: f64 = 1.5;

/// Какие границы применять при отсечении
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSides {
    pub lower: bool,
    pub upper: bool,
}

impl ClipSides {
    pub const BOTH: ClipSides = ClipSides {
        lower: true,
        upper: true,
    };
}

impl Default for ClipSides {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Результат обработки таблицы: новая таблица и вычисленные границы
#[derive(Debug, Clone)]
pub struct ClippedFrame {
    pub frame: Frame,
    pub bounds: Vec<ColumnBounds>,
}

pub struct OutlierClipper;

impl OutlierClipper {
    /// Границы Q1 - 1.5·IQR и Q3 + 1.5·IQR для столбца
    pub fn bounds(name: &str, values: ArrayView1<'_, f64>) -> Result<ColumnBounds> {
        if values.is_empty() {
            return Err(EnergyError::EmptyData(format!("column '{}' is empty", name)));
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;

        Ok(ColumnBounds {
            column: name.to_string(),
            q1,
            q3,
            iqr,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        })
    }

    /// Замена значений за границами на сами границы; значения внутри не меняются
    pub fn clip_values(
        values: ArrayView1<'_, f64>,
        bounds: &ColumnBounds,
        sides: ClipSides,
    ) -> Array1<f64> {
        values.mapv(|x| {
            if sides.lower && x < bounds.lower {
                bounds.lower
            } else if sides.upper && x > bounds.upper {
                bounds.upper
            } else {
                x
            }
        })
    }

    pub fn clip_column(
        name: &str,
        values: ArrayView1<'_, f64>,
        sides: ClipSides,
    ) -> Result<(Array1<f64>, ColumnBounds)> {
        let bounds = Self::bounds(name, values)?;
        Ok((Self::clip_values(values, &bounds, sides), bounds))
    }

    /// Обработка таблицы; `columns = None` означает все столбцы
    pub fn clip_frame<S: AsRef<str>>(
        frame: &Frame,
        columns: Option<&[S]>,
        sides: ClipSides,
    ) -> Result<ClippedFrame> {
        let targets: Vec<String> = match columns {
            Some(list) => {
                for name in list {
                    frame.column_index(name.as_ref())?;
                }
                list.iter().map(|s| s.as_ref().to_string()).collect()
            }
            None => frame.columns().to_vec(),
        };

        let mut bounds = Vec::with_capacity(targets.len());
        for name in &targets {
            bounds.push(Self::bounds(name, frame.column(name)?)?);
        }

        let frame = Self::apply_bounds(frame, &bounds, sides)?;
        Ok(ClippedFrame { frame, bounds })
    }

    /// Повторное применение ранее вычисленных границ к другой таблице
    pub fn apply_bounds(frame: &Frame, bounds: &[ColumnBounds], sides: ClipSides) -> Result<Frame> {
        let mut data = frame.data().clone();

        for b in bounds {
            let idx = frame.column_index(&b.column)?;
            let column = data.column(idx);
            let clipped = Self::clip_values(column, b, sides);
            let changed = column
                .iter()
                .zip(clipped.iter())
                .filter(|(a, c)| a.to_bits() != c.to_bits())
                .count();
            if changed > 0 {
                tracing::debug!(
                    "Clipped {} values in '{}' to [{:.4}, {:.4}]",
                    changed,
                    b.column,
                    b.lower,
                    b.upper
                );
            }
            data.column_mut(idx).assign(&clipped);
        }

        Frame::new(frame.columns().to_vec(), data)
    }
}
