//! Неизменяемая таблица числовых признаков
//!
//! Все этапы пайплайна принимают `&Frame` и возвращают новый `Frame`,
//! исходная таблица никогда не изменяется.

use ndarray::{concatenate, Array1, Array2, ArrayView1, Axis};

use crate::error::{EnergyError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl Frame {
    pub fn new(columns: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if columns.len() != data.ncols() {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} columns", columns.len()),
                found: format!("{} columns", data.ncols()),
            });
        }
        Ok(Self { columns, data })
    }

    /// Сборка таблицы из именованных столбцов одинаковой длины
    pub fn from_columns(columns: Vec<(String, Array1<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let mut data = Array2::zeros((n_rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());

        for (j, (name, values)) in columns.into_iter().enumerate() {
            if values.len() != n_rows {
                return Err(EnergyError::ShapeMismatch {
                    expected: format!("{} rows in '{}'", n_rows, name),
                    found: format!("{} rows", values.len()),
                });
            }
            data.column_mut(j).assign(&values);
            names.push(name);
        }

        Self::new(names, data)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| EnergyError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.data.column(idx))
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let indices = names
            .iter()
            .map(|n| self.column_index(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Frame {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            data: self.data.select(Axis(1), &indices),
        })
    }

    /// Удаление столбцов; неизвестное имя считается ошибкой
    pub fn drop<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        for name in names {
            self.column_index(name.as_ref())?;
        }
        let keep: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| !names.iter().any(|n| n.as_ref() == *c))
            .collect();
        self.select(&keep)
    }

    /// Замена существующего столбца или добавление нового в конец
    pub fn with_column(&self, name: &str, values: Array1<f64>) -> Result<Frame> {
        if values.len() != self.nrows() {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} rows", self.nrows()),
                found: format!("{} rows", values.len()),
            });
        }

        if let Ok(idx) = self.column_index(name) {
            let mut data = self.data.clone();
            data.column_mut(idx).assign(&values);
            return Ok(Frame {
                columns: self.columns.clone(),
                data,
            });
        }

        let column = values.insert_axis(Axis(1));
        let data = concatenate(Axis(1), &[self.data.view(), column.view()])
            .map_err(|e| EnergyError::ShapeMismatch {
                expected: format!("{} rows", self.nrows()),
                found: e.to_string(),
            })?;
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        Ok(Frame { columns, data })
    }

    pub fn take_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.clone(),
            data: self.data.select(Axis(0), indices),
        }
    }

    /// Склейка по строкам, схемы обеих таблиц должны совпадать
    pub fn vstack(&self, other: &Frame) -> Result<Frame> {
        if self.columns != other.columns {
            return Err(EnergyError::ShapeMismatch {
                expected: self.columns.join(","),
                found: other.columns.join(","),
            });
        }
        let data = concatenate(Axis(0), &[self.data.view(), other.data.view()])
            .map_err(|e| EnergyError::ShapeMismatch {
                expected: format!("{} columns", self.ncols()),
                found: e.to_string(),
            })?;
        Ok(Frame {
            columns: self.columns.clone(),
            data,
        })
    }

    /// Отделение целевой переменной от признаков
    pub fn split_target(&self, target: &str) -> Result<(Frame, Array1<f64>)> {
        let y = self.column(target)?.to_owned();
        let x = self.drop(&[target])?;
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Frame {
        Frame::new(
            vec!["a".into(), "b".into(), "c".into()],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn select_and_drop_keep_order() {
        let frame = sample();
        let selected = frame.select(&["c", "a"]).unwrap();
        assert_eq!(selected.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(selected.data(), &array![[3.0, 1.0], [6.0, 4.0]]);

        let dropped = frame.drop(&["b"]).unwrap();
        assert_eq!(dropped.columns(), &["a".to_string(), "c".to_string()]);
        assert!(frame.drop(&["missing"]).is_err());
    }

    #[test]
    fn with_column_appends_or_replaces() {
        let frame = sample();
        let appended = frame.with_column("d", array![7.0, 8.0]).unwrap();
        assert_eq!(appended.ncols(), 4);
        assert_eq!(appended.column("d").unwrap().to_vec(), vec![7.0, 8.0]);

        let replaced = frame.with_column("a", array![0.0, 0.0]).unwrap();
        assert_eq!(replaced.ncols(), 3);
        assert_eq!(replaced.column("a").unwrap().to_vec(), vec![0.0, 0.0]);
        // исходная таблица не изменилась
        assert_eq!(frame.column("a").unwrap().to_vec(), vec![1.0, 4.0]);
    }

    #[test]
    fn split_target_removes_column() {
        let (x, y) = sample().split_target("b").unwrap();
        assert_eq!(y.to_vec(), vec![2.0, 5.0]);
        assert!(!x.has_column("b"));
    }

    #[test]
    fn vstack_requires_same_schema() {
        let frame = sample();
        let stacked = frame.vstack(&frame).unwrap();
        assert_eq!(stacked.nrows(), 4);

        let other = frame.select(&["a"]).unwrap();
        assert!(frame.vstack(&other).is_err());
    }
}
