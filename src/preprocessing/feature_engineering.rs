//! Feature engineering: календарные признаки из временной метки

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime};
use ndarray::Array1;

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::preprocessing::calendar::{calendar_features, HolidayCalendar};
use crate::types::{
    CalendarFeatures, ObservationTable, DAY_COLUMN, DAY_OF_WEEK_COLUMN, HOLIDAY_COLUMN,
    HOUR_COLUMN, MONTH_COLUMN, NSM_COLUMN, WEEKEND_COLUMN,
};

pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Годы, встречающиеся в данных (для построения календаря праздников)
    pub fn years(timestamps: &[NaiveDateTime]) -> BTreeSet<i32> {
        timestamps.iter().map(|ts| ts.year()).collect()
    }

    pub fn calendar(timestamps: &[NaiveDateTime], holidays: &HolidayCalendar) -> Vec<CalendarFeatures> {
        timestamps
            .iter()
            .map(|ts| calendar_features(ts, holidays))
            .collect()
    }

    /// Числовые столбцы + день недели, выходной, месяц, день, час.
    /// Текстовые `WeekStatus` и `Day_of_week` заменяются числовыми.
    pub fn with_time_features(
        table: &ObservationTable,
        calendar: &[CalendarFeatures],
    ) -> Result<Frame> {
        let n = table.numeric.nrows();
        if calendar.len() != n {
            return Err(EnergyError::ShapeMismatch {
                expected: format!("{} calendar rows", n),
                found: format!("{} calendar rows", calendar.len()),
            });
        }

        let mismatched = table
            .week_status
            .iter()
            .zip(calendar)
            .filter(|(status, c)| status.eq_ignore_ascii_case("weekend") != c.weekend)
            .count();
        if mismatched > 0 {
            tracing::warn!("{} rows have WeekStatus inconsistent with the timestamp", mismatched);
        }

        let column = |f: fn(&CalendarFeatures) -> f64| -> Array1<f64> {
            calendar.iter().map(f).collect()
        };

        let mut frame = table.numeric.clone();
        frame = frame.with_column(DAY_OF_WEEK_COLUMN, column(|c| c.day_of_week as f64))?;
        frame = frame.with_column(WEEKEND_COLUMN, column(|c| if c.weekend { 1.0 } else { 0.0 }))?;
        frame = frame.with_column(MONTH_COLUMN, column(|c| c.month as f64))?;
        frame = frame.with_column(DAY_COLUMN, column(|c| c.day as f64))?;
        frame = frame.with_column(HOUR_COLUMN, column(|c| c.hour as f64))?;

        let nsm = column(|c| c.nsm as f64);
        if frame.has_column(NSM_COLUMN) {
            let differing = frame
                .column(NSM_COLUMN)?
                .iter()
                .zip(nsm.iter())
                .filter(|(a, b)| (*a - *b).abs() > 0.5)
                .count();
            if differing > 0 {
                tracing::warn!("{} rows have NSM inconsistent with the timestamp", differing);
            }
        } else {
            frame = frame.with_column(NSM_COLUMN, nsm)?;
        }

        Ok(frame)
    }

    /// Булев признак праздничного дня (1.0 / 0.0)
    pub fn with_holiday(frame: &Frame, calendar: &[CalendarFeatures]) -> Result<Frame> {
        let holiday: Array1<f64> = calendar
            .iter()
            .map(|c| if c.holiday { 1.0 } else { 0.0 })
            .collect();
        frame.with_column(HOLIDAY_COLUMN, holiday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::TIMESTAMP_FORMAT;
    use ndarray::array;

    fn table() -> ObservationTable {
        let timestamps = ["2016-03-28 09:00:00", "2016-04-02 18:30:00"]
            .iter()
            .map(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap())
            .collect();
        ObservationTable {
            timestamps,
            numeric: Frame::new(vec!["Appliances".into()], array![[50.0], [120.0]]).unwrap(),
            week_status: vec!["Weekday".into(), "Weekend".into()],
            day_of_week: vec!["Monday".into(), "Saturday".into()],
        }
    }

    #[test]
    fn appends_calendar_columns() {
        let table = table();
        let holidays = HolidayCalendar::belgium(FeatureEngineer::years(&table.timestamps));
        let calendar = FeatureEngineer::calendar(&table.timestamps, &holidays);

        let frame = FeatureEngineer::with_time_features(&table, &calendar).unwrap();
        assert_eq!(frame.column(DAY_OF_WEEK_COLUMN).unwrap().to_vec(), vec![0.0, 5.0]);
        assert_eq!(frame.column(WEEKEND_COLUMN).unwrap().to_vec(), vec![0.0, 1.0]);
        assert_eq!(frame.column(HOUR_COLUMN).unwrap().to_vec(), vec![9.0, 18.0]);
        assert_eq!(frame.column(NSM_COLUMN).unwrap().to_vec(), vec![32400.0, 66600.0]);
        assert!(!frame.has_column(HOLIDAY_COLUMN));

        let frame = FeatureEngineer::with_holiday(&frame, &calendar).unwrap();
        // 2016-03-28 — Пасхальный понедельник
        assert_eq!(frame.column(HOLIDAY_COLUMN).unwrap().to_vec(), vec![1.0, 0.0]);
    }
}
