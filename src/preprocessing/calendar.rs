//! Календарные признаки и праздничные дни

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::types::CalendarFeatures;

/// Набор праздничных дат с поиском за O(1)
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Государственные праздники Бельгии за указанные годы
    pub fn belgium(years: impl IntoIterator<Item = i32>) -> Self {
        Self::new(years.into_iter().flat_map(belgian_holidays))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

fn belgian_holidays(year: i32) -> Vec<NaiveDate> {
    let fixed = [(1, 1), (5, 1), (7, 21), (8, 15), (11, 1), (11, 11), (12, 25)];
    let mut dates: Vec<NaiveDate> = fixed
        .iter()
        .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
        .collect();

    if let Some(easter) = easter_sunday(year) {
        // Пасха, Пасхальный понедельник, Вознесение, Троица, Духов день
        for offset in [0, 1, 39, 49, 50] {
            dates.push(easter + Duration::days(offset));
        }
    }

    dates
}

/// Дата католической Пасхи (григорианский алгоритм Гаусса/Мееуса)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

pub fn calendar_features(ts: &NaiveDateTime, holidays: &HolidayCalendar) -> CalendarFeatures {
    let day_of_week = ts.weekday().num_days_from_monday();
    CalendarFeatures {
        day_of_week,
        weekend: day_of_week >= 5,
        month: ts.month(),
        day: ts.day(),
        hour: ts.hour(),
        nsm: ts.num_seconds_from_midnight(),
        holiday: holidays.contains(ts.date()),
    }
}
