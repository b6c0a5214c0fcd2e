//! Загрузка партиций CSV и приведение типов

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use csv::StringRecord;
use ndarray::Array2;

use crate::error::{EnergyError, Result};
use crate::frame::Frame;
use crate::types::{
    ObservationTable, RawTable, RawTimestamp, DAY_OF_WEEK_COLUMN, TIMESTAMP_COLUMN,
    WEEK_STATUS_COLUMN,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Чтение одной партиции из файла
pub fn load_partition(path: &Path) -> Result<RawTable> {
    let file = File::open(path)?;
    read_partition(file, path)
}

/// Чтение партиции из произвольного источника; `origin` используется в сообщениях об ошибках
pub fn read_partition<R: Read>(reader: R, origin: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let layout = HeaderLayout::resolve(&headers, origin)?;

    let mut timestamps = Vec::new();
    let mut week_status = Vec::new();
    let mut day_of_week = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: заголовок занимает первую строку, нумерация с 1
        let line = idx + 2;
        let record = result?;

        timestamps.push(RawTimestamp {
            line,
            value: field(&record, layout.timestamp).to_string(),
        });
        week_status.push(field(&record, layout.week_status).to_string());
        day_of_week.push(field(&record, layout.day_of_week).to_string());

        for (name, &col) in layout.numeric_names.iter().zip(&layout.numeric) {
            let raw = field(&record, col);
            let value = raw.parse::<f64>().map_err(|_| EnergyError::InvalidValue {
                line,
                column: name.clone(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }
    }

    if timestamps.is_empty() {
        return Err(EnergyError::EmptyData(format!(
            "no rows in {}",
            origin.display()
        )));
    }

    let n_rows = timestamps.len();
    let data = Array2::from_shape_vec((n_rows, layout.numeric.len()), values).map_err(|e| {
        EnergyError::SchemaMismatch {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    tracing::debug!(
        "Loaded {} rows x {} numeric columns from {}",
        n_rows,
        layout.numeric.len(),
        origin.display()
    );

    Ok(RawTable {
        timestamps,
        numeric: Frame::new(layout.numeric_names, data)?,
        week_status,
        day_of_week,
    })
}

/// Загрузка обеих партиций и их объединение в одну рабочую таблицу
pub fn load_partitions(training: &Path, testing: &Path) -> Result<RawTable> {
    let train = load_partition(training)?;
    let test = load_partition(testing)?;
    tracing::info!(
        "Loaded partitions: train {} rows, test {} rows",
        train.numeric.nrows(),
        test.numeric.nrows()
    );
    concat_partitions(train, test, testing)
}

pub fn concat_partitions(first: RawTable, second: RawTable, second_origin: &Path) -> Result<RawTable> {
    if first.numeric.columns() != second.numeric.columns() {
        return Err(EnergyError::SchemaMismatch {
            path: second_origin.to_path_buf(),
            reason: format!(
                "expected columns [{}], found [{}]",
                first.numeric.columns().join(", "),
                second.numeric.columns().join(", ")
            ),
        });
    }

    let numeric = first.numeric.vstack(&second.numeric)?;
    let mut timestamps = first.timestamps;
    timestamps.extend(second.timestamps);
    let mut week_status = first.week_status;
    week_status.extend(second.week_status);
    let mut day_of_week = first.day_of_week;
    day_of_week.extend(second.day_of_week);

    Ok(RawTable {
        timestamps,
        numeric,
        week_status,
        day_of_week,
    })
}

/// Разбор текстовой временной метки; ошибка останавливает пайплайн
pub fn normalize_types(raw: RawTable) -> Result<ObservationTable> {
    let timestamps = raw
        .timestamps
        .iter()
        .map(|ts| {
            NaiveDateTime::parse_from_str(&ts.value, TIMESTAMP_FORMAT).map_err(|e| {
                EnergyError::TimestampParse {
                    line: ts.line,
                    value: ts.value.clone(),
                    reason: e.to_string(),
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ObservationTable {
        timestamps,
        numeric: raw.numeric,
        week_status: raw.week_status,
        day_of_week: raw.day_of_week,
    })
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

struct HeaderLayout {
    timestamp: usize,
    week_status: usize,
    day_of_week: usize,
    numeric: Vec<usize>,
    numeric_names: Vec<String>,
}

impl HeaderLayout {
    fn resolve(headers: &StringRecord, origin: &Path) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EnergyError::SchemaMismatch {
                    path: origin.to_path_buf(),
                    reason: format!("missing required column '{}'", name),
                })
        };

        let timestamp = find(TIMESTAMP_COLUMN)?;
        let week_status = find(WEEK_STATUS_COLUMN)?;
        let day_of_week = find(DAY_OF_WEEK_COLUMN)?;

        let (numeric, numeric_names): (Vec<usize>, Vec<String>) = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != timestamp && *i != week_status && *i != day_of_week)
            .map(|(i, h)| (i, h.to_string()))
            .unzip();

        if numeric.is_empty() {
            return Err(EnergyError::SchemaMismatch {
                path: origin.to_path_buf(),
                reason: "no numeric columns".to_string(),
            });
        }

        Ok(Self {
            timestamp,
            week_status,
            day_of_week,
            numeric,
            numeric_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const HEADER: &str = "date,Appliances,lights,T1,NSM,WeekStatus,Day_of_week\n";

    fn partition(body: &str) -> RawTable {
        let csv = format!("{}{}", HEADER, body);
        read_partition(csv.as_bytes(), Path::new("memory.csv")).unwrap()
    }

    #[test]
    fn reads_numeric_and_categorical_columns() {
        let raw = partition(
            "2016-01-11 17:00:00,60,30,19.89,61200,Weekday,Monday\n\
             2016-01-11 17:10:00,60,30,19.89,61800,Weekday,Monday\n",
        );
        assert_eq!(
            raw.numeric.columns(),
            &["Appliances", "lights", "T1", "NSM"].map(String::from)
        );
        assert_eq!(raw.numeric.nrows(), 2);
        assert_eq!(raw.week_status, vec!["Weekday", "Weekday"]);
        assert_eq!(raw.timestamps[1].line, 3);
    }

    #[test]
    fn concatenates_partitions_in_order() {
        let a = partition("2016-01-11 17:00:00,60,30,19.89,61200,Weekday,Monday\n");
        let b = partition("2016-01-16 10:00:00,90,0,20.5,36000,Weekend,Saturday\n");
        let merged = concat_partitions(a, b, Path::new("b.csv")).unwrap();
        assert_eq!(merged.numeric.nrows(), 2);
        assert_eq!(merged.day_of_week, vec!["Monday", "Saturday"]);
        assert_eq!(merged.numeric.column("Appliances").unwrap().to_vec(), vec![60.0, 90.0]);
    }

    #[test]
    fn rejects_partitions_with_different_schema() {
        let a = partition("2016-01-11 17:00:00,60,30,19.89,61200,Weekday,Monday\n");
        let b = read_partition(
            "date,Appliances,lights,WeekStatus,Day_of_week\n2016-01-11 17:00:00,60,30,Weekday,Monday\n"
                .as_bytes(),
            Path::new("b.csv"),
        )
        .unwrap();
        assert!(matches!(
            concat_partitions(a, b, Path::new("b.csv")),
            Err(EnergyError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn parses_timestamps() {
        let raw = partition("2016-01-11 17:10:00,60,30,19.89,61800,Weekday,Monday\n");
        let table = normalize_types(raw).unwrap();
        let ts = table.timestamps[0];
        assert_eq!((ts.year(), ts.month(), ts.day()), (2016, 1, 11));
        assert_eq!((ts.hour(), ts.minute()), (17, 10));
    }

    #[test]
    fn malformed_timestamp_is_fatal() {
        let raw = partition("11/01/2016 17:10,60,30,19.89,61800,Weekday,Monday\n");
        match normalize_types(raw) {
            Err(EnergyError::TimestampParse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|t| t.timestamps.len())),
        }
    }

    #[test]
    fn invalid_number_reports_column() {
        let csv = format!("{}2016-01-11 17:00:00,abc,30,19.89,61200,Weekday,Monday\n", HEADER);
        match read_partition(csv.as_bytes(), Path::new("memory.csv")) {
            Err(EnergyError::InvalidValue { column, .. }) => assert_eq!(column, "Appliances"),
            other => panic!("unexpected result: {:?}", other.map(|t| t.numeric.nrows())),
        }
    }
}
