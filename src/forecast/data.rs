//! Dataset ingestion and preparation
//!
//! Turns a raw CSV table into a [`TimeSeriesRecord`]: timestamps normalized
//! to UTC, unparseable rows filtered out, rows ordered chronologically.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::{fs::File, io::Read, path::Path};
use tracing::{info, warn};

use super::ForecastError;
use crate::config::DataConfig;
use crate::domain::{Observation, TimeSeriesRecord};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Untyped tabular data as read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ForecastError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Render a prepared record back into table form (date column first)
    pub fn from_record(record: &TimeSeriesRecord, date_column: &str) -> Self {
        let mut headers = vec![date_column.to_string(), record.target_column().to_string()];
        headers.extend(record.columns().iter().cloned());

        let rows = record
            .observations()
            .iter()
            .map(|obs| {
                let mut row = vec![obs.timestamp.to_rfc3339(), obs.target.to_string()];
                row.extend(
                    record
                        .columns()
                        .iter()
                        .map(|c| obs.sensor(c).map(|v| v.to_string()).unwrap_or_default()),
                );
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a date cell; naive stamps are taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub struct DataPreparer {
    date_column: String,
    target_column: String,
    default_start_date: String,
}

impl DataPreparer {
    pub fn new(cfg: &DataConfig) -> Self {
        Self {
            date_column: cfg.date_column.clone(),
            target_column: cfg.target_column.clone(),
            default_start_date: cfg.default_start_date.clone(),
        }
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    /// Read and prepare the dataset stored at `path`
    pub fn load(&self, path: &Path) -> Result<TimeSeriesRecord, ForecastError> {
        if !path.exists() {
            tracing::error!(path = %path.display(), "dataset not found");
            return Err(ForecastError::DataNotFound {
                path: path.to_path_buf(),
            });
        }

        info!(path = %path.display(), "loading dataset");
        let raw = RawTable::from_reader(File::open(path)?)?;
        self.prepare(raw)
    }

    pub fn prepare(&self, raw: RawTable) -> Result<TimeSeriesRecord, ForecastError> {
        let target_idx = raw
            .column_index(&self.target_column)
            .ok_or_else(|| ForecastError::MissingColumn(self.target_column.clone()))?;
        let date_idx = raw.column_index(&self.date_column);

        let synthetic_start = match date_idx {
            Some(_) => None,
            None => {
                warn!(
                    column = %self.date_column,
                    "date column not found, creating synthetic hourly dates"
                );
                Some(self.synthetic_start()?)
            }
        };

        let sensor_columns: Vec<(usize, String)> = raw
            .headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx && Some(*i) != date_idx)
            .map(|(i, h)| (i, h.clone()))
            .collect();

        let total = raw.len();
        let mut bad_dates = 0usize;
        let mut bad_targets = 0usize;
        let mut observations = Vec::with_capacity(total);

        for (row_no, row) in raw.rows.iter().enumerate() {
            let timestamp = match (date_idx, synthetic_start) {
                (Some(idx), _) => row.get(idx).and_then(|cell| parse_timestamp(cell)),
                (None, Some(start)) => Some(start + Duration::hours(row_no as i64)),
                (None, None) => None,
            };
            let Some(timestamp) = timestamp else {
                bad_dates += 1;
                continue;
            };

            let Some(target) = row.get(target_idx).and_then(|cell| parse_number(cell)) else {
                bad_targets += 1;
                continue;
            };

            let mut obs = Observation::new(timestamp, target);
            for (idx, name) in &sensor_columns {
                if let Some(value) = row.get(*idx).and_then(|cell| parse_number(cell)) {
                    obs.sensors.insert(name.clone(), value);
                }
            }
            observations.push(obs);
        }

        if bad_dates > 0 {
            warn!(rows = bad_dates, "dropped rows with unparseable dates");
        }
        if bad_targets > 0 {
            warn!(rows = bad_targets, column = %self.target_column, "dropped rows with non-numeric target");
        }

        let kept = observations.len();
        let columns = sensor_columns.into_iter().map(|(_, name)| name).collect();
        let record = TimeSeriesRecord::new(self.target_column.clone(), columns, observations);
        if record.len() < kept {
            warn!(rows = kept - record.len(), "dropped rows with duplicate timestamps");
        }

        match record.span() {
            Some((first, last)) => info!(
                rows = record.len(),
                from = %first,
                to = %last,
                "prepared dataset"
            ),
            None => warn!("prepared dataset is empty"),
        }

        Ok(record)
    }

    fn synthetic_start(&self) -> Result<DateTime<Utc>, ForecastError> {
        parse_timestamp(&self.default_start_date)
            .ok_or_else(|| ForecastError::InvalidStartDate(self.default_start_date.clone()))
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn preparer() -> DataPreparer {
        DataPreparer::new(&DataConfig::default())
    }

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_prepare_sorts_and_parses() {
        let raw = table(
            "date,Appliances,T1,RH_1\n\
             2016-01-11 19:00:00,50,19.8,44.2\n\
             2016-01-11 17:00:00,60,19.9,46.7\n\
             2016-01-11 18:00:00,70,19.7,45.0\n",
        );

        let record = preparer().prepare(raw).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.targets(), vec![60.0, 70.0, 50.0]);
        assert_eq!(record.columns(), &["T1".to_string(), "RH_1".to_string()]);
        assert_eq!(record.observations()[0].sensor("T1"), Some(19.9));
    }

    #[test]
    fn test_unparseable_dates_are_dropped() {
        let raw = table(
            "date,Appliances\n\
             2016-01-11 17:00:00,60\n\
             not-a-date,70\n\
             ,80\n\
             2016-01-11 18:00:00,50\n",
        );

        let record = preparer().prepare(raw).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.targets(), vec![60.0, 50.0]);
    }

    #[test]
    fn test_missing_date_column_synthesizes_hourly_sequence() {
        let raw = table("Appliances,T1\n10,1.0\n20,2.0\n30,3.0\n");

        let record = preparer().prepare(raw).unwrap();
        let stamps = record.timestamps();
        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[0].to_rfc3339(), "2023-01-01T00:00:00+00:00");
        assert_eq!(stamps[2] - stamps[0], Duration::hours(2));
    }

    #[test]
    fn test_missing_target_column_is_an_error() {
        let raw = table("date,Other\n2016-01-11 17:00:00,1\n");
        let err = preparer().prepare(raw).unwrap_err();
        assert!(matches!(err, ForecastError::MissingColumn(c) if c == "Appliances"));
    }

    #[test]
    fn test_missing_dataset_is_data_not_found() {
        let err = preparer()
            .load(Path::new("/nonexistent/appliances_energy.csv"))
            .unwrap_err();
        assert!(matches!(err, ForecastError::DataNotFound { .. }));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2016-01-11 17:00:00").is_some());
        assert!(parse_timestamp("2016-01-11T17:00:00").is_some());
        assert!(parse_timestamp("2016-01-11T17:00:00+01:00").is_some());
        assert!(parse_timestamp("2016-01-11 17:00").is_some());
        assert!(parse_timestamp("2016-01-11").is_some());
        assert!(parse_timestamp("11/01/2016").is_none());
    }

    proptest! {
        #[test]
        fn prop_prepared_output_sorted_and_idempotent(
            rows in prop::collection::vec((0i64..2_000, 0.0f64..1_000.0, prop::option::of(-10.0f64..40.0)), 0..60)
        ) {
            let base = Utc.with_ymd_and_hms(2016, 1, 11, 0, 0, 0).unwrap();
            let mut csv = String::from("date,Appliances,T1\n");
            for (hour, target, t1) in &rows {
                let ts = base + Duration::hours(*hour);
                let t1 = t1.map(|v| v.to_string()).unwrap_or_default();
                csv.push_str(&format!("{},{},{}\n", ts.format("%Y-%m-%d %H:%M:%S"), target, t1));
            }

            let p = preparer();
            let first = p.prepare(table(&csv)).unwrap();
            let stamps = first.timestamps();
            prop_assert!(stamps.windows(2).all(|w| w[0] < w[1]));

            let second = p.prepare(RawTable::from_record(&first, p.date_column())).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
