use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use common::config::PreprocessingSettings;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

pub const FEATURE_NAMES: [&str; 8] = [
    "Distance(mi)",
    "Temperature(F)",
    "Wind_Speed(mph)",
    "Visibility(mi)",
    "hour",
    "day_of_week",
    "month",
    "weather_risk",
];

pub const TARGET_CLASSES: [&str; 3] = ["Low Risk", "Medium Risk", "High Risk"];
pub const N_CLASSES: usize = TARGET_CLASSES.len();

const START_TIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset has no usable rows")]
    NoUsableRows,

    #[error("column '{0}' has no values to impute from")]
    AllMissing(&'static str),

    #[error("test ratio must be within (0, 1), got {0}")]
    InvalidTestRatio(f64),

    #[error("split of {samples} samples leaves an empty train or test set")]
    TooFewSamples { samples: usize },
}

/// One row of the accidents CSV. Unknown columns are ignored and numeric
/// cells that fail to parse are read as missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccidentRecord {
    #[serde(rename = "Severity", default, deserialize_with = "csv::invalid_option")]
    pub severity: Option<f64>,
    #[serde(rename = "Start_Time", default)]
    pub start_time: Option<String>,
    #[serde(rename = "Distance(mi)", default, deserialize_with = "csv::invalid_option")]
    pub distance: Option<f64>,
    #[serde(rename = "Temperature(F)", default, deserialize_with = "csv::invalid_option")]
    pub temperature: Option<f64>,
    #[serde(rename = "Wind_Speed(mph)", default, deserialize_with = "csv::invalid_option")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "Visibility(mi)", default, deserialize_with = "csv::invalid_option")]
    pub visibility: Option<f64>,
    #[serde(rename = "Weather_Condition", default)]
    pub weather_condition: Option<String>,
}

/// Accepts the timestamp layouts found in the accidents export, with or
/// without fractional seconds and offsets. Offsets are dropped, keeping
/// the local wall-clock time.
pub fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(parsed.naive_local());
    }
    START_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Severity 1 and 2 are low risk, 3 medium, 4 high. Anything else has no class.
pub fn risk_class(severity: f64) -> Option<usize> {
    if severity == 1.0 || severity == 2.0 {
        Some(0)
    } else if severity == 3.0 {
        Some(1)
    } else if severity == 4.0 {
        Some(2)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<usize>) -> Self {
        Self {
            features,
            labels,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn class_counts(&self, n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; n_classes];
        for &label in &self.labels {
            if label < n_classes {
                counts[label] += 1;
            }
        }
        counts
    }

    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Splits into `(train, test)` keeping class proportions in both parts.
    ///
    /// Every class with at least two samples lands on both sides.
    pub fn stratified_split(&self, test_ratio: f64, seed: u64) -> Result<(Dataset, Dataset), DatasetError> {
        if test_ratio.is_nan() || test_ratio <= 0.0 || test_ratio >= 1.0 {
            return Err(DatasetError::InvalidTestRatio(test_ratio));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, &label) in self.labels.iter().enumerate() {
            by_class.entry(label).or_default().push(index);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::with_capacity(self.n_samples());
        let mut test = Vec::new();
        for (_, mut indices) in by_class {
            indices.shuffle(&mut rng);
            let n = indices.len();
            let mut n_test = (n as f64 * test_ratio).round() as usize;
            if n >= 2 {
                n_test = n_test.clamp(1, n - 1);
            }
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        if train.is_empty() || test.is_empty() {
            return Err(DatasetError::TooFewSamples {
                samples: self.n_samples(),
            });
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        Ok((self.subset(&train), self.subset(&test)))
    }
}

struct PreparedRow {
    distance: Option<f64>,
    temperature: Option<f64>,
    wind_speed: Option<f64>,
    visibility: Option<f64>,
    hour: f64,
    day_of_week: f64,
    month: f64,
    weather_risk: f64,
    label: Option<usize>,
}

fn prepare_row(record: AccidentRecord, settings: &PreprocessingSettings) -> Option<PreparedRow> {
    let start_time = parse_start_time(record.start_time.as_deref()?)?;

    let weather_risk = record
        .weather_condition
        .as_deref()
        .and_then(|condition| settings.weather_risk.get(condition))
        .copied()
        .unwrap_or(settings.default_weather_risk);

    Some(PreparedRow {
        distance: record.distance.filter(|v| !v.is_nan()),
        temperature: record.temperature.filter(|v| !v.is_nan()),
        wind_speed: record.wind_speed.filter(|v| !v.is_nan()),
        visibility: record.visibility.filter(|v| !v.is_nan()),
        hour: start_time.hour() as f64,
        day_of_week: start_time.weekday().num_days_from_monday() as f64,
        month: start_time.month() as f64,
        weather_risk,
        label: record.severity.and_then(risk_class),
    })
}

pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn column_median(rows: &[PreparedRow], column: impl Fn(&PreparedRow) -> Option<f64>) -> Option<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(column).collect();
    median(&mut values)
}

fn fill(value: Option<f64>, fallback: Option<f64>, column: &'static str) -> Result<f64, DatasetError> {
    value.or(fallback).ok_or(DatasetError::AllMissing(column))
}

/// Turns raw accident records into the model's feature matrix and labels.
///
/// Medians are taken over every row with a valid timestamp, before rows
/// without a risk class are dropped.
pub fn prepare_records(
    records: impl IntoIterator<Item = AccidentRecord>,
    settings: &PreprocessingSettings,
) -> Result<Dataset, DatasetError> {
    let rows: Vec<PreparedRow> = records
        .into_iter()
        .filter_map(|record| prepare_row(record, settings))
        .collect();

    let distance_median = column_median(&rows, |row| row.distance);
    let temperature_median = column_median(&rows, |row| row.temperature);
    let wind_speed_median = column_median(&rows, |row| row.wind_speed);

    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(label) = row.label else {
            continue;
        };

        let distance = fill(row.distance, distance_median, FEATURE_NAMES[0])?;
        let temperature = fill(row.temperature, temperature_median, FEATURE_NAMES[1])?;
        let wind_speed = fill(row.wind_speed, wind_speed_median, FEATURE_NAMES[2])?;
        let visibility = row.visibility.unwrap_or(settings.visibility_fill);

        features.push(vec![
            settings.distance_bounds.clip(distance),
            settings.temperature_bounds.clip(temperature),
            settings.wind_speed_bounds.clip(wind_speed),
            settings.visibility_bounds.clip(visibility),
            row.hour,
            row.day_of_week,
            row.month,
            row.weather_risk,
        ]);
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(DatasetError::NoUsableRows);
    }

    let dataset = Dataset::new(features, labels);
    tracing::info!(
        rows = dataset.n_samples(),
        columns = dataset.n_features(),
        "Dataset shape"
    );
    tracing::info!(distribution = ?dataset.class_counts(N_CLASSES), "Target distribution");
    Ok(dataset)
}

pub fn load_dataset(path: impl AsRef<Path>, settings: &PreprocessingSettings) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    tracing::info!(path = %path.display(), "Loading accidents dataset");

    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<AccidentRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(records = records.len(), "Read raw records");

    prepare_records(records, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_time_layouts() {
        let expected = NaiveDate::from_ymd_opt(2016, 2, 8)
            .unwrap()
            .and_hms_opt(5, 46, 0)
            .unwrap();

        assert_eq!(parse_start_time("2016-02-08 05:46:00"), Some(expected));
        assert_eq!(parse_start_time("2016-02-08T05:46:00"), Some(expected));
        assert_eq!(parse_start_time("2016-02-08 05:46"), Some(expected));
        assert_eq!(parse_start_time("02/08/2016 05:46:00"), Some(expected));
        assert_eq!(
            parse_start_time("2016-02-08 05:46:00.000000000").map(|t| t.hour()),
            Some(5)
        );
        assert_eq!(parse_start_time("2016-02-08T05:46:00-05:00"), Some(expected));
        assert_eq!(parse_start_time("not a date"), None);
        assert_eq!(parse_start_time("   "), None);
    }

    #[test]
    fn test_risk_class_mapping() {
        assert_eq!(risk_class(1.0), Some(0));
        assert_eq!(risk_class(2.0), Some(0));
        assert_eq!(risk_class(3.0), Some(1));
        assert_eq!(risk_class(4.0), Some(2));
        assert_eq!(risk_class(0.0), None);
        assert_eq!(risk_class(5.0), None);
        assert_eq!(risk_class(2.5), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }
}
