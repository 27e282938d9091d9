#![allow(dead_code)]

use common::config::{GradientBoostingSettings, RandomForestSettings, TrainerConfig};
use training::Dataset;

const WEATHER: [&str; 4] = ["Clear", "Rain", "Snow", "Fog"];

/// Accident rows whose class depends only on distance, with the other
/// columns cycling through unrelated values.
pub fn synthetic_csv(rows_per_class: usize) -> String {
    let mut csv = String::from(
        "ID,Severity,Start_Time,Distance(mi),Temperature(F),Wind_Speed(mph),Visibility(mi),Weather_Condition\n",
    );
    for i in 0..rows_per_class {
        let step = (i % 10) as f64;
        for (severity, distance) in [(2, 0.1 + 0.08 * step), (3, 4.0 + 0.4 * step), (4, 15.0 + 1.5 * step)] {
            csv.push_str(&format!(
                "S-{severity}-{i},{severity},2021-{month:02}-{day:02} {hour:02}:15:00,{distance},{temperature},{wind},{visibility},{weather}\n",
                month = 1 + i % 12,
                day = 1 + i % 28,
                hour = (i * 5) % 24,
                temperature = 30 + (i * 7) % 50,
                wind = (i * 3) % 20,
                visibility = 1 + i % 10,
                weather = WEATHER[i % WEATHER.len()],
            ));
        }
    }
    csv
}

pub fn synthetic_dataset(rows_per_class: usize) -> Dataset {
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..rows_per_class {
        let step = (i % 10) as f64;
        for (label, distance) in [(0, 0.1 + 0.08 * step), (1, 4.0 + 0.4 * step), (2, 15.0 + 1.5 * step)] {
            features.push(vec![
                distance,
                (30 + (i * 7) % 50) as f64,
                ((i * 3) % 20) as f64,
                (1 + i % 10) as f64,
                ((i * 5) % 24) as f64,
                (i % 7) as f64,
                (1 + i % 12) as f64,
                (i % 4) as f64,
            ]);
            labels.push(label);
        }
    }
    Dataset::new(features, labels)
}

pub fn quick_config(dataset_path: &str, output_dir: &str) -> TrainerConfig {
    let mut config = TrainerConfig::new(dataset_path);
    config.output_dir = output_dir.to_string();
    config.random_forest = RandomForestSettings {
        n_estimators: 15,
        ..RandomForestSettings::default()
    };
    config.gradient_boosting = GradientBoostingSettings {
        n_estimators: 20,
        max_depth: 3,
        ..GradientBoostingSettings::default()
    };
    config
}
