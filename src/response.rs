//! Decoding of the columnar measurements response into per-label series

use serde::{Deserialize, Serialize};

/// One column of the measurements response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub values: Vec<Option<f64>>,
}

/// Body returned by `POST /rest/measurements`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementsResponse {
    #[serde(default)]
    pub step: i64,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub timestamps: Option<Vec<i64>>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// A single sample; the value is absent when the server returned NaN or null
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub value: Option<f64>,
    pub timestamp: i64,
}

/// All samples for one requested label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub label: String,
    pub points: Vec<Point>,
}

/// Splits the response into one series per label.
///
/// Rows outside `[start, end]` are dropped: storage backends may return
/// wider ranges than requested for narrow time spans.
pub fn parse(response: &MeasurementsResponse) -> Vec<SeriesResult> {
    let timestamps = match &response.timestamps {
        Some(timestamps) => timestamps,
        None => return Vec::new(),
    };

    response
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let points = match response.columns.get(i) {
                Some(column) => timestamps
                    .iter()
                    .enumerate()
                    .filter(|(_, ts)| **ts >= response.start && **ts <= response.end)
                    .map(|(j, ts)| Point {
                        value: column.values.get(j).copied().flatten(),
                        timestamp: *ts,
                    })
                    .collect(),
                None => Vec::new(),
            };

            SeriesResult {
                label: label.clone(),
                points,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_point() {
        let response: MeasurementsResponse = serde_json::from_str(
            r#"{
                "step": 300000,
                "start": 1424211730000,
                "end": 1424226130000,
                "timestamps": [1424211730001],
                "labels": ["loadavg1"],
                "columns": [{"values": [5.0]}]
            }"#,
        )
        .unwrap();

        let series = parse(&response);
        assert_eq!(
            series,
            vec![SeriesResult {
                label: "loadavg1".to_string(),
                points: vec![Point {
                    value: Some(5.0),
                    timestamp: 1424211730001
                }],
            }]
        );
    }

    #[test]
    fn test_missing_timestamps_yields_no_series() {
        let response: MeasurementsResponse =
            serde_json::from_str(r#"{"start": 1, "end": 2, "labels": ["a"], "columns": []}"#)
                .unwrap();
        assert!(parse(&response).is_empty());
    }

    #[test]
    fn test_points_outside_window_are_dropped() {
        let response = MeasurementsResponse {
            step: 10,
            start: 100,
            end: 120,
            timestamps: Some(vec![90, 100, 110, 120, 130]),
            labels: vec!["a".to_string(), "b".to_string()],
            columns: vec![
                Column {
                    values: vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
                },
                Column {
                    values: vec![Some(10.0), None, Some(30.0), Some(40.0), Some(50.0)],
                },
            ],
        };

        let series = parse(&response);
        assert_eq!(series.len(), 2);
        let a: Vec<(Option<f64>, i64)> = series[0]
            .points
            .iter()
            .map(|p| (p.value, p.timestamp))
            .collect();
        assert_eq!(a, vec![(Some(2.0), 100), (Some(3.0), 110), (Some(4.0), 120)]);
        assert_eq!(series[1].label, "b");
        assert_eq!(series[1].points[0].value, None);
    }

    #[test]
    fn test_short_column_pads_with_missing_values() {
        let response = MeasurementsResponse {
            start: 0,
            end: 10,
            timestamps: Some(vec![1, 2]),
            labels: vec!["a".to_string()],
            columns: vec![Column {
                values: vec![Some(7.0)],
            }],
            ..Default::default()
        };

        let series = parse(&response);
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[1].value, None);
    }

    #[test]
    fn test_label_without_column_is_empty_series() {
        let response = MeasurementsResponse {
            start: 0,
            end: 10,
            timestamps: Some(vec![5]),
            labels: vec!["orphan".to_string()],
            ..Default::default()
        };

        let series = parse(&response);
        assert_eq!(series[0].label, "orphan");
        assert!(series[0].points.is_empty());
    }
}
