// kalmanloads_core/src/estimation/series.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channels::{Channel, ChannelLayout};
use crate::error::{EstimatorError, Result};
use crate::types::Trajectory;

/// Relative tolerance on each sample interval when checking uniform sampling.
pub const UNIFORM_DT_TOLERANCE: f64 = 1e-3;

/// Named columns sharing one time axis. This is what a measurement file
/// adapter hands to the estimator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesTable {
    time: Vec<f64>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl TimeSeriesTable {
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            columns: BTreeMap::new(),
        }
    }

    /// Adds or replaces a column. Its length must match the time axis.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.time.len() {
            return Err(EstimatorError::LengthMismatch {
                name,
                expected: self.time.len(),
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn nt(&self) -> usize {
        self.time.len()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| EstimatorError::MissingChannel {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Multiplies a column in place. Returns `false` if the column is absent.
    pub fn scale(&mut self, name: &str, factor: f64) -> bool {
        match self.columns.get_mut(name) {
            Some(values) => {
                values.iter_mut().for_each(|v| *v *= factor);
                true
            }
            None => false,
        }
    }

    /// Keeps the rows for which `keep(row_index, time)` is true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(usize, f64) -> bool) {
        let mask: Vec<bool> = self
            .time
            .iter()
            .enumerate()
            .map(|(i, &t)| keep(i, t))
            .collect();
        let filter = |values: &mut Vec<f64>| {
            let mut i = 0;
            values.retain(|_| {
                let k = mask[i];
                i += 1;
                k
            });
        };
        filter(&mut self.time);
        self.columns.values_mut().for_each(filter);
    }

    /// The constant sample interval of the time axis.
    ///
    /// Fails if there are fewer than two samples, if time does not strictly
    /// increase, or if any interval deviates from the first one by more than
    /// [`UNIFORM_DT_TOLERANCE`] (relative). Returns the mean interval.
    pub fn uniform_dt(&self) -> Result<f64> {
        let t = &self.time;
        if t.len() < 2 {
            return Err(EstimatorError::TooFewSamples { found: t.len() });
        }
        let expected = t[1] - t[0];
        for (i, w) in t.windows(2).enumerate() {
            let dt = w[1] - w[0];
            if !(dt > 0.0) {
                return Err(EstimatorError::NonMonotonicTime { index: i + 1 });
            }
            if (dt - expected).abs() > UNIFORM_DT_TOLERANCE * expected {
                return Err(EstimatorError::NonUniformSampling {
                    index: i + 1,
                    dt,
                    expected,
                });
            }
        }
        Ok((t[t.len() - 1] - t[0]) / (t.len() - 1) as f64)
    }

    /// Stacks the columns mapped to `layout`'s channels into a
    /// channel-by-sample trajectory.
    pub fn trajectory(&self, layout: &ChannelLayout, map: &ChannelMap) -> Result<Trajectory> {
        let mut out = Trajectory::zeros(layout.dim(), self.nt());
        for (row, &channel) in layout.channels().iter().enumerate() {
            let values = self.require(map.column(channel))?;
            for (col, v) in values.iter().enumerate() {
                out[(row, col)] = *v;
            }
        }
        Ok(out)
    }
}

/// Maps every channel to the name of the file column that records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMap(BTreeMap<Channel, String>);

impl Default for ChannelMap {
    fn default() -> Self {
        Self(BTreeMap::from(
            [
                (Channel::TowerTopDisplacement, "TTDspFA"),
                (Channel::Azimuth, "Azimuth"),
                (Channel::TowerTopVelocity, "NcIMUTVxs"),
                (Channel::RotorSpeed, "RotSpeed"),
                (Channel::Thrust, "RtAeroFxh"),
                (Channel::AeroTorque, "RtAeroMxh"),
                (Channel::GeneratorTorque, "GenTq"),
                (Channel::WindSpeed, "RtVAvgxh"),
                (Channel::Pitch, "BldPitch1"),
                (Channel::TowerTopAcceleration, "NcIMUTAxs"),
            ]
            .map(|(c, s)| (c, s.to_string())),
        ))
    }
}

impl ChannelMap {
    /// The default map with some entries replaced.
    pub fn with_overrides(overrides: &BTreeMap<Channel, String>) -> Self {
        let mut map = Self::default();
        for (channel, column) in overrides {
            map.0.insert(*channel, column.clone());
        }
        map
    }

    /// The column recording `channel`. Every channel has an entry.
    pub fn column(&self, channel: Channel) -> &str {
        self.0
            .get(&channel)
            .map(String::as_str)
            .unwrap_or_else(|| channel.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(time: Vec<f64>) -> TimeSeriesTable {
        TimeSeriesTable::new(time)
    }

    #[test]
    fn uniform_dt_is_detected() {
        let t = table(vec![0.0, 0.1, 0.2, 0.3]);
        assert!((t.uniform_dt().unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn uniform_dt_is_the_mean_interval() {
        // First interval is slightly long but within tolerance.
        let t = table(vec![0.0, 0.10005, 0.2, 0.3, 0.4]);
        let dt = t.uniform_dt().unwrap();
        assert!((dt - 0.1).abs() < 1e-15);
        assert!((dt - 0.10005).abs() > 1e-5);
    }

    #[test]
    fn sampling_preconditions_are_reported_with_index() {
        assert_eq!(
            table(vec![0.0]).uniform_dt(),
            Err(EstimatorError::TooFewSamples { found: 1 })
        );
        assert_eq!(
            table(vec![0.0, 0.1, 0.1]).uniform_dt(),
            Err(EstimatorError::NonMonotonicTime { index: 2 })
        );
        assert!(matches!(
            table(vec![0.0, 0.1, 0.2, 0.35]).uniform_dt(),
            Err(EstimatorError::NonUniformSampling { index: 3, .. })
        ));
    }

    #[test]
    fn column_length_is_checked() {
        let mut t = table(vec![0.0, 1.0]);
        assert!(t.insert("a", vec![1.0, 2.0]).is_ok());
        assert_eq!(
            t.insert("b", vec![1.0]),
            Err(EstimatorError::LengthMismatch {
                name: "b".into(),
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn retain_rows_filters_every_column() {
        let mut t = table(vec![0.0, 1.0, 2.0, 3.0]);
        t.insert("a", vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        t.retain_rows(|i, _| i % 2 == 0);
        assert_eq!(t.time(), &[0.0, 2.0]);
        assert_eq!(t.column("a").unwrap(), &[10.0, 12.0]);
    }

    #[test]
    fn trajectory_uses_channel_map() {
        let mut t = table(vec![0.0, 1.0]);
        t.insert("RotSpeed", vec![1.0, 1.1]).unwrap();
        t.insert("speed", vec![2.0, 2.2]).unwrap();
        let layout = ChannelLayout::new(vec![Channel::RotorSpeed]).unwrap();

        let default = t.trajectory(&layout, &ChannelMap::default()).unwrap();
        assert_eq!(default[(0, 1)], 1.1);

        let custom = ChannelMap::with_overrides(&BTreeMap::from([(
            Channel::RotorSpeed,
            "speed".to_string(),
        )]));
        assert_eq!(custom.column(Channel::Pitch), "BldPitch1");
        let custom = t.trajectory(&layout, &custom).unwrap();
        assert_eq!(custom[(0, 0)], 2.0);

        let pitch = ChannelLayout::new(vec![Channel::Pitch]).unwrap();
        assert_eq!(
            t.trajectory(&pitch, &ChannelMap::default()),
            Err(EstimatorError::MissingChannel {
                name: "BldPitch1".into()
            })
        );
    }
}
