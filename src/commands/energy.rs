//! Energy command: convert absolute-channel energies into lower energy
//! boundaries per detector mode channel.
//!
//! The energy/channel table holds one row per absolute channel with one
//! energy column per observation epoch. The binning table holds, in its
//! third column, how many absolute channels each mode channel groups.

use crate::error::{GtiError, Result};
use crate::table::output::{write_atomic, TextWriter};
use crate::table::text::parse_numeric_table;
use crate::table::InputData;
use log::info;
use std::path::Path;

/// Column of the binning table holding group sizes.
const BINNING_COLUMN: usize = 2;

/// Observation epochs with calibrated energy columns.
pub const EPOCHS: std::ops::RangeInclusive<u32> = 1..=5;

/// Energy column (0-based) of the energy/channel table for an epoch.
pub fn energy_column(epoch: u32) -> Result<usize> {
    match epoch {
        1..=4 => Ok(epoch as usize + 1),
        5 => Ok(7),
        _ => Err(GtiError::Configuration(format!(
            "Invalid observation epoch {}: must be between {} and {}",
            epoch,
            EPOCHS.start(),
            EPOCHS.end()
        ))),
    }
}

/// Lower energy boundary of each mode channel.
///
/// The first boundary is the first energy. Each following one is the mean of
/// the two energies straddling the edge of a group; past the last absolute
/// channel the last energy is repeated. One boundary per group is returned.
pub fn boundaries(energies: &[f64], binning: &[usize]) -> Result<Vec<f64>> {
    let Some(&first) = energies.first() else {
        return Err(GtiError::InvalidFormat("Energy table is empty".into()));
    };
    let at = |i: usize| energies.get(i).copied().unwrap_or(energies[energies.len() - 1]);

    let mut bounds = Vec::with_capacity(binning.len() + 1);
    bounds.push(first);
    let mut edge = 0;
    for (group, &amount) in binning.iter().enumerate() {
        if amount == 0 {
            return Err(GtiError::InvalidFormat(format!(
                "Mode channel {} groups no absolute channels",
                group
            )));
        }
        edge += amount;
        if edge > energies.len() {
            return Err(GtiError::InvalidFormat(format!(
                "Binning covers {} absolute channels but the energy table has {}",
                edge,
                energies.len()
            )));
        }
        bounds.push((at(edge - 1) + at(edge)) / 2.0);
    }
    bounds.truncate(binning.len());
    Ok(bounds)
}

fn group_sizes(column: &[f64]) -> Result<Vec<usize>> {
    column
        .iter()
        .enumerate()
        .map(|(row, &v)| {
            if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
                Ok(v as usize)
            } else {
                Err(GtiError::InvalidFormat(format!(
                    "Invalid channel count {} in binning row {}",
                    v,
                    row + 1
                )))
            }
        })
        .collect()
}

/// Energy command configuration.
#[derive(Debug, Clone, Copy)]
pub struct EnergyCommand {
    pub epoch: u32,
}

impl EnergyCommand {
    pub fn new(epoch: u32) -> Self {
        Self { epoch }
    }

    /// Compute boundaries from the two tables.
    pub fn compute<P: AsRef<Path>>(&self, ec_table: P, chan_bin: P) -> Result<Vec<f64>> {
        let column = energy_column(self.epoch)?;

        let ec = parse_numeric_table(&InputData::open(ec_table)?)?;
        let energies = ec.column(column)?;
        let binning = parse_numeric_table(&InputData::open(chan_bin)?)?;
        let sizes = group_sizes(&binning.column(BINNING_COLUMN)?)?;

        boundaries(&energies, &sizes)
    }

    /// Compute and write one boundary per line.
    pub fn run<P: AsRef<Path>>(&self, ec_table: P, chan_bin: P, output: P) -> Result<usize> {
        let bounds = self.compute(ec_table, chan_bin)?;
        write_atomic(output.as_ref(), |out| {
            let mut w = TextWriter::new(out);
            for &b in &bounds {
                w.write_float(b)?;
                w.write_newline()?;
            }
            w.flush()
        })?;
        info!(
            "Wrote {} energy boundaries to {}",
            bounds.len(),
            output.as_ref().display()
        );
        Ok(bounds.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_energy_column() {
        assert_eq!(energy_column(1).unwrap(), 2);
        assert_eq!(energy_column(4).unwrap(), 5);
        assert_eq!(energy_column(5).unwrap(), 7);
        assert!(energy_column(0).is_err());
        assert!(energy_column(6).is_err());
    }

    #[test]
    fn test_boundaries() {
        let energies = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bounds = boundaries(&energies, &[2, 3, 1]).unwrap();
        assert_eq!(bounds, vec![1.0, 2.5, 5.5]);
    }

    #[test]
    fn test_boundaries_single_channel_groups() {
        let energies = [1.0, 3.0, 5.0];
        assert_eq!(boundaries(&energies, &[1, 1, 1]).unwrap(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_boundaries_errors() {
        assert!(boundaries(&[], &[1]).is_err());
        assert!(boundaries(&[1.0, 2.0], &[0, 1]).is_err());
        assert!(boundaries(&[1.0, 2.0], &[2, 1]).is_err());
    }

    #[test]
    fn test_group_sizes() {
        assert_eq!(group_sizes(&[1.0, 4.0]).unwrap(), vec![1, 4]);
        assert!(group_sizes(&[1.5]).is_err());
        assert!(group_sizes(&[-1.0]).is_err());
    }

    #[test]
    fn test_run() {
        let dir = tempfile::tempdir().unwrap();
        let ec = dir.path().join("ec.txt");
        let bin = dir.path().join("bin.txt");
        let out = dir.path().join("bounds.txt");

        // channel, then eight energy columns; epoch 3 reads column 4
        let mut table = String::new();
        for chan in 0..6 {
            table.push_str(&format!("{} 0 0 0 {} 0 0 0\n", chan, chan + 1));
        }
        fs::write(&ec, table).unwrap();
        fs::write(&bin, "0 1 2\n2 4 3\n5 5 1\n").unwrap();

        let n = EnergyCommand::new(3).run(&ec, &bin, &out).unwrap();
        assert_eq!(n, 3);
        assert_eq!(fs::read_to_string(&out).unwrap(), "1.0\n2.5\n5.5\n");
    }
}
