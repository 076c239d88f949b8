use crate::traits::Forcing;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Forcing and observed streamflow of a set of basins over a common period
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    /// Basin names (header columns of the input files)
    pub basins: Vec<String>,
    /// Time-step labels (first column of the input files)
    pub dates: Vec<String>,
    /// Precipitation [basin][step], mm
    pub precip: Vec<Vec<f64>>,
    /// Potential evapotranspiration [basin][step], mm
    pub pet: Vec<Vec<f64>>,
    /// Observed streamflow [basin][step], mm; NaN when missing
    #[serde(with = "crate::utils::serde_nan_matrix")]
    pub qobs: Vec<Vec<f64>>,
    pub n_basins: usize,
    pub n_steps: usize,
}

/// One TSV table: header, row labels, and values by column
struct Table {
    columns: Vec<String>,
    labels: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Data {
    /// Create a new `Data` instance with default values
    pub fn new() -> Data {
        Data {
            basins: Vec::new(),
            dates: Vec::new(),
            precip: Vec::new(),
            pet: Vec::new(),
            qobs: Vec::new(),
            n_basins: 0,
            n_steps: 0,
        }
    }

    /// Check if another dataset covers the same basins, in the same order
    pub fn check_compatibility(&self, other: &Data) -> bool {
        self.basins == other.basins
    }

    /// Load forcing and observations from three tab-separated files sharing
    /// the layout `date<TAB>basin_1<TAB>...<TAB>basin_n`.
    ///
    /// Forcing values must be numeric. Missing or non-numeric observed values
    /// are kept as NaN and ignored when scoring.
    pub fn load_data(&mut self, precip_path: &str, pet_path: &str, qobs_path: &str) -> Result<(), Box<dyn Error>> {
        info!("Loading files {}, {} and {}...", precip_path, pet_path, qobs_path);

        let precip = read_table(precip_path, false)?;
        let pet = read_table(pet_path, false)?;
        let qobs = read_table(qobs_path, true)?;

        if precip.columns.is_empty() {
            return Err(format!("{} has no basin column", precip_path).into());
        }

        let pet_values = align_columns(&precip.columns, pet, pet_path, &precip.labels)?;
        let qobs_values = align_columns(&precip.columns, qobs, qobs_path, &precip.labels)?;

        self.basins = precip.columns;
        self.dates = precip.labels;
        self.precip = precip.values;
        self.pet = pet_values;
        self.qobs = qobs_values;
        self.n_basins = self.basins.len();
        self.n_steps = self.dates.len();

        for basin in 0..self.n_basins {
            self.forcing(basin)?;
        }

        for (basin, name) in self.basins.iter().enumerate() {
            let missing = self.qobs[basin].iter().filter(|q| q.is_nan()).count();
            if missing == self.n_steps {
                warn!("Basin {} has no observed streamflow at all.", name);
            } else if missing > 0 {
                info!("Basin {}: {} missing observed values will be skipped.", name, missing);
            }
        }

        Ok(())
    }

    /// Keep only the requested basins, in the requested order
    pub fn subset(&self, basins: &[String]) -> Result<Data, String> {
        let mut indices = Vec::with_capacity(basins.len());
        for name in basins {
            match self.basins.iter().position(|b| b == name) {
                Some(i) => indices.push(i),
                None => return Err(format!("Unknown basin {}", name)),
            }
        }

        Ok(Data {
            basins: indices.iter().map(|i| self.basins[*i].clone()).collect(),
            dates: self.dates.clone(),
            precip: indices.iter().map(|i| self.precip[*i].clone()).collect(),
            pet: indices.iter().map(|i| self.pet[*i].clone()).collect(),
            qobs: indices.iter().map(|i| self.qobs[*i].clone()).collect(),
            n_basins: indices.len(),
            n_steps: self.n_steps,
        })
    }

    /// Forcing series of one basin
    pub fn forcing(&self, basin: usize) -> Result<Forcing<'_>, String> {
        if basin >= self.n_basins {
            return Err(format!("Basin index {} out of range ({} basins)", basin, self.n_basins));
        }
        Forcing::new(&self.precip[basin], &self.pet[basin])
            .map_err(|e| format!("basin {}: {}", self.basins[basin], e))
    }

    /// Observed streamflow of one basin after the warm-up period
    pub fn scored_observed(&self, basin: usize, warmup: usize) -> &[f64] {
        let series = &self.qobs[basin];
        &series[warmup.min(series.len())..]
    }

    /// Check that the warm-up leaves, for every basin, at least one observed
    /// value to score.
    pub fn check_scoring_window(&self, warmup: usize) -> Result<(), String> {
        if warmup >= self.n_steps {
            return Err(format!(
                "Warm-up of {} steps leaves nothing to score in a {} steps period",
                warmup, self.n_steps
            ));
        }
        let unscored: Vec<&str> = (0..self.n_basins)
            .filter(|b| self.scored_observed(*b, warmup).iter().all(|q| q.is_nan()))
            .map(|b| self.basins[b].as_str())
            .collect();
        if !unscored.is_empty() {
            return Err(format!(
                "No observed streamflow after the {} warm-up steps for basin(s) {}",
                warmup,
                unscored.join(", ")
            ));
        }
        Ok(())
    }
}

/// Read a TSV table. Values failing to parse are an error, unless
/// `allow_missing`, in which case they become NaN.
fn read_table(path: &str, allow_missing: bool) -> Result<Table, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|h| h.trim().to_string())
        .collect();

    let mut labels = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != columns.len() + 1 {
            return Err(format!(
                "{}: line {} has {} fields, expected {}",
                path,
                row + 2,
                record.len(),
                columns.len() + 1
            )
            .into());
        }
        labels.push(record[0].trim().to_string());
        for (col, field) in record.iter().skip(1).enumerate() {
            let field = field.trim();
            let value = match field.parse::<f64>() {
                Ok(v) if !v.is_nan() => v,
                _ if allow_missing => f64::NAN,
                _ => {
                    return Err(format!(
                        "{}: invalid value '{}' at line {} for {}",
                        path,
                        field,
                        row + 2,
                        columns[col]
                    )
                    .into())
                }
            };
            values[col].push(value);
        }
    }

    Ok(Table { columns, labels, values })
}

/// Reorder the columns of `table` by the reference basin names, checking that
/// rows align with the reference time steps.
fn align_columns(
    reference: &[String],
    table: Table,
    path: &str,
    labels: &[String],
) -> Result<Vec<Vec<f64>>, Box<dyn Error>> {
    if table.labels != labels {
        return Err(format!(
            "{}: time steps do not match the precipitation file ({} vs {} rows)",
            path,
            table.labels.len(),
            labels.len()
        )
        .into());
    }

    let mut by_name: Vec<Option<Vec<f64>>> = table.values.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(reference.len());
    for name in reference {
        let column = table
            .columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| by_name[i].take())
            .ok_or_else(|| format!("{}: missing column for basin {}", path, name))?;
        aligned.push(column);
    }
    if table.columns.len() != reference.len() {
        warn!(
            "{}: {} extra column(s) ignored",
            path,
            table.columns.len() - reference.len()
        );
    }
    Ok(aligned)
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let period = match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => format!("{} -> {}", first, last),
            _ => "empty".to_string(),
        };
        write!(
            f,
            "Data: {} basin(s) x {} steps [{}] | basins: {}",
            self.n_basins,
            self.n_steps,
            period,
            self.basins.join(", ")
        )
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
