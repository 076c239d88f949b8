use crate::param::{FitFunction, Param};
use crate::population::Population;

/// Info-level log line, stripped of ANSI colour codes when `$colorful` is false
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)*) => {
        log::info!("{}", $crate::utils::strip_ansi_if_needed(&format!($($arg)*), $colorful))
    };
}

/// Remove ANSI escape sequences (`ESC [ ... letter`) from a string
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            while let Some(code) = chars.next() {
                if code.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn strip_ansi_if_needed(text: &str, colorful: bool) -> String {
    if colorful {
        text.to_string()
    } else {
        strip_ansi(text)
    }
}

/// Median of the finite values, NaN if there is none
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Mean and (population) standard deviation of the finite values
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn fit_name(fit: &FitFunction) -> &'static str {
    match fit {
        FitFunction::rmse => "-RMSE",
        FitFunction::mae => "-MAE",
        FitFunction::nse => "NSE",
        FitFunction::kge => "KGE",
        FitFunction::pbias => "-|PBIAS|",
    }
}

pub fn display_epoch_legend(param: &Param) -> String {
    format!(
        "\x1b[1;97mLegend:\x1b[0m #epoch | best fit ({}) [RMSE NSE KGE] | median fit | failed\n",
        fit_name(&param.general.fit)
    )
}

/// One line summary of a (sorted) generation
pub fn display_epoch(pop: &Population, _param: &Param, epoch: usize) -> String {
    if pop.individuals.is_empty() {
        return format!("#{:<4} | empty population", epoch);
    }
    let best = &pop.individuals[0];
    let fits: Vec<f64> = pop.individuals.iter().map(|i| i.fit).collect();
    let failed = fits.iter().filter(|f| !f.is_finite()).count();
    let best_color = if best.epoch == epoch { "1;92" } else { "1;97" };
    let failed_text = if failed > 0 {
        format!("\x1b[1;91m{}\x1b[0m", failed)
    } else {
        "0".to_string()
    };

    format!(
        "#{:<4} | \x1b[{}m{:>9.4}\x1b[0m [{:.3} {:.3} {:.3}] | {:>9.4} | {}",
        epoch,
        best_color,
        best.fit,
        best.metrics.rmse,
        best.metrics.nse,
        best.metrics.kge,
        median(&fits),
        failed_text
    )
}

/// Serialize a f64 that may be infinite or NaN as an optional value, so that
/// JSON (which has no representation for them) can round-trip it.
/// Missing values come back as NaN.
pub mod serde_nan {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Same as `serde_nan` for fitness values: missing values come back as -inf.
pub mod serde_fit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        super::serde_nan::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

/// `serde_nan` applied to every cell of a series matrix.
pub mod serde_nan_matrix {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(matrix: &Vec<Vec<f64>>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(matrix.len()))?;
        for row in matrix {
            let cells: Vec<Option<f64>> = row
                .iter()
                .map(|v| if v.is_finite() { Some(*v) } else { None })
                .collect();
            seq.serialize_element(&cells)?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Option<f64>>>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}
