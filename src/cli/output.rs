//! Output formatting for CLI results

use colorful::Colorful;
use serde::Serialize;

use crate::core::dsp::mean;
use crate::core::ema::{ModalResults, ResponseRow};
use crate::core::measurement::{FrfKind, Measurement};
use crate::teds::Teds;

/// Peak and coherence of one measured FRF
#[derive(Debug, Clone, Serialize)]
pub struct FrfSummary {
    pub response: String,
    pub form: String,
    pub peak_freq: f64,
    pub peak_magnitude: f64,
    pub mean_coherence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurementSummary {
    pub name: String,
    pub impacts: usize,
    pub frfs: Vec<FrfSummary>,
    /// Impacts flagged for overflow or double hits, if checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_impacts: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeSummary {
    pub mode: usize,
    pub freq: f64,
    pub damping_percent: f64,
    /// Mode shape magnitude per response row
    pub shape: Vec<f64>,
}

pub fn summarize_measurement(meas: &Measurement, rejected: Option<Vec<usize>>) -> MeasurementSummary {
    let frf = meas.frf();
    let form = frf.form();
    let h1 = frf.get(FrfKind::H1, form);
    let f_axis = frf.f_axis();
    let (_, resp_names) = meas.names();

    let frfs = resp_names
        .into_iter()
        .enumerate()
        .map(|(r, response)| {
            // DC excluded
            let (peak_bin, peak_magnitude) = (1..f_axis.len())
                .map(|k| (k, h1[[r, 0, k]].norm()))
                .fold((0, 0.0f64), |best, cur| if cur.1 > best.1 { cur } else { best });
            let coherence = frf.coherence().row(r).to_vec();
            FrfSummary {
                response,
                form: form.name().to_string(),
                peak_freq: f_axis.get(peak_bin).copied().unwrap_or(0.0),
                peak_magnitude,
                mean_coherence: mean(&coherence),
            }
        })
        .collect();

    MeasurementSummary {
        name: meas.name().to_string(),
        impacts: meas.num_impacts(),
        frfs,
        rejected_impacts: rejected,
    }
}

pub fn summarize_modes(results: &ModalResults) -> Vec<ModeSummary> {
    results
        .nat_freq
        .iter()
        .zip(&results.nat_xi)
        .enumerate()
        .map(|(m, (&freq, &xi))| ModeSummary {
            mode: m + 1,
            freq,
            damping_percent: xi * 100.0,
            shape: results.phi.column(m).iter().map(|c| c.norm()).collect(),
        })
        .collect()
}

/// Format a decoded TEDS as a two column table
pub fn format_teds(teds: &Teds) -> String {
    let width = teds.fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    let mut output = String::new();
    let kind = if teds.is_accelerometer() { "accelerometer" } else { "other sensor" };
    output.push_str(&format!("{} ({})\n", "TEDS".bold(), kind));
    for field in &teds.fields {
        output.push_str(&format!(
            "  {:<width$}  {}\n",
            field.name,
            field.value,
            width = width
        ));
    }
    output
}

pub fn format_measurement(summary: &MeasurementSummary) -> String {
    let mut output = format!(
        "{} {}\n",
        summary.name.clone().bold(),
        format!("({} impacts)", summary.impacts).cyan()
    );

    match &summary.rejected_impacts {
        Some(bad) if bad.is_empty() => {
            output.push_str(&format!("  {}\n", "✓ all impacts clean".green()));
        }
        Some(bad) => {
            output.push_str(&format!(
                "  {}\n",
                format!("✗ overflow or double hit in impacts {:?}", bad).red()
            ));
        }
        None => {}
    }

    for frf in &summary.frfs {
        let coherence = format!("{:.3}", frf.mean_coherence);
        let coherence = if frf.mean_coherence >= 0.9 {
            coherence.green()
        } else {
            coherence.yellow()
        };
        output.push_str(&format!(
            "  {:<16} {:<12} peak {:>9.2} Hz  |H| {:.3e}  coherence {}\n",
            frf.response, frf.form, frf.peak_freq, frf.peak_magnitude, coherence
        ));
    }
    output
}

pub fn format_modes(modes: &[ModeSummary], rows: &[ResponseRow]) -> String {
    let mut output = format!("{}\n", "Modes".bold());
    output.push_str(&format!("  {:>4} {:>12} {:>10}\n", "#", "f [Hz]", "xi [%]"));
    for mode in modes {
        output.push_str(&format!(
            "  {:>4} {:>12.3} {:>10.3}\n",
            mode.mode, mode.freq, mode.damping_percent
        ));
    }

    if !modes.is_empty() {
        output.push_str(&format!("\n{}\n", "Shapes |phi|".bold()));
        for (j, row) in rows.iter().enumerate() {
            let values: Vec<String> = modes
                .iter()
                .map(|m| format!("{:>10.4}", m.shape.get(j).copied().unwrap_or(0.0)))
                .collect();
            output.push_str(&format!(
                "  {:<16} {:>3} {}\n",
                row.name,
                row.direction.as_str(),
                values.join("")
            ));
        }
    }
    output
}

/// Pretty JSON for any summary
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use num_complex::Complex64;

    fn results() -> ModalResults {
        ModalResults {
            nat_freq: vec![50.0, 120.0],
            nat_xi: vec![0.02, 0.01],
            h: Array2::zeros((2, 4)),
            a: Array2::zeros((2, 2)),
            phi: Array2::from_shape_vec(
                (2, 2),
                vec![
                    Complex64::new(1.0, 0.0),
                    Complex64::new(0.0, 1.0),
                    Complex64::new(-2.0, 0.0),
                    Complex64::new(0.0, 0.5),
                ],
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_summarize_modes() {
        let modes = summarize_modes(&results());
        assert_eq!(modes.len(), 2);
        assert_eq!(modes[1].mode, 2);
        assert!((modes[0].damping_percent - 2.0).abs() < 1e-12);
        assert_eq!(modes[0].shape, vec![1.0, 2.0]);
        assert_eq!(modes[1].shape, vec![1.0, 0.5]);
    }

    #[test]
    fn test_json_skips_unchecked_impacts() {
        let summary = MeasurementSummary {
            name: "mp1".into(),
            impacts: 3,
            frfs: Vec::new(),
            rejected_impacts: None,
        };
        let json = format_json(&summary).unwrap();
        assert!(json.contains("\"impacts\": 3"));
        assert!(!json.contains("rejected_impacts"));
    }
}
