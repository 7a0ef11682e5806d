//! Measurement planning for the electrochemistry instrument.

use sdlab_types::experiment::{MeasurementPlan, MeasurementType};
use sdlab_types::fault::LabFault;
use sdlab_types::step::Params;

use super::{f64_param, u64_param};

const DEFAULT_MEASUREMENT: &str = "CP";

/// Longest measurement the instrument will be asked to run (one week).
pub const MAX_MEASUREMENT_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

/// Build the measurement plan described by a step's parameters.
pub fn plan_measurement(params: &Params) -> Result<MeasurementPlan, LabFault> {
    let name = super::str_param(params, "measurement_type", DEFAULT_MEASUREMENT);
    let kind = MeasurementType::parse(name)
        .ok_or_else(|| LabFault::electrochemical(format!("Unsupported measurement type: {name}")))?;

    let sample_interval_s = f64_param(params, "sample_interval", 1.0);
    if sample_interval_s <= 0.0 {
        return Err(LabFault::electrochemical(format!(
            "Invalid sample interval: {sample_interval_s}"
        )));
    }

    Ok(MeasurementPlan {
        kind,
        duration_s: estimate_duration(kind, params)?,
        sample_interval_s,
        channel: u8::try_from(u64_param(params, "channel", 0)).unwrap_or(0),
    })
}

/// Expected run time in seconds for `kind` with the given parameters.
pub fn estimate_duration(kind: MeasurementType, params: &Params) -> Result<f64, LabFault> {
    let duration = match kind {
        MeasurementType::Ocv => f64_param(params, "ocv_duration", 60.0),
        MeasurementType::Cp => f64_param(params, "cp_duration", 720.0),
        MeasurementType::Cva => {
            let cycles = f64_param(params, "cva_cycles", 3.0);
            let scan_rate = positive(f64_param(params, "cva_scan_rate", 0.05), "cva_scan_rate")?;
            let range = (f64_param(params, "cva_end_voltage", 0.5)
                - f64_param(params, "cva_start_voltage", -0.5))
            .abs();
            // forward and reverse sweep
            cycles * (range / scan_rate) * 2.0
        }
        MeasurementType::Peis => {
            let points = f64_param(params, "peis_points_per_decade", 5.0);
            let start = positive(f64_param(params, "peis_start_frequency", 10_000.0), "peis_start_frequency")?;
            let end = positive(f64_param(params, "peis_end_frequency", 0.1), "peis_end_frequency")?;
            let decades = (start.log10() - end.log10()).abs();
            points * decades * 2.0
        }
        MeasurementType::Lsv => {
            let scan_rate = positive(f64_param(params, "lsv_scan_rate", 0.01), "lsv_scan_rate")?;
            let range = (f64_param(params, "lsv_end_voltage", 0.5)
                - f64_param(params, "lsv_start_voltage", -0.5))
            .abs();
            range / scan_rate
        }
    };
    if !duration.is_finite() || !(0.0..=MAX_MEASUREMENT_SECONDS).contains(&duration) {
        return Err(LabFault::electrochemical(format!(
            "Measurement duration out of range: {duration} s"
        )));
    }
    Ok(duration)
}

fn positive(value: f64, name: &str) -> Result<f64, LabFault> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(LabFault::electrochemical(format!("Invalid {name}: {value}")))
    }
}
