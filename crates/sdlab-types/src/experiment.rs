//! Experiment data rows collected by the electrochemistry instrument.

use serde::{Deserialize, Serialize};

/// One DC sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcRow {
    pub timestamp_s: f64,
    #[serde(rename = "current_A")]
    pub current_a: f64,
    #[serde(rename = "we_voltage_V")]
    pub we_voltage_v: f64,
}

/// One impedance sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcRow {
    pub timestamp: f64,
    pub frequency: f64,
    pub absolute_impedance: f64,
    pub real_impedance: f64,
    pub imag_impedance: f64,
    pub phase_angle: f64,
    pub number_of_cycles: u32,
}

/// DC and AC buffers for the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    #[serde(default)]
    pub dc_rows: Vec<DcRow>,
    #[serde(default)]
    pub ac_rows: Vec<AcRow>,
}

impl ExperimentData {
    pub fn is_empty(&self) -> bool {
        self.dc_rows.is_empty() && self.ac_rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.dc_rows.clear();
        self.ac_rows.clear();
    }
}

// ---------------------------------------------------------------------------
// Measurement plans
// ---------------------------------------------------------------------------

/// Electrochemical techniques the instrument can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeasurementType {
    /// Open-circuit voltage.
    Ocv,
    /// Chronopotentiometry.
    Cp,
    /// Cyclic voltammetry.
    Cva,
    /// Potentiostatic impedance spectroscopy.
    Peis,
    /// Linear sweep voltammetry.
    Lsv,
}

impl MeasurementType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "OCV" => Some(MeasurementType::Ocv),
            "CP" => Some(MeasurementType::Cp),
            "CVA" => Some(MeasurementType::Cva),
            "PEIS" => Some(MeasurementType::Peis),
            "LSV" => Some(MeasurementType::Lsv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementType::Ocv => "OCV",
            MeasurementType::Cp => "CP",
            MeasurementType::Cva => "CVA",
            MeasurementType::Peis => "PEIS",
            MeasurementType::Lsv => "LSV",
        }
    }

    /// Whether the technique produces AC (impedance) rows rather than DC rows.
    pub fn is_impedance(self) -> bool {
        self == MeasurementType::Peis
    }
}

/// What the instrument is asked to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPlan {
    pub kind: MeasurementType,
    pub duration_s: f64,
    pub sample_interval_s: f64,
    pub channel: u8,
}

/// Counts reported back once a measurement finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub dc_points: usize,
    pub ac_points: usize,
    pub simulated: bool,
}
