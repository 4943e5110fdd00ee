//! Instrument header defaults.

use crate::header::{Header, REST_FREQUENCY_KEYS};

/// CO J=1-0 rest frequency, Hz.
pub const CO_REST_FREQUENCY: f64 = 115.271_201_8e9;
/// HI 21 cm rest frequency, Hz.
pub const HI_REST_FREQUENCY: f64 = 1.420_405_751_768e9;

/// Named header fix-ups for survey cubes whose spectral axis keywords are
/// incomplete or non-standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPreset {
    /// CO survey cubes.
    Co,
    /// EBHIS HI cubes.
    Ebhis,
}

impl HeaderPreset {
    /// Line rest frequency in Hz.
    pub fn rest_frequency(self) -> f64 {
        match self {
            HeaderPreset::Co => CO_REST_FREQUENCY,
            HeaderPreset::Ebhis => HI_REST_FREQUENCY,
        }
    }

    /// Force the spectral axis to radio velocity in m/s in the LSRK frame and
    /// add the line rest frequency when none is recorded.
    pub fn apply(self, header: &mut Header) {
        header.set("CUNIT3", "m/s");
        header.set("CTYPE3", "VRAD");
        header.set("SPECSYS", "LSRK");
        if header.value_for(REST_FREQUENCY_KEYS).is_err() {
            header.set("RESTFRQ", self.rest_frequency());
        }
    }
}
