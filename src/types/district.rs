//! City district reference data

use serde::{Deserialize, Serialize};

/// A district used to group and label drivers. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct District {
    pub id: String,
    /// Russian name, the canonical grouping key on the dashboard
    pub name_ru: String,
    /// Armenian name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_hy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u32>,
    pub center_lat: f64,
    pub center_lon: f64,
}
