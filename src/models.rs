use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Malaria,
    Leptospirosis,
}

impl Disease {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disease::Malaria => "malaria",
            Disease::Leptospirosis => "leptospirosis",
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disease {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "malaria" => Ok(Disease::Malaria),
            "leptospirosis" => Ok(Disease::Leptospirosis),
            other => Err(anyhow::anyhow!("unknown disease '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    HouseIndex,
    ContainerIndex,
    BreteauIndex,
    RodentIndex,
    InfectionRate,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::HouseIndex => "house_index",
            IndexType::ContainerIndex => "container_index",
            IndexType::BreteauIndex => "breteau_index",
            IndexType::RodentIndex => "rodent_index",
            IndexType::InfectionRate => "infection_rate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndexType::HouseIndex => "House Index",
            IndexType::ContainerIndex => "Container Index",
            IndexType::BreteauIndex => "Breteau Index",
            IndexType::RodentIndex => "Rodent Index",
            IndexType::InfectionRate => "Infection Rate",
        }
    }

    /// Breteau is a count per 100 houses; the others are percentages.
    pub fn format_value(&self, value: f64) -> String {
        match self {
            IndexType::BreteauIndex => format!("{value} per 100 houses"),
            _ => format!("{value}%"),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image metadata owned by the upload side; only ever read here.
#[derive(Debug, Clone, Serialize)]
pub struct SurveillanceImage {
    pub id: Uuid,
    pub disease: Disease,
    pub file_path: String,
    pub file_name: String,
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// A computed index ready to be written. Rows are insert-only.
#[derive(Debug, Clone, Serialize)]
pub struct NewComputedIndex {
    pub owner: Uuid,
    pub disease: Disease,
    pub index_type: IndexType,
    pub calculated_value: f64,
    pub input_data: serde_json::Value,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_images: i64,
    pub malaria_images: i64,
    pub leptospirosis_images: i64,
    pub recent_uploads: i64,
}

/// Filter over the image relation. `None` fields do not constrain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub disease: Option<Disease>,
    pub uploaded_since: Option<DateTime<Utc>>,
}

impl ImageFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn disease(disease: Disease) -> Self {
        Self {
            disease: Some(disease),
            uploaded_since: None,
        }
    }

    pub fn since(uploaded_since: DateTime<Utc>) -> Self {
        Self {
            disease: None,
            uploaded_since: Some(uploaded_since),
        }
    }
}
