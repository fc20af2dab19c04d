use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::apartment::GeoPoint;

/// Administrative level accepted by `GET /search/locations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    /// 시/군/구
    Sigungu,
    /// 동
    Dong,
}

impl LocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sigungu => "sigungu",
            Self::Dong => "dong",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(deserialize_with = "crate::utils::serde::string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub location_type: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub center: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationResults {
    #[serde(default)]
    pub results: Vec<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LocationType::Sigungu).unwrap(),
            "\"sigungu\""
        );
        assert_eq!(LocationType::Dong.to_string(), "dong");
    }

    #[test]
    fn parses_location_row() {
        let row: Location = serde_json::from_value(serde_json::json!({
            "id": 11680,
            "name": "강남구",
            "type": "sigungu",
            "full_name": "서울특별시 강남구",
            "center": {"lat": 37.5172, "lng": 127.0473}
        }))
        .unwrap();
        assert_eq!(row.id, "11680");
        assert_eq!(row.location_type, "sigungu");
        assert!(row.center.is_some());
    }
}
