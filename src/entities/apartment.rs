use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One apartment complex as returned by `GET /search/apartments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apartment {
    #[serde(deserialize_with = "crate::utils::serde::string_or_number")]
    pub apt_id: String,
    pub apt_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub sigungu_name: String,
    #[serde(default)]
    pub dong_name: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl Apartment {
    /// District and neighbourhood joined for display, e.g. `강남구 역삼동`.
    pub fn area_label(&self) -> String {
        [self.sigungu_name.trim(), self.dong_name.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApartmentResults {
    #[serde(default)]
    pub results: Vec<Apartment>,
}
