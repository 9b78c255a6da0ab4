use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Root of the per-tenant configuration document (`config.json`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionConfig {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub active_solution: String,
    #[serde(default, deserialize_with = "deserialize_without_nulls")]
    pub solutions: Vec<Solution>,
}

impl SolutionConfig {
    /// A config is usable only when it carries at least one solution
    pub fn is_usable(&self) -> bool {
        !self.solutions.is_empty()
    }
}

/// One tenant's complete chat-widget configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub deep_link: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub chat_title: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub locale: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub iframe_url: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub knowledge_data: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub response_icon: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub user_icon: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub float: bool,
    #[serde(default, deserialize_with = "deserialize_theme")]
    pub theme: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_context_params: Option<String>,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub enable_live_chat: bool,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub enable_asr_tts_on_open: bool,
    #[serde(default, deserialize_with = "deserialize_without_nulls")]
    pub context_params: Vec<ContextParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asr_corrections: Option<String>,
    /// Fields this crate does not interpret, kept so cached configs round-trip
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A named, possibly multi-valued request field sent to the dialogue engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextParam {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_without_nulls")]
    pub values: Vec<ContextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextValue {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub text: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub active: bool,
}

/// A single `[from, to]` speech-recognition substitution
pub type AsrCorrection = [String; 2];

/// Fully resolved solution handed to the view layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSolution {
    pub solution: Solution,
    pub request_parameters: String,
    pub asr_corrections: Vec<AsrCorrection>,
}

/// Location data cached under `{STORAGE_KEY}loc`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub ip: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub continent_code: Option<String>,
    #[serde(default)]
    pub continent_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub currency_symbol: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub longitude: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub region_name: Option<String>,
}

/// Response shape of a geo provider that already uses the normalized names
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedGeoResponse {
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub continent_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub continent_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub country_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub currency_symbol: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub currency_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub longitude: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub region_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub region_name: Option<String>,
}

/// Response shape of geoplugin.net
#[derive(Debug, Deserialize)]
pub struct GeopluginResponse {
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub geoplugin_city: Option<String>,
    #[serde(default, rename = "geoplugin_continentCode", deserialize_with = "deserialize_flexible_string")]
    pub continent_code: Option<String>,
    #[serde(default, rename = "geoplugin_continentName", deserialize_with = "deserialize_flexible_string")]
    pub continent_name: Option<String>,
    #[serde(default, rename = "geoplugin_countryCode", deserialize_with = "deserialize_flexible_string")]
    pub country_code: Option<String>,
    #[serde(default, rename = "geoplugin_countryName", deserialize_with = "deserialize_flexible_string")]
    pub country_name: Option<String>,
    #[serde(default, rename = "geoplugin_currencySymbol", deserialize_with = "deserialize_flexible_string")]
    pub currency_symbol: Option<String>,
    #[serde(default, rename = "geoplugin_currencyCode", deserialize_with = "deserialize_flexible_string")]
    pub currency_code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub geoplugin_latitude: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_string")]
    pub geoplugin_longitude: Option<String>,
    #[serde(default, rename = "geoplugin_regionCode", deserialize_with = "deserialize_flexible_string")]
    pub region_code: Option<String>,
    #[serde(default, rename = "geoplugin_regionName", deserialize_with = "deserialize_flexible_string")]
    pub region_name: Option<String>,
}

impl NormalizedGeoResponse {
    pub fn into_location(self, ip: String) -> GeoLocation {
        GeoLocation {
            ip,
            city: self.city,
            continent_code: self.continent_code,
            continent_name: self.continent_name,
            country_code: self.country_code,
            country_name: self.country_name,
            currency_symbol: self.currency_symbol,
            currency_code: self.currency_code,
            latitude: self.latitude,
            longitude: self.longitude,
            region_code: self.region_code,
            region_name: self.region_name,
        }
    }
}

impl GeopluginResponse {
    pub fn into_location(self, ip: String) -> GeoLocation {
        GeoLocation {
            ip,
            city: self.geoplugin_city,
            continent_code: self.continent_code,
            continent_name: self.continent_name,
            country_code: self.country_code,
            country_name: self.country_name,
            currency_symbol: self.currency_symbol,
            currency_code: self.currency_code,
            latitude: self.geoplugin_latitude,
            longitude: self.geoplugin_longitude,
            region_code: self.region_code,
            region_name: self.region_name,
        }
    }
}

/// Hand-edited configs use `null` where a field is meant to be unset
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// List deserializer that drops `null` entries
fn deserialize_without_nulls<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

/// Theme slots set to `null` fall back to the widget defaults
fn deserialize_theme<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let slots = Option::<BTreeMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(slots
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(slot, color)| color.map(|c| (slot, c)))
        .collect())
}

/// Flexible string deserializer: geo providers send coordinates as numbers or strings
fn deserialize_flexible_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleString {
        String(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    let value = Option::<FlexibleString>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        FlexibleString::String(s) => s,
        FlexibleString::Int(i) => i.to_string(),
        FlexibleString::Float(f) => f.to_string(),
        FlexibleString::Bool(b) => b.to_string(),
    }))
}
