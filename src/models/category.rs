use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// A class of inspectable object with its per-unit time allowance
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CategoryConfig {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub sort_order: i64,
    /// Survey hours charged per object of this category
    pub unit_time_allowance_hours: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Object count for one configured category
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryEntry {
    pub category_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub count: u32,
}

impl CategoryEntry {
    pub fn new(category_id: impl Into<String>, title: impl Into<String>, count: u32) -> Self {
        Self {
            category_id: category_id.into(),
            title: title.into(),
            count,
        }
    }
}

/// Object count as sent by clients: negative counts become 0
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(u32::try_from(raw.max(0)).unwrap_or(u32::MAX))
}

/// Categories in display order
///
/// Sorted by `sort_order`; the sort is stable, so ties keep their
/// configuration order.
pub fn sorted_categories(configs: &[CategoryConfig]) -> Vec<&CategoryConfig> {
    let mut sorted: Vec<&CategoryConfig> = configs.iter().collect();
    sorted.sort_by_key(|c| c.sort_order);
    sorted
}

/// Align an entry list with the current category configuration
///
/// - entries for categories no longer configured are dropped
/// - newly configured categories get an entry with `count = 0`
/// - counts are preserved by id, titles are refreshed from config
///
/// The result is in display order. Reconciling twice yields the same list.
pub fn reconcile_entries(entries: &[CategoryEntry], configs: &[CategoryConfig]) -> Vec<CategoryEntry> {
    let counts: HashMap<&str, u32> = entries
        .iter()
        .map(|e| (e.category_id.as_str(), e.count))
        .collect();

    sorted_categories(configs)
        .into_iter()
        .map(|config| CategoryEntry {
            category_id: config.id.clone(),
            title: config.title.clone(),
            count: counts.get(config.id.as_str()).copied().unwrap_or(0),
        })
        .collect()
}
