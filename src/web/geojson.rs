//! GeoJSON emission for the map layer

use serde_json::{json, Value};

use crate::db::Datapoint;

/// Display name assembled from the narrowest populated admin level,
/// e.g. "Suffolk, Massachusetts, US".
fn feature_name(dp: &Datapoint) -> String {
    let mut name = if dp.admin0.is_empty() {
        "World".to_string()
    } else {
        dp.admin0.clone()
    };
    if !dp.admin1.is_empty() {
        name = format!("{}, {}", dp.admin1, name);
    }
    if !dp.admin2.is_empty() {
        name = format!("{}, {}", dp.admin2, name);
    }
    name
}

/// Build a FeatureCollection of Point features from located datapoints.
pub fn feature_collection(datapoints: &[Datapoint]) -> Value {
    let features: Vec<Value> = datapoints
        .iter()
        .map(|dp| {
            let name = feature_name(dp);
            json!({
                "id": name,
                "type": "Feature",
                "properties": {
                    "name": name,
                    "admin0": dp.admin0,
                    "admin1": dp.admin1,
                    "admin2": dp.admin2,
                    "entry_date": dp.entry_date,
                    "latitude": dp.latitude,
                    "longitude": dp.longitude,
                    "total": dp.total,
                    "deaths": dp.deaths,
                    "recovered": dp.recovered,
                    "active": dp.active,
                },
                "geometry": {
                    "coordinates": [dp.longitude, dp.latitude],
                    "type": "Point"
                }
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
