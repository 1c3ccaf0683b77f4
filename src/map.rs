//! Incident map page.
//!
//! Renders a standalone Leaflet page: satellite tiles centred on the command
//! post with a translucent red circle marking the watched sector. The page is
//! presentational only; nothing in the pipeline reads it back.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::MapSettings;

const LEAFLET_VERSION: &str = "1.9.4";

#[derive(Clone, Debug)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub radius_m: f64,
    pub tiles: String,
    pub attribution: String,
}

impl MapView {
    pub fn from_settings(settings: &MapSettings) -> Self {
        Self {
            center_lat: settings.center_lat,
            center_lon: settings.center_lon,
            zoom: settings.zoom,
            radius_m: settings.radius_m,
            tiles: settings.tiles.clone(),
            attribution: settings.attribution.clone(),
        }
    }

    pub fn render_html(&self) -> String {
        // serde_json gives properly escaped JS string literals.
        let tiles = serde_json::Value::from(self.tiles.as_str()).to_string();
        let attribution = serde_json::Value::from(self.attribution.as_str()).to_string();
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Geospatial Live Feed</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{v}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{v}/dist/leaflet.js"></script>
<style>html, body, #map {{ height: 100%; margin: 0; }}</style>
</head>
<body>
<div id="map"></div>
<script>
var center = [{lat}, {lon}];
var map = L.map("map").setView(center, {zoom});
L.tileLayer({tiles}, {{ attribution: {attribution} }}).addTo(map);
L.circle(center, {{ radius: {radius}, color: "red", fill: true, fillOpacity: 0.2 }}).addTo(map);
</script>
</body>
</html>
"#,
            v = LEAFLET_VERSION,
            lat = self.center_lat,
            lon = self.center_lon,
            zoom = self.zoom,
            tiles = tiles,
            attribution = attribution,
            radius = self.radius_m,
        )
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render_html())
            .with_context(|| format!("write map page {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentinelConfig;

    #[test]
    fn page_centres_on_command_post() {
        let html = MapView::from_settings(&SentinelConfig::default().map).render_html();
        assert!(html.contains("var center = [30.7333, 76.7794];"));
        assert!(html.contains("setView(center, 14)"));
        assert!(html.contains("radius: 500"));
        assert!(html.contains("World_Imagery/MapServer/tile/{z}/{y}/{x}"));
        assert!(html.contains(r#"attribution: "Esri World Imagery""#));
    }

    #[test]
    fn attribution_is_escaped() {
        let mut view = MapView::from_settings(&SentinelConfig::default().map);
        view.attribution = r#"a "quoted" name"#.into();
        assert!(view.render_html().contains(r#""a \"quoted\" name""#));
    }

    #[test]
    fn writes_page_to_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("map.html");
        MapView::from_settings(&SentinelConfig::default().map).write_to(&path)?;
        assert!(std::fs::read_to_string(&path)?.starts_with("<!DOCTYPE html>"));
        Ok(())
    }
}
