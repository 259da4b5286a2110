use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Point;
use crate::id::RecordId;
use crate::image::ImagePayload;

pub const DEFAULT_GRID_SIZE: f64 = 50.0;

/// The map currently shown to the players.
///
/// Fields the shell does not interpret (song ids, group, campaign, ...) ride
/// along in `extra` so a persisted map reloads exactly as it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayedMap {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "image_data", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        rename = "panoramic_view_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub panoramic_view_data: Option<ImagePayload>,
    #[serde(default)]
    pub show_grid: bool,
    #[serde(default = "default_grid_size")]
    pub grid_size: f64,
    #[serde(default)]
    pub grid_offset_x: f64,
    #[serde(default)]
    pub grid_offset_y: f64,
    #[serde(default)]
    pub pan_x: f64,
    #[serde(default)]
    pub pan_y: f64,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub combat_tokens: Vec<CombatToken>,
    #[serde(default)]
    pub current_combatant_id: Option<RecordId>,
    #[serde(default)]
    pub manually_selected_combatant_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_grid_size() -> f64 {
    DEFAULT_GRID_SIZE
}

fn default_zoom() -> f64 {
    1.0
}

impl DisplayedMap {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_data: None,
            url: None,
            panoramic_view_data: None,
            show_grid: false,
            grid_size: DEFAULT_GRID_SIZE,
            grid_offset_x: 0.0,
            grid_offset_y: 0.0,
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            rotation: 0.0,
            combat_tokens: Vec::new(),
            current_combatant_id: None,
            manually_selected_combatant_id: None,
            extra: Map::new(),
        }
    }

    pub fn image_data_url(&self) -> Option<String> {
        self.image_data.as_ref()?.to_data_url(&self.name)
    }

    pub fn panoramic_data_url(&self) -> Option<String> {
        self.panoramic_view_data.as_ref()?.to_data_url(&self.name)
    }

    pub fn placed_tokens(&self) -> impl Iterator<Item = &CombatToken> {
        self.combat_tokens.iter().filter(|token| token.is_on_map)
    }
}

/// A map as pushed to a renderer, with its images resolved to inline URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBroadcast {
    #[serde(flatten)]
    pub map: DisplayedMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panoramic_data_url: Option<String>,
}

impl MapBroadcast {
    pub fn new(mut map: DisplayedMap) -> Self {
        // Renderers echo previously resolved URLs back; recompute them instead.
        map.extra.remove("imageDataUrl");
        map.extra.remove("panoramicDataUrl");
        let image_data_url = map.image_data_url();
        Self {
            map,
            image_data_url,
            panoramic_data_url: None,
        }
    }

    pub fn with_panoramic(mut self) -> Self {
        self.panoramic_data_url = self.map.panoramic_data_url();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    #[default]
    Character,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenVisual {
    #[default]
    Color,
    Image,
}

/// A character or monster marker on the combat map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatToken {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub category: TokenCategory,
    #[serde(default, rename = "token_type")]
    pub visual: TokenVisual,
    #[serde(default, rename = "token_value")]
    pub visual_value: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub is_on_map: bool,
}

impl CombatToken {
    pub fn new(
        id: impl Into<RecordId>,
        name: impl Into<String>,
        category: TokenCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            visual: TokenVisual::Color,
            visual_value: None,
            x: 0.0,
            y: 0.0,
            is_on_map: false,
        }
    }

    /// Map-local position; `None` while the token sits in the sidebar.
    pub fn position(&self) -> Option<Point> {
        self.is_on_map.then_some(Point::new(self.x, self.y))
    }

    pub fn place(&mut self, at: Point) {
        self.x = at.x;
        self.y = at.y;
        self.is_on_map = true;
    }

    pub fn remove_from_map(&mut self) {
        self.is_on_map = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{CombatToken, DisplayedMap, MapBroadcast, TokenCategory, TokenVisual};
    use crate::geometry::Point;
    use crate::id::RecordId;
    use crate::image::ImagePayload;

    #[test]
    fn parses_renderer_payload_with_defaults() {
        let map: DisplayedMap = serde_json::from_str(
            r#"{
                "id": "m1",
                "name": "town.png",
                "group_name": "Act I",
                "showGrid": true,
                "combatTokens": [
                    {"id": "t1", "name": "Aria", "type": "character", "token_type": "image",
                     "token_value": "data:image/png;base64,AA==", "x": 10, "y": 20, "isOnMap": true}
                ],
                "currentCombatantId": "t1"
            }"#,
        )
        .expect("parse map");

        assert_eq!(map.grid_size, 50.0);
        assert_eq!(map.zoom, 1.0);
        assert!(map.show_grid);
        assert_eq!(map.extra.get("group_name"), Some(&serde_json::json!("Act I")));
        let token = &map.combat_tokens[0];
        assert_eq!(token.visual, TokenVisual::Image);
        assert_eq!(token.position(), Some(Point::new(10.0, 20.0)));
        assert_eq!(map.current_combatant_id, Some(RecordId::from("t1")));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut map = DisplayedMap::new("m1", "keep.jpg");
        map.image_data = Some(ImagePayload::from_bytes(vec![7, 8, 9]));
        map.panoramic_view_data = Some(ImagePayload::Text("AAEC".into()));
        map.rotation = 90.0;
        map.combat_tokens
            .push(CombatToken::new("t1", "Goblin", TokenCategory::Monster));
        map.extra
            .insert("song_id".into(), serde_json::json!("song_3"));

        let json = serde_json::to_string(&map).expect("serialize map");
        let parsed: DisplayedMap = serde_json::from_str(&json).expect("parse map");
        assert_eq!(parsed, map);
    }

    #[test]
    fn unplaced_token_has_no_position() {
        let mut token = CombatToken::new("t1", "Goblin", TokenCategory::Monster);
        assert_eq!(token.position(), None);
        token.place(Point::new(5.0, 6.0));
        assert_eq!(token.position(), Some(Point::new(5.0, 6.0)));
        token.remove_from_map();
        assert_eq!(token.position(), None);
    }

    #[test]
    fn broadcast_inlines_images_and_drops_stale_urls() {
        let mut map = DisplayedMap::new("m1", "town.png");
        map.image_data = Some(ImagePayload::from_bytes(b"abc".to_vec()));
        map.panoramic_view_data = Some(ImagePayload::Text("YWJj".into()));
        map.extra
            .insert("imageDataUrl".into(), serde_json::json!("data:stale"));

        let broadcast = MapBroadcast::new(map).with_panoramic();
        assert_eq!(
            broadcast.image_data_url.as_deref(),
            Some("data:image/png;base64,YWJj")
        );
        assert_eq!(
            broadcast.panoramic_data_url.as_deref(),
            Some("data:image/png;base64,YWJj")
        );

        let json = serde_json::to_value(&broadcast).expect("serialize broadcast");
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,YWJj");
        assert_eq!(json["id"], "m1");
    }
}
