//! Backend records the shell keeps in sync with the renderer's lists.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::id::RecordId;
use crate::image::ImagePayload;

/// Bookkeeping columns the backend adds to every table.
pub const BACKEND_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// A record with a stable identity inside a REST collection, optionally
/// owning a nested collection of its own.
pub trait Syncable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Child: Syncable;

    /// Path segment of the collection, e.g. `shops`.
    const COLLECTION: &'static str;
    /// JSON field holding the nested collection, if any.
    const CHILDREN_FIELD: Option<&'static str> = None;
    /// Columns the backend fills in itself (foreign keys, timestamps). A
    /// client record that omits them has not cleared them.
    const SERVER_FIELDS: &'static [&'static str] = BACKEND_COLUMNS;

    fn identity(&self) -> &RecordId;

    fn children(&self) -> &[Self::Child] {
        &[]
    }

    /// Brings fields that crossed a JSON boundary back to their wire form.
    fn normalize(&mut self) -> Result<(), base64::DecodeError> {
        Ok(())
    }
}

/// Child type of records that own no nested collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NoChildren {}

impl Syncable for NoChildren {
    type Child = NoChildren;
    const COLLECTION: &'static str = "";

    fn identity(&self) -> &RecordId {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<ImagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panoramic_view_data: Option<ImagePayload>,
    #[serde(default, rename = "keepOpen", with = "int_flag")]
    pub keep_open: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MapRecord {
    /// Adds `imageDataUrl` / `panoramicDataUrl` for renderers and leaves the
    /// image fields as bare base64.
    pub fn resolve_image_urls(&mut self) {
        if let Some(url) = self.image_data.as_ref().and_then(|p| p.to_data_url(&self.name)) {
            self.extra.insert("imageDataUrl".into(), Value::String(url));
        }
        if let Some(url) = self
            .panoramic_view_data
            .as_ref()
            .and_then(|p| p.to_data_url(&self.name))
        {
            self.extra.insert("panoramicDataUrl".into(), Value::String(url));
        }
        for payload in [&mut self.image_data, &mut self.panoramic_view_data]
            .into_iter()
            .flatten()
        {
            if let Some(body) = payload.base64().map(|body| body.into_owned()) {
                *payload = ImagePayload::Text(body);
            }
        }
    }
}

impl Syncable for MapRecord {
    type Child = NoChildren;
    const COLLECTION: &'static str = "maps";

    fn identity(&self) -> &RecordId {
        &self.id
    }

    fn normalize(&mut self) -> Result<(), base64::DecodeError> {
        // Resolved URLs are a renderer convenience, never stored.
        self.extra.remove("imageDataUrl");
        self.extra.remove("panoramicDataUrl");
        for payload in [&mut self.image_data, &mut self.panoramic_view_data]
            .into_iter()
            .flatten()
        {
            *payload = payload.to_binary()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Syncable for Monster {
    type Child = NoChildren;
    const COLLECTION: &'static str = "monsters";

    fn identity(&self) -> &RecordId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Syncable for Shop {
    type Child = Category;
    const COLLECTION: &'static str = "shops";
    const CHILDREN_FIELD: Option<&'static str> = Some("categories");

    fn identity(&self) -> &RecordId {
        &self.id
    }

    fn children(&self) -> &[Category] {
        &self.categories
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<RecordId>,
    #[serde(default)]
    pub name: String,
    /// Column layout as JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_definition: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Syncable for Category {
    type Child = Item;
    const COLLECTION: &'static str = "categories";
    const CHILDREN_FIELD: Option<&'static str> = Some("items");
    const SERVER_FIELDS: &'static [&'static str] = &["shop_id", "created_at", "updated_at"];

    fn identity(&self) -> &RecordId {
        &self.id
    }

    fn children(&self) -> &[Item] {
        &self.items
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<RecordId>,
    /// Item properties as JSON text, keyed by the category's columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Syncable for Item {
    type Child = NoChildren;
    const COLLECTION: &'static str = "items";
    const SERVER_FIELDS: &'static [&'static str] = &["category_id", "created_at", "updated_at"];

    fn identity(&self) -> &RecordId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Syncable for Song {
    type Child = NoChildren;
    const COLLECTION: &'static str = "songs";

    fn identity(&self) -> &RecordId {
        &self.id
    }
}

/// `bool` stored by the backend as an integer column.
mod int_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Float(f64),
        Null(()),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
            Flag::Float(value) => value != 0.0,
            Flag::Null(()) => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MapRecord, Monster, Shop, Syncable};
    use crate::id::RecordId;
    use crate::image::ImagePayload;

    #[test]
    fn keep_open_accepts_bools_and_ints() {
        let from_bool: MapRecord =
            serde_json::from_str(r#"{"id":"a","keepOpen":true}"#).expect("bool flag");
        let from_int: MapRecord =
            serde_json::from_str(r#"{"id":"a","keepOpen":0}"#).expect("int flag");
        let from_null: MapRecord =
            serde_json::from_str(r#"{"id":"a","keepOpen":null}"#).expect("null flag");
        assert!(from_bool.keep_open);
        assert!(!from_int.keep_open);
        assert!(!from_null.keep_open);

        let json = serde_json::to_value(&from_bool).expect("serialize");
        assert_eq!(json["keepOpen"], 1);
    }

    #[test]
    fn normalize_turns_base64_images_into_buffers() {
        let mut record: MapRecord = serde_json::from_str(
            r#"{"id":"a","name":"town.png","image_data":"data:image/png;base64,YWJj",
                "panoramic_view_data":"YWJj","imageDataUrl":"data:image/png;base64,YWJj"}"#,
        )
        .expect("parse map record");
        record.normalize().expect("valid base64");

        assert_eq!(record.image_data, Some(ImagePayload::from_bytes(b"abc".to_vec())));
        assert_eq!(
            record.panoramic_view_data,
            Some(ImagePayload::from_bytes(b"abc".to_vec()))
        );
        assert!(!record.extra.contains_key("imageDataUrl"));
    }

    #[test]
    fn resolve_image_urls_adds_inline_urls() {
        let mut record: MapRecord = serde_json::from_value(serde_json::json!({
            "id": "a",
            "name": "cave.jpg",
            "image_data": {"type": "Buffer", "data": [97, 98, 99]},
        }))
        .expect("parse map record");
        record.resolve_image_urls();

        assert_eq!(
            record.extra.get("imageDataUrl"),
            Some(&serde_json::json!("data:image/jpg;base64,YWJj"))
        );
        assert_eq!(record.image_data, Some(ImagePayload::Text("YWJj".into())));
        assert!(!record.extra.contains_key("panoramicDataUrl"));
    }

    #[test]
    fn shop_parses_nested_collections() {
        let shop: Shop = serde_json::from_str(
            r#"{"id":"s1","name":"Smithy","categories":[
                {"id":"c1","shop_id":"s1","name":"Weapons","items":[
                    {"id":"i1","category_id":"c1","data":"{\"Name\":\"Axe\"}"}
                ]}
            ]}"#,
        )
        .expect("parse shop");

        assert_eq!(shop.children().len(), 1);
        assert_eq!(shop.categories[0].children()[0].identity(), "i1");
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let monsters: Vec<Monster> =
            serde_json::from_str(r#"[{"id":1,"name":"Wolf"},{"id":"g2"}]"#).expect("parse monsters");
        assert_eq!(monsters[0].identity(), &RecordId::Number(1));
        assert_eq!(serde_json::to_value(&monsters[0]).expect("serialize")["id"], 1);

        let shop: Shop = serde_json::from_str(
            r#"{"id":3,"categories":[{"id":4,"shop_id":3,"items":[{"id":5,"category_id":4}]}]}"#,
        )
        .expect("parse shop with integer keys");
        assert_eq!(shop.categories[0].shop_id, Some(RecordId::Number(3)));
    }
}
