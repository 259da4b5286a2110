pub mod character;
pub mod geometry;
pub mod id;
pub mod image;
pub mod map;
pub mod messages;
pub mod records;

pub use character::SpotlightCharacter;
pub use geometry::{DragGesture, MapTransform, Point, placement_point, snap_to_grid};
pub use id::RecordId;
pub use image::ImagePayload;
pub use map::{CombatToken, DisplayedMap, MapBroadcast, TokenCategory, TokenVisual};
pub use messages::*;
pub use records::{
    BACKEND_COLUMNS, Category, Item, MapRecord, Monster, NoChildren, Shop, Song, Syncable,
};
