//! Domain model (ids, items, captions, errors).

pub mod caption;
pub mod errors;
pub mod ids;
pub mod item;

pub use caption::{CAPTION_LIMIT, Caption};
pub use errors::{DeliveryError, ErrorKind};
pub use ids::ItemId;
pub use item::{DeliveryItem, DeliveryKind, ImageRef, Payload};
