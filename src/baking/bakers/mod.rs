//! Concrete bakers, one per artifact family.
//!
//! Every baker follows the same scheduling contract (see
//! [`crate::baking::baker::Baker`]); what differs is which extensions it
//! claims, which output names it derives, and the transformation body.
//! Orders: order 0 bakers work from raw sources only, order 1 bakers may
//! read order 0 output through the baked-files view, order 2 bakers may
//! read both.

mod config;
mod effect;
mod image;
mod map;
mod metadata;
mod model;
mod proto;
mod proto_text;
mod raw_copy;
mod script;
mod text;

pub use config::ConfigBaker;
pub use effect::EffectBaker;
pub use image::ImageBaker;
pub use map::MapBaker;
pub use metadata::MetadataBaker;
pub use model::ModelBaker;
pub use proto::ProtoBaker;
pub use proto_text::ProtoTextBaker;
pub use raw_copy::RawCopyBaker;
pub use script::ScriptBaker;
pub use text::TextBaker;
