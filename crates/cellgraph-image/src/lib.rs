//! Image nodes built on the cellgraph engine.
//!
//! - [`image_plugs`]: the `ImagePlugs` bundle, tile helpers
//! - [`constant`]: `Constant` image source
//! - [`reformat`]: `Reformat` and its pure scale/origin geometry
//! - [`scale`]: `Scale`, the data-window resize `Reformat` delegates to
//! - [`options`]: `RenderManOptions` globals node

pub mod constant;
pub mod image_plugs;
pub mod options;
pub mod reformat;
pub mod scale;

pub use constant::Constant;
pub use image_plugs::{connect_image, connect_image_internal, image_context, tile_origins, ImagePlugs, TILE_SIZE};
pub use options::{OptionMember, RenderManOptions, SEARCH_PATH_OPTIONS};
pub use reformat::{reformat_origin, reformat_scale, Reformat, ReformatMode};
pub use scale::{scale_window, Scale};
