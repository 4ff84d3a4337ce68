//! The four-cell image bundle shared by every image node.

use std::sync::Arc;

use cellgraph_core::context::{CHANNEL_NAME, TILE_ORIGIN};
use cellgraph_core::{Box2i, CellId, Context, FloatVector, Format, Plug, StringVector, V2i};
use cellgraph_engine::{Engine, EngineError, NodeBuilder};

/// Edge length of a square channel-data tile.
pub const TILE_SIZE: i32 = 64;

/// An image as four cells: format, data window, channel names and the
/// per-tile channel data (requested with an `image:channelName` +
/// `image:tileOrigin` context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlugs {
    pub format: Plug<Format>,
    pub data_window: Plug<Box2i>,
    pub channel_names: Plug<StringVector>,
    pub channel_data: Plug<FloatVector>,
}

impl ImagePlugs {
    /// Declares the bundle as input cells named `<prefix>.format` etc.
    pub fn inputs(b: &mut NodeBuilder<'_>, prefix: &str) -> Self {
        ImagePlugs {
            format: b.input(&format!("{prefix}.format"), Format::default()),
            data_window: b.input(&format!("{prefix}.dataWindow"), Box2i::default()),
            channel_names: b.input(&format!("{prefix}.channelNames"), Arc::new(Vec::new())),
            channel_data: b.input(&format!("{prefix}.channelData"), Arc::new(Vec::new())),
        }
    }

    /// Declares the bundle as output cells named `<prefix>.format` etc.
    pub fn outputs(b: &mut NodeBuilder<'_>, prefix: &str) -> Self {
        ImagePlugs {
            format: b.output(&format!("{prefix}.format")),
            data_window: b.output(&format!("{prefix}.dataWindow")),
            channel_names: b.output(&format!("{prefix}.channelNames")),
            channel_data: b.output(&format!("{prefix}.channelData")),
        }
    }

    pub fn cells(&self) -> [CellId; 4] {
        [
            self.format.cell(),
            self.data_window.cell(),
            self.channel_names.cell(),
            self.channel_data.cell(),
        ]
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.cells().contains(&cell)
    }

    /// The cell of `other` in the same slot as `cell` in `self`.
    pub fn corresponding(&self, other: &ImagePlugs, cell: CellId) -> Option<CellId> {
        self.cells()
            .iter()
            .zip(other.cells())
            .find(|(mine, _)| **mine == cell)
            .map(|(_, theirs)| theirs)
    }
}

/// Wires all four cells of `src` to `dst` while a node is being built.
pub fn connect_image_internal(b: &mut NodeBuilder<'_>, src: &ImagePlugs, dst: &ImagePlugs) {
    b.connect(src.format, dst.format);
    b.connect(src.data_window, dst.data_window);
    b.connect(src.channel_names, dst.channel_names);
    b.connect(src.channel_data, dst.channel_data);
}

/// `context` without the per-tile variables.
///
/// Image-level reads (formats, scale factors, origins) go through this so
/// one value is shared by every channel and tile.
pub fn image_context(context: &Context) -> Context {
    context.clone().without(CHANNEL_NAME).without(TILE_ORIGIN)
}

/// Connects all four cells of `src` to `dst`.
pub fn connect_image(engine: &Engine, src: &ImagePlugs, dst: &ImagePlugs) -> Result<(), EngineError> {
    engine.connect(src.format, dst.format)?;
    engine.connect(src.data_window, dst.data_window)?;
    engine.connect(src.channel_names, dst.channel_names)?;
    engine.connect(src.channel_data, dst.channel_data)
}

/// Origins of the tiles covering `window`, row by row.
///
/// Stepping happens in `i64` so windows reaching `i32::MAX` terminate.
pub fn tile_origins(window: &Box2i) -> Vec<V2i> {
    if window.is_empty() {
        return Vec::new();
    }
    let align = |v: i32| i64::from(v.div_euclid(TILE_SIZE) * TILE_SIZE);
    let step = TILE_SIZE as usize;
    let rows = (align(window.min.y)..i64::from(window.max.y)).step_by(step);
    rows.flat_map(|y| {
        (align(window.min.x)..i64::from(window.max.x))
            .step_by(step)
            .filter_map(move |x| Some(V2i::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?)))
    })
    .collect()
}
