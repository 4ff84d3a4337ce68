//! Reformat: resizes an image to a target format.
//!
//! The node works out a 2D scale factor and a scale origin from the input and
//! target display windows and exposes them on the internal `__scale.*` and
//! `__origin.*` outputs. Those drive a nested [`Scale`] node, which produces
//! the output data window and channel data. Pixels are forwarded tile for
//! tile; resampling happens elsewhere.
//!
//! `out.format` is the target format. It forwards `in.format` when the
//! `enabled` plug is off or the input format already equals the target
//! format; in both cases the nested scale is (1, 1) or disabled, so the other
//! `out.*` cells forward their `in.*` counterparts too.

use std::sync::Arc;

use cellgraph_core::{Box2i, CellId, Context, FingerprintHasher, Format, Plug, V2f, Value};
use cellgraph_engine::{EngineError, Evaluation, Node, NodeBuilder};

use crate::image_plugs::{connect_image_internal, image_context, ImagePlugs};
use crate::scale::Scale;

/// How the input is fitted to the target format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReformatMode {
    /// Scale uniformly so the widths match.
    Width,
    /// Scale uniformly so the heights match.
    Height,
    /// Scale uniformly so the whole input fits (letterbox).
    Fit,
    /// Scale uniformly so the target is covered (crop).
    Fill,
    /// Scale each axis independently.
    Distort,
}

impl ReformatMode {
    pub fn as_i32(self) -> i32 {
        match self {
            ReformatMode::Width => 0,
            ReformatMode::Height => 1,
            ReformatMode::Fit => 2,
            ReformatMode::Fill => 3,
            ReformatMode::Distort => 4,
        }
    }
}

impl From<i32> for ReformatMode {
    /// Unknown values behave as `Distort`.
    fn from(value: i32) -> Self {
        match value {
            0 => ReformatMode::Width,
            1 => ReformatMode::Height,
            2 => ReformatMode::Fit,
            3 => ReformatMode::Fill,
            _ => ReformatMode::Distort,
        }
    }
}

// ---------------------------------------------------------------------------
// Pure geometry
// ---------------------------------------------------------------------------

/// Scale factor taking `input` display window to `output`.
///
/// Returns `None` when the input window is empty.
pub fn reformat_scale(input: &Box2i, output: &Box2i, mode: ReformatMode) -> Option<V2f> {
    if input.is_empty() {
        return None;
    }
    let width = output.width() as f64 / input.width() as f64;
    let height = output.height() as f64 / input.height() as f64;
    let fit = width.min(height);
    let fill = width.max(height);

    let (x, y) = match mode {
        ReformatMode::Width => (width, width),
        ReformatMode::Height => (height, height),
        ReformatMode::Fit => (fit, fit),
        ReformatMode::Fill => (fill, fill),
        ReformatMode::Distort => (width, height),
    };
    Some(V2f::new(x as f32, y as f32))
}

/// Point the image is scaled about.
///
/// When centering, the offset is minus half the input data window extent
/// along the axis not driving the scale. `Fit` offsets X when
/// `offset_x > offset_y`, `Fill` when `offset_x < offset_y`. Otherwise the
/// origin is the input display window's min corner.
pub fn reformat_origin(
    display_window: &Box2i,
    data_window: &Box2i,
    mode: ReformatMode,
    center: bool,
) -> V2f {
    let corner = V2f::new(display_window.min.x as f32, display_window.min.y as f32);
    if !center {
        return corner;
    }
    let offset_x = -(data_window.width() as f64 / 2.0);
    let offset_y = -(data_window.height() as f64 / 2.0);
    let along_x = V2f::new(offset_x as f32, 0.0);
    let along_y = V2f::new(0.0, offset_y as f32);

    match mode {
        ReformatMode::Width => along_x,
        ReformatMode::Height => along_y,
        ReformatMode::Fit => {
            if offset_x > offset_y {
                along_x
            } else {
                along_y
            }
        }
        ReformatMode::Fill => {
            if offset_x < offset_y {
                along_x
            } else {
                along_y
            }
        }
        ReformatMode::Distort => corner,
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

pub struct Reformat {
    pub input: ImagePlugs,
    pub enabled: Plug<bool>,
    pub format: Plug<Format>,
    pub mode: Plug<i32>,
    pub center_enabled: Plug<bool>,
    pub scale_x: Plug<f32>,
    pub scale_y: Plug<f32>,
    pub origin_x: Plug<f32>,
    pub origin_y: Plug<f32>,
    pub out: ImagePlugs,
    /// The nested node doing the resize, registered as `<name>.__scale`.
    pub scale: Arc<Scale>,
}

impl Reformat {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        let input = ImagePlugs::inputs(b, "in");
        let enabled = b.input("enabled", true);
        let format = b.input("format", Format::default());
        let mode = b.input("mode", ReformatMode::Width.as_i32());
        let center_enabled = b.input("centerEnabled", false);
        let scale_x = b.output("__scale.x");
        let scale_y = b.output("__scale.y");
        let origin_x = b.output("__origin.x");
        let origin_y = b.output("__origin.y");
        let out = ImagePlugs::outputs(b, "out");

        let scale = b.child("__scale", Scale::build);
        connect_image_internal(b, &input, &scale.input);
        b.connect(enabled, scale.enabled);
        b.connect(scale_x, scale.scale_x);
        b.connect(scale_y, scale.scale_y);
        b.connect(origin_x, scale.origin_x);
        b.connect(origin_y, scale.origin_y);
        b.connect(scale.out.data_window, out.data_window);
        b.connect(scale.out.channel_names, out.channel_names);
        b.connect(scale.out.channel_data, out.channel_data);

        Reformat {
            input,
            enabled,
            format,
            mode,
            center_enabled,
            scale_x,
            scale_y,
            origin_x,
            origin_y,
            out,
            scale,
        }
    }

    fn geometry_outputs(&self) -> [CellId; 4] {
        [
            self.scale_x.cell(),
            self.scale_y.cell(),
            self.origin_x.cell(),
            self.origin_y.cell(),
        ]
    }

    fn current_mode(&self, eval: &Evaluation<'_>, context: &Context) -> Result<ReformatMode, EngineError> {
        Ok(ReformatMode::from(eval.get(self.mode, context)?))
    }

    fn scale_factor(&self, output: CellId, eval: &Evaluation<'_>, context: &Context) -> Result<V2f, EngineError> {
        let in_format = eval.get(self.input.format, context)?;
        let out_format = eval.get(self.format, context)?;
        if (in_format.width(), in_format.height()) == (out_format.width(), out_format.height()) {
            return Ok(V2f::new(1.0, 1.0));
        }
        let mode = self.current_mode(eval, context)?;
        reformat_scale(&in_format.display_window, &out_format.display_window, mode).ok_or_else(|| {
            EngineError::compute_failure(output, "input format has an empty display window")
        })
    }

    fn origin(&self, eval: &Evaluation<'_>, context: &Context) -> Result<V2f, EngineError> {
        let in_format = eval.get(self.input.format, context)?;
        let data_window = eval.get(self.input.data_window, context)?;
        let mode = self.current_mode(eval, context)?;
        let center = eval.get(self.center_enabled, context)?;
        Ok(reformat_origin(&in_format.display_window, &data_window, mode, center))
    }
}

impl Node for Reformat {
    fn type_name(&self) -> &'static str {
        "Reformat"
    }

    // out.dataWindow, out.channelNames and out.channelData are connected to
    // the nested scale and dirtied through it.
    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.input.format.cell() || input == self.format.cell() {
            outputs.extend(self.geometry_outputs());
            outputs.push(self.out.format.cell());
        } else if input == self.mode.cell() || input == self.center_enabled.cell() {
            outputs.extend(self.geometry_outputs());
        } else if input == self.input.data_window.cell() {
            outputs.push(self.origin_x.cell());
            outputs.push(self.origin_y.cell());
        } else if input == self.enabled.cell() {
            outputs.push(self.out.format.cell());
        }
    }

    fn enabled(&self, eval: &Evaluation<'_>, context: &Context) -> Result<bool, EngineError> {
        if !eval.get(self.enabled, context)? {
            return Ok(false);
        }
        let global = image_context(context);
        let in_format = eval.get(self.input.format, &global)?;
        let out_format = eval.get(self.format, &global)?;
        Ok(in_format != out_format)
    }

    fn pass_through(&self, output: CellId) -> Option<CellId> {
        (output == self.out.format.cell()).then(|| self.input.format.cell())
    }

    fn hash(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        if output == self.scale_x.cell() {
            let in_format = eval.get(self.input.format, context)?;
            let out_format = eval.get(self.format, context)?;
            h.append(&in_format.width())
                .append(&in_format.height())
                .append(&out_format.width())
                .append(&out_format.height())
                .append(&eval.get(self.mode, context)?);
        } else if output == self.scale_y.cell() {
            let in_format = eval.get(self.input.format, context)?;
            let out_format = eval.get(self.format, context)?;
            h.append(&in_format.width())
                .append(&in_format.height())
                .append(&in_format.pixel_aspect)
                .append(&out_format.width())
                .append(&out_format.height())
                .append(&out_format.pixel_aspect)
                .append(&eval.get(self.mode, context)?);
        } else if output == self.origin_x.cell() || output == self.origin_y.cell() {
            let in_format = eval.get(self.input.format, context)?;
            h.append(&in_format.display_window);
            if output == self.origin_y.cell() {
                h.append(&in_format.pixel_aspect);
            }
            eval.append_hash(self.input.data_window, context, h)?;
            h.append(&eval.get(self.mode, context)?)
                .append(&eval.get(self.center_enabled, context)?);
        } else if output == self.out.format.cell() {
            eval.append_hash(self.format, context, h)?;
        }
        Ok(())
    }

    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        if output == self.scale_x.cell() {
            Ok(Value::Float(self.scale_factor(output, eval, context)?.x))
        } else if output == self.scale_y.cell() {
            Ok(Value::Float(self.scale_factor(output, eval, context)?.y))
        } else if output == self.origin_x.cell() {
            Ok(Value::Float(self.origin(eval, context)?.x))
        } else if output == self.origin_y.cell() {
            Ok(Value::Float(self.origin(eval, context)?.y))
        } else if output == self.out.format.cell() {
            Ok(Value::Format(eval.get(self.format, context)?))
        } else {
            Err(EngineError::CellNotFound(output))
        }
    }
}
