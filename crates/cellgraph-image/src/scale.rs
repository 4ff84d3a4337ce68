//! Scale: resizes an image's data window about an origin.
//!
//! `scale` and `origin` are per-axis float inputs. The node is disabled, and
//! `out.dataWindow`/`out.channelData` forward their `in.*` counterparts, when
//! `enabled` is off or the scale is exactly (1, 1). `out.format` and
//! `out.channelNames` are wired straight to the input.
//!
//! Tiles are forwarded unresampled, but the channel data fingerprint folds in
//! the scale and origin so downstream memos follow geometry edits.

use cellgraph_core::{Box2i, CellId, Context, FingerprintHasher, Plug, V2f, V2i, Value};
use cellgraph_engine::{EngineError, Evaluation, Node, NodeBuilder};

use crate::image_plugs::{image_context, ImagePlugs};

/// `window` scaled by `scale` about `origin`, rounded outwards.
///
/// Returns `None` when a scaled corner does not fit in `i32` coordinates.
pub fn scale_window(window: &Box2i, origin: V2f, scale: V2f) -> Option<Box2i> {
    if window.is_empty() {
        return Some(*window);
    }
    let map = |v: i32, o: f32, s: f32| f64::from(o) + (f64::from(v) - f64::from(o)) * f64::from(s);
    let coord = |v: f64| {
        let fits = v.is_finite() && v >= f64::from(i32::MIN) && v <= f64::from(i32::MAX);
        fits.then_some(v as i32)
    };
    Some(Box2i::new(
        V2i::new(
            coord(map(window.min.x, origin.x, scale.x).floor())?,
            coord(map(window.min.y, origin.y, scale.y).floor())?,
        ),
        V2i::new(
            coord(map(window.max.x, origin.x, scale.x).ceil())?,
            coord(map(window.max.y, origin.y, scale.y).ceil())?,
        ),
    ))
}

pub struct Scale {
    pub input: ImagePlugs,
    pub enabled: Plug<bool>,
    pub scale_x: Plug<f32>,
    pub scale_y: Plug<f32>,
    pub origin_x: Plug<f32>,
    pub origin_y: Plug<f32>,
    pub out: ImagePlugs,
}

impl Scale {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        let node = Scale {
            input: ImagePlugs::inputs(b, "in"),
            enabled: b.input("enabled", true),
            scale_x: b.input("scale.x", 1.0),
            scale_y: b.input("scale.y", 1.0),
            origin_x: b.input("origin.x", 0.0),
            origin_y: b.input("origin.y", 0.0),
            out: ImagePlugs::outputs(b, "out"),
        };
        b.connect(node.input.format, node.out.format);
        b.connect(node.input.channel_names, node.out.channel_names);
        node
    }

    fn geometry_inputs(&self) -> [CellId; 4] {
        [
            self.scale_x.cell(),
            self.scale_y.cell(),
            self.origin_x.cell(),
            self.origin_y.cell(),
        ]
    }

    // Scale and origin are image-level: read them once for every tile.
    fn scale(&self, eval: &Evaluation<'_>, context: &Context) -> Result<V2f, EngineError> {
        let global = image_context(context);
        Ok(V2f::new(eval.get(self.scale_x, &global)?, eval.get(self.scale_y, &global)?))
    }

    fn origin(&self, eval: &Evaluation<'_>, context: &Context) -> Result<V2f, EngineError> {
        let global = image_context(context);
        Ok(V2f::new(eval.get(self.origin_x, &global)?, eval.get(self.origin_y, &global)?))
    }

    fn append_geometry(
        &self,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        let global = image_context(context);
        for cell in self.geometry_inputs() {
            eval.append_hash(cell, &global, h)?;
        }
        Ok(())
    }
}

impl Node for Scale {
    fn type_name(&self) -> &'static str {
        "Scale"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if self.geometry_inputs().contains(&input) || input == self.enabled.cell() {
            outputs.push(self.out.data_window.cell());
            outputs.push(self.out.channel_data.cell());
        } else if input == self.input.data_window.cell() {
            outputs.push(self.out.data_window.cell());
        } else if input == self.input.channel_data.cell() {
            outputs.push(self.out.channel_data.cell());
        }
    }

    fn enabled(&self, eval: &Evaluation<'_>, context: &Context) -> Result<bool, EngineError> {
        if !eval.get(self.enabled, context)? {
            return Ok(false);
        }
        Ok(self.scale(eval, context)? != V2f::new(1.0, 1.0))
    }

    fn pass_through(&self, output: CellId) -> Option<CellId> {
        self.out.corresponding(&self.input, output)
    }

    fn hash(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        if output == self.out.data_window.cell() {
            eval.append_hash(self.input.data_window, context, h)?;
            self.append_geometry(context, eval, h)
        } else if output == self.out.channel_data.cell() {
            eval.append_hash(self.input.channel_data, context, h)?;
            self.append_geometry(context, eval, h)
        } else {
            Ok(())
        }
    }

    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        if output == self.out.data_window.cell() {
            let window = eval.get(self.input.data_window, context)?;
            let scale = self.scale(eval, context)?;
            let origin = self.origin(eval, context)?;
            scale_window(&window, origin, scale).map(Value::Box2i).ok_or_else(|| {
                EngineError::compute_failure(output, "scaled data window is outside the i32 range")
            })
        } else if output == self.out.channel_data.cell() {
            Ok(Value::FloatVector(eval.get(self.input.channel_data, context)?))
        } else {
            Err(EngineError::CellNotFound(output))
        }
    }
}
