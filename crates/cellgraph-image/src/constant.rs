//! Constant: an image source filled with a single value.

use std::sync::Arc;

use cellgraph_core::{CellId, Context, FingerprintHasher, Format, Plug, StringVector, Value};
use cellgraph_engine::{EngineError, Evaluation, Node, NodeBuilder};

use crate::image_plugs::{ImagePlugs, TILE_SIZE};

pub struct Constant {
    pub format: Plug<Format>,
    pub value: Plug<f32>,
    pub channels: Plug<StringVector>,
    pub out: ImagePlugs,
}

impl Constant {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        let channels = ["R", "G", "B", "A"].map(String::from).to_vec();
        Constant {
            format: b.input("format", Format::default()),
            value: b.input("value", 0.0),
            channels: b.input("channels", Arc::new(channels)),
            out: ImagePlugs::outputs(b, "out"),
        }
    }

    /// Channel requested by `context`, checked against `channels`.
    fn requested_channel(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<String, EngineError> {
        let channel = context
            .channel_name()
            .ok_or_else(|| EngineError::compute_failure(output, "context has no channel name"))?;
        let channels = eval.get(self.channels, context)?;
        if !channels.iter().any(|c| c == channel) {
            return Err(EngineError::compute_failure(
                output,
                format!("unknown channel '{channel}'"),
            ));
        }
        Ok(channel.to_string())
    }
}

impl Node for Constant {
    fn type_name(&self) -> &'static str {
        "Constant"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.format.cell() {
            outputs.push(self.out.format.cell());
            outputs.push(self.out.data_window.cell());
        } else if input == self.value.cell() {
            outputs.push(self.out.channel_data.cell());
        } else if input == self.channels.cell() {
            outputs.push(self.out.channel_names.cell());
            outputs.push(self.out.channel_data.cell());
        }
    }

    fn hash(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        if output == self.out.format.cell() || output == self.out.data_window.cell() {
            eval.append_hash(self.format, context, h)
        } else if output == self.out.channel_names.cell() {
            eval.append_hash(self.channels, context, h)
        } else {
            eval.append_hash(self.value, context, h)?;
            eval.append_hash(self.channels, context, h)?;
            h.append(context.channel_name().unwrap_or_default());
            Ok(())
        }
    }

    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        if output == self.out.format.cell() {
            Ok(Value::Format(eval.get(self.format, context)?))
        } else if output == self.out.data_window.cell() {
            Ok(Value::Box2i(eval.get(self.format, context)?.display_window))
        } else if output == self.out.channel_names.cell() {
            Ok(Value::StringVector(eval.get(self.channels, context)?))
        } else if output == self.out.channel_data.cell() {
            self.requested_channel(output, context, eval)?;
            let value = eval.get(self.value, context)?;
            let tile = vec![value; (TILE_SIZE * TILE_SIZE) as usize];
            Ok(Value::FloatVector(Arc::new(tile)))
        } else {
            Err(EngineError::CellNotFound(output))
        }
    }
}
