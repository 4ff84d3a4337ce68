//! RenderManOptions: optional renderer search-path settings layered onto a
//! globals map.
//!
//! Each member is an `enabled` flag plus a string value. Enabled members are
//! written to the output globals as `option:<name>`. With the node disabled,
//! or no member enabled, the output is the input globals unchanged and shares
//! its fingerprint.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellgraph_core::{CellId, Context, FingerprintHasher, OptionMap, Plug, Value};
use cellgraph_engine::{EngineError, Evaluation, Node, NodeBuilder};

/// Option name and plug name of every member, in declaration order.
pub const SEARCH_PATH_OPTIONS: [(&str, &str); 5] = [
    ("ri:searchpath:shader", "shaderSearchPath"),
    ("ri:searchpath:texture", "textureSearchPath"),
    ("ri:searchpath:display", "displaySearchPath"),
    ("ri:searchpath:archive", "archiveSearchPath"),
    ("ri:searchpath:procedural", "proceduralSearchPath"),
];

/// Prefix of option keys in a globals map.
pub const OPTION_PREFIX: &str = "option:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionMember {
    pub option: &'static str,
    pub enabled: Plug<bool>,
    pub value: Plug<String>,
}

pub struct RenderManOptions {
    pub input: Plug<OptionMap>,
    pub enabled: Plug<bool>,
    pub members: Vec<OptionMember>,
    pub out: Plug<OptionMap>,
}

impl RenderManOptions {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        let input = b.input("in", OptionMap::default());
        let enabled = b.input("enabled", true);
        let members = SEARCH_PATH_OPTIONS
            .iter()
            .map(|&(option, plug)| OptionMember {
                option,
                enabled: b.input(&format!("{plug}.enabled"), false),
                value: b.input(&format!("{plug}.value"), String::new()),
            })
            .collect();
        RenderManOptions {
            input,
            enabled,
            members,
            out: b.output("out"),
        }
    }

    /// Member for option `option` (e.g. `ri:searchpath:shader`).
    pub fn member(&self, option: &str) -> Option<&OptionMember> {
        self.members.iter().find(|m| m.option == option)
    }

    fn enabled_members<'a>(
        &'a self,
        eval: &Evaluation<'_>,
        context: &Context,
    ) -> Result<Vec<&'a OptionMember>, EngineError> {
        let mut enabled = Vec::new();
        for member in &self.members {
            if eval.get(member.enabled, context)? {
                enabled.push(member);
            }
        }
        Ok(enabled)
    }
}

impl Node for RenderManOptions {
    fn type_name(&self) -> &'static str {
        "RenderManOptions"
    }

    fn affects(&self, _input: CellId, outputs: &mut Vec<CellId>) {
        outputs.push(self.out.cell());
    }

    fn enabled(&self, eval: &Evaluation<'_>, context: &Context) -> Result<bool, EngineError> {
        if !eval.get(self.enabled, context)? {
            return Ok(false);
        }
        Ok(!self.enabled_members(eval, context)?.is_empty())
    }

    fn pass_through(&self, output: CellId) -> Option<CellId> {
        (output == self.out.cell()).then(|| self.input.cell())
    }

    fn hash(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        eval.append_hash(self.input, context, h)?;
        for member in self.enabled_members(eval, context)? {
            h.append(member.option);
            eval.append_hash(member.value, context, h)?;
        }
        Ok(())
    }

    fn compute(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        let mut globals: BTreeMap<String, String> = eval.get(self.input, context)?.as_ref().clone();
        for member in self.enabled_members(eval, context)? {
            let value = eval.get(member.value, context)?;
            globals.insert(format!("{OPTION_PREFIX}{}", member.option), value);
        }
        Ok(Value::Options(Arc::new(globals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_engine::Engine;

    #[test]
    fn test_members_follow_preset_order() {
        let engine = Engine::default();
        let options = engine.add_node("options", RenderManOptions::build);
        let names: Vec<&str> = options.members.iter().map(|m| m.option).collect();
        assert_eq!(names, SEARCH_PATH_OPTIONS.map(|(option, _)| option).to_vec());
        assert_eq!(
            engine.cell_name(options.member("ri:searchpath:texture").unwrap().value),
            "options.textureSearchPath.value"
        );
        assert!(options.member("ri:searchpath:bogus").is_none());
    }

    #[test]
    fn test_enabled_members_are_written() {
        let engine = Engine::default();
        let options = engine.add_node("options", RenderManOptions::build);
        let shader = *options.member("ri:searchpath:shader").unwrap();
        engine.set_value(shader.enabled, true).unwrap();
        engine.set_value(shader.value, "/shaders".to_string()).unwrap();

        let globals = engine.get(options.out, &Context::new()).unwrap();
        assert_eq!(globals.len(), 1);
        assert_eq!(
            globals.get("option:ri:searchpath:shader").map(String::as_str),
            Some("/shaders")
        );
    }

    #[test]
    fn test_no_enabled_member_passes_through() {
        let engine = Engine::default();
        let options = engine.add_node("options", RenderManOptions::build);
        let mut upstream = BTreeMap::new();
        upstream.insert("option:user:foo".to_string(), "bar".to_string());
        engine.set_value(options.input, Arc::new(upstream)).unwrap();
        let ctx = Context::new();

        assert_eq!(
            engine.hash(options.out, &ctx).unwrap(),
            engine.hash(options.input, &ctx).unwrap()
        );
        assert_eq!(
            engine.value(options.out, &ctx).unwrap(),
            engine.value(options.input, &ctx).unwrap()
        );
        assert_eq!(engine.stats().computes, 0);
    }

    #[test]
    fn test_disabled_node_ignores_members() {
        let engine = Engine::default();
        let options = engine.add_node("options", RenderManOptions::build);
        let texture = *options.member("ri:searchpath:texture").unwrap();
        engine.set_value(texture.enabled, true).unwrap();
        engine.set_value(options.enabled, false).unwrap();
        let ctx = Context::new();

        assert!(engine.get(options.out, &ctx).unwrap().is_empty());
        assert_eq!(
            engine.hash(options.out, &ctx).unwrap(),
            engine.hash(options.input, &ctx).unwrap()
        );
    }

    #[test]
    fn test_member_value_changes_fingerprint() {
        let engine = Engine::default();
        let options = engine.add_node("options", RenderManOptions::build);
        let archive = *options.member("ri:searchpath:archive").unwrap();
        engine.set_value(archive.enabled, true).unwrap();
        let ctx = Context::new();
        let before = engine.hash(options.out, &ctx).unwrap();

        engine.set_value(archive.value, "/archives".to_string()).unwrap();
        assert_ne!(engine.hash(options.out, &ctx).unwrap(), before);

        // Values of disabled members do not matter.
        let display = *options.member("ri:searchpath:display").unwrap();
        let current = engine.hash(options.out, &ctx).unwrap();
        engine.set_value(display.value, "/displays".to_string()).unwrap();
        assert_eq!(engine.hash(options.out, &ctx).unwrap(), current);
    }
}
