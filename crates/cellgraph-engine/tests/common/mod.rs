//! Test nodes shared by the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cellgraph_core::{CellId, Context, FingerprintHasher, Plug, Value};
use cellgraph_engine::{Engine, EngineError, Evaluation, Node, NodeBuilder};

/// `sum = op1 + op2`. Passes `op1` through while `enabled` is false.
pub struct AddNode {
    pub op1: Plug<i32>,
    pub op2: Plug<i32>,
    pub enabled: Plug<bool>,
    pub sum: Plug<i32>,
    computes: AtomicUsize,
    delay: Option<Duration>,
}

impl AddNode {
    pub fn build(b: &mut NodeBuilder<'_>, op1: i32, op2: i32) -> Self {
        AddNode {
            op1: b.input("op1", op1),
            op2: b.input("op2", op2),
            enabled: b.input("enabled", true),
            sum: b.output("sum"),
            computes: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Same as [`AddNode::build`], but compute sleeps for `delay` first.
    pub fn slow(b: &mut NodeBuilder<'_>, op1: i32, op2: i32, delay: Duration) -> Self {
        AddNode {
            delay: Some(delay),
            ..AddNode::build(b, op1, op2)
        }
    }

    pub fn computes(&self) -> usize {
        self.computes.load(Ordering::SeqCst)
    }
}

impl Node for AddNode {
    fn type_name(&self) -> &'static str {
        "AddNode"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.op1.cell() || input == self.op2.cell() || input == self.enabled.cell() {
            outputs.push(self.sum.cell());
        }
    }

    fn enabled(&self, eval: &Evaluation<'_>, context: &Context) -> Result<bool, EngineError> {
        eval.get(self.enabled, context)
    }

    fn pass_through(&self, output: CellId) -> Option<CellId> {
        (output == self.sum.cell()).then(|| self.op1.cell())
    }

    fn hash(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        eval.append_hash(self.op1, context, h)?;
        eval.append_hash(self.op2, context, h)
    }

    fn compute(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let a = eval.get(self.op1, context)?;
        let b = eval.get(self.op2, context)?;
        Ok(Value::Int(a + b))
    }
}

/// `out = x + 10`, computed by a nested [`AddNode`].
pub struct OffsetNode {
    pub x: Plug<i32>,
    pub out: Plug<i32>,
    pub inner: Arc<AddNode>,
}

impl OffsetNode {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        let x = b.input("x", 0);
        let out = b.output("out");
        let inner = b.child("add", |b| AddNode::build(b, 0, 10));
        b.connect(x, inner.op1);
        b.connect(inner.sum, out);
        OffsetNode { x, out, inner }
    }
}

impl Node for OffsetNode {
    fn type_name(&self) -> &'static str {
        "OffsetNode"
    }

    // Everything flows through connections to the nested node.
    fn affects(&self, _input: CellId, _outputs: &mut Vec<CellId>) {}

    fn hash(
        &self,
        _output: CellId,
        _context: &Context,
        _eval: &Evaluation<'_>,
        _h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn compute(
        &self,
        output: CellId,
        _context: &Context,
        _eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        Err(EngineError::CellNotFound(output))
    }
}

/// `fx = 2x`, `fy = 2y`; `x` never affects `fy` and vice versa.
pub struct PairNode {
    pub x: Plug<i32>,
    pub y: Plug<i32>,
    pub fx: Plug<i32>,
    pub fy: Plug<i32>,
    computes: AtomicUsize,
}

impl PairNode {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        PairNode {
            x: b.input("x", 1),
            y: b.input("y", 2),
            fx: b.output("fx"),
            fy: b.output("fy"),
            computes: AtomicUsize::new(0),
        }
    }

    pub fn computes(&self) -> usize {
        self.computes.load(Ordering::SeqCst)
    }

    fn source(&self, output: CellId) -> Plug<i32> {
        if output == self.fx.cell() {
            self.x
        } else {
            self.y
        }
    }
}

impl Node for PairNode {
    fn type_name(&self) -> &'static str {
        "PairNode"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.x.cell() {
            outputs.push(self.fx.cell());
        } else if input == self.y.cell() {
            outputs.push(self.fy.cell());
        }
    }

    fn hash(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        eval.append_hash(self.source(output), context, h)
    }

    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        self.computes.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(2 * eval.get(self.source(output), context)?))
    }
}

/// `root = sqrt(x)`, failing for negative `x`.
pub struct SqrtNode {
    pub x: Plug<f32>,
    pub root: Plug<f32>,
}

impl SqrtNode {
    pub fn build(b: &mut NodeBuilder<'_>, x: f32) -> Self {
        SqrtNode {
            x: b.input("x", x),
            root: b.output("root"),
        }
    }
}

impl Node for SqrtNode {
    fn type_name(&self) -> &'static str {
        "SqrtNode"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.x.cell() {
            outputs.push(self.root.cell());
        }
    }

    fn hash(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        eval.append_hash(self.x, context, h)
    }

    fn compute(
        &self,
        output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        let x = eval.get(self.x, context)?;
        if x < 0.0 {
            return Err(EngineError::compute_failure(output, format!("negative input {x}")));
        }
        Ok(Value::Float(x.sqrt()))
    }
}

/// Declares an `Int` output but computes a `Float`.
pub struct MistypedNode {
    pub out: Plug<i32>,
}

impl Node for MistypedNode {
    fn type_name(&self) -> &'static str {
        "MistypedNode"
    }

    fn affects(&self, _input: CellId, _outputs: &mut Vec<CellId>) {}

    fn hash(
        &self,
        _output: CellId,
        _context: &Context,
        _eval: &Evaluation<'_>,
        _h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn compute(
        &self,
        _output: CellId,
        _context: &Context,
        _eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        Ok(Value::Float(1.5))
    }
}

/// Computes `out` by reading `out`.
pub struct SelfReadNode {
    pub out: Plug<i32>,
}

impl Node for SelfReadNode {
    fn type_name(&self) -> &'static str {
        "SelfReadNode"
    }

    fn affects(&self, _input: CellId, _outputs: &mut Vec<CellId>) {}

    fn hash(
        &self,
        _output: CellId,
        _context: &Context,
        _eval: &Evaluation<'_>,
        _h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn compute(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        eval.value(self.out, context)
    }
}

/// Mis-declared node whose inputs affect each other.
pub struct LoopNode {
    pub a: Plug<i32>,
    pub b: Plug<i32>,
    pub out: Plug<i32>,
}

impl LoopNode {
    pub fn build(b: &mut NodeBuilder<'_>) -> Self {
        LoopNode {
            a: b.input("a", 1),
            b: b.input("b", 2),
            out: b.output("out"),
        }
    }
}

impl Node for LoopNode {
    fn type_name(&self) -> &'static str {
        "LoopNode"
    }

    fn affects(&self, input: CellId, outputs: &mut Vec<CellId>) {
        if input == self.a.cell() {
            outputs.push(self.b.cell());
        } else if input == self.b.cell() {
            outputs.push(self.a.cell());
        }
    }

    fn hash(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
        h: &mut FingerprintHasher,
    ) -> Result<(), EngineError> {
        eval.append_hash(self.a, context, h)
    }

    fn compute(
        &self,
        _output: CellId,
        context: &Context,
        eval: &Evaluation<'_>,
    ) -> Result<Value, EngineError> {
        Ok(Value::Int(eval.get(self.a, context)?))
    }
}

/// Engine with an unbounded memo so tests never see evictions.
pub fn unbounded_engine() -> Engine {
    Engine::with_policy(
        Default::default(),
        Box::new(cellgraph_engine::UnboundedPolicy::new()),
    )
}

pub fn add_node(engine: &Engine, name: &str, op1: i32, op2: i32) -> Arc<AddNode> {
    engine.add_node(name, |b| AddNode::build(b, op1, op2))
}
