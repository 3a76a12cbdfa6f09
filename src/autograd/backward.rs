//! Backward op trait and tape ordering

use super::Tensor;
use std::collections::HashSet;
use std::rc::Rc;

/// A recorded operation that can push its output gradient to its inputs.
///
/// `backward` must only accumulate into the inputs' gradients; graph traversal
/// is driven by [`tape_order`] so that shared subgraphs (residual branches)
/// are visited once, after all of their consumers.
pub trait BackwardOp {
    /// Propagate the result gradient into the inputs
    fn backward(&self);

    /// Tensors this op was computed from
    fn inputs(&self) -> Vec<&Tensor>;
}

fn op_id(op: &Rc<dyn BackwardOp>) -> usize {
    Rc::as_ptr(op) as *const () as usize
}

/// Ops reachable from `root`, ordered so every op runs after all ops that
/// consume its output.
pub(crate) fn tape_order(root: &Rc<dyn BackwardOp>) -> Vec<Rc<dyn BackwardOp>> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut post_order: Vec<Rc<dyn BackwardOp>> = Vec::new();
    let mut stack: Vec<(Rc<dyn BackwardOp>, bool)> = vec![(Rc::clone(root), false)];

    while let Some((op, expanded)) = stack.pop() {
        if expanded {
            post_order.push(op);
            continue;
        }
        if !visited.insert(op_id(&op)) {
            continue;
        }
        stack.push((Rc::clone(&op), true));
        for input in op.inputs() {
            if let Some(child) = input.backward_op() {
                if !visited.contains(&op_id(&child)) {
                    stack.push((child, false));
                }
            }
        }
    }

    post_order.reverse();
    post_order
}
