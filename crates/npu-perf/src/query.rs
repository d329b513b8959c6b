//! Formula inputs.

use npu_perf_expr::Expr;

use crate::error::{OperandSide, PerfError};
use crate::params::ParamTable;
use crate::shape::{NodeRef, TensorShapeInfo};
use crate::soc::SocProfile;

/// Read-only context shared by every formula call.
#[derive(Clone, Copy, Debug)]
pub struct FormulaCtx<'a> {
    pub params: &'a ParamTable,
    pub soc: &'a SocProfile,
}

impl<'a> FormulaCtx<'a> {
    pub fn new(params: &'a ParamTable, soc: &'a SocProfile) -> Self {
        Self { params, soc }
    }

    pub fn block_dim(&self) -> Expr {
        self.soc.block_dim()
    }
}

/// One instruction to cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerfQuery {
    pub op_type: String,
    pub inputs: Vec<TensorShapeInfo>,
    pub outputs: Vec<TensorShapeInfo>,
    pub node: Option<NodeRef>,
}

impl PerfQuery {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            node: None,
        }
    }

    pub fn with_input(mut self, input: TensorShapeInfo) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: TensorShapeInfo) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_node(mut self, node: NodeRef) -> Self {
        self.node = Some(node);
        self
    }

    /// The same operands under another instruction name.
    pub fn renamed(&self, op_type: &str) -> Self {
        Self {
            op_type: op_type.to_string(),
            ..self.clone()
        }
    }

    pub fn input(&self, index: usize) -> Result<&TensorShapeInfo, PerfError> {
        self.operand(OperandSide::Input, index)
    }

    pub fn output(&self, index: usize) -> Result<&TensorShapeInfo, PerfError> {
        self.operand(OperandSide::Output, index)
    }

    fn operand(&self, side: OperandSide, index: usize) -> Result<&TensorShapeInfo, PerfError> {
        let list = match side {
            OperandSide::Input => &self.inputs,
            OperandSide::Output => &self.outputs,
        };
        list.get(index).ok_or_else(|| PerfError::MissingOperands {
            op: self.op_type.clone(),
            side,
            expected: index + 1,
            got: list.len(),
        })
    }

    /// Like [`input`](Self::input) but also rejects a rank-0 operand.
    pub fn shaped_input(&self, index: usize) -> Result<&TensorShapeInfo, PerfError> {
        self.non_empty(self.input(index)?)
    }

    pub fn shaped_output(&self, index: usize) -> Result<&TensorShapeInfo, PerfError> {
        self.non_empty(self.output(index)?)
    }

    fn non_empty<'t>(&self, operand: &'t TensorShapeInfo) -> Result<&'t TensorShapeInfo, PerfError> {
        if operand.rank() == 0 {
            return Err(PerfError::EmptyShape {
                op: self.op_type.clone(),
            });
        }
        Ok(operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::DataType;

    #[test]
    fn missing_operands_are_reported() {
        let q = PerfQuery::new("Add").with_input(TensorShapeInfo::new(DataType::Float16, [4]));
        assert!(q.input(0).is_ok());
        match q.input(1) {
            Err(PerfError::MissingOperands {
                side: OperandSide::Input,
                expected: 2,
                got: 1,
                ..
            }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(q.output(0), Err(PerfError::MissingOperands { .. })));
    }

    #[test]
    fn rank_zero_is_empty_shape() {
        let q = PerfQuery::new("Load").with_input(TensorShapeInfo::new(DataType::Float16, Vec::<i64>::new()));
        assert!(q.input(0).is_ok());
        assert!(matches!(q.shaped_input(0), Err(PerfError::EmptyShape { .. })));
    }

    #[test]
    fn renamed_keeps_operands() {
        let q = PerfQuery::new("Exp")
            .with_input(TensorShapeInfo::new(DataType::Float16, [8]))
            .with_node(NodeRef(3));
        let r = q.renamed("Vexp");
        assert_eq!(r.op_type, "Vexp");
        assert_eq!(r.inputs, q.inputs);
        assert_eq!(r.node, Some(NodeRef(3)));
    }
}
