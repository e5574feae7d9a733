use crate::ast::Operation;

/// Complete pipeline: the ordered stages of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationChain {
    /// Pipeline stages, in evaluation order
    pub operations: Vec<Operation>,
}

impl OperationChain {
    pub fn new(operations: Vec<Operation>) -> Self {
        OperationChain { operations }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Operation> {
        self.operations.iter()
    }

    /// Stage names joined the way they appear in a script, for logging.
    pub fn describe(&self) -> String {
        self.operations
            .iter()
            .map(|op| format!(".{}", op.name()))
            .collect()
    }
}
