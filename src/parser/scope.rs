use crate::ast::Parameter;

/// The `it`/`parent`/`root` triple active while parsing one sub-expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFrame {
    pub it: Option<Parameter>,
    pub parent: Option<Parameter>,
    pub root: Option<Parameter>,
}

impl ScopeFrame {
    /// The outermost frame: `it` and `root` are the same parameter.
    pub fn root(it: Option<Parameter>) -> Self {
        ScopeFrame {
            root: it.clone(),
            it,
            parent: None,
        }
    }

    /// Frame for the arguments of an aggregate call: `element` becomes `it`
    /// and the current `it` becomes `parent`.
    pub fn nested(&self, element: Parameter) -> Self {
        ScopeFrame {
            it: Some(element),
            parent: self.it.clone(),
            root: self.root.clone(),
        }
    }

    /// Types of the frame's parameters, for type-name lookup.
    pub fn types(&self) -> Vec<&crate::types::Type> {
        [&self.it, &self.parent, &self.root]
            .into_iter()
            .flatten()
            .map(|p| p.ty())
            .collect()
    }
}

/// Stack of scope frames mirroring the lexical nesting of lambdas.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new(root: ScopeFrame) -> Self {
        ScopeStack { frames: vec![root] }
    }

    pub fn current(&self) -> &ScopeFrame {
        // the root frame is never popped
        &self.frames[self.frames.len() - 1]
    }

    pub fn push(&mut self, frame: ScopeFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
