use crate::Value;

/// Something with outgoing value edges.
///
/// Visiting an object means visiting only its direct edges; the caller
/// decides whether to follow them.
pub trait Visitable {
    fn visit_edges(&self, visitor: &mut impl Visitor);
}

pub trait Visitor: Sized {
    fn visit(&mut self, value: Value);
}

/// Collects visited values in order.
#[derive(Debug, Default)]
pub struct CollectVisitor {
    pub visited: Vec<Value>,
}

impl Visitor for CollectVisitor {
    #[inline]
    fn visit(&mut self, value: Value) {
        self.visited.push(value);
    }
}

impl Visitable for [Value] {
    fn visit_edges(&self, visitor: &mut impl Visitor) {
        for value in self {
            visitor.visit(*value);
        }
    }
}
