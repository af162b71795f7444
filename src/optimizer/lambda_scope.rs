use crate::schema::ResolvedType;

/// Identifiers bound by enclosing lambdas, innermost first.
///
/// Each lambda body gets a new link pointing at its parent; nothing is ever
/// mutated, leaving the lambda drops the link.
#[derive(Debug, Clone, Copy)]
pub struct LambdaScope<'a> {
    name: &'a str,
    ty: &'a ResolvedType,
    parent: Option<&'a LambdaScope<'a>>,
}

impl<'a> LambdaScope<'a> {
    pub fn new(name: &'a str, ty: &'a ResolvedType, parent: Option<&'a LambdaScope<'a>>) -> Self {
        Self { name, ty, parent }
    }

    pub fn lookup(&self, name: &str) -> Option<&'a ResolvedType> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(self.ty);
        }
        self.parent.and_then(|parent| parent.lookup(name))
    }
}

/// Lookup through an optional innermost scope.
pub fn lookup_lambda<'a>(scope: Option<&LambdaScope<'a>>, name: &str) -> Option<&'a ResolvedType> {
    scope.and_then(|scope| scope.lookup(name))
}
