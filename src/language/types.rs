/// A type as written in a construction form; resolved against the
/// scope's type registry at evaluation time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    /// A possibly-dotted type name (`int`, `util.Point`).
    Named(Vec<String>),
    Seq(Box<TypeExpr>),
    Map(Box<TypeExpr>),
    Chan(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(vec![name.into()])
    }

    pub fn path(segments: &[&str]) -> Self {
        TypeExpr::Named(segments.iter().map(|s| s.to_string()).collect())
    }
}
