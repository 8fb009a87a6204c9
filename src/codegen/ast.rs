//! A small TypeScript syntax tree

/// One source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Line comments printed before everything else
    pub header: Vec<String>,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Import {
        names: Vec<String>,
        from: String,
    },
    Interface {
        name: String,
        extends: Option<String>,
        members: Vec<Member>,
    },
    Class {
        name: String,
        extends: Option<String>,
        constructor: Constructor,
    },
}

/// An interface property
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub optional: bool,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Named(String),
    Function { params: Vec<Param>, returns: Box<Type> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    If { condition: Expr, then: Vec<Stmt> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Str(String),
    Template(Vec<TemplatePart>),
    Member(Box<Expr>, String),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Object(Vec<(String, Expr)>),
    Regex { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

impl Type {
    pub fn named(name: &str) -> Self {
        Type::Named(name.to_string())
    }
}

impl Param {
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    pub fn str(value: &str) -> Self {
        Expr::Str(value.to_string())
    }

    /// `a.b.c` from a dotted path
    pub fn path(dotted: &str) -> Self {
        let mut parts = dotted.split('.');
        let head = Expr::ident(parts.next().unwrap_or_default());
        parts.fold(head, |acc, part| Expr::Member(Box::new(acc), part.to_string()))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }
}
