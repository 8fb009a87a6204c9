//! Pretty-printer for the TypeScript syntax tree

use crate::codegen::ast::{Constructor, Expr, Item, Member, Module, Param, Stmt, TemplatePart, Type};

const INDENT: &str = "  ";

/// Print a module; output always ends with a newline
pub fn print_module(module: &Module) -> String {
    let mut printer = Printer::default();
    for line in &module.header {
        printer.line(&format!("// {}", line));
    }
    for (i, item) in module.items.iter().enumerate() {
        let previous_was_import = i > 0 && matches!(module.items[i - 1], Item::Import { .. });
        let is_import = matches!(item, Item::Import { .. });
        if (i == 0 && !module.header.is_empty()) || (i > 0 && !(is_import && previous_was_import)) {
            printer.blank();
        }
        printer.item(item);
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    depth: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Import { names, from } => {
                self.line(&format!("import {{ {} }} from {};", names.join(", "), string_literal(from)));
            }
            Item::Interface {
                name,
                extends,
                members,
            } => {
                self.line(&format!("export interface {}{} {{", name, extends_clause(extends)));
                self.depth += 1;
                for member in members {
                    self.line(&member_decl(member));
                }
                self.depth -= 1;
                self.line("}");
            }
            Item::Class {
                name,
                extends,
                constructor,
            } => {
                self.line(&format!("export class {}{} {{", name, extends_clause(extends)));
                self.depth += 1;
                self.constructor(constructor);
                self.depth -= 1;
                self.line("}");
            }
        }
    }

    fn constructor(&mut self, constructor: &Constructor) {
        self.line(&format!("constructor({}) {{", params(&constructor.params)));
        self.depth += 1;
        self.block(&constructor.body);
        self.depth -= 1;
        self.line("}");
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Expr(expr) => {
                    let text = self.expr(expr);
                    self.line(&format!("{};", text));
                }
                Stmt::If { condition, then } => {
                    let condition = self.expr(condition);
                    self.line(&format!("if ({}) {{", condition));
                    self.depth += 1;
                    self.block(then);
                    self.depth -= 1;
                    self.line("}");
                }
            }
        }
    }

    /// Objects break over lines, indented relative to the current statement
    fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Str(value) => string_literal(value),
            Expr::Template(parts) => {
                let mut out = String::from("`");
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => out.push_str(&escape_template(text)),
                        TemplatePart::Expr(expr) => {
                            out.push_str("${");
                            out.push_str(&self.expr(expr));
                            out.push('}');
                        }
                    }
                }
                out.push('`');
                out
            }
            Expr::Regex { pattern, flags } => format!("/{}/{}", pattern, flags),
            Expr::Member(object, property) => format!("{}.{}", self.expr(object), property),
            Expr::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("{}({})", self.expr(callee), args.join(", "))
            }
            Expr::Object(entries) => {
                if entries.is_empty() {
                    return "{}".to_string();
                }
                let nested = Printer {
                    out: String::new(),
                    depth: self.depth + 1,
                };
                let pad = INDENT.repeat(self.depth + 1);
                let mut out = String::from("{\n");
                for (key, value) in entries {
                    out.push_str(&format!("{}{}: {},\n", pad, property_key(key), nested.expr(value)));
                }
                out.push_str(&INDENT.repeat(self.depth));
                out.push('}');
                out
            }
        }
    }
}

fn extends_clause(extends: &Option<String>) -> String {
    extends
        .as_ref()
        .map(|base| format!(" extends {}", base))
        .unwrap_or_default()
}

fn member_decl(member: &Member) -> String {
    format!(
        "readonly {}{}: {};",
        member.name,
        if member.optional { "?" } else { "" },
        type_ref(&member.ty)
    )
}

fn params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("{}: {}", p.name, type_ref(&p.ty)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_ref(ty: &Type) -> String {
    match ty {
        Type::Named(name) => name.clone(),
        Type::Function { params: ps, returns } => format!("({}) => {}", params(ps), type_ref(returns)),
    }
}

fn property_key(key: &str) -> String {
    let is_identifier = key
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        key.to_string()
    } else {
        string_literal(key)
    }
}

/// Single-quoted string literal
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn escape_template(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}
