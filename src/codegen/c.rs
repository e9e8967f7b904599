//! C code generation from the annotated loop-nest AST.

use crate::codegen::ast::{Ast, AstBinOp, AstExpr, AstNode, ForLoop};
use crate::utils::pretty::{CodeFormatter, DEFAULT_INDENT};

/// Renders an [`Ast`] as C source text.
///
/// Parallel loops load their bounds into `lbp`/`ubp` before an OpenMP
/// work-sharing pragma; vectorizable loops use `lbv`/`ubv` with `ivdep`
/// hints.
#[derive(Debug, Clone)]
pub struct CRenderer {
    indent: String,
}

impl Default for CRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl CRenderer {
    pub fn new() -> Self {
        Self { indent: DEFAULT_INDENT.to_string() }
    }

    pub fn with_indent(indent: &str) -> Self {
        Self { indent: indent.to_string() }
    }

    /// Render the whole AST.
    pub fn render(&self, ast: &Ast) -> String {
        let mut f = CodeFormatter::new(&self.indent);
        self.render_nodes(&mut f, &ast.body);
        f.finish()
    }

    fn render_nodes(&self, f: &mut CodeFormatter, nodes: &[AstNode]) {
        for node in nodes {
            self.render_node(f, node);
        }
    }

    fn render_node(&self, f: &mut CodeFormatter, node: &AstNode) {
        match node {
            AstNode::For(l) => self.render_for(f, l),
            AstNode::If { condition, then_body, else_body } => {
                f.writeln(&format!("if ({}) {{", expr_to_c(condition)));
                f.indent();
                self.render_nodes(f, then_body);
                f.dedent();
                match else_body {
                    Some(e) => {
                        f.writeln("} else {");
                        f.indent();
                        self.render_nodes(f, e);
                        f.dedent();
                        f.writeln("}");
                    }
                    None => f.writeln("}"),
                }
            }
            AstNode::Stmt { id, args } => {
                let args: Vec<String> = args.iter().map(expr_to_c).collect();
                f.writeln(&format!("{}({});", id, args.join(",")));
            }
            AstNode::Block { statements } => self.render_nodes(f, statements),
        }
    }

    fn render_for(&self, f: &mut CodeFormatter, l: &ForLoop) {
        let lower = expr_to_c(&l.lower);
        let upper = expr_to_c(&l.upper);

        let (lb, ub) = if l.directives.parallel {
            ("lbp".to_string(), "ubp".to_string())
        } else if l.directives.vector {
            ("lbv".to_string(), "ubv".to_string())
        } else {
            (lower.clone(), upper.clone())
        };

        if l.directives.parallel {
            f.writeln(&format!("lbp={};", lower));
            f.writeln(&format!("ubp={};", upper));
        }
        if l.directives.vector {
            f.writeln(&format!("lbv={};", lower));
            f.writeln(&format!("ubv={};", upper));
        }
        if l.directives.parallel {
            if l.private_vars.is_empty() {
                f.directive("#pragma omp parallel for");
            } else {
                f.directive(&format!("#pragma omp parallel for private({})", l.private_vars.join(", ")));
            }
        }
        if l.directives.vector {
            f.directive("#pragma ivdep");
            f.directive("#pragma vector always");
        }

        let incr = if l.step == 1 {
            format!("{}++", l.iterator)
        } else {
            format!("{}+={}", l.iterator, l.step)
        };
        let header = format!("for ({it}={lb};{it}<={ub};{incr})", it = l.iterator);
        f.block(&header, |f| self.render_nodes(f, &l.body));
    }
}

/// Binding strength of an expression's outermost operator.
fn precedence(e: &AstExpr) -> u8 {
    match e {
        AstExpr::Binary { op, left, .. } => {
            if *op == AstBinOp::Mul && **left == AstExpr::Int(-1) {
                7
            } else {
                op.precedence()
            }
        }
        AstExpr::Int(v) if *v < 0 => 7,
        _ => 8,
    }
}

/// Render an expression as C.
pub fn expr_to_c(e: &AstExpr) -> String {
    match e {
        AstExpr::Int(v) => v.to_string(),
        AstExpr::Var(name) => name.clone(),
        AstExpr::Binary { op: AstBinOp::Mul, left, right } if **left == AstExpr::Int(-1) => {
            format!("-{}", operand(right, 7, false))
        }
        AstExpr::Binary { op, left, right } => {
            let p = op.precedence();
            let l = operand(left, p, false);
            let r = operand(right, p, true);
            match op {
                AstBinOp::Add | AstBinOp::Sub | AstBinOp::Mul | AstBinOp::Div | AstBinOp::Mod => {
                    format!("{}{}{}", l, op.symbol(), r)
                }
                _ => format!("{} {} {}", l, op.symbol(), r),
            }
        }
        AstExpr::Min(a, b) => format!("min({},{})", expr_to_c(a), expr_to_c(b)),
        AstExpr::Max(a, b) => format!("max({},{})", expr_to_c(a), expr_to_c(b)),
        AstExpr::FloorDiv(a, b) => format!("floord({},{})", expr_to_c(a), expr_to_c(b)),
        AstExpr::CeilDiv(a, b) => format!("ceild({},{})", expr_to_c(a), expr_to_c(b)),
    }
}

/// Render a child, parenthesized when it binds looser than its parent.
/// Right operands of non-commutative operators also need parentheses at equal precedence.
fn operand(e: &AstExpr, parent: u8, right: bool) -> String {
    let p = precedence(e);
    let s = expr_to_c(e);
    if p < parent || (right && p == parent) {
        format!("({})", s)
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pir::StmtId;

    fn nest() -> Ast {
        let inner = ForLoop::new("t2", AstExpr::var("t1"), AstExpr::var("N").sub(AstExpr::int(1)), vec![
            AstNode::Stmt { id: StmtId(0), args: vec![AstExpr::var("t1"), AstExpr::var("t2")] },
        ]);
        Ast::new(vec![AstNode::For(ForLoop::new("t1", AstExpr::int(0), AstExpr::var("N"), vec![
            AstNode::For(inner),
        ]))])
    }

    #[test]
    fn test_plain_nest() {
        assert_eq!(
            CRenderer::new().render(&nest()),
            "for (t1=0;t1<=N;t1++) {\n  for (t2=t1;t2<=N-1;t2++) {\n    S1(t1,t2);\n  }\n}\n"
        );
    }

    #[test]
    fn test_parallel_and_vector_loops() {
        let mut ast = nest();
        ast.for_each_loop_mut(|l| {
            if l.iterator == "t1" {
                l.directives.parallel = true;
                l.private_vars = vec!["lbv".into(), "ubv".into(), "t2".into()];
            } else {
                l.directives.vector = true;
            }
        });
        let code = CRenderer::new().render(&ast);
        assert_eq!(
            code,
            "lbp=0;\nubp=N;\n#pragma omp parallel for private(lbv, ubv, t2)\n\
             for (t1=lbp;t1<=ubp;t1++) {\n  lbv=t1;\n  ubv=N-1;\n#pragma ivdep\n#pragma vector always\n\
             \x20 for (t2=lbv;t2<=ubv;t2++) {\n    S1(t1,t2);\n  }\n}\n"
        );
    }

    #[test]
    fn test_expression_precedence() {
        let e = AstExpr::var("N").sub(AstExpr::var("t1").add(AstExpr::int(1)));
        assert_eq!(expr_to_c(&e), "N-(t1+1)");
        let e = AstExpr::int(-1).mul(AstExpr::var("t1")).add(AstExpr::var("t2"));
        assert_eq!(expr_to_c(&e), "-t1+t2");
        let e = AstExpr::int(2).mul(AstExpr::var("t1").add(AstExpr::var("N"))).ceil_div(3);
        assert_eq!(expr_to_c(&e), "ceild(2*(t1+N),3)");
        let e = AstExpr::cmp(AstBinOp::Ge, AstExpr::var("t1"), AstExpr::var("N").max(AstExpr::int(2)));
        assert_eq!(expr_to_c(&e), "t1 >= max(N,2)");
    }

    #[test]
    fn test_step_and_guard() {
        let mut l = ForLoop::new("t1", AstExpr::int(0), AstExpr::var("N"), vec![AstNode::If {
            condition: AstExpr::cmp(AstBinOp::Ge, AstExpr::var("t1"), AstExpr::int(1)),
            then_body: vec![AstNode::Stmt { id: StmtId(1), args: vec![AstExpr::var("t1")] }],
            else_body: None,
        }]);
        l.step = 4;
        let code = CRenderer::new().render(&Ast::new(vec![AstNode::For(l)]));
        assert_eq!(code, "for (t1=0;t1<=N;t1+=4) {\n  if (t1 >= 1) {\n    S2(t1);\n  }\n}\n");
    }
}
