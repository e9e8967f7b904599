//! Statement macros and scalar declarations for generated code.

use crate::ir::pir::{PolyProgram, Statement};
use crate::options::{CodegenOptions, IndvarType};
use crate::utils::errors::{CodegenError, CodegenResult};
use std::fmt::Write;

/// `#define S<n>(i0,...,ik)\t<body>` for one statement.
pub fn statement_macro(stmt: &Statement) -> CodegenResult<String> {
    let dim = stmt.dim();
    let names: &[String] = match &stmt.iterators {
        Some(names) if names.len() >= dim => &names[..dim],
        _ if dim == 0 => &[],
        _ => return Err(CodegenError::missing_iterators(stmt.id)),
    };
    Ok(format!("#define {}({})\t{}", stmt.id, names.join(","), stmt.text))
}

/// Statement macro whose body is prefixed with the schedule in the form
/// read by the Bee/Cl@k tools: ` __bee_schedule[f1][f2].. _NL_DELIMIT_ `.
pub fn bee_statement_macro(stmt: &Statement, params: &[String]) -> CodegenResult<String> {
    let plain = statement_macro(stmt)?;
    let (head, text) = plain.split_once('\t').unwrap_or((plain.as_str(), ""));

    let iterators = stmt.iterators.clone().unwrap_or_default();
    let mut schedule = String::new();
    for row in stmt.schedule.iter().flat_map(|m| &m.outputs) {
        let f = row.to_string_with_names(&iterators, params).replace(' ', "");
        let _ = write!(schedule, "[{}]", f);
    }
    Ok(format!("{}\t __bee_schedule{} _NL_DELIMIT_ {}", head, schedule, text))
}

/// Generate statement macros followed by the scalar declarations the loop
/// nest uses.
///
/// The induction variable type is resolved before anything is produced, so
/// an unsupported width yields an error and no partial output.
pub fn generate_declarations(prog: &PolyProgram, opts: &CodegenOptions) -> CodegenResult<String> {
    let ty = opts.resolve_indvar_type()?;

    let mut out = String::new();
    for stmt in &prog.statements {
        let line = if opts.bee {
            bee_statement_macro(stmt, &prog.parameters)?
        } else {
            statement_macro(stmt)?
        };
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&scalar_declarations(prog, opts, ty));
    Ok(out)
}

fn scalar_declarations(prog: &PolyProgram, opts: &CodegenOptions, ty: IndvarType) -> String {
    let mut out = String::new();
    if prog.num_hyperplanes() == 0 {
        if opts.parallel {
            let _ = writeln!(out, "\t{} lb, ub, lbp, ubp, lb2, ub2;", ty);
        }
        return out;
    }

    let vars: Vec<String> = prog.hyperplanes.iter()
        .enumerate()
        .map(|(i, h)| {
            let t = i + 1;
            if h.unroll {
                format!("t{t}, t{t}t, newlb_t{t}, newub_t{t}")
            } else {
                format!("t{t}")
            }
        })
        .collect();
    let _ = writeln!(out, "\t\t{} {};", ty, vars.join(", "));
    out.push('\n');

    if opts.parallel {
        let _ = writeln!(out, "\t{} lb, ub, lbp, ubp, lb2, ub2;", ty);
    }
    let _ = writeln!(out, "\tregister {} lbv, ubv;", ty);
    out.push('\n');
    out
}

/// Helper macros used by generated loop bounds.
pub fn math_macros() -> &'static str {
    "#define ceild(n,d)  (((n)<0) ? -((-(n))/(d)) : ((n)+(d)-1)/(d))\n\
     #define floord(n,d) (((n)<0) ? -((-(n)+(d)-1)/(d)) : (n)/(d))\n\
     #define max(x,y)    ((x) > (y)? (x) : (y))\n\
     #define min(x,y)    ((x) < (y)? (x) : (y))\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::pir::{HyperplaneProperty, StatementBuilder};
    use crate::polyhedral::{AffineMap, IntegerSet};
    use crate::utils::errors::CodegenErrorKind;

    fn program() -> PolyProgram {
        let mut prog = PolyProgram::new("p", vec!["N".into()]);
        prog.add_statement(
            StatementBuilder::new(IntegerSet::parametric_box(&[0, 0], 1), "a[i][j] = 0;")
                .iterators(["i", "j"])
                .schedule_rows(&[vec![1, 0, 0, 0], vec![0, 1, 0, 0]]),
        );
        prog.hyperplanes = vec![
            HyperplaneProperty::parallel_loop(),
            HyperplaneProperty::sequential_loop().with_unroll(),
        ];
        prog
    }

    #[test]
    fn test_declarations() {
        let prog = program();
        let out = generate_declarations(&prog, &CodegenOptions::new()).unwrap();
        assert_eq!(
            out,
            "#define S1(i,j)\ta[i][j] = 0;\n\n\
             \t\tint t1, t2, t2t, newlb_t2, newub_t2;\n\n\
             \tregister int lbv, ubv;\n\n"
        );
    }

    #[test]
    fn test_parallel_bound_scalars() {
        let prog = program();
        let opts = CodegenOptions::new().parallel(true).indvar_type(64);
        let out = generate_declarations(&prog, &opts).unwrap();
        assert!(out.contains("\tlong long lb, ub, lbp, ubp, lb2, ub2;\n"));
        assert!(out.contains("\tregister long long lbv, ubv;\n"));
    }

    #[test]
    fn test_invalid_indvar_type_emits_nothing() {
        let err = generate_declarations(&program(), &CodegenOptions::new().indvar_type(17)).unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::InvalidIndvarType);
    }

    #[test]
    fn test_missing_iterators() {
        let mut prog = program();
        prog.statements[0].iterators = None;
        let err = generate_declarations(&prog, &CodegenOptions::new()).unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::MissingIterators);
        assert!(err.message.contains("S1"));
    }

    #[test]
    fn test_bee_schedule_prefix() {
        let mut prog = program();
        prog.statements[0].schedule = Some(AffineMap::from_matrix(2, 1, &[vec![1, 0, 1, 0], vec![0, 1, 0, -1]]));
        let out = generate_declarations(&prog, &CodegenOptions::new().bee(true)).unwrap();
        assert!(out.starts_with("#define S1(i,j)\t __bee_schedule[i+N][j-1] _NL_DELIMIT_ a[i][j] = 0;\n"), "{}", out);

        let plain = generate_declarations(&prog, &CodegenOptions::new()).unwrap();
        assert!(plain.starts_with("#define S1(i,j)\ta[i][j] = 0;\n"));
    }

    #[test]
    fn test_zero_dim_statement_needs_no_names() {
        let mut prog = PolyProgram::new("p", vec![]);
        prog.add_statement(StatementBuilder::new(IntegerSet::universe(0), "x = 0;"));
        let out = generate_declarations(&prog, &CodegenOptions::new()).unwrap();
        assert_eq!(out, "#define S1()\tx = 0;\n\n");
    }
}
