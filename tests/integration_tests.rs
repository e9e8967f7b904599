//! Integration tests for the code generation pipeline.

use polyemit::prelude::*;
use polyemit::codegen::declarations::generate_declarations;
use polyemit::codegen::driver::{generator_options, select_ranges, DimRange, RangeSelection};
use polyemit::transform::vector_loop_list;

/// Context `N >= 1`.
fn with_positive_n(prog: &mut PolyProgram) {
    let mut e = AffineExpr::param(0, 0, 1);
    e.constant = -1;
    prog.param_context.add_constraint(Constraint::ge_zero(e));
}

/// Two statements in one 3-deep nest scheduled parallel, sequential, parallel.
fn two_statement_program() -> PolyProgram {
    let mut prog = PolyProgram::new("fused", vec!["N".into()]);
    with_positive_n(&mut prog);
    for text in ["a[i][j][k] = 0;", "b[i][j][k] = a[i][j][k];"] {
        prog.add_statement(
            StatementBuilder::new(IntegerSet::parametric_box(&[0, 0, 0], 1), text)
                .iterators(["i", "j", "k"])
                .schedule(AffineMap::identity(3, 1)),
        );
    }
    prog.hyperplanes = vec![
        HyperplaneProperty::parallel_loop(),
        HyperplaneProperty::sequential_loop(),
        HyperplaneProperty::parallel_loop(),
    ];
    prog
}

/// One statement over `n` parallel dimensions.
fn parallel_box(n: usize) -> PolyProgram {
    let mut prog = PolyProgram::new("box", vec!["N".into()]);
    with_positive_n(&mut prog);
    prog.add_statement(
        StatementBuilder::new(IntegerSet::parametric_box(&vec![0; n], 1), "s;")
            .iterators((0..n).map(|i| format!("i{}", i)))
            .schedule(AffineMap::identity(n, 1)),
    );
    prog.hyperplanes = vec![HyperplaneProperty::parallel_loop(); n];
    prog
}

// ============================================================
// End-to-end
// ============================================================

#[test]
fn test_parallel_vector_translation_unit() {
    let prog = two_statement_program();
    let opts = CodegenOptions::new().parallel(true).prevector(true);
    let code = polyemit::multicore_codegen(&prog, &opts).expect("codegen failed");

    assert!(code.starts_with("#include <omp.h>\n\n#define ceild(n,d)"), "{}", code);
    assert!(code.contains("#define S1(i,j,k)\ta[i][j][k] = 0;\n#define S2(i,j,k)\tb[i][j][k] = a[i][j][k];\n\n"));
    assert!(code.contains("\t\tint t1, t2, t3;\n\n\tint lb, ub, lbp, ubp, lb2, ub2;\n\tregister int lbv, ubv;\n\n"));

    // Exactly one parallel pragma, on the outer loop, privatizing the vector bounds
    assert_eq!(code.matches("#pragma omp parallel for").count(), 1);
    assert!(code.contains(
        "lbp=0;\nubp=N-1;\n#pragma omp parallel for private(lbv, ubv, t2, t3)\nfor (t1=lbp;t1<=ubp;t1++) {\n"
    ), "{}", code);
    // The innermost parallel loop is vectorized
    assert!(code.contains("lbv=0;\n    ubv=N-1;\n#pragma ivdep\n#pragma vector always\n    for (t3=lbv;t3<=ubv;t3++) {"), "{}", code);
    assert!(code.contains("for (t2=0;t2<=N-1;t2++) {"));

    let s1 = code.find("S1(t1,t2,t3);").expect("S1 missing");
    let s2 = code.find("S2(t1,t2,t3);").expect("S2 missing");
    assert!(s1 < s2);
    assert!(code.ends_with("/* End of generated loop nest */\n"));
}

#[test]
fn test_side_file_records() {
    let prog = two_statement_program();
    let opts = CodegenOptions::new().parallel(true).prevector(true);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".pragmas");

    assert_eq!(omp_parallelize(&prog, &opts, &path).unwrap(), 1);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "t1 #pragma omp parallel for shared(lb1,ub1) private(ubv,lbv,t1,t2,t3)\n");
}

#[test]
fn test_unroll_jam_end_to_end() {
    let mut prog = two_statement_program();
    prog.hyperplanes[1].unroll = true;
    let opts = CodegenOptions::new().unroll_jam(2);
    let code = polyemit::generate_code(&prog, &opts).unwrap();

    assert!(code.contains("for (t2=0;t2<=floord(N,2)*2-1;t2+=2) {"), "{}", code);
    assert!(code.contains("for (t2=max(floord(N,2)*2,0);t2<=N-1;t2++) {"), "{}", code);
    assert!(code.contains(
        "S1(t1,t2,t3);\n      S2(t1,t2,t3);\n      S1(t1,t2+1,t3);\n      S2(t1,t2+1,t3);\n"
    ), "{}", code);

    let decls = generate_declarations(&prog, &opts).unwrap();
    assert!(decls.contains("int t1, t2, t2t, newlb_t2, newub_t2, t3;"));
}

#[test]
fn test_all_options_off_is_generator_output() {
    let prog = two_statement_program();
    let opts = CodegenOptions::new();
    let input = GeneratorInput::from_program(&prog);

    let raw = LoopNestScanner::new()
        .generate(&input, &generator_options(&prog, &opts, None))
        .unwrap();
    let annotated = CodegenDriver::new().build_ast(&prog, &opts, &input, None).unwrap();
    assert_eq!(raw, annotated);
    assert!(annotated.loops().iter().all(|l| l.directives.is_empty()));
}

#[test]
fn test_empty_program() {
    let prog = PolyProgram::new("empty", vec![]);
    let code = polyemit::generate_code(&prog, &CodegenOptions::new()).unwrap();
    assert_eq!(code, "/* Start of generated loop nest */\n/* End of generated loop nest */\n");
    assert!(find_parallel_annotations(&prog, &CodegenOptions::multicore()).is_empty());
}

// ============================================================
// Ranges and declarations
// ============================================================

#[test]
fn test_tile_aware_range() {
    let mut prog = PolyProgram::new("tiled", vec!["N".into()]);
    prog.hyperplanes = vec![
        HyperplaneProperty::parallel_loop(),
        HyperplaneProperty::sequential_loop(),
        HyperplaneProperty::scalar(),
        HyperplaneProperty::sequential_loop(),
        HyperplaneProperty::parallel_loop(),
        HyperplaneProperty::parallel_loop(),
    ];
    let rows: Vec<Vec<i64>> = (0..6)
        .map(|r| {
            let mut row = vec![0; 7];
            match r {
                0 | 1 => row[r] = 1,
                2 => {}
                _ => row[r - 1] = 1,
            }
            row
        })
        .collect();
    prog.add_statement(
        StatementBuilder::new(IntegerSet::parametric_box(&[0; 5], 1), "s;")
            .iterators(["it", "jt", "i", "j", "k"])
            .schedule_rows(&rows)
            .last_tile_dim(3),
    );

    let opts = CodegenOptions::new().tile(true);
    assert_eq!(
        select_ranges(&prog, &opts, None),
        RangeSelection::PerStatement(vec![DimRange::new(5, 6)])
    );
}

#[test]
fn test_indvar_type_64() {
    let prog = two_statement_program();
    let opts = CodegenOptions::new().parallel(true).indvar_type(64);
    let decls = generate_declarations(&prog, &opts).unwrap();
    assert!(decls.contains("\t\tlong long t1, t2, t3;\n"));
    assert!(decls.contains("\tlong long lb, ub, lbp, ubp, lb2, ub2;\n"));
    assert!(decls.contains("\tregister long long lbv, ubv;\n"));
}

#[test]
fn test_invalid_indvar_type_fails_before_output() {
    let prog = two_statement_program();
    let opts = CodegenOptions::new().parallel(true).indvar_type(17);
    let mut out = String::new();
    let err = CodegenDriver::new().multicore_codegen(&prog, &opts, &mut out).unwrap_err();
    assert_eq!(err.kind, CodegenErrorKind::InvalidIndvarType);
    assert!(err.is_fatal());
    assert!(out.is_empty());
}

#[test]
fn test_missing_iterators_is_fatal() {
    let mut prog = two_statement_program();
    prog.statements[1].iterators = None;
    let err = polyemit::multicore_codegen(&prog, &CodegenOptions::new()).unwrap_err();
    assert_eq!(err.kind, CodegenErrorKind::MissingIterators);
    assert!(err.to_string().contains("S2"));
}

// ============================================================
// Parallel and vector annotation
// ============================================================

#[test]
fn test_parallel_cap() {
    let prog = parallel_box(4);
    assert_eq!(find_parallel_annotations(&prog, &CodegenOptions::new().parallel(true)).len(), 1);
    let opts = CodegenOptions::multicore().multipar(true);
    assert_eq!(find_parallel_annotations(&prog, &opts).len(), 2);
    let opts = opts.max_parallel_loops(3);
    assert_eq!(find_parallel_annotations(&prog, &opts).len(), 3);
}

#[test]
fn test_shared_private_counts() {
    let n = 4;
    let prog = parallel_box(n);
    let opts = CodegenOptions::multicore().multipar(true);
    let cap = opts.parallel_cap();
    for (i, ann) in find_parallel_annotations(&prog, &opts).iter().enumerate() {
        let k = i + 1;
        assert_eq!(ann.shared.len(), ann.depth + 2 * k);
        assert_eq!(ann.private.len(), 2 + 2 * (cap - k) + (n - ann.depth));
    }
}

#[test]
fn test_vector_selection_independent_of_parallel_pass() {
    let prog = two_statement_program();
    let query = ScheduleLoopQuery::new();
    let vloops = vector_loop_list(&prog, &query);
    assert_eq!(vloops.len(), 1);
    assert_eq!(vloops[0].iter, "t3");
    assert_eq!(vloops[0].stmt_ids, vec![1, 2]);

    let input = GeneratorInput::from_program(&prog);
    let driver = CodegenDriver::new();
    let vector_only = driver.build_ast(&prog, &CodegenOptions::new().prevector(true), &input, None).unwrap();
    let both = driver
        .build_ast(&prog, &CodegenOptions::new().prevector(true).parallel(true), &input, None)
        .unwrap();
    let marked = |ast: &Ast| -> Vec<String> {
        ast.loops().iter().filter(|l| l.directives.vector).map(|l| l.iterator.clone()).collect()
    };
    assert_eq!(marked(&vector_only), marked(&both));
}

#[test]
fn test_no_parallel_loops_no_pragmas() {
    let mut prog = two_statement_program();
    for h in &mut prog.hyperplanes {
        *h = HyperplaneProperty::sequential_loop();
    }
    let code = polyemit::multicore_codegen(&prog, &CodegenOptions::multicore().multipar(true)).unwrap();
    assert!(!code.contains("#pragma"));
    assert!(code.contains("\tomp_set_nested(1);\n\tomp_set_num_threads(2);\n"));
}

#[test]
fn test_program_round_trips_through_json() {
    let prog = two_statement_program();
    let json = serde_json::to_string(&prog).unwrap();
    let back = polyemit::parse_program(&json).unwrap();
    assert_eq!(
        polyemit::generate_code(&back, &CodegenOptions::new()).unwrap(),
        polyemit::generate_code(&prog, &CodegenOptions::new()).unwrap()
    );
}
