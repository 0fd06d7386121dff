use pdx_core::Analyzer;
use pdx_core::file::{FileId, FileKind};
use std::time::{Duration, Instant};

fn assert_under(label: &str, dur: Duration, max: Duration) {
    eprintln!("{} took: {:?} (limit: {:?})", label, dur, max);
    assert!(dur <= max, "{} exceeded budget: {:?} > {:?}", label, dur, max);
}

#[test]
fn test_small_file_latency() {
    let analyzer = Analyzer::with_defaults();
    let src = "my_effect = {\n\tsave_scope_as = hero\n\tscope:hero = { add_gold = 10 }\n}\n";

    // First run pays for the vocabulary load.
    analyzer.analyze(FileId(0), FileKind::ScriptedEffects, 1, src);

    let start = Instant::now();
    let analysis = analyzer.analyze(FileId(0), FileKind::ScriptedEffects, 2, src);
    let elapsed = start.elapsed();
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);

    // Debug builds vary; keep threshold generous but meaningful
    assert_under("analyze(small file)", elapsed, Duration::from_millis(50));
}

#[test]
fn test_large_file_latency() {
    let analyzer = Analyzer::with_defaults();
    let mut src = String::new();
    for i in 0..500 {
        src.push_str(&format!(
            "effect_{i} = {{\n\tevery_vassal = {{ limit = {{ is_adult = yes }} add_gold = {i} }}\n\tprimary_title = {{ holder = {{ add_prestige = 1 }} }}\n}}\n"
        ));
    }

    let start = Instant::now();
    let analysis = analyzer.analyze(FileId(1), FileKind::ScriptedEffects, 1, &src);
    let elapsed = start.elapsed();
    assert!(analysis.is_clean());
    assert_eq!(analyzer.index().snapshot().definitions("effect_499").count(), 1);

    assert_under("analyze(500 definitions)", elapsed, Duration::from_millis(2000));
}

#[test]
fn test_unbalanced_input_still_analyzed() {
    let analyzer = Analyzer::with_defaults();
    let src = "{".repeat(3000) + &"}".repeat(4000);

    let start = Instant::now();
    let analysis = analyzer.analyze(FileId(2), FileKind::Other, 1, &src);
    let elapsed = start.elapsed();
    assert_eq!(analysis.tree_errors.len(), 1000);

    assert_under("analyze(deep nesting)", elapsed, Duration::from_millis(2000));
}
