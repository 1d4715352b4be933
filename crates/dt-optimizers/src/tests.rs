use crate::expr::{self, Expr, ParseError, SimplifyStats};
use crate::*;
use dt_core::{CallConventions, CostModel, Document, EngineConfig, FormulaSettings, Optimizer};
use serde_json::json;

fn doc(value: serde_json::Value) -> Document {
    Document::from(value)
}

fn simplified(src: &str) -> (String, SimplifyStats) {
    let mut stats = SimplifyStats::default();
    let out = expr::simplify(expr::parse(src).unwrap(), &mut stats);
    (out.render(), stats)
}

// ========== Structural redundancy ==========

#[test]
fn test_structural_removes_null_and_empty_entries() {
    let input = doc(json!({"key1": "value", "key2": null, "key3": [], "key4": {}}));
    let (output, result) = StructuralRedundancy::new().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"key1": "value"})));
    assert_eq!(result.optimizer_name(), "structural_redundancy");
    assert_eq!(result.metric_f64("fields_removed"), Some(3.0));
    assert_eq!(result.metric_f64("nulls_removed"), Some(1.0));
    assert_eq!(result.unit(), Some("bytes"));
    assert!(result.efficiency_gain() > 0.0);
    assert!(result.optimized_value() < result.original_value());
}

#[test]
fn test_structural_no_redundancy_is_unchanged() {
    let input = doc(json!({"key1": "value"}));
    let (output, result) = StructuralRedundancy::new().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.efficiency_gain(), 0.0);
    assert_eq!(result.metric_f64("fields_removed"), Some(0.0));
}

#[test]
fn test_structural_keeps_falsy_data() {
    let input = doc(json!({"zero": 0, "off": false, "blank": "", "gone": null}));
    let (output, _) = StructuralRedundancy::new().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"zero": 0, "off": false, "blank": ""})));
}

#[test]
fn test_structural_keeps_nested_falsy_data() {
    let input = doc(json!({
        "a": {"x": 0, "y": null},
        "b": [{"z": false, "w": {}}],
        "c": {"d": ""}
    }));
    let (output, result) = StructuralRedundancy::new().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"a": {"x": 0}, "b": [{"z": false}], "c": {"d": ""}})));
    assert_eq!(output.get("a").and_then(|a| a.get("x")), Some(&Document::from(0u64)));
    let b0 = &output.get("b").and_then(Document::as_sequence).unwrap()[0];
    assert_eq!(b0.get("z"), Some(&Document::from(false)));
    assert_eq!(output.get("c").and_then(|c| c.get("d")).and_then(Document::as_str), Some(""));
    assert_eq!(result.metric_f64("fields_removed"), Some(2.0));
}

#[test]
fn test_structural_cascades_innermost_first() {
    let input = doc(json!({"a": {"b": null, "c": {"d": []}}, "e": 1}));
    let mut output = input.clone();
    let mut stats = structural::PruneStats::default();
    structural::prune(&mut output, &mut stats);
    assert_eq!(output, doc(json!({"e": 1})));
    assert_eq!(stats.nulls, 1);
    assert_eq!(stats.empty_sequences, 1);
    assert_eq!(stats.empty_mappings, 2);
    assert_eq!(stats.total(), 4);
}

#[test]
fn test_structural_never_drops_sequence_elements() {
    let input = doc(json!({"rows": [null, {"x": null}, []]}));
    let (output, result) = StructuralRedundancy::new().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"rows": [null, {}, []]})));
    assert_eq!(result.metric_f64("fields_removed"), Some(1.0));
}

#[test]
fn test_structural_keeps_root() {
    let (output, _) = StructuralRedundancy::new().optimize(&doc(json!({"a": null}))).unwrap();
    assert_eq!(output, Document::mapping());
}

#[test]
fn test_structural_idempotent() {
    let input = doc(json!({"a": {"b": null}, "c": [{"d": {}}], "e": "x"}));
    let optimizer = StructuralRedundancy::new();
    let (once, first) = optimizer.optimize(&input).unwrap();
    let (twice, second) = optimizer.optimize(&once).unwrap();
    assert!(first.efficiency_gain() > 0.0);
    assert_eq!(second.efficiency_gain(), 0.0);
    assert_eq!(once, twice);
}

// ========== Formula parsing ==========

#[test]
fn test_formula_body() {
    assert_eq!(expr::formula_body("=A1+1", "="), Some("A1+1"));
    assert_eq!(expr::formula_body("=", "="), None);
    assert_eq!(expr::formula_body("=  ", "="), None);
    assert_eq!(expr::formula_body("A1+1", "="), None);
}

#[test]
fn test_parse_precedence() {
    let parsed = expr::parse("1+2*3").unwrap();
    assert!(matches!(parsed, Expr::Binary { op: expr::BinOp::Add, .. }));
    assert_eq!(parsed.node_count(), 5);
}

#[test]
fn test_parse_references() {
    for src in ["A1", "$B$2", "A1:B9", "Sheet1!C3", "total_price"] {
        assert_eq!(expr::parse(src).unwrap(), Expr::Ref(src.to_string()), "{src}");
    }
}

#[test]
fn test_render_minimal_parentheses() {
    assert_eq!(expr::parse("((A1))").unwrap().render(), "A1");
    assert_eq!(expr::parse("(A1+B1)*C1").unwrap().render(), "(A1+B1)*C1");
    assert_eq!(expr::parse("(A1-B1)-C1").unwrap().render(), "A1-B1-C1");
    assert_eq!(expr::parse("A1-(B1-C1)").unwrap().render(), "A1-(B1-C1)");
    assert_eq!(expr::parse("A1*(B1*C1)").unwrap().render(), "A1*(B1*C1)");
    assert_eq!(expr::parse("-(A1+B1)").unwrap().render(), "-(A1+B1)");
    assert_eq!(expr::parse("SUM( A1 , B1 )").unwrap().render(), "SUM(A1,B1)");
}

#[test]
fn test_render_reparses_to_same_tree() {
    for src in ["-2^2", "3--2", "-A1^2", "A1^-B1", "2^3^2", "IF(A1,\"a\"\"b\",-1.5)", "NOW()"] {
        let parsed = expr::parse(src).unwrap();
        assert_eq!(expr::parse(&parsed.render()).unwrap(), parsed, "{src}");
    }
}

#[test]
fn test_string_literal_escapes() {
    let parsed = expr::parse(r#""say ""hi""""#).unwrap();
    assert_eq!(parsed, Expr::Text("say \"hi\"".to_string()));
    assert_eq!(parsed.render(), r#""say ""hi""""#);
}

#[test]
fn test_parse_errors() {
    assert!(matches!(expr::parse("A1>B1"), Err(ParseError::UnexpectedChar('>', 2))));
    assert!(matches!(expr::parse("A1&B1"), Err(ParseError::UnexpectedChar('&', _))));
    assert_eq!(expr::parse("SUM(A1"), Err(ParseError::UnexpectedEnd));
    assert!(matches!(expr::parse("A1 B1"), Err(ParseError::UnexpectedToken(_))));
    assert!(matches!(expr::parse("(A1))"), Err(ParseError::UnexpectedToken(_))));
    assert_eq!(expr::parse("\"open"), Err(ParseError::UnterminatedString));
    assert_eq!(expr::parse(""), Err(ParseError::Empty));
}

#[test]
fn test_lexer_number_forms_and_whitespace() {
    assert_eq!(expr::parse(".5").unwrap(), Expr::Number(0.5));
    assert_eq!(expr::parse("1e3").unwrap(), Expr::Number(1000.0));
    assert_eq!(expr::parse("2.").unwrap(), Expr::Number(2.0));
    assert_eq!(expr::parse(" SUM(\tA1,\nB1 ) ").unwrap().render(), "SUM(A1,B1)");
    assert_eq!(expr::parse("\"\"").unwrap(), Expr::Text(String::new()));
    assert!(matches!(expr::parse("A1 # B1"), Err(ParseError::UnexpectedChar('#', 3))));
}

#[test]
fn test_parse_depth_limit() {
    let deep = format!("{}1{}", "(".repeat(500), ")".repeat(500));
    assert_eq!(expr::parse(&deep), Err(ParseError::TooDeep));
}

// ========== Formula rewrites ==========

#[test]
fn test_constant_folding() {
    let (text, stats) = simplified("2*3+A1");
    assert_eq!(text, "6+A1");
    assert_eq!(stats.constants_folded, 1);

    let (text, _) = simplified("(1+2)*(3+4)");
    assert_eq!(text, "21");
}

#[test]
fn test_no_folding_of_invalid_arithmetic() {
    assert_eq!(simplified("1/0").0, "1/0");
    assert_eq!(simplified("0^-1").0, "0^-1");
    assert_eq!(simplified("1/0").1.constants_folded, 0);
}

#[test]
fn test_identities_only_on_numeric_operands() {
    let (text, stats) = simplified("(A1+B1)+0");
    assert_eq!(text, "A1+B1");
    assert_eq!(stats.identities_removed, 1);

    assert_eq!(simplified("(2*A1)*1").0, "2*A1");
    assert_eq!(simplified("1*(A1-B1)").0, "A1-B1");

    // References and calls may hold text; coercion must be preserved.
    assert_eq!(simplified("A1+0").0, "A1+0");
    assert_eq!(simplified("SUM(A1)*1").0, "SUM(A1)*1");
    assert_eq!(simplified("A1^1").1.identities_removed, 0);
}

#[test]
fn test_negation_rewrites() {
    let (text, stats) = simplified("-(2)");
    assert_eq!(text, "-2");
    assert_eq!(stats.constants_folded, 1);

    assert_eq!(simplified("--(A1+1)").0, "A1+1");
    assert_eq!(simplified("--A1").0, "--A1");
}

#[test]
fn test_simplify_is_fixpoint() {
    for src in ["(A1+0*B1)*1", "--(1+A1)-0", "SUM((2+3)*A1,0+B1)", "-(-(A1*B1))"] {
        let mut stats = SimplifyStats::default();
        let once = expr::simplify(expr::parse(src).unwrap(), &mut stats);
        let reparsed = expr::parse(&once.render()).unwrap();
        let mut again = SimplifyStats::default();
        let twice = expr::simplify(reparsed, &mut again);
        assert_eq!(twice, once, "{src}");
        assert_eq!(again, SimplifyStats::default(), "{src}");
    }
}

#[test]
fn test_duplicate_subexpressions() {
    assert_eq!(expr::parse("(A1+B1)*(A1+B1)").unwrap().duplicate_subexpressions(), 1);
    assert_eq!(expr::parse("A1*A1").unwrap().duplicate_subexpressions(), 0);
}

// ========== Formula efficiency ==========

#[test]
fn test_formula_optimizer() {
    let input = doc(json!({
        "total": "=(A1+B1)+0",
        "fixed": "=2*3",
        "label": "plain",
        "bad": "=A1>B1",
        "n": "=A1"
    }));
    let (output, result) = FormulaEfficiency::default().optimize(&input).unwrap();
    assert_eq!(output.get("total").and_then(Document::as_str), Some("=A1+B1"));
    assert_eq!(output.get("fixed").and_then(Document::as_str), Some("=6"));
    assert_eq!(output.get("bad").and_then(Document::as_str), Some("=A1>B1"));
    assert_eq!(output.get("label").and_then(Document::as_str), Some("plain"));

    assert_eq!(result.unit(), Some("expression_nodes"));
    assert_eq!(result.original_value(), 9.0);
    assert_eq!(result.optimized_value(), 5.0);
    assert_eq!(result.metric_f64("formulas_seen"), Some(4.0));
    assert_eq!(result.metric_f64("formulas_rewritten"), Some(2.0));
    assert_eq!(result.metric_f64("skipped"), Some(1.0));
    assert_eq!(result.metric_f64("constants_folded"), Some(1.0));
    assert_eq!(result.metric_f64("identities_removed"), Some(1.0));
}

#[test]
fn test_formula_optimizer_idempotent() {
    let input = doc(json!({"rows": ["=(A1*1+0)*(2+2)", "=SUM(1+1,B2)", "=--(C1-0)"]}));
    let optimizer = FormulaEfficiency::default();
    let (once, first) = optimizer.optimize(&input).unwrap();
    let (twice, second) = optimizer.optimize(&once).unwrap();
    assert!(first.efficiency_gain() > 0.0);
    assert_eq!(second.efficiency_gain(), 0.0);
    assert_eq!(second.metric_f64("formulas_rewritten"), Some(0.0));
    assert_eq!(once, twice);
}

#[test]
fn test_formula_redundant_parentheses_rewritten() {
    let input = doc(json!({"f": "=((A1+B1))"}));
    let (output, result) = FormulaEfficiency::default().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"f": "=A1+B1"})));
    assert_eq!(result.efficiency_gain(), 0.0);
    assert_eq!(result.metric_f64("formulas_rewritten"), Some(1.0));
}

#[test]
fn test_formula_custom_prefix() {
    let settings = FormulaSettings { prefix: "@".into(), ..FormulaSettings::default() };
    let input = doc(json!({"a": "@1+1", "b": "=1+1"}));
    let (output, _) = FormulaEfficiency::new(settings).optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"a": "@2", "b": "=1+1"})));
}

#[test]
fn test_formula_census_counts_unparsed() {
    let input = doc(json!(["=A1+1", "=A1<", "text"]));
    let census = measure::formula_census(&input, &FormulaSettings::default());
    assert_eq!(census.formulas, 2);
    assert_eq!(census.unparsed, 1);
    assert_eq!(census.nodes, 3);
}

// ========== Computation speed ==========

#[test]
fn test_speed_flattens_nested_sum() {
    let input = doc(json!({"f": "=SUM(SUM(A1,B1),C1)"}));
    let (output, result) = ComputationSpeed::default().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"f": "=SUM(A1,B1,C1)"})));
    assert_eq!(result.unit(), Some("evaluation_steps"));
    assert_eq!(result.original_value(), 5.0);
    assert_eq!(result.optimized_value(), 4.0);
    assert!((result.efficiency_gain() - 20.0).abs() < 1e-9);
    assert_eq!(result.metric_f64("calls_flattened"), Some(1.0));
}

#[test]
fn test_speed_flattens_deep_nesting() {
    let flat = |src: &str| {
        let (out, removed) = expr::flatten_calls(expr::parse(src).unwrap(), &|n: &str| n == "SUM");
        (out.render(), removed)
    };
    assert_eq!(flat("SUM(A1,SUM(B1,SUM(C1,D1)))"), ("SUM(A1,B1,C1,D1)".to_string(), 2));
    assert_eq!(flat("MAX(MAX(A1,B1),C1)"), ("MAX(MAX(A1,B1),C1)".to_string(), 0));
    assert_eq!(flat("SUM(MAX(A1),B1)"), ("SUM(MAX(A1),B1)".to_string(), 0));
}

#[test]
fn test_speed_reports_rewritten_and_skipped() {
    let input = doc(json!(["=SUM(SUM(A1),B1)", "=A1+1", "=A1>"]));
    let (output, result) = ComputationSpeed::default().optimize(&input).unwrap();
    assert_eq!(output, doc(json!(["=SUM(A1,B1)", "=A1+1", "=A1>"])));
    assert_eq!(result.metric_f64("formulas_rewritten"), Some(1.0));
    assert_eq!(result.metric_f64("skipped"), Some(1.0));
}

#[test]
fn test_speed_counts_call_sites() {
    let input = doc(json!({"f": "=SUM(SUM(A1,B1),C1)", "c": {"call": "svc"}}));
    let (_, result) = ComputationSpeed::default().optimize(&input).unwrap();
    assert_eq!(result.original_value(), 6.0);
    assert_eq!(result.optimized_value(), 5.0);
}

// ========== Call aggregation ==========

#[test]
fn test_calls_merged_at_first_position() {
    let input = doc(json!([
        {"call": "crm.lookup", "method": "GET", "params": {"id": 1}},
        {"note": "x"},
        {"call": "crm.lookup", "method": "GET", "params": {"id": 2}}
    ]));
    let (output, result) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(
        output,
        doc(json!([
            {"call": "crm.lookup", "method": "GET", "batch": [{"id": 1}, {"id": 2}]},
            {"note": "x"}
        ]))
    );
    assert_eq!(result.unit(), Some("call_sites"));
    assert_eq!(result.efficiency_gain(), 50.0);
    assert_eq!(result.metric_f64("batches_created"), Some(1.0));
    assert_eq!(result.metric_f64("calls_merged"), Some(1.0));
}

#[test]
fn test_calls_with_different_shape_not_merged() {
    let input = doc(json!([
        {"call": "t", "method": "GET", "params": {"id": 1}},
        {"call": "t", "method": "POST", "params": {"id": 2}},
        {"call": "u", "method": "GET", "params": {"id": 3}}
    ]));
    let (output, result) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.efficiency_gain(), 0.0);
}

#[test]
fn test_calls_in_different_sequences_not_merged() {
    let input = doc(json!({
        "a": [{"call": "t", "params": {"id": 1}}],
        "b": [{"call": "t", "params": {"id": 2}}]
    }));
    let (output, _) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_calls_merge_into_existing_batch() {
    let input = doc(json!([
        {"call": "t", "batch": [{"id": 1}]},
        {"call": "t", "params": {"id": 2}},
        {"call": "t"}
    ]));
    let (output, _) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, doc(json!([{"call": "t", "batch": [{"id": 1}, {"id": 2}, {}]}])));
}

#[test]
fn test_calls_ambiguous_descriptor_left_alone() {
    let input = doc(json!([
        {"call": "t", "params": {"id": 1}, "batch": [{"id": 2}]},
        {"call": "t", "params": {"id": 3}}
    ]));
    let (output, _) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_calls_interleaved_targets_not_merged() {
    let input = doc(json!([
        {"call": "a", "params": 1},
        {"call": "b", "params": 1},
        {"call": "a", "params": 2},
        {"call": "b", "params": 2}
    ]));
    let (output, result) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.metric_f64("batches_created"), Some(0.0));
}

#[test]
fn test_calls_read_not_moved_before_write() {
    let input = doc(json!({"steps": [
        {"call": "crm.record", "method": "GET", "params": {"id": 1}},
        {"call": "crm.record", "method": "POST", "params": {"id": 1, "status": "won"}},
        {"call": "crm.record", "method": "GET", "params": {"id": 1}}
    ]}));
    let (output, result) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.efficiency_gain(), 0.0);
}

#[test]
fn test_calls_merge_each_run_separately() {
    let input = doc(json!([
        {"call": "a", "params": 1},
        {"call": "a", "params": 2},
        {"nested": [{"call": "b"}]},
        {"call": "a", "params": 3},
        {"note": "x"},
        {"call": "a", "params": 4}
    ]));
    let (output, result) = CallAggregation::default().optimize(&input).unwrap();
    assert_eq!(
        output,
        doc(json!([
            {"call": "a", "batch": [1, 2]},
            {"nested": [{"call": "b"}]},
            {"call": "a", "batch": [3, 4]},
            {"note": "x"}
        ]))
    );
    assert_eq!(result.metric_f64("batches_created"), Some(2.0));
    assert_eq!(result.metric_f64("calls_merged"), Some(2.0));
}

#[test]
fn test_calls_aggregation_idempotent() {
    let input = doc(json!({"jobs": [{"call": "t", "params": 1}, {"call": "t", "params": 2}]}));
    let optimizer = CallAggregation::default();
    let (once, _) = optimizer.optimize(&input).unwrap();
    let (twice, second) = optimizer.optimize(&once).unwrap();
    assert_eq!(once, twice);
    assert_eq!(second.efficiency_gain(), 0.0);
}

#[test]
fn test_call_site_helpers() {
    let conv = CallConventions::default();
    let batched = doc(json!({"call": "t", "method": "Get", "batch": [1, 2, 3]}));
    assert_eq!(call_site::target(&batched, &conv), Some("t"));
    assert!(call_site::is_read_only(&batched, &conv));
    assert_eq!(call_site::billable(&batched, &conv), (1, 3));
    assert!(!call_site::is_call_site(&doc(json!({"call": 1})), &conv));
    assert!(!call_site::is_read_only(&doc(json!({"call": "t"})), &conv));
}

// ========== Cost per execution ==========

#[test]
fn test_cost_removes_duplicate_read_only_calls() {
    let input = doc(json!({"calls": [
        {"call": "crm.lookup", "method": "GET", "params": {"id": 1}},
        {"call": "crm.lookup", "method": "GET", "params": {"id": 1}},
        {"call": "crm.update", "method": "POST", "params": {"id": 1}},
        {"call": "crm.update", "method": "POST", "params": {"id": 1}}
    ]}));
    let (output, result) = CostPerExecution::default().optimize(&input).unwrap();
    assert_eq!(output.get("calls").and_then(Document::as_sequence).map(<[_]>::len), Some(3));
    assert_eq!(result.unit(), Some("cost_units"));
    assert_eq!(result.metric_f64("duplicate_calls_removed"), Some(1.0));
    assert_eq!(result.metric_f64("billable_calls"), Some(3.0));
    assert!((result.original_value() - 4.04).abs() < 1e-9);
    assert!((result.optimized_value() - 3.03).abs() < 1e-9);
    assert!((result.efficiency_gain() - 25.0).abs() < 1e-9);
}

#[test]
fn test_cost_keeps_read_after_write() {
    let input = doc(json!({"steps": [
        {"call": "crm.record", "method": "GET", "params": {"id": 1}},
        {"call": "crm.record", "method": "POST", "params": {"id": 1, "status": "won"}},
        {"call": "crm.record", "method": "GET", "params": {"id": 1}},
        {"call": "crm.record", "method": "GET", "params": {"id": 1}}
    ]}));
    let (output, result) = CostPerExecution::default().optimize(&input).unwrap();
    let steps = output.get("steps").and_then(Document::as_sequence).unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[2].get("method").and_then(Document::as_str), Some("GET"));
    assert_eq!(result.metric_f64("duplicate_calls_removed"), Some(1.0));
}

#[test]
fn test_cost_nested_write_is_a_barrier() {
    let input = doc(json!([
        {"call": "t", "method": "GET", "params": 1},
        {"job": {"call": "t", "method": "PUT", "params": 1}},
        {"call": "t", "method": "GET", "params": 1}
    ]));
    let (output, _) = CostPerExecution::default().optimize(&input).unwrap();
    assert_eq!(output, input);
}

#[test]
fn test_cost_keeps_calls_without_method() {
    let input = doc(json!([{"call": "t", "params": 1}, {"call": "t", "params": 1}]));
    let (output, result) = CostPerExecution::default().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.efficiency_gain(), 0.0);
}

#[test]
fn test_cost_dedups_read_only_batch_items() {
    let input = doc(json!({"call": "t", "method": "get", "batch": [{"id": 1}, {"id": 1}, {"id": 2}]}));
    let (output, result) = CostPerExecution::default().optimize(&input).unwrap();
    assert_eq!(output, doc(json!({"call": "t", "method": "get", "batch": [{"id": 1}, {"id": 2}]})));
    assert_eq!(result.metric_f64("duplicate_batch_items_removed"), Some(1.0));
    assert_eq!(result.metric_f64("batch_items"), Some(2.0));
}

#[test]
fn test_cost_estimate_uses_model() {
    let model = CostModel { call_unit_price: 2.0, batch_item_price: 0.5, compute_unit_price: 0.0 };
    let input = doc(json!([{"call": "t", "batch": [1, 2]}, {"call": "u"}]));
    let breakdown = cost::estimate(&input, &model, &CallConventions::default(), &FormulaSettings::default());
    assert_eq!(breakdown.requests, 2);
    assert_eq!(breakdown.batch_items, 2);
    assert_eq!(breakdown.steps, 2);
    assert_eq!(breakdown.total, 5.0);
}

// ========== Memory footprint ==========

#[test]
fn test_memory_reclaims_excess_capacity() {
    let mut items = Vec::with_capacity(64);
    items.push(Document::from("a"));
    let mut name = String::with_capacity(256);
    name.push_str("short");
    let input = Document::from(vec![Document::Sequence(items), Document::String(name)]);

    let (output, result) = MemoryFootprint::new().optimize(&input).unwrap();
    assert_eq!(output, input);
    assert_eq!(result.unit(), Some("bytes"));
    assert!(result.efficiency_gain() > 0.0);
    assert!(result.metric_f64("bytes_reclaimed").unwrap() > 0.0);
    assert_eq!(result.metric_f64("nodes"), Some(4.0));
}

// ========== Standard set ==========

#[test]
fn test_standard_optimizers_order() {
    let names: Vec<String> = standard_optimizers(&EngineConfig::default())
        .iter()
        .map(|o| o.name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "structural_redundancy",
            "formula_efficiency",
            "call_aggregation",
            "computation_speed",
            "memory_footprint",
            "cost_per_execution"
        ]
    );
}

#[test]
fn test_builtin_gains_bounded() {
    let inputs = [
        doc(json!({})),
        doc(json!([])),
        doc(json!("=1+1")),
        doc(json!({"a": null, "f": "=SUM(SUM(1,A1),2*1)", "calls": [
            {"call": "t", "method": "GET", "params": 1},
            {"call": "t", "method": "GET", "params": 1}
        ]})),
    ];
    for optimizer in standard_optimizers(&EngineConfig::default()) {
        for input in &inputs {
            let (_, result) = optimizer.optimize(input).unwrap();
            let gain = result.efficiency_gain();
            assert!((0.0..=100.0).contains(&gain), "{} gave {gain}", optimizer.name());
            assert!(result.unit().is_some());
        }
    }
}
