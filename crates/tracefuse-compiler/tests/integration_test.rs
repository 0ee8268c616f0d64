//! Run the full pass pipeline on a small traced attention-style graph.

mod common;

use std::collections::HashSet;

use common::{OpKind, TestGraph, assert_well_formed, expr_of, init_tracing};
use tracefuse_compiler::{Error, PassPipeline};

#[test]
fn test_pipeline_on_traced_graph() {
    init_tracing();

    // q: [batch, seq, heads * head_dim] reshaped to [batch, seq, heads, head_dim]
    let mut g = TestGraph::new();
    let q = g.input("q");
    let d0 = g.constant("d0", 0i64);
    let d1 = g.constant("d1", 1i64);
    let batch = g.op("aten::size", &[q, d0], "batch");
    let seq = g.op("aten::size", &[q, d1], "seq");
    let heads = g.constant("heads", 8i64);
    let head_dim = g.constant("head_dim", 64i64);
    let shape = g.op("prim::ListConstruct", &[batch, seq, heads, head_dim], "shape");
    let view = g.op("aten::view", &[q, shape], "view");

    let scale_base = g.constant("scale_base", 64.0);
    let scale = g.op("aten::rsqrt", &[scale_base], "scale");
    let scaled = g.op("aten::mul", &[view, scale], "scaled");
    let weights = g.op("aten::softmax", &[scaled], "weights");
    g.output(&[weights]);

    let list = g.producer(shape);
    let mul = g.producer(scaled);
    let softmax = g.producer(weights);
    let mut graph = g.finish();

    tracing::info!(
        num_operators = graph.operator_count(),
        num_operands = graph.operand_count(),
        "graph built"
    );

    let changed = {
        let _span = tracing::info_span!("pipeline").entered();
        PassPipeline::new(HashSet::new())
            .run(&mut graph)
            .expect("pipeline should succeed")
    };
    assert!(changed);

    assert_eq!(expr_of(&graph, list), "[size(@0,0),size(@0,1),8,64]");
    assert_eq!(graph.operator(list).unwrap().inputs, vec![q]);
    assert_eq!(expr_of(&graph, mul), "mul(@0,rsqrt(6.400000e+01))");
    assert_eq!(graph.operator(mul).unwrap().inputs, vec![view]);
    assert_eq!(
        graph.operator(softmax).unwrap().kind(),
        &OpKind::Other("aten::softmax".to_string())
    );

    graph.check_links().unwrap();
    assert_well_formed(&graph);

    // Second run finds nothing left to fuse.
    let once = graph.clone();
    let changed = PassPipeline::new(HashSet::new()).run(&mut graph).unwrap();
    assert!(!changed);
    assert_eq!(graph, once);
}

#[test]
fn test_pipeline_rejects_wrong_arity() {
    let mut g = TestGraph::new();
    let x = g.input("x");
    let y = g.op("aten::rsub", &[x, x], "y");
    g.output(&[y]);
    let mut graph = g.finish();
    let before = graph.clone();

    let err = PassPipeline::new(HashSet::new())
        .run(&mut graph)
        .unwrap_err();

    assert!(matches!(err, Error::Arity(_)), "unexpected error: {err}");
    assert_eq!(graph, before);
}

#[test]
fn test_pipeline_rejects_cycle() {
    let mut g = TestGraph::new();
    let x = g.input("x");
    let a = g.op("aten::neg", &[x], "a");
    let b = g.op("aten::exp", &[a], "b");
    g.output(&[b]);
    let neg = g.producer(a);
    let mut graph = g.finish();
    graph.replace_inputs(neg, vec![b]).unwrap();

    let err = PassPipeline::new(HashSet::new())
        .run(&mut graph)
        .unwrap_err();

    assert!(matches!(err, Error::Cycle(_)), "unexpected error: {err}");
}
