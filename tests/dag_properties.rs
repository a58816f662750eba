//! Property tests for the DAG primitive.

use metaforge::graph::Dag;
use proptest::prelude::*;

proptest! {
    /// For random edge sets that only point "forward" (i < j), evaluation
    /// succeeds and places every edge's start before its end.
    #[test]
    fn toposort_respects_forward_edges(
        edges in prop::collection::hash_set((0usize..12, 0usize..12), 0..40)
    ) {
        let edges: Vec<(usize, usize)> = edges
            .into_iter()
            .filter(|(a, b)| a < b)
            .collect();

        let mut dag = Dag::new();
        for (a, b) in &edges {
            dag.link(&format!("n{a}"), &format!("n{b}"), 1);
        }

        prop_assert!(dag.evaluate().is_ok());
        let order = dag.order().unwrap().to_vec();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        for (a, b) in &edges {
            let (pa, pb) = (pos(&format!("n{}", a)), pos(&format!("n{}", b)));
            prop_assert!(pa < pb);
        }
    }

    /// Closing any forward chain back on itself must be rejected, and the
    /// reported members include the nodes on the loop.
    #[test]
    fn closing_a_chain_is_detected(len in 2usize..8) {
        let mut dag = Dag::new();
        for i in 0..len - 1 {
            dag.link(&format!("n{i}"), &format!("n{}", i + 1), 1);
        }
        dag.link(&format!("n{}", len - 1), "n0", 1);

        let members = dag.evaluate().unwrap_err();
        prop_assert_eq!(members.len(), len);
    }
}
