use proptest::collection::vec;
use proptest::prelude::*;
use streamloom::accumulator::StreamAccumulator;
use streamloom::scope::ScopedId;
use streamloom::types::NodeKind;

proptest! {
    /// Tokens for one node are applied in arrival order no matter how
    /// token events for other nodes interleave with them.
    #[test]
    fn prop_per_node_token_order_survives_interleaving(
        tokens in vec(("[ab]", "[a-z]{1,4}"), 1..40)
    ) {
        let mut acc = StreamAccumulator::new("wf", "Workflow");
        acc.node_start("a", "A", NodeKind::Agent, None);
        acc.node_start("b", "B", NodeKind::Agent, None);

        let mut expected_a = String::new();
        let mut expected_b = String::new();
        for (node, text) in &tokens {
            acc.node_token(node, text);
            if node == "a" {
                expected_a.push_str(text);
            } else {
                expected_b.push_str(text);
            }
        }
        acc.flush();

        let streamed = |id: &str| {
            acc.tree().nodes[id]
                .streaming_text
                .clone()
                .unwrap_or_default()
        };
        prop_assert_eq!(streamed("a"), expected_a);
        prop_assert_eq!(streamed("b"), expected_b);
    }

    /// The root version counter never moves backward, whatever mix of
    /// events and flushes is applied.
    #[test]
    fn prop_root_version_is_monotonic(
        ops in vec((0..5u8, "[a-c]{1}", "[a-z]{0,3}"), 1..60)
    ) {
        let mut acc = StreamAccumulator::new("wf", "Workflow");
        let mut last_version = acc.version();
        for (op, id, text) in &ops {
            match op {
                0 => acc.node_start(id, "Node", NodeKind::Agent, None),
                1 => acc.node_token(id, text),
                2 => acc.node_finish(id, Some(text.clone())),
                3 => acc.flush(),
                _ => acc.node_error(id, "boom"),
            }
            prop_assert!(acc.version() >= last_version);
            last_version = acc.version();
        }
    }

    /// Well-formed scoped ids round-trip through parse and to_raw.
    #[test]
    fn prop_valid_scoped_ids_round_trip(
        path in vec("[a-z]{1,6}", 0..3),
        local in "[a-z]{1,6}"
    ) {
        let mut raw = String::new();
        for ancestor in &path {
            raw.push('@');
            raw.push_str(ancestor);
            raw.push('/');
        }
        raw.push_str(&local);

        let parsed = ScopedId::parse(&raw);
        prop_assert_eq!(&parsed.path, &path);
        prop_assert_eq!(&parsed.local, &local);
        prop_assert_eq!(parsed.to_raw(), raw);
    }
}
