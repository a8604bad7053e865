use streamloom::accumulator::StreamAccumulator;
use streamloom::observe::{ChangeHub, ChangeNotice, MemorySink};
use streamloom::types::NodeKind;
use tokio::sync::mpsc;

#[test]
fn test_accumulator_emits_notices_per_touched_subtree() {
    let (tx, rx) = flume::unbounded::<ChangeNotice>();
    let mut acc = StreamAccumulator::new("wf", "Workflow").with_notifier(tx);

    acc.node_start("sub", "Sub", NodeKind::Subflow, None);
    acc.node_token("@sub/worker", "a");
    acc.node_token("@sub/worker", "b");
    acc.flush();

    let notices: Vec<ChangeNotice> = rx.drain().collect();
    // One for the start (root), one for the flush (nested tree).
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].scope, "root");
    assert_eq!(notices[1].scope, "@sub");
    assert!(notices[1].version > 1);
}

#[test]
fn test_notices_carry_monotonic_versions() {
    let (tx, rx) = flume::unbounded::<ChangeNotice>();
    let mut acc = StreamAccumulator::new("wf", "Workflow").with_notifier(tx);

    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_finish("n1", Some("done".to_string()));

    let versions: Vec<u64> = rx.drain().map(|n| n.version).collect();
    assert!(versions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_dropped_receiver_does_not_break_mutation() {
    let (tx, rx) = flume::unbounded::<ChangeNotice>();
    drop(rx);
    let mut acc = StreamAccumulator::new("wf", "Workflow").with_notifier(tx);
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    assert_eq!(acc.tree().nodes.len(), 1);
}

#[tokio::test]
async fn test_hub_broadcasts_to_memory_sink() {
    let sink = MemorySink::new();
    let hub = ChangeHub::with_sink(sink.clone());
    hub.listen();

    let mut acc = StreamAccumulator::new("wf", "Workflow").with_notifier(hub.sender());
    acc.node_start("n1", "Node", NodeKind::Agent, None);
    acc.node_finish("n1", Some("done".to_string()));

    // Let the listener drain before stopping it.
    for _ in 0..100 {
        if sink.snapshot().len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    hub.stop().await;

    let captured = sink.snapshot();
    assert_eq!(captured.len(), 2);
    assert!(captured.iter().all(|n| n.scope == "root"));
}

#[tokio::test]
async fn test_hub_channel_sink_forwards_to_async_consumer() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let hub = ChangeHub::with_sink(streamloom::observe::ChannelSink::new(tx));
    hub.listen();

    hub.sender().send(ChangeNotice::new("root", 2)).unwrap();
    let notice = rx.recv().await.expect("forwarded notice");
    assert_eq!(notice.scope, "root");
    hub.stop().await;
}
