//! # Streamloom: Workflow Execution Stream Accumulator
//!
//! Streamloom turns an unordered stream of workflow-execution events into a
//! consistent, hierarchical, versioned state tree that UIs can render live
//! and persistence layers can snapshot and resume from.
//!
//! ## Core Concepts
//!
//! - **Events**: One [`events::ExecEvent`] per engine occurrence, applied
//!   fire-and-forget
//! - **State tree**: A recursive [`state::WorkflowTree`] of nodes, branches,
//!   and nested subflow trees, each subtree with its own version counter
//! - **Scoped ids**: `@subflow/@subflow/local` addressing with on-demand
//!   placeholder creation ([`scope`])
//! - **Token batching**: High-frequency token events buffered and applied in
//!   deferred flushes ([`accumulator::batch`])
//! - **Export**: Immutable snapshots with resume checkpoints
//!   ([`accumulator::export`])
//!
//! ## Quick Start
//!
//! ### Accumulating a run
//!
//! ```
//! use streamloom::accumulator::StreamAccumulator;
//! use streamloom::events::FinalizeOptions;
//! use streamloom::types::{ExecutionState, NodeKind};
//!
//! let mut acc = StreamAccumulator::new("wf-1", "Research pipeline");
//! acc.node_start("plan", "Plan", NodeKind::Agent, None);
//! acc.node_token("plan", "Thinking");
//! acc.node_finish("plan", Some("A three-step plan".to_string()));
//! acc.finalize(FinalizeOptions::completed());
//!
//! assert_eq!(acc.tree().execution_state, ExecutionState::Completed);
//! assert_eq!(acc.tree().final_output, "A three-step plan");
//! ```
//!
//! ### Addressing nodes inside subflows
//!
//! Events carry scoped ids; missing ancestors are created as placeholders
//! so arrival order never matters:
//!
//! ```
//! use streamloom::accumulator::StreamAccumulator;
//! use streamloom::types::NodeKind;
//!
//! let mut acc = StreamAccumulator::new("wf-2", "Nested");
//! // Token arrives before anything else has started.
//! acc.node_token("@research/fetch", "partial");
//! acc.flush();
//!
//! let research = acc.tree().nodes["research"].subflow.as_deref().unwrap();
//! assert_eq!(research.nodes["fetch"].streaming_text.as_deref(), Some("partial"));
//! ```
//!
//! ### Snapshotting for persistence
//!
//! ```
//! use streamloom::accumulator::StreamAccumulator;
//! use streamloom::events::FinalizeOptions;
//!
//! let mut acc = StreamAccumulator::new("wf-3", "Failing run");
//! acc.finalize(FinalizeOptions::failed("engine crashed"));
//!
//! let snapshot = acc.to_message_data(Some("original prompt".into()));
//! // A run that ended in error carries a resume checkpoint.
//! assert!(snapshot.resume_state.is_some());
//! ```
//!
//! ## Module Guide
//!
//! - [`accumulator`] - The stream accumulator, token batching, HITL
//!   resolution, and snapshot export
//! - [`events`] - The consumed event interface
//! - [`state`] - The versioned workflow state tree
//! - [`scope`] - Scoped-id parsing and subtree resolution
//! - [`observe`] - Change notices, sinks, and the broadcast hub
//! - [`service`] - Channel-driven background accumulator
//! - [`store`] - Snapshot persistence seam
//! - [`message`] - Session message primitives
//! - [`types`] - Shared status and kind vocabulary

pub mod accumulator;
pub mod events;
pub mod message;
pub mod observe;
pub mod scope;
pub mod service;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;
