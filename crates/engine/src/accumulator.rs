//! Tool-call accumulator.
//!
//! Providers stream a tool invocation as a series of fragments sharing an
//! id: the first usually carries the function name, the rest carry slices
//! of the JSON arguments. The accumulator reassembles them and decides when
//! an invocation is complete. It lives for one streaming call.
//!
//! Completion depends on [`ToolCallCompletion`]:
//! - `Parse`: an entry is complete as soon as its accumulated arguments
//!   parse as a JSON object. Balanced-but-unfinished text (e.g. `{}` before
//!   the model has written its real arguments) is misread as complete; this
//!   is an accepted approximation for providers with no end signal.
//! - `FinishReason`: [`process_delta`](ToolCallAccumulator::process_delta)
//!   never reports completion; the driver calls
//!   [`finish`](ToolCallAccumulator::finish) when the provider says the turn
//!   ended on tool calls.
//!
//! Processed ids are never re-entered, so a call is reported complete at most
//! once per accumulator even if the provider re-sends its deltas.

use std::collections::{HashMap, HashSet};
use taskswarm_core::message::{ToolCallDelta, ToolCallRecord};
use taskswarm_core::observer::StreamObserver;
use taskswarm_core::provider::{ToolCallCompletion, ToolDefinition};
use tracing::trace;

/// An invocation being reassembled.
#[derive(Debug, Clone)]
pub struct InFlightCall {
    /// The record so far; `arguments` may still be partial
    pub record: ToolCallRecord,

    /// The matching tool definition, once the name resolves
    pub definition: Option<ToolDefinition>,

    pub is_complete: bool,

    /// Arrival order, for flushing
    seq: u64,
}

/// Reassembles streamed tool-call fragments into complete invocations.
#[derive(Debug)]
pub struct ToolCallAccumulator {
    mode: ToolCallCompletion,
    in_progress: HashMap<String, InFlightCall>,
    processed: HashSet<String>,
    next_seq: u64,
}

impl ToolCallAccumulator {
    pub fn new(mode: ToolCallCompletion) -> Self {
        Self {
            mode,
            in_progress: HashMap::new(),
            processed: HashSet::new(),
            next_seq: 0,
        }
    }

    pub fn mode(&self) -> ToolCallCompletion {
        self.mode
    }

    /// Fold one delta into its entry.
    ///
    /// Returns `None` when the delta is dropped: it has no id, or its id was
    /// already processed. Otherwise returns the entry, with `is_complete`
    /// telling the caller whether to record it.
    pub fn process_delta<O>(
        &mut self,
        delta: &ToolCallDelta,
        tools: &[ToolDefinition],
        observer: &O,
    ) -> Option<&InFlightCall>
    where
        O: StreamObserver + ?Sized,
    {
        if delta.id.is_empty() {
            trace!("Dropping tool-call delta without an id");
            return None;
        }

        if self.processed.contains(&delta.id) {
            trace!(call_id = %delta.id, "Dropping delta for an already processed tool call");
            return None;
        }

        let seq = self.next_seq;
        let entry = self.in_progress.entry(delta.id.clone()).or_insert_with(|| {
            let definition = resolve(tools, &delta.name);
            InFlightCall {
                record: ToolCallRecord {
                    id: delta.id.clone(),
                    name: delta.name.clone(),
                    arguments: String::new(),
                },
                definition,
                is_complete: false,
                seq,
            }
        });
        if entry.seq == seq {
            self.next_seq += 1;
        }

        if !delta.name.is_empty() && entry.record.name.is_empty() {
            entry.record.name = delta.name.clone();
            entry.definition = resolve(tools, &entry.record.name);
        }

        if !delta.arguments.is_empty() {
            entry.record.arguments.push_str(&delta.arguments);
            observer.on_tool_call_arguments(&entry.record.id, &delta.arguments);
        }

        if self.mode == ToolCallCompletion::Parse {
            entry.is_complete = parses_as_object(&entry.record.arguments);
        }

        Some(entry)
    }

    /// Mark every in-progress entry complete and return them in arrival order.
    ///
    /// Used when the provider signals the end of the tool calls, or when the
    /// stream ends in `FinishReason` mode. The caller still has to
    /// [`mark_processed`](Self::mark_processed) each one.
    pub fn finish(&mut self) -> Vec<InFlightCall> {
        let mut entries: Vec<InFlightCall> = self
            .in_progress
            .values_mut()
            .map(|entry| {
                entry.is_complete = true;
                entry.clone()
            })
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    /// Entries still waiting for more fragments, in arrival order.
    pub fn pending(&self) -> Vec<&InFlightCall> {
        let mut entries: Vec<&InFlightCall> = self
            .in_progress
            .values()
            .filter(|entry| !entry.is_complete)
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
    }

    /// Retire `id`: later deltas for it are dropped.
    ///
    /// The caller does this once it has recorded the completed call.
    pub fn mark_processed(&mut self, id: &str) {
        self.in_progress.remove(id);
        self.processed.insert(id.to_string());
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }
}

fn resolve(tools: &[ToolDefinition], name: &str) -> Option<ToolDefinition> {
    if name.is_empty() {
        return None;
    }
    tools.iter().find(|t| t.name == name).cloned()
}

fn parses_as_object(text: &str) -> bool {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use taskswarm_core::NoopObserver;

    #[derive(Default)]
    struct FragmentRecorder {
        fragments: Mutex<Vec<(String, String)>>,
    }

    impl StreamObserver for FragmentRecorder {
        fn on_tool_call_arguments(&self, id: &str, fragment: &str) {
            self.fragments
                .lock()
                .unwrap()
                .push((id.to_string(), fragment.to_string()));
        }
    }

    fn sum_tool() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "sum".into(),
            description: "Add numbers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]
    }

    #[test]
    fn fragments_complete_on_parse() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let tools = sum_tool();

        let entry = acc
            .process_delta(&ToolCallDelta::new("X", "sum", "{\"a\":1"), &tools, &NoopObserver)
            .unwrap();
        assert!(!entry.is_complete);
        assert!(entry.definition.is_some());

        let entry = acc
            .process_delta(&ToolCallDelta::new("X", "", "}"), &tools, &NoopObserver)
            .unwrap();
        assert!(entry.is_complete);
        let args: serde_json::Value = serde_json::from_str(&entry.record.arguments).unwrap();
        assert_eq!(args, serde_json::json!({"a": 1}));
    }

    #[test]
    fn delta_without_id_is_dropped() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let result = acc.process_delta(&ToolCallDelta::new("", "sum", "{}"), &sum_tool(), &NoopObserver);
        assert!(result.is_none());
        assert!(acc.pending().is_empty());
    }

    #[test]
    fn processed_id_is_never_reported_again() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let tools = sum_tool();
        let delta = ToolCallDelta::new("c1", "sum", r#"{"a":1,"b":2}"#);

        let mut completions = 0;
        for _ in 0..3 {
            let complete = acc
                .process_delta(&delta, &tools, &NoopObserver)
                .is_some_and(|e| e.is_complete);
            if complete {
                completions += 1;
                acc.mark_processed("c1");
            }
        }
        assert_eq!(completions, 1);
        assert!(acc.is_processed("c1"));
    }

    #[test]
    fn unknown_tool_still_tracked() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let entry = acc
            .process_delta(&ToolCallDelta::new("c1", "nope", "{}"), &sum_tool(), &NoopObserver)
            .unwrap();
        assert!(entry.definition.is_none());
        assert!(entry.is_complete);
        assert_eq!(entry.record.name, "nope");
    }

    #[test]
    fn late_name_is_backfilled() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let tools = sum_tool();
        acc.process_delta(&ToolCallDelta::new("c1", "", "{\"a\""), &tools, &NoopObserver);
        let entry = acc
            .process_delta(&ToolCallDelta::new("c1", "sum", ":1}"), &tools, &NoopObserver)
            .unwrap();
        assert_eq!(entry.record.name, "sum");
        assert!(entry.definition.is_some());
        assert!(entry.is_complete);
    }

    #[test]
    fn every_fragment_is_observed_in_order() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::FinishReason);
        let observer = FragmentRecorder::default();
        let tools = sum_tool();
        acc.process_delta(&ToolCallDelta::new("c1", "sum", ""), &tools, &observer);
        acc.process_delta(&ToolCallDelta::new("c1", "", "{\"a\":"), &tools, &observer);
        acc.process_delta(&ToolCallDelta::new("c1", "", "1}"), &tools, &observer);

        let fragments = observer.fragments.lock().unwrap();
        assert_eq!(
            *fragments,
            vec![
                ("c1".to_string(), "{\"a\":".to_string()),
                ("c1".to_string(), "1}".to_string()),
            ]
        );
    }

    #[test]
    fn finish_reason_mode_waits_for_flush() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::FinishReason);
        let tools = sum_tool();

        // Balanced JSON is not enough in this mode
        let entry = acc
            .process_delta(&ToolCallDelta::new("b", "sum", "{}"), &tools, &NoopObserver)
            .unwrap();
        assert!(!entry.is_complete);
        acc.process_delta(&ToolCallDelta::new("a", "sum", "{\"a\":1}"), &tools, &NoopObserver);
        acc.process_delta(&ToolCallDelta::new("b", "", ""), &tools, &NoopObserver);

        let flushed = acc.finish();
        let ids: Vec<&str> = flushed.iter().map(|e| e.record.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(flushed.iter().all(|e| e.is_complete));

        for entry in &flushed {
            acc.mark_processed(&entry.record.id);
        }
        assert!(acc.finish().is_empty());
        assert!(
            acc.process_delta(&ToolCallDelta::new("a", "", "x"), &tools, &NoopObserver)
                .is_none()
        );
    }

    #[test]
    fn pending_lists_incomplete_entries() {
        let mut acc = ToolCallAccumulator::new(ToolCallCompletion::Parse);
        let tools = sum_tool();
        acc.process_delta(&ToolCallDelta::new("c1", "sum", "{\"a\":"), &tools, &NoopObserver);
        acc.process_delta(&ToolCallDelta::new("c2", "sum", "{}"), &tools, &NoopObserver);

        let pending = acc.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].record.id, "c1");
    }
}
