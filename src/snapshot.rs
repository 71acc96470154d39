//! Stack snapshot builder.
//!
//! At the instant of a pause the interpreter stack is materialized into the
//! editor-facing frames/scopes/variables views. The snapshot lives from the
//! pause until the matching resume; requests arriving outside that window
//! are answered with empty collections.

use std::collections::HashMap;

use crate::engine::{is_adapter_source, StackView, TEMPORARY_NAME};
use crate::protocol::{Scope, Source, StackFrame, Variable};

/// Frames, scopes and variables captured at a pause.
#[derive(Debug, Default)]
pub struct Snapshot {
    frames: Vec<StackFrame>,
    scopes: HashMap<i64, Vec<Scope>>,
    variables: Vec<Vec<Variable>>,
}

impl Snapshot {
    /// Walk the suspended stack outward from the innermost frame until the
    /// stack ends or the hosting adapter's own frames are reached.
    ///
    /// Frame ids equal the interpreter stack level at capture. A leading `@`
    /// is stripped from file-backed sources; frames with any other source
    /// origin are still counted for id assignment but carry no source. Locals
    /// are enumerated in slot order; in the innermost frame the interpreter's
    /// temporaries are filtered out and types are captured.
    pub fn capture(stack: &dyn StackView) -> Self {
        let mut snapshot = Self::default();
        let mut level = 1usize;
        loop {
            let Some(frame) = stack.frame(level) else {
                break;
            };
            if frame.source.as_deref().is_some_and(is_adapter_source) {
                break;
            }
            let innermost = level == 1;

            let mut variables = Vec::new();
            let mut index = 1usize;
            while let Some(local) = stack.local(level, index) {
                index += 1;
                if innermost && local.name == TEMPORARY_NAME {
                    continue;
                }
                variables.push(Variable {
                    name: local.name,
                    value: local.value,
                    type_name: innermost.then_some(local.type_name),
                    variables_reference: 0,
                });
            }
            snapshot.variables.push(variables);
            let reference = snapshot.variables.len() as i64;

            let id = level as i64;
            snapshot.scopes.insert(
                id,
                vec![Scope {
                    name: "Locals".to_string(),
                    presentation_hint: "locals".to_string(),
                    variables_reference: reference,
                    expensive: false,
                }],
            );

            let path = frame
                .source
                .as_deref()
                .and_then(|s| s.strip_prefix('@'))
                .map(str::to_string);
            snapshot.frames.push(StackFrame {
                id,
                name: frame.name,
                source: path.map(|path| Source {
                    name: None,
                    path: Some(path),
                }),
                line: frame.line,
                column: 1,
            });

            level += 1;
        }
        snapshot
    }

    /// Frames, innermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Scope descriptors for a frame id; empty for unknown ids.
    pub fn scopes_for(&self, frame_id: i64) -> Vec<Scope> {
        self.scopes.get(&frame_id).cloned().unwrap_or_default()
    }

    /// Variables behind a 1-based reference; empty for unknown references.
    pub fn variables_for(&self, reference: i64) -> Vec<Variable> {
        if reference < 1 {
            return Vec::new();
        }
        self.variables
            .get((reference - 1) as usize)
            .cloned()
            .unwrap_or_default()
    }
}
