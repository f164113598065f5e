//! ScriptComposer - リモートに送るプログラムの組み立て
//!
//! Bridge captures become stub names in the program plus caller-side
//! [`BridgeFunction`]s; value captures become literal bindings.

use std::collections::BTreeMap;

use crate::domain::payload;
use crate::domain::{CaptureValue, CodecError, LambdaId, RemoteProgram, TaskDescriptor};

use super::bridge::BridgeFunction;

/// Output of composing one descriptor: the program to ship and the bridges
/// the caller side must serve.
#[derive(Debug)]
pub struct ComposedTask {
    pub program: RemoteProgram,
    pub bridges: BTreeMap<String, BridgeFunction>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptComposer;

impl ScriptComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose the program for `descriptor`, to run as `lambda`.
    pub fn compose(
        &self,
        lambda: LambdaId,
        descriptor: &TaskDescriptor,
    ) -> Result<ComposedTask, CodecError> {
        let mut stubs = Vec::new();
        let mut bridges = BTreeMap::new();
        let mut bindings = BTreeMap::new();

        for (name, value) in descriptor.capture().iter() {
            match value {
                CaptureValue::Bridge(function) => {
                    stubs.push(name.to_string());
                    bridges.insert(
                        name.to_string(),
                        BridgeFunction::new(name, function.clone()),
                    );
                }
                CaptureValue::Value(value) => {
                    bindings.insert(name.to_string(), payload::encode(value)?);
                }
            }
        }

        Ok(ComposedTask {
            program: RemoteProgram {
                lambda,
                entry: descriptor.entry().to_string(),
                bridges: stubs,
                bindings,
            },
            bridges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn captures_split_into_stubs_and_bindings() {
        let descriptor = TaskDescriptor::new("demo.greet.v1")
            .bind("greeting", "hi")
            .unwrap()
            .bind("limits", &json!({"max": 3}))
            .unwrap()
            .bridge("onLog", |_| None);

        let composed = ScriptComposer::new()
            .compose(LambdaId::new(9), &descriptor)
            .unwrap();

        assert_eq!(composed.program.lambda, LambdaId::new(9));
        assert_eq!(composed.program.entry, "demo.greet.v1");
        assert_eq!(composed.program.bridges, vec!["onLog".to_string()]);
        assert_eq!(composed.program.bindings["greeting"], r#""hi""#);
        assert_eq!(composed.program.bindings["limits"], r#"{"max":3}"#);
        assert_eq!(composed.bridges.keys().collect::<Vec<_>>(), vec!["onLog"]);
        assert_eq!(composed.bridges["onLog"].name(), "onLog");
    }

    #[test]
    fn composed_program_round_trips_through_text() {
        let descriptor = TaskDescriptor::new("x").bind("n", &5).unwrap();
        let composed = ScriptComposer::new()
            .compose(LambdaId::new(1), &descriptor)
            .unwrap();

        let text = composed.program.to_text().unwrap();
        assert_eq!(RemoteProgram::parse(&text).unwrap(), composed.program);
    }
}
