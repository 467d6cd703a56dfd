// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host functions exposed to plugin code under the `plughost` import module.
//!
//! Plugins receive their input and publish their result through these calls.
//! Errors that mean the guest broke the ABI (out-of-bounds pointers, invalid
//! UTF-8) trap, which surfaces as a failed hook.

use anyhow::anyhow;
use plughost_core::{LoadErrorKind, PluginFault, PluginIdentity};
use serde_json::{Map, Value};
use tracing::{debug, error, info, trace, warn};
use wasmtime::{Caller, Linker, Memory, StoreLimits};

/// Import module name every plugin links against.
pub const HOST_MODULE: &str = "plughost";

/// Per-scope state stored in the wasmtime `Store`.
pub struct HostState {
    /// Bundle file name, used to tag plugin log lines.
    pub(crate) label: String,
    pub(crate) limits: StoreLimits,
    identity: Option<PluginIdentity>,
    input: Value,
    input_json: String,
    raw_output: Option<String>,
    fields: Map<String, Value>,
    error: Option<String>,
}

impl HostState {
    pub fn new(label: impl Into<String>, limits: StoreLimits) -> Self {
        Self {
            label: label.into(),
            limits,
            identity: None,
            input: Value::Null,
            input_json: "null".to_string(),
            raw_output: None,
            fields: Map::new(),
            error: None,
        }
    }

    /// Resets per-call state and installs the input for the next call.
    pub fn begin_call(&mut self, input: Value) {
        self.input_json = input.to_string();
        self.input = input;
        self.raw_output = None;
        self.fields.clear();
        self.error = None;
    }

    /// Identity reported through `set_identity`, if any.
    pub fn take_identity(&mut self) -> Option<PluginIdentity> {
        self.identity.take()
    }

    /// Message last passed to `set_error`.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    /// Builds the call result: raw JSON first, then the field map, then null.
    pub fn take_output(&mut self) -> Result<Value, PluginFault> {
        if let Some(raw) = self.raw_output.take() {
            return serde_json::from_str(&raw)
                .map_err(|e| PluginFault::new(format!("plugin wrote invalid JSON output: {e}")));
        }
        if self.fields.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::Object(std::mem::take(&mut self.fields)))
        }
    }

    fn input_field(&self, key: &str) -> Option<&Value> {
        self.input.as_object().and_then(|obj| obj.get(key))
    }

    fn input_number(&self, key: &str) -> f64 {
        match self.input_field(key) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    fn input_str_eq(&self, key: &str, expected: &str) -> bool {
        matches!(self.input_field(key), Some(Value::String(s)) if s.eq_ignore_ascii_case(expected))
    }
}

/// Defines the `plughost` import module in the linker.
pub fn define_host_functions(linker: &mut Linker<HostState>) -> Result<(), LoadErrorKind> {
    linker
        .func_wrap(
            HOST_MODULE,
            "set_identity",
            |mut caller: Caller<'_, HostState>,
             name_ptr: i32,
             name_len: i32,
             version_ptr: i32,
             version_len: i32,
             desc_ptr: i32,
             desc_len: i32|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let identity = PluginIdentity {
                    name: read_string(&memory, &caller, name_ptr, name_len)?,
                    version: read_string(&memory, &caller, version_ptr, version_len)?,
                    description: read_string(&memory, &caller, desc_ptr, desc_len)?,
                };
                caller.data_mut().identity = Some(identity);
                Ok(())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "log",
            |mut caller: Caller<'_, HostState>,
             level: i32,
             ptr: i32,
             len: i32|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let msg = read_string(&memory, &caller, ptr, len)?;
                let bundle = caller.data().label.as_str();
                match level {
                    0 => trace!(bundle = %bundle, "{msg}"),
                    1 => debug!(bundle = %bundle, "{msg}"),
                    3 => warn!(bundle = %bundle, "{msg}"),
                    4 => error!(bundle = %bundle, "{msg}"),
                    _ => info!(bundle = %bundle, "{msg}"),
                }
                Ok(())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "input_len",
            |caller: Caller<'_, HostState>| -> i32 { caller.data().input_json.len() as i32 },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "input_read",
            |mut caller: Caller<'_, HostState>, ptr: i32| -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let input = caller.data().input_json.clone();
                write_bytes(&memory, &mut caller, ptr, input.as_bytes())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "output_write",
            |mut caller: Caller<'_, HostState>,
             ptr: i32,
             len: i32|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let output = read_string(&memory, &caller, ptr, len)?;
                caller.data_mut().raw_output = Some(output);
                Ok(())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "input_number",
            |mut caller: Caller<'_, HostState>,
             key_ptr: i32,
             key_len: i32|
             -> Result<f64, wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let key = read_string(&memory, &caller, key_ptr, key_len)?;
                Ok(caller.data().input_number(&key))
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "input_str_eq",
            |mut caller: Caller<'_, HostState>,
             key_ptr: i32,
             key_len: i32,
             val_ptr: i32,
             val_len: i32|
             -> Result<i32, wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let key = read_string(&memory, &caller, key_ptr, key_len)?;
                let expected = read_string(&memory, &caller, val_ptr, val_len)?;
                Ok(caller.data().input_str_eq(&key, &expected) as i32)
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "output_number",
            |mut caller: Caller<'_, HostState>,
             key_ptr: i32,
             key_len: i32,
             value: f64|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let key = read_string(&memory, &caller, key_ptr, key_len)?;
                // Whole numbers stay integers in the JSON result.
                let json = if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    Value::from(value as i64)
                } else {
                    serde_json::Number::from_f64(value)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                };
                caller.data_mut().fields.insert(key, json);
                Ok(())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "output_string",
            |mut caller: Caller<'_, HostState>,
             key_ptr: i32,
             key_len: i32,
             val_ptr: i32,
             val_len: i32|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let key = read_string(&memory, &caller, key_ptr, key_len)?;
                let value = read_string(&memory, &caller, val_ptr, val_len)?;
                caller.data_mut().fields.insert(key, Value::String(value));
                Ok(())
            },
        )
        .map_err(linker_err)?;

    linker
        .func_wrap(
            HOST_MODULE,
            "set_error",
            |mut caller: Caller<'_, HostState>,
             ptr: i32,
             len: i32|
             -> Result<(), wasmtime::Error> {
                let memory = exported_memory(&mut caller)?;
                let message = read_string(&memory, &caller, ptr, len)?;
                caller.data_mut().error = Some(message);
                Ok(())
            },
        )
        .map_err(linker_err)?;

    Ok(())
}

fn exported_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory, wasmtime::Error> {
    match caller.get_export("memory") {
        Some(wasmtime::Extern::Memory(mem)) => Ok(mem),
        _ => Err(anyhow!("plugin module has no exported memory").into()),
    }
}

fn guest_range(ptr: i32, len: i32, size: usize) -> Result<std::ops::Range<usize>, wasmtime::Error> {
    let start = usize::try_from(ptr).map_err(|_| anyhow!("negative pointer {ptr}"))?;
    let len = usize::try_from(len).map_err(|_| anyhow!("negative length {len}"))?;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= size)
        .ok_or_else(|| anyhow!("range {start}+{len} is outside guest memory ({size} bytes)"))?;
    Ok(start..end)
}

/// Reads a UTF-8 string from guest memory.
fn read_string(
    memory: &Memory,
    caller: &Caller<'_, HostState>,
    ptr: i32,
    len: i32,
) -> Result<String, wasmtime::Error> {
    let data = memory.data(caller);
    let range = guest_range(ptr, len, data.len())?;
    String::from_utf8(data[range].to_vec())
        .map_err(|e| anyhow!("guest string is not valid UTF-8: {e}").into())
}

/// Writes bytes into guest memory.
fn write_bytes(
    memory: &Memory,
    caller: &mut Caller<'_, HostState>,
    ptr: i32,
    bytes: &[u8],
) -> Result<(), wasmtime::Error> {
    let data = memory.data_mut(caller);
    let range = guest_range(ptr, bytes.len() as i32, data.len())?;
    data[range].copy_from_slice(bytes);
    Ok(())
}

fn linker_err(e: anyhow::Error) -> LoadErrorKind {
    LoadErrorKind::Instantiation(format!("failed to define host function: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wasmtime::StoreLimitsBuilder;

    fn state() -> HostState {
        HostState::new("test.bundle", StoreLimitsBuilder::new().build())
    }

    #[test]
    fn numeric_input_accepts_numbers_and_numeric_strings() {
        let mut s = state();
        s.begin_call(json!({"a": 10, "b": "5.5", "c": "x"}));
        assert_eq!(s.input_number("a"), 10.0);
        assert_eq!(s.input_number("b"), 5.5);
        assert!(s.input_number("c").is_nan());
        assert!(s.input_number("missing").is_nan());
    }

    #[test]
    fn string_comparison_ignores_ascii_case() {
        let mut s = state();
        s.begin_call(json!({"operation": "ADD"}));
        assert!(s.input_str_eq("operation", "add"));
        assert!(!s.input_str_eq("operation", "subtract"));
        assert!(!s.input_str_eq("other", "add"));
    }

    #[test]
    fn non_object_input_has_no_fields() {
        let mut s = state();
        s.begin_call(json!([1, 2, 3]));
        assert!(s.input_number("0").is_nan());
        assert_eq!(s.input_json, "[1,2,3]");
    }

    #[test]
    fn raw_output_wins_over_fields() {
        let mut s = state();
        s.begin_call(Value::Null);
        s.fields.insert("result".into(), json!(1));
        s.raw_output = Some(r#"{"echo":true}"#.into());
        assert_eq!(s.take_output().unwrap(), json!({"echo": true}));
    }

    #[test]
    fn invalid_raw_output_is_a_fault() {
        let mut s = state();
        s.begin_call(Value::Null);
        s.raw_output = Some("{not json".into());
        assert!(s.take_output().is_err());
    }

    #[test]
    fn empty_output_is_null() {
        let mut s = state();
        s.begin_call(json!({"x": 1}));
        assert_eq!(s.take_output().unwrap(), Value::Null);
    }

    #[test]
    fn begin_call_clears_previous_results() {
        let mut s = state();
        s.fields.insert("result".into(), json!(2));
        s.error = Some("boom".into());
        s.begin_call(Value::Null);
        assert!(s.take_error().is_none());
        assert_eq!(s.take_output().unwrap(), Value::Null);
    }

    #[test]
    fn guest_range_rejects_out_of_bounds() {
        assert!(guest_range(0, 4, 4).is_ok());
        assert!(guest_range(2, 4, 4).is_err());
        assert!(guest_range(-1, 1, 4).is_err());
        assert!(guest_range(0, -1, 4).is_err());
    }
}
