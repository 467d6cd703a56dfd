// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WAT sources of fixture plugins.
//!
//! Every fixture implements the plugin contract: it exports `memory`,
//! `identity`, `start`, `stop` and `execute`, and imports what it needs from
//! the `plughost` host module.

/// Arithmetic on `a` and `b` selected by `operation`
/// (`add`, `subtract`, `multiply`, `divide`). Writes `result`.
///
/// Refuses to execute before `start`. Division by zero and unknown operations
/// fail through `set_error`.
pub const CALCULATOR_WAT: &str = r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))
  (import "plughost" "set_error" (func $set_error (param i32 i32)))
  (import "plughost" "input_number" (func $input_number (param i32 i32) (result f64)))
  (import "plughost" "input_str_eq" (func $input_str_eq (param i32 i32 i32 i32) (result i32)))
  (import "plughost" "output_number" (func $output_number (param i32 i32 f64)))
  (import "plughost" "log" (func $log (param i32 i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "Calculator Plugin")
  (data (i32.const 32) "1.0.0")
  (data (i32.const 48) "Basic arithmetic on two operands")
  (data (i32.const 128) "operation")
  (data (i32.const 144) "add")
  (data (i32.const 152) "subtract")
  (data (i32.const 168) "multiply")
  (data (i32.const 184) "divide")
  (data (i32.const 192) "a")
  (data (i32.const 196) "b")
  (data (i32.const 200) "result")
  (data (i32.const 208) "division by zero")
  (data (i32.const 232) "unsupported operation")
  (data (i32.const 256) "not started")
  (data (i32.const 272) "calculator started")

  (global $started (mut i32) (i32.const 0))

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const 17)
      (i32.const 32) (i32.const 5)
      (i32.const 48) (i32.const 32)))

  (func (export "start") (result i32)
    (global.set $started (i32.const 1))
    (call $log (i32.const 2) (i32.const 272) (i32.const 18))
    (i32.const 0))

  (func (export "stop") (result i32)
    (global.set $started (i32.const 0))
    (i32.const 0))

  (func $is_op (param $ptr i32) (param $len i32) (result i32)
    (call $input_str_eq (i32.const 128) (i32.const 9) (local.get $ptr) (local.get $len)))

  (func $emit (param $value f64) (result i32)
    (call $output_number (i32.const 200) (i32.const 6) (local.get $value))
    (i32.const 0))

  (func (export "execute") (result i32)
    (local $a f64)
    (local $b f64)
    (if (i32.eqz (global.get $started))
      (then
        (call $set_error (i32.const 256) (i32.const 11))
        (return (i32.const 1))))
    (local.set $a (call $input_number (i32.const 192) (i32.const 1)))
    (local.set $b (call $input_number (i32.const 196) (i32.const 1)))

    (if (call $is_op (i32.const 144) (i32.const 3))
      (then (return (call $emit (f64.add (local.get $a) (local.get $b))))))
    (if (call $is_op (i32.const 152) (i32.const 8))
      (then (return (call $emit (f64.sub (local.get $a) (local.get $b))))))
    (if (call $is_op (i32.const 168) (i32.const 8))
      (then (return (call $emit (f64.mul (local.get $a) (local.get $b))))))
    (if (call $is_op (i32.const 184) (i32.const 6))
      (then
        (if (f64.eq (local.get $b) (f64.const 0))
          (then
            (call $set_error (i32.const 208) (i32.const 16))
            (return (i32.const 1))))
        (return (call $emit (f64.div (local.get $a) (local.get $b))))))

    (call $set_error (i32.const 232) (i32.const 21))
    (i32.const 1))
)
"#;

/// Returns its input unchanged through `output_write`.
pub const ECHO_WAT: &str = r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))
  (import "plughost" "input_len" (func $input_len (result i32)))
  (import "plughost" "input_read" (func $input_read (param i32)))
  (import "plughost" "output_write" (func $output_write (param i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "Echo Plugin")
  (data (i32.const 16) "0.1.0")
  (data (i32.const 32) "Returns its input unchanged")

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const 11)
      (i32.const 16) (i32.const 5)
      (i32.const 32) (i32.const 27)))

  (func (export "start") (result i32) (i32.const 0))
  (func (export "stop") (result i32) (i32.const 0))

  (func (export "execute") (result i32)
    (local $len i32)
    (local.set $len (call $input_len))
    (call $input_read (i32.const 1024))
    (call $output_write (i32.const 1024) (local.get $len))
    (i32.const 0))
)
"#;

/// `start` fails with "database unavailable".
pub const FAILING_START_WAT: &str = r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))
  (import "plughost" "set_error" (func $set_error (param i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "Failing Plugin")
  (data (i32.const 16) "0.0.1")
  (data (i32.const 32) "database unavailable")

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const 14)
      (i32.const 16) (i32.const 5)
      (i32.const 0) (i32.const 0)))

  (func (export "start") (result i32)
    (call $set_error (i32.const 32) (i32.const 20))
    (i32.const 1))

  (func (export "stop") (result i32) (i32.const 0))
  (func (export "execute") (result i32) (i32.const 0))
)
"#;

/// `execute` hits `unreachable`.
pub const TRAPPING_WAT: &str = r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "Trap Plugin")
  (data (i32.const 16) "0.0.1")

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const 11)
      (i32.const 16) (i32.const 5)
      (i32.const 0) (i32.const 0)))

  (func (export "start") (result i32) (i32.const 0))
  (func (export "stop") (result i32) (i32.const 0))
  (func (export "execute") (result i32) unreachable)
)
"#;

/// Implements the contract but never calls `set_identity`.
pub const NO_IDENTITY_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "identity"))
  (func (export "start") (result i32) (i32.const 0))
  (func (export "stop") (result i32) (i32.const 0))
  (func (export "execute") (result i32) (i32.const 0))
)
"#;

/// A library unit with no contract. Bundle it as `math_helpers.wasm`.
pub const MATH_HELPERS_WAT: &str = r#"
(module
  (func (export "double") (param f64) (result f64)
    (f64.mul (local.get 0) (f64.const 2)))
)
"#;

/// Doubles `value` by calling `double` from the `math_helpers` sibling unit.
pub const DOUBLER_WAT: &str = r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))
  (import "plughost" "input_number" (func $input_number (param i32 i32) (result f64)))
  (import "plughost" "output_number" (func $output_number (param i32 i32 f64)))
  (import "math_helpers" "double" (func $double (param f64) (result f64)))

  (memory (export "memory") 1)
  (data (i32.const 0) "Doubler Plugin")
  (data (i32.const 32) "1.0.0")
  (data (i32.const 48) "Doubles a value using a helper unit")
  (data (i32.const 128) "value")
  (data (i32.const 144) "result")

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const 14)
      (i32.const 32) (i32.const 5)
      (i32.const 48) (i32.const 35)))

  (func (export "start") (result i32) (i32.const 0))
  (func (export "stop") (result i32) (i32.const 0))

  (func (export "execute") (result i32)
    (call $output_number
      (i32.const 144) (i32.const 6)
      (call $double (call $input_number (i32.const 128) (i32.const 5))))
    (i32.const 0))
)
"#;

/// A minimal plugin reporting `name` and `version`, whose `execute`
/// returns `{"plugin": "<name>"}`.
///
/// `name` and `version` must not contain `"` or `\`.
pub fn plugin_wat(name: &str, version: &str) -> String {
    let output = format!(r#"{{"plugin":"{name}"}}"#);
    let escaped_output = output.replace('"', "\\\"");
    format!(
        r#"
(module
  (import "plughost" "set_identity" (func $set_identity (param i32 i32 i32 i32 i32 i32)))
  (import "plughost" "output_write" (func $output_write (param i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "{name}")
  (data (i32.const 512) "{version}")
  (data (i32.const 1024) "{escaped_output}")

  (func (export "identity")
    (call $set_identity
      (i32.const 0) (i32.const {name_len})
      (i32.const 512) (i32.const {version_len})
      (i32.const 0) (i32.const 0)))

  (func (export "start") (result i32) (i32.const 0))
  (func (export "stop") (result i32) (i32.const 0))

  (func (export "execute") (result i32)
    (call $output_write (i32.const 1024) (i32.const {output_len}))
    (i32.const 0))
)
"#,
        name_len = name.len(),
        version_len = version.len(),
        output_len = output.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_parse() {
        for (label, source) in [
            ("calculator", CALCULATOR_WAT),
            ("echo", ECHO_WAT),
            ("failing", FAILING_START_WAT),
            ("trapping", TRAPPING_WAT),
            ("no identity", NO_IDENTITY_WAT),
            ("helpers", MATH_HELPERS_WAT),
            ("doubler", DOUBLER_WAT),
        ] {
            assert!(wat::parse_str(source).is_ok(), "{label} fixture should parse");
        }
    }

    #[test]
    fn generated_plugin_parses() {
        let source = plugin_wat("alpha", "2.0.0");
        assert!(source.contains(r#"{\"plugin\":\"alpha\"}"#));
        assert!(wat::parse_str(&source).is_ok());
    }
}
