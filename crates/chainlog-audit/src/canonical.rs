//! Canonical JSON serialization of the signable payload.
//!
//! The same bytes feed both the chain hash and the HMAC, at append time and
//! again at verification time, so the encoding is fixed here and nowhere
//! else:
//!
//! - object keys sorted by code point, recursively;
//! - no whitespace between tokens (`,` and `:` separators);
//! - strings in UTF-8 with non-ASCII characters written literally, only
//!   `"`, `\` and control characters escaped;
//! - numbers exactly as `serde_json` writes them.
//!
//! Key order is enforced explicitly rather than relying on `serde_json::Map`
//! being a `BTreeMap`, which changes if any crate in the build enables the
//! `preserve_order` feature.

use serde_json::Value;

use chainlog_contracts::record::BasePayload;

/// Serialize `value` canonically.
pub fn canonical_json(value: &Value) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Canonical bytes of a typed payload.
pub fn canonical_payload(base: &BasePayload) -> serde_json::Result<Vec<u8>> {
    canonical_json(&base.to_value())
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> serde_json::Result<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(child, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(child, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::canonical_json;

    fn canon(value: &Value) -> String {
        String::from_utf8(canonical_json(value).unwrap()).unwrap()
    }

    #[test]
    fn keys_are_sorted_and_compact() {
        let value = json!({"zeta": 1, "alpha": {"b": [1, 2, {"y": null, "x": true}], "a": "s"}});
        assert_eq!(
            canon(&value),
            r#"{"alpha":{"a":"s","b":[1,2,{"x":true,"y":null}]},"zeta":1}"#
        );
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut first = Map::new();
        first.insert("event".into(), json!("login"));
        first.insert("critical".into(), json!(false));
        first.insert("details".into(), json!({"ip": "10.0.0.1", "port": 22}));

        let mut second = Map::new();
        second.insert("details".into(), json!({"port": 22, "ip": "10.0.0.1"}));
        second.insert("critical".into(), json!(false));
        second.insert("event".into(), json!("login"));

        assert_eq!(
            canonical_json(&Value::Object(first)).unwrap(),
            canonical_json(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn non_ascii_is_preserved_literally() {
        let value = json!({"name": "Zoë ✓ 東京"});
        assert_eq!(canon(&value), "{\"name\":\"Zoë ✓ 東京\"}");
    }

    #[test]
    fn control_characters_and_quotes_are_escaped() {
        let value = json!({"s": "a\"b\\c\nd\u{1f}"});
        assert_eq!(canon(&value), r#"{"s":"a\"b\\c\nd\u001f"}"#);
    }

    #[test]
    fn keys_sort_by_code_point() {
        let value = json!({"b": 1, "B": 2, "é": 3, "a": 4});
        assert_eq!(canon(&value), r#"{"B":2,"a":4,"b":1,"é":3}"#);
    }

    #[test]
    fn numbers_keep_their_serde_json_form() {
        let value = json!({"i": -7, "u": 18446744073709551615u64, "f": 1.5});
        assert_eq!(canon(&value), r#"{"f":1.5,"i":-7,"u":18446744073709551615}"#);
    }
}
