//! Mutators for JSON documents.
//!
//! Each one parses the input into a [`JsonNode`] tree, addresses a node by
//! its depth-first ordinal among nodes of one kind, rewrites it and renders
//! the tree back. Inputs the JSON guard rejects pass through unchanged.

use super::{Mutator, bounded, expanded_len, extremize};
use crate::format::is_json;
use crate::json_node::{Entries, JsonNode, NodeKind};
use crate::params::{Params, reduce};

/// Parses `input`, lets `edit` rewrite the tree and renders the result.
///
/// `edit` returns `false` when it had nothing to change, in which case the
/// input is returned byte for byte.
fn rewrite<F>(input: &[u8], edit: F) -> Vec<u8>
where
    F: FnOnce(&mut JsonNode) -> bool,
{
    if !is_json(input) {
        tracing::trace!("json guard rejected input");
        return input.to_vec();
    }
    let Some(mut root) = JsonNode::parse(input) else {
        return input.to_vec();
    };
    if !edit(&mut root) {
        return input.to_vec();
    }
    bounded(input, root.render().into_bytes())
}

/// Picks the `le(0)`-th node of `kind`, wrapping around the number of such nodes.
fn pick(root: &JsonNode, kind: NodeKind, params: Params<'_>) -> Option<usize> {
    let count = root.count(kind);
    (count > 0).then(|| reduce(params.le(0, 2..4), count))
}

/// Scales an integer by a float factor, truncating toward zero.
///
/// The product is not clamped to 64 bits; only products past the `i128` range saturate.
fn scale_int(value: i128, factor: f64) -> i128 {
    (value as f64 * factor) as i128
}

/// Multiplies an integer by `signed(1) * le(1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonIntMutator;

impl Mutator for JsonIntMutator {
    fn name(&self) -> &'static str {
        "Change an int in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let factor = params.signed(1) * params.le(1, 2..4) as f64;
        rewrite(input, |root| {
            let Some(n) = pick(root, NodeKind::Int, params) else {
                return false;
            };
            root.modify_nth(NodeKind::Int, n, |node| {
                if let JsonNode::Int(v) = node {
                    *v = scale_int(*v, factor);
                }
            })
        })
    }
}

/// Multiplies an integer by `i64::MIN`, `0` or `i64::MAX` at the extremes of `signed(1)`,
/// or scales it by `signed(1)` in between.
///
/// The product is exact, so any value other than -1, 0 and 1 leaves the 64-bit range.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExtremeIntMutator;

impl Mutator for JsonExtremeIntMutator {
    fn name(&self) -> &'static str {
        "Change an int to extreme values in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let signed = params.signed(1);
        let extreme = extremize(signed, i128::from(i64::MIN), 0, i128::from(i64::MAX));
        rewrite(input, |root| {
            let Some(n) = pick(root, NodeKind::Int, params) else {
                return false;
            };
            root.modify_nth(NodeKind::Int, n, |node| {
                if let JsonNode::Int(v) = node {
                    *v = match extreme {
                        Some(multiplier) => v.saturating_mul(multiplier),
                        None => scale_int(*v, signed),
                    };
                }
            })
        })
    }
}

/// Multiplies a float by `-inf`, `0` or `+inf`, or by `signed(1)` in between.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFloatInfMutator;

impl Mutator for JsonFloatInfMutator {
    fn name(&self) -> &'static str {
        "Change a float to +-inf in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let signed = params.signed(1);
        let factor =
            extremize(signed, f64::NEG_INFINITY, 0.0, f64::INFINITY).unwrap_or(signed);
        rewrite(input, |root| {
            let Some(n) = pick(root, NodeKind::Float, params) else {
                return false;
            };
            root.modify_nth(NodeKind::Float, n, |node| {
                if let JsonNode::Float(v) = node {
                    *v *= factor;
                }
            })
        })
    }
}

/// Turns a float into NaN at either extreme of `signed(1)`, zero near the centre.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFloatNanMutator;

impl Mutator for JsonFloatNanMutator {
    fn name(&self) -> &'static str {
        "Change a float to nan in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let signed = params.signed(1);
        let factor = extremize(signed, f64::NAN, 0.0, f64::NAN).unwrap_or(signed);
        rewrite(input, |root| {
            let Some(n) = pick(root, NodeKind::Float, params) else {
                return false;
            };
            root.modify_nth(NodeKind::Float, n, |node| {
                if let JsonNode::Float(v) = node {
                    *v *= factor;
                }
            })
        })
    }
}

/// Repeats the elements of one array `le(1)` times; zero empties it.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepeatListMutator;

impl Mutator for JsonRepeatListMutator {
    fn name(&self) -> &'static str {
        "Repeat a list in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let count = params.le(1, 2..4) as usize;
        if expanded_len(input.len(), count).is_none() {
            return input.to_vec();
        }
        rewrite(input, |root| {
            let Some(n) = pick(root, NodeKind::Array, params) else {
                return false;
            };
            root.modify_nth(NodeKind::Array, n, |node| {
                if let JsonNode::Array(items) = node {
                    let repeated = items.len() * count;
                    *items = items.iter().cloned().cycle().take(repeated).collect();
                }
            })
        })
    }
}

/// Removes one array element or object member (count 0) or duplicates it in place.
///
/// Object members keep their key, so duplicates produce repeated keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRepeatEntryMutator;

impl Mutator for JsonRepeatEntryMutator {
    fn name(&self) -> &'static str {
        "Repeat a key in json"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let count = params.le(1, 2..4) as usize;
        if count == 1 || expanded_len(input.len(), count).is_none() {
            return input.to_vec();
        }
        rewrite(input, |root| {
            let entries = root.count_entries();
            if entries == 0 {
                return false;
            }
            let n = reduce(params.le(0, 2..4), entries);
            root.modify_nth_entry(n, |container, i| match container {
                Entries::Array(items) => {
                    let entry = items.remove(i);
                    for _ in 0..count {
                        items.insert(i, entry.clone());
                    }
                }
                Entries::Object(members) => {
                    let entry = members.remove(i);
                    for _ in 0..count {
                        members.insert(i, entry.clone());
                    }
                }
            })
        })
    }
}

/// Converts the `le(0)`-th node of one kind into another kind.
///
/// Both kinds are read from coordinate buckets: int up to 0.2, float up to
/// 0.4, string up to 0.6, array up to 0.8, object above.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonChangeTypeMutator;

impl JsonChangeTypeMutator {
    fn kind_for(unit: f64) -> NodeKind {
        if unit <= 0.2 {
            NodeKind::Int
        } else if unit <= 0.4 {
            NodeKind::Float
        } else if unit <= 0.6 {
            NodeKind::String
        } else if unit <= 0.8 {
            NodeKind::Array
        } else {
            NodeKind::Object
        }
    }
}

impl Mutator for JsonChangeTypeMutator {
    fn name(&self) -> &'static str {
        "Change a type in json"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let from = Self::kind_for(params.unit(1));
        let to = Self::kind_for(params.unit(2));
        if from == to {
            return input.to_vec();
        }
        rewrite(input, |root| {
            let Some(n) = pick(root, from, params) else {
                return false;
            };
            root.modify_nth(from, n, |node| {
                let converted = convert(node, to);
                *node = converted;
            })
        })
    }
}

/// Integer read from bytes 2..4 of `text`, little-endian, the way coordinates are decoded.
fn text_code(text: &str) -> i128 {
    text.as_bytes()
        .iter()
        .skip(2)
        .take(2)
        .rev()
        .fold(0i128, |acc, &b| (acc << 8) | i128::from(b))
}

fn singleton_object(text: String) -> JsonNode {
    JsonNode::Object(vec![(text.clone(), JsonNode::String(text))])
}

/// Converts a scalar or container to `to`, keeping as much of its content as the target allows.
fn convert(node: &JsonNode, to: NodeKind) -> JsonNode {
    let text = match node {
        JsonNode::String(s) => s.clone(),
        other => other.render(),
    };
    match (node, to) {
        (JsonNode::Int(v), NodeKind::Float) => JsonNode::Float(*v as f64),
        (JsonNode::Float(v), NodeKind::Int) => JsonNode::Int(*v as i128),
        (JsonNode::Array(items), NodeKind::String) => JsonNode::String(
            items
                .iter()
                .map(JsonNode::render)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (JsonNode::Object(members), NodeKind::Array) => {
            JsonNode::Array(members.iter().map(|(_, v)| v.clone()).collect())
        }
        (_, NodeKind::Int) => JsonNode::Int(text_code(&text)),
        (_, NodeKind::Float) => JsonNode::Float(text_code(&text) as f64),
        (_, NodeKind::String) => JsonNode::String(text),
        (_, NodeKind::Array) => JsonNode::Array(vec![node.clone()]),
        (_, NodeKind::Object) => singleton_object(text),
        (_, NodeKind::Null) => JsonNode::Null,
        (_, NodeKind::Bool) => JsonNode::Bool(!text.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::test_utils::coord;

    const DOC: &[u8] = br#"{"a": 3, "b": [1.5, 2], "c": "hello"}"#;

    fn run(m: &dyn Mutator, input: &[u8], coords: &[f64]) -> String {
        String::from_utf8(m.mutate(input, Params::new(coords))).unwrap()
    }

    #[test]
    fn non_json_passes_through() {
        let input = b"{broken";
        for m in [
            &JsonIntMutator as &dyn Mutator,
            &JsonExtremeIntMutator,
            &JsonFloatInfMutator,
            &JsonFloatNanMutator,
            &JsonRepeatListMutator,
            &JsonRepeatEntryMutator,
            &JsonChangeTypeMutator,
        ] {
            assert_eq!(m.mutate(input, Params::new(&[0.3, 0.6, 0.9])), input);
        }
    }

    #[test]
    fn int_mutator_scales_selected_int() {
        // Second int (n = 1). The factor coordinate is 0.75 with bytes 2..4
        // set to 4, so the factor is just over signed(0.75) * 4 = 2.
        let factor = f64::from_bits(0.75f64.to_bits() | (4 << 16));
        let out = run(&JsonIntMutator, DOC, &[coord(1), factor]);
        assert_eq!(out, r#"{"a": 3, "b": [1.5, 4], "c": "hello"}"#);
    }

    #[test]
    fn extreme_int_overflows_64_bits() {
        // 3 * i64::MAX and 3 * i64::MIN, written out exactly.
        let out = run(&JsonExtremeIntMutator, DOC, &[0.0, 1.0]);
        assert_eq!(
            out,
            r#"{"a": 27670116110564327421, "b": [1.5, 2], "c": "hello"}"#
        );
        let out = run(&JsonExtremeIntMutator, DOC, &[0.0, 0.0]);
        assert!(out.starts_with(r#"{"a": -27670116110564327424,"#), "{out}");
        let out = run(&JsonExtremeIntMutator, DOC, &[0.0, 0.5]);
        assert!(out.starts_with(r#"{"a": 0,"#));
        assert!(is_json(run(&JsonExtremeIntMutator, DOC, &[0.0, 1.0]).as_bytes()));
    }

    #[test]
    fn int_mutator_does_not_clamp_to_64_bits() {
        // i64::MAX * 2 (the factor sits just above 2 but truncation follows the f64 product).
        let doc = br#"[9223372036854775807]"#;
        let factor = f64::from_bits(0.75f64.to_bits() | (4 << 16));
        let out = run(&JsonIntMutator, doc, &[0.0, factor]);
        let value: i128 = out.trim_matches(|c| c == '[' || c == ']').parse().unwrap();
        assert!(value > i128::from(i64::MAX), "{out}");
    }

    #[test]
    fn float_inf_and_nan_render_bare_tokens() {
        let out = run(&JsonFloatInfMutator, DOC, &[0.0, 1.0]);
        assert!(out.contains("[Infinity, 2]"), "{out}");
        let out = run(&JsonFloatInfMutator, DOC, &[0.0, 0.0]);
        assert!(out.contains("[-Infinity, 2]"), "{out}");
        let out = run(&JsonFloatNanMutator, DOC, &[0.0, 1.0]);
        assert!(out.contains("[NaN, 2]"), "{out}");
        assert!(!is_json(out.as_bytes()));
    }

    #[test]
    fn documents_without_target_kind_are_unchanged() {
        let input = br#"{"k": "v"}"#;
        assert_eq!(JsonIntMutator.mutate(input, Params::new(&[0.1, 0.9])), input);
        assert_eq!(
            JsonFloatInfMutator.mutate(input, Params::new(&[0.1, 1.0])),
            input
        );
    }

    #[test]
    fn repeat_list_repeats_and_empties() {
        let out = run(&JsonRepeatListMutator, DOC, &[0.0, coord(3)]);
        assert_eq!(
            out,
            r#"{"a": 3, "b": [1.5, 2, 1.5, 2, 1.5, 2], "c": "hello"}"#
        );
        let out = run(&JsonRepeatListMutator, DOC, &[0.0, 0.0]);
        assert_eq!(out, r#"{"a": 3, "b": [], "c": "hello"}"#);
    }

    #[test]
    fn repeat_list_clones_strings_and_objects() {
        let doc = br#"{"l": ["s", {"k": [1]}]}"#;
        let out = run(&JsonRepeatListMutator, doc, &[0.0, coord(2)]);
        assert_eq!(out, r#"{"l": ["s", {"k": [1]}, "s", {"k": [1]}]}"#);
    }

    #[test]
    fn repeat_entry_duplicates_keys_and_removes() {
        let out = run(&JsonRepeatEntryMutator, DOC, &[0.0, coord(2)]);
        assert_eq!(
            out,
            r#"{"a": 3, "a": 3, "b": [1.5, 2], "c": "hello"}"#
        );
        // entry 3 is b[1]
        let out = run(&JsonRepeatEntryMutator, DOC, &[coord(3), 0.0]);
        assert_eq!(out, r#"{"a": 3, "b": [1.5], "c": "hello"}"#);
    }

    #[test]
    fn repeat_entry_respects_budget() {
        let big = format!("[{}]", vec!["1"; 3000].join(","));
        let coords = [0.0, coord(5000)];
        assert_eq!(
            JsonRepeatEntryMutator.mutate(big.as_bytes(), Params::new(&coords)),
            big.as_bytes()
        );
    }

    #[test]
    fn change_type_converts_between_kinds() {
        // int -> string
        let out = run(&JsonChangeTypeMutator, DOC, &[0.0, 0.1, 0.5]);
        assert_eq!(out, r#"{"a": "3", "b": [1.5, 2], "c": "hello"}"#);
        // string -> array
        let out = run(&JsonChangeTypeMutator, DOC, &[0.0, 0.5, 0.7]);
        assert_eq!(out, r#"{"a": 3, "b": [1.5, 2], "c": ["hello"]}"#);
        // float -> int
        let out = run(&JsonChangeTypeMutator, DOC, &[0.0, 0.3, 0.1]);
        assert_eq!(out, r#"{"a": 3, "b": [1, 2], "c": "hello"}"#);
        // string -> int uses bytes 2..4 of the text: "ll" = 0x6c6c
        let out = run(&JsonChangeTypeMutator, DOC, &[0.0, 0.5, 0.1]);
        assert_eq!(out, r#"{"a": 3, "b": [1.5, 2], "c": 27756}"#);
        // same kind is identity
        assert_eq!(
            JsonChangeTypeMutator.mutate(DOC, Params::new(&[0.0, 0.1, 0.1])),
            DOC
        );
    }
}
