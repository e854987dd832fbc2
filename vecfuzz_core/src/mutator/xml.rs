//! Structural mutators for XML documents.
//!
//! Documents are read into a small element tree with `xml-rs` and written back
//! without a declaration. Comments and processing instructions are dropped.
//! Tag and attribute names are emitted verbatim, so a mutation that puts
//! markup characters in a name produces deliberately malformed output.

use super::{Mutator, bounded, expanded_len};
use crate::format::is_xml;
use crate::params::{Params, reduce};
use ::xml::escape::{escape_str_attribute, escape_str_pcdata};
use ::xml::name::OwnedName;
use ::xml::reader::{EventReader, XmlEvent};

const MAX_REPEAT: usize = 10_000;
const TAG: &str = "<tag>";
const HREF: &str = "https://fuzz.invalid/";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn parse(input: &[u8]) -> Option<Element> {
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        for event in EventReader::new(input) {
            match event.ok()? {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => stack.push(Element {
                    name: qualified(&name),
                    attributes: attributes
                        .into_iter()
                        .map(|a| (qualified(&a.name), a.value))
                        .collect(),
                    children: Vec::new(),
                }),
                XmlEvent::EndElement { .. } => {
                    let done = stack.pop()?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(done)),
                        None => root = Some(done),
                    }
                }
                XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    }
                }
                _ => {}
            }
        }
        root
    }

    /// Visits this element and every descendant element, parents first.
    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.for_each_mut(f);
            }
        }
    }

    fn for_each_descendant_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.for_each_mut(f);
            }
        }
    }

    fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        self.render_into(&mut out);
        out.into_bytes()
    }

    fn render_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_str_attribute(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.render_into(out),
                Node::Text(text) => out.push_str(&escape_str_pcdata(text)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn qualified(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{prefix}:{}", name.local_name),
        None => name.local_name.clone(),
    }
}

/// `le(0)` bytes 2..5 reduced modulo the input length and capped.
fn repeat(input: &[u8], params: Params<'_>) -> usize {
    reduce(params.le(0, 2..5), input.len()).min(MAX_REPEAT)
}

/// Guards, checks the `len * repeat` budget, parses, edits and renders.
fn rewrite<F>(input: &[u8], count: usize, edit: F) -> Vec<u8>
where
    F: FnOnce(&mut Element),
{
    if expanded_len(input.len(), count).is_none() || !is_xml(input) {
        return input.to_vec();
    }
    let Some(mut root) = Element::parse(input) else {
        return input.to_vec();
    };
    edit(&mut root);
    bounded(input, root.render())
}

/// Emits a fresh document of `n` nested `<tag>` and `<input>` pairs. Not gated on the input format.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlNestedTagsMutator;

impl Mutator for XmlNestedTagsMutator {
    fn name(&self) -> &'static str {
        "Repeated tag in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        if n == 0 {
            return input.to_vec();
        }
        let doc = format!(
            "{}{}{}{}",
            "<tag>".repeat(n),
            "<input>".repeat(n),
            "</input>".repeat(n),
            "</tag>".repeat(n)
        );
        bounded(input, doc.into_bytes())
    }
}

/// Replaces the attributes of every element with a single oversized one.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlAttributeMutator;

impl Mutator for XmlAttributeMutator {
    fn name(&self) -> &'static str {
        "Change attributes for tags in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        let value = "</tag>".repeat(n);
        rewrite(input, n, |root| {
            root.for_each_mut(&mut |element| {
                element.attributes = vec![(TAG.to_string(), value.clone())];
            })
        })
    }
}

/// Replaces every `href` attribute value with a repeated URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlHrefMutator;

impl Mutator for XmlHrefMutator {
    fn name(&self) -> &'static str {
        "Change 'href' attributes in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        let url = HREF.repeat(n);
        rewrite(input, n, |root| {
            root.for_each_mut(&mut |element| {
                for (key, value) in &mut element.attributes {
                    if key == "href" {
                        *value = url.clone();
                    }
                }
            })
        })
    }
}

/// Renames every element below the root to `<tag>` repeated.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlRenameTagsMutator;

impl Mutator for XmlRenameTagsMutator {
    fn name(&self) -> &'static str {
        "Change tag names in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        let name = TAG.repeat(n);
        rewrite(input, n, |root| {
            root.for_each_descendant_mut(&mut |element| element.name = name.clone())
        })
    }
}

/// Renames the root (and any element sharing its name) and appends the original tree to it.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlRootTagMutator;

impl Mutator for XmlRootTagMutator {
    fn name(&self) -> &'static str {
        "Repeat root tag in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        let name = TAG.repeat(n);
        // The renamed tags grow linearly, so only the final size is checked.
        rewrite(input, 1, |root| {
            let original = root.clone();
            root.for_each_mut(&mut |element| {
                if element.name == original.name {
                    element.name = name.clone();
                }
            });
            root.children.push(Node::Element(original));
        })
    }
}

/// Appends `n` copies of the whole tree to the root.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlRepeatChildrenMutator;

impl Mutator for XmlRepeatChildrenMutator {
    fn name(&self) -> &'static str {
        "Repeat the tree's children in xml"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let n = repeat(input, params);
        rewrite(input, n, |root| {
            let copy = root.clone();
            for _ in 0..n {
                root.children.push(Node::Element(copy.clone()));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::test_utils::coord;

    const DOC: &[u8] = br#"<root><a href="x">t</a><b k="v">u</b></root>"#;

    fn run(m: &dyn Mutator, input: &[u8], coords: &[f64]) -> String {
        String::from_utf8(m.mutate(input, Params::new(coords))).unwrap()
    }

    #[test]
    fn parse_and_render_keep_structure() {
        let root = Element::parse(DOC).unwrap();
        assert_eq!(root.render(), DOC);
        let empty = Element::parse(b"<r><e/></r>").unwrap();
        assert_eq!(empty.render(), b"<r><e/></r>");
    }

    #[test]
    fn nested_tags_ignores_input_format() {
        assert_eq!(
            run(&XmlNestedTagsMutator, b"hello world", &[coord(2)]),
            "<tag><tag><input><input></input></input></tag></tag>"
        );
        assert_eq!(
            XmlNestedTagsMutator.mutate(b"hello", Params::new(&[0.0])),
            b"hello"
        );
    }

    #[test]
    fn nested_tags_respects_budget() {
        let input = vec![b'x'; 5000];
        let coords = [coord(4000)];
        assert_eq!(XmlNestedTagsMutator.mutate(&input, Params::new(&coords)), input);
    }

    #[test]
    fn attributes_are_replaced_on_every_element() {
        let out = run(&XmlAttributeMutator, DOC, &[coord(2)]);
        assert!(out.starts_with("<root <tag>=\""), "{out}");
        assert!(!out.contains("href"));
        // three elements, two closing tags in each value
        assert_eq!(out.matches("/tag").count(), 6);
    }

    #[test]
    fn href_values_are_replaced() {
        assert_eq!(
            run(&XmlHrefMutator, DOC, &[coord(2)]),
            r#"<root><a href="https://fuzz.invalid/https://fuzz.invalid/">t</a><b k="v">u</b></root>"#
        );
    }

    #[test]
    fn rename_leaves_root_alone() {
        assert_eq!(
            run(&XmlRenameTagsMutator, DOC, &[coord(1)]),
            r#"<root><<tag> href="x">t</<tag>><<tag> k="v">u</<tag>></root>"#
        );
    }

    #[test]
    fn root_tag_is_renamed_and_tree_appended() {
        assert_eq!(
            run(&XmlRootTagMutator, b"<r><c>x</c></r>", &[coord(1)]),
            "<<tag>><c>x</c><r><c>x</c></r></<tag>>"
        );
    }

    #[test]
    fn repeat_children_appends_copies() {
        assert_eq!(
            run(&XmlRepeatChildrenMutator, b"<r><c/></r>", &[coord(2)]),
            "<r><c/><r><c/></r><r><c/></r></r>"
        );
    }

    #[test]
    fn malformed_xml_passes_through() {
        let input = b"<root><a></root>";
        for m in [
            &XmlAttributeMutator as &dyn Mutator,
            &XmlHrefMutator,
            &XmlRenameTagsMutator,
            &XmlRootTagMutator,
            &XmlRepeatChildrenMutator,
        ] {
            assert_eq!(m.mutate(input, Params::new(&[coord(1)])), input);
        }
    }
}
