//! Minimal owned XML tree for writing scene documents, plus the text helpers
//! shared by the component readers.

use std::fmt::{self, Write as _};

use glam::{Vec2, Vec3, Vec4};
use roxmltree::Node;

use crate::error::{SceneError, SceneResult};

/// Deepest nesting level that still gets its own indentation.
const MAX_INDENT_DEPTH: usize = 16;
const INDENT: &str = "                                ";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Element holding only text, e.g. `<Radius>0.5</Radius>`.
    pub fn text_element(name: impl Into<String>, text: impl ToString) -> Self {
        Self::new(name).with_text(text.to_string())
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Renders a standalone document with an XML declaration.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.write_indented(&mut out);
        out
    }

    fn write_indented(&self, out: &mut String) {
        let mut pending = vec![Step::Open(self, 0)];
        while let Some(step) = pending.pop() {
            match step {
                Step::Open(element, depth) => {
                    let indent = indent(depth);
                    let _ = write!(out, "{indent}<{}", element.name);
                    for (key, value) in &element.attributes {
                        let _ = write!(out, " {key}=\"{}\"", escape(value));
                    }
                    match (&element.text, element.children.is_empty()) {
                        (None, true) => out.push_str("/>\n"),
                        (Some(text), true) => {
                            let _ = writeln!(out, ">{}</{}>", escape(text), element.name);
                        }
                        (text, false) => {
                            out.push_str(">\n");
                            if let Some(text) = text {
                                let _ = writeln!(out, "{indent}  {}", escape(text));
                            }
                            pending.push(Step::Close(element, depth));
                            pending.extend(
                                element
                                    .children
                                    .iter()
                                    .rev()
                                    .map(|child| Step::Open(child, depth + 1)),
                            );
                        }
                    }
                }
                Step::Close(element, depth) => {
                    let _ = writeln!(out, "{}</{}>", indent(depth), element.name);
                }
            }
        }
    }
}

enum Step<'a> {
    Open(&'a XmlElement, usize),
    Close(&'a XmlElement, usize),
}

fn indent(depth: usize) -> &'static str {
    &INDENT[..2 * depth.min(MAX_INDENT_DEPTH)]
}

// Deeply nested trees are torn down level by level instead of recursively.
impl Drop for XmlElement {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut element) = pending.pop() {
            pending.append(&mut element.children);
        }
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_indented(&mut out);
        f.write_str(&out)
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub(crate) fn format_vec2(value: Vec2) -> String {
    format!("{} {}", value.x, value.y)
}

pub(crate) fn format_vec3(value: Vec3) -> String {
    format!("{} {} {}", value.x, value.y, value.z)
}

pub(crate) fn format_vec4(value: Vec4) -> String {
    format!("{} {} {} {}", value.x, value.y, value.z, value.w)
}

pub(crate) fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

/// Text of `tag` exactly as written, for free-form string fields.
pub(crate) fn verbatim_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .map(|child| child.text().unwrap_or_default().to_string())
}

pub(crate) fn required_text(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
) -> SceneResult<String> {
    optional_text(node, tag).ok_or(SceneError::MissingField {
        element,
        field: tag,
    })
}

/// Reads `tag` as a value of `T`, falling back to `default` when absent.
pub(crate) fn parse_field<T>(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
    default: T,
) -> SceneResult<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match optional_text(node, tag) {
        Some(value) => value.parse::<T>().map_err(|err| SceneError::InvalidValue {
            element,
            field: tag,
            message: format!("`{value}`: {err}"),
        }),
        None => Ok(default),
    }
}

fn parse_floats<const N: usize>(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
) -> SceneResult<Option<[f32; N]>> {
    let Some(value) = optional_text(node, tag) else {
        return Ok(None);
    };
    let invalid = |message: String| SceneError::InvalidValue {
        element,
        field: tag,
        message,
    };
    let mut numbers = [0.0; N];
    let mut parts = value.split_whitespace();
    for slot in numbers.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| invalid(format!("expected {N} components in `{value}`")))?;
        *slot = part
            .parse::<f32>()
            .map_err(|err| invalid(format!("`{part}`: {err}")))?;
    }
    Ok(Some(numbers))
}

pub(crate) fn parse_vec2(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
    default: Vec2,
) -> SceneResult<Vec2> {
    Ok(parse_floats::<2>(node, element, tag)?.map_or(default, Vec2::from_array))
}

pub(crate) fn parse_vec3(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
    default: Vec3,
) -> SceneResult<Vec3> {
    Ok(parse_floats::<3>(node, element, tag)?.map_or(default, Vec3::from_array))
}

pub(crate) fn parse_vec4(
    node: &Node<'_, '_>,
    element: &'static str,
    tag: &'static str,
    default: Vec4,
) -> SceneResult<Vec4> {
    Ok(parse_floats::<4>(node, element, tag)?.map_or(default, Vec4::from_array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roxmltree::Document;

    #[test]
    fn written_documents_parse_back() {
        let element = XmlElement::new("Entity")
            .with_attribute("id", 3)
            .with_child(XmlElement::text_element("Name", "Fish & <Chips> \"quoted\""))
            .with_child(XmlElement::new("Children"));
        let text = element.to_document();
        let document = Document::parse(&text).unwrap();
        let root = document.root_element();
        assert_eq!(root.tag_name().name(), "Entity");
        assert_eq!(root.attribute("id"), Some("3"));
        assert_eq!(
            optional_text(&root, "Name").as_deref(),
            Some("Fish & <Chips> \"quoted\"")
        );
    }

    #[test]
    fn empty_elements_are_self_closing() {
        assert_eq!(XmlElement::new("Children").to_string(), "<Children/>\n");
    }

    #[test]
    fn deep_trees_write_with_bounded_indentation() {
        let depth = 20_000;
        let mut element = XmlElement::text_element("Leaf", "end");
        for _ in 0..depth {
            element = XmlElement::new("Node").with_child(element);
        }
        let text = element.to_document();
        let widest = text.lines().map(|line| line.len() - line.trim_start().len()).max();
        assert_eq!(widest, Some(2 * MAX_INDENT_DEPTH));
        assert_eq!(text.matches("<Node>").count(), depth);
        assert!(text.contains("<Leaf>end</Leaf>"));
        drop(element);
    }

    #[test]
    fn verbatim_text_keeps_whitespace() {
        let element = XmlElement::new("Sprite")
            .with_child(XmlElement::text_element("Texture", "  art/tile 01.png \r\n"))
            .with_child(XmlElement::text_element("Empty", ""));
        let text = element.to_document();
        let document = Document::parse(&text).unwrap();
        let root = document.root_element();
        assert_eq!(
            verbatim_text(&root, "Texture").as_deref(),
            Some("  art/tile 01.png \r\n")
        );
        assert_eq!(verbatim_text(&root, "Empty").as_deref(), Some(""));
        assert_eq!(verbatim_text(&root, "Missing"), None);
        assert_eq!(optional_text(&root, "Texture").as_deref(), Some("art/tile 01.png"));
    }

    #[test]
    fn vectors_use_whitespace_separated_text() {
        let document =
            Document::parse("<T><Position>1 2.5 -3</Position><Offset>1</Offset></T>").unwrap();
        let root = document.root_element();
        let position = parse_vec3(&root, "T", "Position", Vec3::ZERO).unwrap();
        assert_eq!(position, Vec3::new(1.0, 2.5, -3.0));
        assert_eq!(parse_vec3(&root, "T", "Scale", Vec3::ONE).unwrap(), Vec3::ONE);
        assert!(matches!(
            parse_vec2(&root, "T", "Offset", Vec2::ZERO),
            Err(SceneError::InvalidValue { field: "Offset", .. })
        ));
    }

    #[test]
    fn formatted_floats_survive_parsing() {
        let value = Vec3::new(0.1, 1.0 / 3.0, -2.75e-7);
        let text = format!("<T><V>{}</V></T>", format_vec3(value));
        let document = Document::parse(&text).unwrap();
        let parsed = parse_vec3(&document.root_element(), "T", "V", Vec3::ZERO).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn required_text_reports_missing_fields() {
        let document = Document::parse("<Primitive/>").unwrap();
        let err = required_text(&document.root_element(), "Primitive", "Shape").unwrap_err();
        assert!(matches!(
            err,
            SceneError::MissingField {
                element: "Primitive",
                field: "Shape"
            }
        ));
    }
}
