//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! A reversible textual interchange transform for [`crate::ndf::Graph`]:
//! every property element's tag equals its property name, scalars carry
//! `value`, vectors carry `x,y,z,w`, color carries `r,g,b,a`, wide strings
//! carry `str`, GUID/hash/loc-hash carry uppercase hex in `guid`/`hash`,
//! references carry `referenceType` plus `object`/`import`, and every
//! element carries `typeId`. `List` nests its items directly as
//! `ListItem` elements, `Map` wraps each pair in `MapItem`/`Key`/`Value`,
//! `Pair` uses `First`/`Second`.
//!
//! This is a small hand-rolled reader/writer for exactly this vocabulary,
//! not a general-purpose XML library: the only consumer is this crate's
//! own property model, not arbitrary third-party documents, so there's
//! no need for a full parser.

use crate::error::{Error, Result};
use crate::ndf::{
    Color, F32Vec2, F32Vec3, F32Vec4, Graph, ImportReference, Object, ObjectReference, Property,
    PropertyType, S32Vec2, S32Vec3,
};

// -- writer ---------------------------------------------------------------

struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.push((key.to_string(), value.into()));
        self
    }

    fn child(mut self, element: Element) -> Self {
        self.children.push(element);
        self
    }

    fn render(&self, out: &mut String, indent: usize) {
        out.push_str(&"  ".repeat(indent));
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>\n");
            return;
        }
        out.push_str(">\n");
        for child in &self.children {
            child.render(out, indent + 1);
        }
        out.push_str(&"  ".repeat(indent));
        out.push_str("</");
        out.push_str(&self.tag);
        out.push_str(">\n");
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn property_to_element(name: &str, value: &Property) -> Element {
    let type_id = value.property_type().tag().to_string();
    let element = Element::new(name).attr("typeId", type_id);
    match value {
        Property::Bool(v) => element.attr("value", v.to_string()),
        Property::UInt8(v) => element.attr("value", v.to_string()),
        Property::Int32(v) => element.attr("value", v.to_string()),
        Property::UInt32(v) => element.attr("value", v.to_string()),
        Property::Int16(v) => element.attr("value", v.to_string()),
        Property::UInt16(v) => element.attr("value", v.to_string()),
        Property::Float32(v) => element.attr("value", v.into_inner().to_string()),
        Property::Float64(v) => element.attr("value", v.into_inner().to_string()),
        Property::String(v) => element.attr("value", v.clone()),
        Property::PathReference(v) => element.attr("value", v.clone()),
        Property::WideString(v) => element.attr("str", v.clone()),
        Property::ObjectReference(reference) => {
            let element = element.attr("referenceType", "object");
            match reference {
                ObjectReference::Object(name) => element.attr("object", name.clone()),
                ObjectReference::Dangling => element.attr("dangling", "true"),
            }
        }
        Property::ImportReference(reference) => {
            let element = element.attr("referenceType", "import");
            match reference {
                ImportReference::Import(path) => element.attr("import", path.clone()),
                ImportReference::Dangling => element.attr("dangling", "true"),
            }
        }
        Property::F32Vec3(F32Vec3 { x, y, z }) => element
            .attr("x", x.to_string())
            .attr("y", y.to_string())
            .attr("z", z.to_string()),
        Property::F32Vec4(F32Vec4 { x, y, z, w }) => element
            .attr("x", x.to_string())
            .attr("y", y.to_string())
            .attr("z", z.to_string())
            .attr("w", w.to_string()),
        Property::F32Vec2(F32Vec2 { x, y }) => {
            element.attr("x", x.to_string()).attr("y", y.to_string())
        }
        Property::S32Vec3(S32Vec3 { x, y, z }) => element
            .attr("x", x.to_string())
            .attr("y", y.to_string())
            .attr("z", z.to_string()),
        Property::S32Vec2(S32Vec2 { x, y }) => {
            element.attr("x", x.to_string()).attr("y", y.to_string())
        }
        Property::Color(Color { r, g, b, a }) => element
            .attr("r", r.to_string())
            .attr("g", g.to_string())
            .attr("b", b.to_string())
            .attr("a", a.to_string()),
        Property::Guid(bytes) => element.attr("guid", super::ndf::property::hex_upper(bytes)),
        Property::LocalisationHash(bytes) => {
            element.attr("hash", super::ndf::property::hex_upper(bytes))
        }
        Property::Hash(bytes) => element.attr("hash", super::ndf::property::hex_upper(bytes)),
        Property::List(items) => items
            .iter()
            .fold(element, |element, item| element.child(property_to_element("ListItem", item))),
        Property::Map(pairs) => pairs.iter().fold(element, |element, (key, value)| {
            let item = Element::new("MapItem")
                .child(property_to_element("Key", key))
                .child(property_to_element("Value", value));
            element.child(item)
        }),
        Property::Pair(first, second) => element
            .child(property_to_element("First", first))
            .child(property_to_element("Second", second)),
    }
}

fn object_to_element(object: &Object) -> Element {
    let mut element = Element::new("Object")
        .attr("name", object.name.clone())
        .attr("className", object.class_name.clone());
    if object.is_top_object {
        element = element.attr("isTopObject", "true");
    }
    if let Some(export_path) = &object.export_path {
        element = element.attr("exportPath", export_path.clone());
    }
    for (name, value) in &object.properties {
        element = element.child(property_to_element(name, value));
    }
    element
}

/// Renders `graph` as a textual interchange document.
pub fn write(graph: &Graph) -> String {
    let mut root = Element::new("Graph");
    let mut imports = Element::new("Imports");
    for import in &graph.imports {
        imports = imports.child(Element::new("Import").attr("path", import.clone()));
    }
    root = root.child(imports);
    for object in graph.objects() {
        root = root.child(object_to_element(object));
    }
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    root.render(&mut out, 0);
    out
}

// -- parser -----------------------------------------------------------------

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Parser {
            chars: input.char_indices().peekable(),
            input,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn skip_declaration(&mut self) {
        self.skip_whitespace();
        if self.input[self.pos()..].starts_with("<?xml") {
            while let Some((_, c)) = self.chars.next() {
                if c == '>' {
                    break;
                }
            }
        }
        self.skip_whitespace();
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.input.len())
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            other => Err(Error::Xml(format!("expected {expected:?}, found {other:?}"))),
        }
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos();
        while matches!(self.chars.peek(), Some((_, c)) if c.is_alphanumeric() || *c == '_' || *c == '-' || *c == ':') {
            self.chars.next();
        }
        let end = self.pos();
        self.input[start..end].to_string()
    }

    fn parse_attr_value(&mut self) -> Result<String> {
        self.expect('"')?;
        let start = self.pos();
        while matches!(self.chars.peek(), Some((_, c)) if *c != '"') {
            self.chars.next();
        }
        let end = self.pos();
        self.expect('"')?;
        Ok(unescape(&self.input[start..end]))
    }

    fn parse_element(&mut self) -> Result<Element> {
        self.skip_whitespace();
        self.expect('<')?;
        let tag = self.parse_name();
        let mut element = Element::new(tag);

        loop {
            self.skip_whitespace();
            match self.chars.peek().copied() {
                Some((_, '/')) => {
                    self.chars.next();
                    self.expect('>')?;
                    return Ok(element);
                }
                Some((_, '>')) => {
                    self.chars.next();
                    break;
                }
                Some(_) => {
                    let key = self.parse_name();
                    self.skip_whitespace();
                    self.expect('=')?;
                    self.skip_whitespace();
                    let value = self.parse_attr_value()?;
                    element.attrs.push((key, value));
                }
                None => return Err(Error::Xml("unexpected end of input in tag".to_string())),
            }
        }

        loop {
            self.skip_whitespace();
            if self.input[self.pos()..].starts_with("</") {
                self.chars.next();
                self.chars.next();
                let closing = self.parse_name();
                if closing != element.tag {
                    return Err(Error::Xml(format!(
                        "mismatched closing tag: expected {:?}, found {:?}",
                        element.tag, closing
                    )));
                }
                self.skip_whitespace();
                self.expect('>')?;
                return Ok(element);
            }
            element.children.push(self.parse_element()?);
        }
    }
}

fn parse_document(input: &str) -> Result<Element> {
    let mut parser = Parser::new(input);
    parser.skip_declaration();
    parser.parse_element()
}

fn attr<'a>(element: &'a Element, key: &str) -> Result<&'a str> {
    element
        .attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| Error::Xml(format!("element {:?} missing attribute {:?}", element.tag, key)))
}

fn attr_opt<'a>(element: &'a Element, key: &str) -> Option<&'a str> {
    element.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn parse_num<T: std::str::FromStr>(element: &Element, key: &str) -> Result<T> {
    attr(element, key)?
        .parse()
        .map_err(|_| Error::Xml(format!("invalid numeric attribute {:?}", key)))
}

fn parse_hex_attr<const N: usize>(element: &Element, key: &str) -> Result<[u8; N]> {
    super::ndf::property::parse_hex(attr(element, key)?)
        .ok_or_else(|| Error::Xml(format!("invalid hex attribute {:?}", key)))
}

fn element_to_property(element: &Element) -> Result<Property> {
    let type_id: u32 = parse_num(element, "typeId")?;
    let property_type = PropertyType::from_tag(type_id)?;
    Ok(match property_type {
        PropertyType::Bool => Property::Bool(attr(element, "value")? == "true"),
        PropertyType::UInt8 => Property::UInt8(parse_num(element, "value")?),
        PropertyType::Int32 => Property::Int32(parse_num(element, "value")?),
        PropertyType::UInt32 => Property::UInt32(parse_num(element, "value")?),
        PropertyType::Int16 => Property::Int16(parse_num(element, "value")?),
        PropertyType::UInt16 => Property::UInt16(parse_num(element, "value")?),
        PropertyType::Float32 => Property::Float32(parse_num::<f32>(element, "value")?.into()),
        PropertyType::Float64 => Property::Float64(parse_num::<f64>(element, "value")?.into()),
        PropertyType::String => Property::String(attr(element, "value")?.to_string()),
        PropertyType::PathReference => Property::PathReference(attr(element, "value")?.to_string()),
        PropertyType::WideString => Property::WideString(attr(element, "str")?.to_string()),
        PropertyType::Reference => match attr(element, "referenceType")? {
            "object" => Property::ObjectReference(match attr_opt(element, "object") {
                Some(name) => ObjectReference::Object(name.to_string()),
                None => ObjectReference::Dangling,
            }),
            "import" => Property::ImportReference(match attr_opt(element, "import") {
                Some(path) => ImportReference::Import(path.to_string()),
                None => ImportReference::Dangling,
            }),
            other => return Err(Error::Xml(format!("unknown referenceType {other:?}"))),
        },
        PropertyType::F32Vec3 => Property::F32Vec3(F32Vec3 {
            x: parse_num(element, "x")?,
            y: parse_num(element, "y")?,
            z: parse_num(element, "z")?,
        }),
        PropertyType::F32Vec4 => Property::F32Vec4(F32Vec4 {
            x: parse_num(element, "x")?,
            y: parse_num(element, "y")?,
            z: parse_num(element, "z")?,
            w: parse_num(element, "w")?,
        }),
        PropertyType::F32Vec2 => Property::F32Vec2(F32Vec2 {
            x: parse_num(element, "x")?,
            y: parse_num(element, "y")?,
        }),
        PropertyType::S32Vec3 => Property::S32Vec3(S32Vec3 {
            x: parse_num(element, "x")?,
            y: parse_num(element, "y")?,
            z: parse_num(element, "z")?,
        }),
        PropertyType::S32Vec2 => Property::S32Vec2(S32Vec2 {
            x: parse_num(element, "x")?,
            y: parse_num(element, "y")?,
        }),
        PropertyType::Color => Property::Color(Color {
            r: parse_num(element, "r")?,
            g: parse_num(element, "g")?,
            b: parse_num(element, "b")?,
            a: parse_num(element, "a")?,
        }),
        PropertyType::Guid => Property::Guid(parse_hex_attr::<16>(element, "guid")?),
        PropertyType::LocalisationHash => {
            Property::LocalisationHash(parse_hex_attr::<8>(element, "hash")?)
        }
        PropertyType::Hash => Property::Hash(parse_hex_attr::<16>(element, "hash")?),
        PropertyType::List => {
            let mut items = Vec::with_capacity(element.children.len());
            for child in &element.children {
                items.push(element_to_property(child)?);
            }
            Property::List(items)
        }
        PropertyType::Map => {
            let mut pairs = Vec::with_capacity(element.children.len());
            for item in &element.children {
                let key_element = item
                    .children
                    .iter()
                    .find(|c| c.tag == "Key")
                    .ok_or_else(|| Error::Xml("MapItem missing Key".to_string()))?;
                let value_element = item
                    .children
                    .iter()
                    .find(|c| c.tag == "Value")
                    .ok_or_else(|| Error::Xml("MapItem missing Value".to_string()))?;
                pairs.push((
                    element_to_property(key_element)?,
                    element_to_property(value_element)?,
                ));
            }
            Property::Map(pairs)
        }
        PropertyType::Pair => {
            let first_element = element
                .children
                .iter()
                .find(|c| c.tag == "First")
                .ok_or_else(|| Error::Xml("Pair missing First".to_string()))?;
            let second_element = element
                .children
                .iter()
                .find(|c| c.tag == "Second")
                .ok_or_else(|| Error::Xml("Pair missing Second".to_string()))?;
            Property::Pair(
                Box::new(element_to_property(first_element)?),
                Box::new(element_to_property(second_element)?),
            )
        }
    })
}

fn element_to_object(element: &Element) -> Result<Object> {
    let name = attr(element, "name")?.to_string();
    let class_name = attr(element, "className")?.to_string();
    let mut object = Object::new(name, class_name);
    object.is_top_object = attr_opt(element, "isTopObject") == Some("true");
    object.export_path = attr_opt(element, "exportPath").map(|s| s.to_string());
    for child in &element.children {
        object.push_property(child.tag.clone(), element_to_property(child)?);
    }
    Ok(object)
}

/// Parses a document produced by [`write`] back into a [`Graph`].
pub fn read(input: &str) -> Result<Graph> {
    let root = parse_document(input)?;
    if root.tag != "Graph" {
        return Err(Error::InvalidXmlShape);
    }
    let mut graph = Graph::new();
    for child in &root.children {
        match child.tag.as_str() {
            "Imports" => {
                for import in &child.children {
                    graph.imports.push(attr(import, "path")?.to_string());
                }
            }
            "Object" => {
                graph.add_object(element_to_object(child)?)?;
            }
            other => return Err(Error::Xml(format!("unexpected top-level element {other:?}"))),
        }
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_scalars_and_vectors() {
        let mut graph = Graph::new();
        let mut object = Object::new("Unit_1", "TUnitDescriptor");
        object.push_property("Health", Property::Int32(100));
        object.push_property(
            "Position",
            Property::F32Vec3(F32Vec3 {
                x: 1.5,
                y: -2.0,
                z: 0.0,
            }),
        );
        object.push_property(
            "Tint",
            Property::Color(Color {
                r: 1,
                g: 2,
                b: 3,
                a: 4,
            }),
        );
        graph.add_object(object).unwrap();

        let text = write(&graph);
        let decoded = read(&text).unwrap();
        let restored = decoded.get("Unit_1").unwrap();
        assert_eq!(restored.get_property("Health"), Some(&Property::Int32(100)));
        assert_eq!(
            restored.get_property("Position"),
            Some(&Property::F32Vec3(F32Vec3 {
                x: 1.5,
                y: -2.0,
                z: 0.0
            }))
        );
    }

    #[test]
    fn test_round_trip_list_and_dangling_reference() {
        let mut graph = Graph::new();
        let mut object = Object::new("Unit_2", "TUnitDescriptor");
        object.push_property(
            "Tags",
            Property::List(vec![
                Property::String("A".to_string()),
                Property::String("B".to_string()),
            ]),
        );
        object.push_property(
            "Leader",
            Property::ObjectReference(ObjectReference::Dangling),
        );
        graph.add_object(object).unwrap();

        let text = write(&graph);
        let decoded = read(&text).unwrap();
        let restored = decoded.get("Unit_2").unwrap();
        assert!(matches!(restored.get_property("Tags"), Some(Property::List(items)) if items.len() == 2));
        assert_eq!(
            restored.get_property("Leader"),
            Some(&Property::ObjectReference(ObjectReference::Dangling))
        );
    }

    #[test]
    fn test_escapes_special_characters_in_attribute_values() {
        let mut graph = Graph::new();
        let mut object = Object::new("Unit_3", "TUnitDescriptor");
        object.push_property("Label", Property::String("A & B <C>".to_string()));
        graph.add_object(object).unwrap();

        let text = write(&graph);
        let decoded = read(&text).unwrap();
        assert_eq!(
            decoded.get("Unit_3").unwrap().get_property("Label"),
            Some(&Property::String("A & B <C>".to_string()))
        );
    }
}
