use scraper::node::Element as HtmlElement;
use scraper::{Html, Node};
use sxd_document::dom::{Document, Element};
use sxd_document::{parser, Package};
use sxd_xpath::Value;
use tracing::trace;

use super::ValueMapper;
use crate::error::{Error, Result};

/// Selects nodes of an XML or HTML document with an XPath expression.
///
/// Input that is not well-formed XML is parsed as HTML, so void tags and
/// doctypes do not defeat the mapper.
#[derive(Debug, Clone)]
pub struct XPathMapper {
    xpath: String,
    index: usize,
}

impl XPathMapper {
    pub fn new(xpath: &str, index: usize) -> Result<Self> {
        if xpath.trim().is_empty() {
            return Err(Error::mapper("xpath", "expression is empty"));
        }
        Ok(Self {
            xpath: xpath.to_string(),
            index,
        })
    }

    fn select(&self, value: &str) -> Option<String> {
        let package = match parser::parse(value) {
            Ok(package) => package,
            Err(_) if value.contains('<') => {
                trace!("XPath input is not XML, parsing as HTML");
                html_package(value)
            }
            Err(e) => {
                trace!("XPath input is not markup: {:?}", e);
                return None;
            }
        };
        let document = package.as_document();

        match sxd_xpath::evaluate_xpath(&document, &self.xpath) {
            Ok(Value::Nodeset(nodes)) => nodes
                .document_order()
                .get(self.index)
                .map(|node| node.string_value()),
            Ok(Value::String(s)) => Some(s),
            Ok(Value::Number(n)) => Some(n.to_string()),
            Ok(Value::Boolean(b)) => Some(b.to_string()),
            Err(e) => {
                trace!("XPath '{}' failed: {:?}", self.xpath, e);
                None
            }
        }
    }
}

/// Copy an HTML tree into an XPath-ready document.
fn html_package(value: &str) -> Package {
    let html = Html::parse_document(value);
    let package = Package::new();
    {
        let document = package.as_document();
        let root = html.root_element();
        let top = copy_element(&document, root.value());
        document.root().append_child(top);

        let mut pending = vec![(*root, top)];
        while let Some((node, parent)) = pending.pop() {
            for child in node.children() {
                match child.value() {
                    Node::Element(element) => {
                        let copy = copy_element(&document, element);
                        parent.append_child(copy);
                        pending.push((child, copy));
                    }
                    Node::Text(text) => parent.append_child(document.create_text(text)),
                    _ => {}
                }
            }
        }
    }
    package
}

fn copy_element<'d>(document: &Document<'d>, element: &HtmlElement) -> Element<'d> {
    let copy = document.create_element(element.name());
    for (name, value) in element.attrs() {
        copy.set_attribute_value(name, value);
    }
    copy
}

impl ValueMapper for XPathMapper {
    fn map(&self, value: &str) -> String {
        self.select(value).unwrap_or_else(|| value.to_string())
    }

    fn kind(&self) -> &'static str {
        "xpath"
    }
}
