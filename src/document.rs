use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// One element of a parsed markup document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(|s| s.trim().parse().ok())
    }

    pub fn attr_i32(&self, name: &str) -> Option<i32> {
        self.attr(name).and_then(|s| s.trim().parse().ok())
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Depth-first search below and including this element
    pub fn contains_element(&self, name: &str) -> bool {
        self.name == name || self.children.iter().any(|c| c.contains_element(name))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| format!("bad attribute on <{}>: {}", name, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("bad attribute value on <{}>: {}", name, e))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }
}

/// Well-formed attribute/element tree with exactly one root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    /// Parses the whole document; the error string carries the reader position.
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
            match event {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err("content after the root element".to_string());
                    }
                    stack.push(XmlElement::from_start(&start)?);
                }
                Event::Empty(start) => {
                    let element = XmlElement::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(end) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "closing tag without opening tag".to_string())?;
                    if end.name().as_ref() != element.name.as_bytes() {
                        return Err(format!(
                            "</{}> closes <{}>",
                            String::from_utf8_lossy(end.name().as_ref()),
                            element.name
                        ));
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
                    match stack.last_mut() {
                        Some(open) => open.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err("text outside the root element".to_string()),
                    }
                }
                Event::CData(data) => {
                    if let Some(open) = stack.last_mut() {
                        open.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        root.map(|root| Self { root })
            .ok_or_else(|| "document has no root element".to_string())
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn contains_element(&self, name: &str) -> bool {
        self.root.contains_element(name)
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err("content after the root element".to_string()),
    }
}
