use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ParseError;
use crate::feed::FeedItem;

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Description,
    Creator,
    Author,
    PubDate,
    Link,
    LinkHref,
}

const FIELD_COUNT: usize = 7;

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"title" => Some(Field::Title),
        b"description" => Some(Field::Description),
        b"creator" => Some(Field::Creator),
        b"author" => Some(Field::Author),
        b"pubDate" => Some(Field::PubDate),
        b"link" => Some(Field::Link),
        _ => None,
    }
}

struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

/// Collects the first occurrence of every field inside one `<item>`.
struct ItemBuilder {
    slot: usize,
    depth: usize,
    fields: [Option<String>; FIELD_COUNT],
    capture: Option<Capture>,
}

impl ItemBuilder {
    fn new(slot: usize, depth: usize) -> Self {
        Self {
            slot,
            depth,
            fields: Default::default(),
            capture: None,
        }
    }

    fn open(&mut self, field: Field, depth: usize) {
        if self.capture.is_none() && self.fields[field as usize].is_none() {
            self.capture = Some(Capture {
                field,
                depth,
                text: String::new(),
            });
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(capture) = &mut self.capture {
            capture.text.push_str(text);
        }
    }

    fn close(&mut self, depth: usize) {
        match self.capture.take() {
            Some(capture) if capture.depth == depth => {
                self.fields[capture.field as usize] = Some(capture.text.trim().to_owned());
            }
            other => self.capture = other,
        }
    }

    fn set_once(&mut self, field: Field, value: String) {
        let slot = &mut self.fields[field as usize];
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn take(&mut self, field: Field) -> Option<String> {
        self.fields[field as usize].take()
    }

    fn build(mut self) -> FeedItem {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        let creator = non_empty(self.take(Field::Creator));
        let author = self.take(Field::Author);
        let link = non_empty(self.take(Field::Link));
        let href = self.take(Field::LinkHref);
        FeedItem {
            title: self.take(Field::Title).unwrap_or_default(),
            description: self.take(Field::Description).unwrap_or_default(),
            author: creator.or(author).unwrap_or_default(),
            publish_date: self.take(Field::PubDate).unwrap_or_default(),
            link: link.or(href).unwrap_or_default(),
        }
    }
}

fn href_of(element: &BytesStart<'_>) -> Option<String> {
    let attr = element.try_get_attribute("href").ok().flatten()?;
    attr.unescape_value().ok().map(|v| v.trim().to_owned())
}

/// Extracts every `<item>`, at any depth, in document order.
///
/// Elements are matched on their local name, so `dc:creator` counts as
/// `creator`. Only a document that is not XML at all is an error; an item
/// missing fields yields empty strings for them.
pub fn parse(raw: &str) -> Result<Vec<FeedItem>, ParseError> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().check_end_names = true;

    let mut slots: Vec<Option<FeedItem>> = Vec::new();
    let mut open_items: Vec<ItemBuilder> = Vec::new();
    let mut open_elements: Vec<String> = Vec::new();
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|source| ParseError::Xml {
            position: reader.buffer_position() as u64,
            source,
        })?;

        match event {
            Event::Start(e) => {
                seen_root = true;
                let local = e.local_name();
                open_elements.push(String::from_utf8_lossy(local.as_ref()).into_owned());
                let depth = open_elements.len();

                if let Some(field) = field_for(local.as_ref()) {
                    for item in &mut open_items {
                        item.open(field, depth);
                    }
                }
                if local.as_ref() == b"item" {
                    open_items.push(ItemBuilder::new(slots.len(), depth));
                    slots.push(None);
                }
            }
            Event::Empty(e) => {
                seen_root = true;
                let local = e.local_name();
                if local.as_ref() == b"item" {
                    slots.push(Some(FeedItem::default()));
                    continue;
                }
                if let Some(field) = field_for(local.as_ref()) {
                    let href = matches!(field, Field::Link).then(|| href_of(&e)).flatten();
                    for item in &mut open_items {
                        if item.capture.is_none() {
                            item.set_once(field, String::new());
                            if let Some(href) = &href {
                                item.set_once(Field::LinkHref, href.clone());
                            }
                        }
                    }
                }
            }
            Event::End(e) => {
                let depth = open_elements.len();
                for item in &mut open_items {
                    item.close(depth);
                }
                if e.local_name().as_ref() == b"item"
                    && open_items.last().is_some_and(|item| item.depth == depth)
                {
                    if let Some(builder) = open_items.pop() {
                        let slot = builder.slot;
                        slots[slot] = Some(builder.build());
                    }
                }
                open_elements.pop();
            }
            Event::Text(e) => {
                if open_items.iter().any(|item| item.capture.is_some()) {
                    let text = e
                        .unescape()
                        .map(|text| text.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    for item in &mut open_items {
                        item.push_text(&text);
                    }
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                for item in &mut open_items {
                    item.push_text(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open_elements.pop() {
        return Err(ParseError::Unclosed(unclosed));
    }
    if !seen_root {
        return Err(ParseError::NoRoot);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Checks that `raw` is a well-formed XML document.
pub fn validate(raw: &str) -> Result<(), ParseError> {
    parse(raw).map(|_| ())
}
