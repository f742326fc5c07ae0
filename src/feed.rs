//! RSS document parsing.
//!
//! Reads a feed's `channel/title` and every `item` with its `title`,
//! `description`, `link` and `pubDate`. All four item fields are required;
//! a feed with an incomplete item is rejected as a whole so that callers
//! only ever see fully populated [`FeedItem`]s.

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;

/// A single item/article in a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    /// Raw `pubDate` text, exactly as published.
    pub pub_date: String,
}

/// A parsed feed: the channel title plus its items in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub items: Vec<FeedItem>,
}

/// Errors that can occur while parsing a feed document.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The bytes are not a well-formed XML document.
    #[error("malformed feed document: {0}")]
    Malformed(String),
    /// A required element is absent. Holds the element path, e.g.
    /// `channel/title` or `item[2]/pubDate`.
    #[error("feed is missing required element `{0}`")]
    MissingField(String),
}

#[derive(Debug, Clone, Copy)]
enum ItemField {
    Title,
    Description,
    Link,
    PubDate,
}

impl ItemField {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(ItemField::Title),
            b"description" => Some(ItemField::Description),
            b"link" => Some(ItemField::Link),
            b"pubDate" => Some(ItemField::PubDate),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            ItemField::Title => "title",
            ItemField::Description => "description",
            ItemField::Link => "link",
            ItemField::PubDate => "pubDate",
        }
    }
}

#[derive(Debug, Default)]
struct PartialItem {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
}

impl PartialItem {
    fn set(&mut self, field: ItemField, value: String) {
        let slot = match field {
            ItemField::Title => &mut self.title,
            ItemField::Description => &mut self.description,
            ItemField::Link => &mut self.link,
            ItemField::PubDate => &mut self.pub_date,
        };
        // first occurrence wins
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// `position` is 1-based, used only for error messages.
    fn finish(self, position: usize) -> Result<FeedItem, ParseError> {
        let missing =
            |field: ItemField| ParseError::MissingField(format!("item[{position}]/{}", field.tag()));

        Ok(FeedItem {
            title: self.title.ok_or_else(|| missing(ItemField::Title))?,
            description: self
                .description
                .ok_or_else(|| missing(ItemField::Description))?,
            link: self.link.ok_or_else(|| missing(ItemField::Link))?,
            pub_date: self.pub_date.ok_or_else(|| missing(ItemField::PubDate))?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    ChannelTitle,
    Item(ItemField),
}

/// Text being collected for one element, closed when the stack returns to `depth`.
struct Capture {
    target: Target,
    depth: usize,
    text: String,
}

/// Decide whether an element opening at the current stack position is one we keep.
fn capture_target(
    stack: &[Vec<u8>],
    name: &[u8],
    channel_title: &Option<String>,
    current: Option<&(usize, PartialItem)>,
) -> Option<Target> {
    match current {
        Some((item_depth, _)) if stack.len() == item_depth + 1 => {
            ItemField::from_tag(name).map(Target::Item)
        }
        Some(_) => None,
        None => {
            let in_channel = stack.last().is_some_and(|parent| parent == b"channel");
            (in_channel && name == b"title" && channel_title.is_none())
                .then_some(Target::ChannelTitle)
        }
    }
}

fn complete(
    target: Target,
    value: String,
    channel_title: &mut Option<String>,
    current: &mut Option<(usize, PartialItem)>,
) {
    match target {
        Target::ChannelTitle => {
            if channel_title.is_none() {
                *channel_title = Some(value);
            }
        }
        Target::Item(field) => {
            if let Some((_, partial)) = current.as_mut() {
                partial.set(field, value);
            }
        }
    }
}

/// Parse raw feed bytes into a [`Channel`].
///
/// The document's declared `encoding` is honoured, so Latin-1 and other
/// non-UTF-8 feeds decode correctly.
///
/// Items are returned in document order, which is the publisher's order and
/// not necessarily chronological. Items are collected wherever they appear,
/// so RSS 1.0 documents (items as siblings of `channel`) parse too.
///
/// # Errors
///
/// - [`ParseError::Malformed`] if the bytes are not well-formed XML
/// - [`ParseError::MissingField`] if `channel/title` or any item field is absent
pub fn parse_feed(bytes: &[u8]) -> Result<Channel, ParseError> {
    // Text is kept untrimmed so mixed content keeps its inner spacing; each
    // captured value is trimmed once when its element closes.
    let mut reader = Reader::from_reader(bytes);

    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;

    let mut channel_title: Option<String> = None;
    let mut items: Vec<FeedItem> = Vec::new();
    // depth of the open <item> element and what has been read from it so far
    let mut current: Option<(usize, PartialItem)> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                saw_root = true;

                if capture.is_none() {
                    capture = capture_target(&stack, &name, &channel_title, current.as_ref())
                        .map(|target| Capture {
                            target,
                            depth: stack.len(),
                            text: String::new(),
                        });
                }
                if name == b"item" && current.is_none() {
                    current = Some((stack.len(), PartialItem::default()));
                }

                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = e.name().as_ref().to_vec();
                saw_root = true;

                if capture.is_none() {
                    if let Some(target) =
                        capture_target(&stack, &name, &channel_title, current.as_ref())
                    {
                        complete(target, String::new(), &mut channel_title, &mut current);
                    }
                }
                if name == b"item" && current.is_none() {
                    items.push(PartialItem::default().finish(items.len() + 1)?);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(capture) = capture.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| ParseError::Malformed(err.to_string()))?;
                    capture.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(capture) = capture.as_mut() {
                    let text = reader
                        .decoder()
                        .decode(&e.into_inner())
                        .map_err(|err| ParseError::Malformed(err.to_string()))?
                        .into_owned();
                    capture.text.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                let depth = stack.len();

                if capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(done) = capture.take() {
                        let value = done.text.trim().to_string();
                        complete(done.target, value, &mut channel_title, &mut current);
                    }
                }
                if current.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let Some((_, partial)) = current.take() {
                        items.push(partial.finish(items.len() + 1)?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Malformed(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(ParseError::Malformed("document has no root element".into()));
    }
    if let Some(open) = stack.last() {
        return Err(ParseError::Malformed(format!(
            "unexpected end of document inside <{}>",
            String::from_utf8_lossy(open)
        )));
    }

    let title = channel_title.ok_or_else(|| ParseError::MissingField("channel/title".into()))?;
    Ok(Channel { title, items })
}
