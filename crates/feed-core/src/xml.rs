//! The `<offers>` feed document: in-memory tree, serializer and parser
//!
//! The tree mirrors the XML one-to-one so post-processing rules can work on
//! freshly built offers and on previously written feeds alike.

use crate::error::{Error, Result};
use crate::offer::Offer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// `<desc>` content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub html: String,
    /// Written as CDATA instead of escaped text
    pub cdata: bool,
}

/// One `<o>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferElement {
    pub id: String,
    pub url: String,
    pub price: String,
    pub avail: String,
    pub stock: String,
    pub basket: String,
    pub category: String,
    pub name: String,
    pub desc: Option<Description>,
    pub desc_json: Option<String>,
    /// First entry is written as `<main>`, the rest as `<i>`
    pub images: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

impl OfferElement {
    /// Element for a built offer
    pub fn from_offer(offer: &Offer, cdata: bool) -> Self {
        Self {
            id: offer.id.clone(),
            url: offer.url.clone(),
            price: offer.price_text(),
            avail: offer.availability.code().to_string(),
            stock: offer.stock().to_string(),
            basket: offer.basket().to_string(),
            category: offer.category.clone(),
            name: offer.name.clone(),
            desc: offer.description.as_ref().map(|html| Description {
                html: html.clone(),
                cdata,
            }),
            desc_json: offer.description_json.clone(),
            images: offer.images.clone(),
            attributes: offer.attributes.clone(),
        }
    }

    /// First attribute value with the given (trimmed) name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n.trim() == name)
            .map(|(_, v)| v.trim())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn set_field(&mut self, key: &str, value: String) {
        match key {
            "id" => self.id = value,
            "url" => self.url = value,
            "price" => self.price = value,
            "avail" => self.avail = value,
            "stock" => self.stock = value,
            "basket" => self.basket = value,
            _ => {}
        }
    }
}

/// The whole feed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub offers: Vec<OfferElement>,
}

impl Feed {
    /// Feed for a list of built offers
    pub fn from_offers(offers: &[Offer], cdata: bool) -> Self {
        Self {
            offers: offers
                .iter()
                .map(|o| OfferElement::from_offer(o, cdata))
                .collect(),
        }
    }

    /// Serialize with an XML declaration and 2-space indentation
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        if self.offers.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("offers")))?;
        } else {
            writer.write_event(Event::Start(BytesStart::new("offers")))?;
            for offer in &self.offers {
                write_offer(&mut writer, offer)?;
            }
            writer.write_event(Event::End(BytesEnd::new("offers")))?;
        }

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| Error::InvalidFeed(e.to_string()))
    }

    /// Write the feed to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_xml()?)?;
        Ok(())
    }

    /// Load a feed written by [`Feed::save`] (or any compatible producer)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse a feed document
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut feed = Feed::default();
        let mut seen_root = false;
        let mut current: Option<OfferElement> = None;
        let mut attr_name: Option<String> = None;
        let mut text = String::new();
        let mut cdata = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    match tag_name(&e).as_str() {
                        "offers" => seen_root = true,
                        "o" => current = Some(offer_from_start(&e)?),
                        "a" => attr_name = Some(attribute_value(&e, "name")?.unwrap_or_default()),
                        _ => {}
                    }
                    text.clear();
                    cdata = false;
                }
                Event::Empty(e) => match tag_name(&e).as_str() {
                    "offers" => seen_root = true,
                    "o" => feed.offers.push(offer_from_start(&e)?),
                    "a" => {
                        if let Some(o) = current.as_mut() {
                            let name = attribute_value(&e, "name")?.unwrap_or_default();
                            o.attributes.push((name, String::new()));
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    let unescaped = e.unescape().map_err(|e| Error::InvalidFeed(e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Event::CData(e) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    cdata = true;
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name == "o" {
                        if let Some(o) = current.take() {
                            feed.offers.push(o);
                        }
                    } else if let Some(o) = current.as_mut() {
                        let value = std::mem::take(&mut text);
                        match name.as_str() {
                            "cat" => o.category = value,
                            "name" => o.name = value,
                            "desc" => o.desc = Some(Description { html: value, cdata }),
                            "desc_json" => o.desc_json = Some(value),
                            "main" | "i" => o.images.push(value),
                            "a" => {
                                if let Some(attr) = attr_name.take() {
                                    o.attributes.push((attr, value));
                                }
                            }
                            _ => {}
                        }
                    }
                    text.clear();
                    cdata = false;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(Error::InvalidFeed("missing <offers> root".to_string()));
        }
        Ok(feed)
    }
}

fn write_offer(writer: &mut Writer<Vec<u8>>, offer: &OfferElement) -> Result<()> {
    let start = BytesStart::new("o").with_attributes([
        ("id", offer.id.as_str()),
        ("url", offer.url.as_str()),
        ("price", offer.price.as_str()),
        ("avail", offer.avail.as_str()),
        ("stock", offer.stock.as_str()),
        ("basket", offer.basket.as_str()),
    ]);
    writer.write_event(Event::Start(start))?;

    writer
        .create_element("cat")
        .write_text_content(BytesText::new(&offer.category))?;
    writer
        .create_element("name")
        .write_text_content(BytesText::new(&offer.name))?;

    if let Some(desc) = &offer.desc {
        // CDATA cannot carry its own terminator.
        if desc.cdata && !desc.html.contains("]]>") {
            writer
                .create_element("desc")
                .write_cdata_content(BytesCData::new(desc.html.as_str()))?;
        } else {
            writer
                .create_element("desc")
                .write_text_content(BytesText::new(&desc.html))?;
        }
    }

    if let Some(json) = &offer.desc_json {
        writer
            .create_element("desc_json")
            .write_text_content(BytesText::new(json))?;
    }

    if let Some((main, rest)) = offer.images.split_first() {
        writer.write_event(Event::Start(BytesStart::new("imgs")))?;
        writer
            .create_element("main")
            .write_text_content(BytesText::new(main))?;
        for url in rest {
            writer
                .create_element("i")
                .write_text_content(BytesText::new(url))?;
        }
        writer.write_event(Event::End(BytesEnd::new("imgs")))?;
    }

    if !offer.attributes.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("attrs")))?;
        for (name, value) in &offer.attributes {
            writer
                .create_element("a")
                .with_attribute(("name", name.as_str()))
                .write_text_content(BytesText::new(value))?;
        }
        writer.write_event(Event::End(BytesEnd::new("attrs")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("o")))?;
    Ok(())
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute_value(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::InvalidFeed(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn offer_from_start(e: &BytesStart<'_>) -> Result<OfferElement> {
    let mut offer = OfferElement::default();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::InvalidFeed(e.to_string()))?
            .into_owned();
        offer.set_field(&key, value);
    }
    Ok(offer)
}
