use super::companion_path;
use crate::common::constants::NFO_EXTENSION;
use crate::common::error::Result;
use crate::common::types::MediaRecord;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::path::PathBuf;
use tracing::{info, warn};

/// Writes Kodi/Emby `movie` descriptors next to media files
#[derive(Debug, Default)]
pub struct NfoWriter;

impl NfoWriter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize a record to descriptor XML. `thumb` is the cover file name, if one exists.
    pub fn render(&self, record: &MediaRecord, thumb: Option<&str>) -> Result<Vec<u8>> {
        let meta = &record.metadata;
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("movie")))?;

        text_element(&mut writer, "title", meta.title.as_deref().unwrap_or_default())?;
        text_element(&mut writer, "originaltitle", &record.identifier)?;
        text_element(&mut writer, "plot", meta.description.as_deref().unwrap_or_default())?;
        let release_date = meta.release_date.as_deref().unwrap_or_default();
        let year: String = release_date.chars().take(4).collect();
        text_element(&mut writer, "year", &year)?;
        text_element(&mut writer, "releasedate", release_date)?;
        text_element(&mut writer, "studio", meta.studio.as_deref().unwrap_or_default())?;
        text_element(&mut writer, "director", meta.director.as_deref().unwrap_or_default())?;
        if let Some(series) = &meta.series {
            text_element(&mut writer, "set", series)?;
        }
        for genre in meta.category.iter().flatten() {
            text_element(&mut writer, "genre", genre)?;
        }
        for actor in meta.actors.iter().flatten() {
            writer.write_event(Event::Start(BytesStart::new("actor")))?;
            text_element(&mut writer, "name", actor.trim())?;
            writer.write_event(Event::End(BytesEnd::new("actor")))?;
        }
        if let Some(thumb) = thumb {
            text_element(&mut writer, "thumb", thumb)?;
        }

        writer.write_event(Event::End(BytesEnd::new("movie")))?;
        Ok(writer.into_inner())
    }

    /// Write `<stem>.nfo` beside the record's media file. Returns `None` when
    /// the record lacks a location or a title.
    pub fn write(&self, record: &MediaRecord, thumb: Option<&str>) -> Result<Option<PathBuf>> {
        let Some(location) = record.file_location.as_deref() else {
            warn!("Skipping descriptor for {}: no file location", record.identifier);
            return Ok(None);
        };
        if record.metadata.title.is_none() {
            warn!("Skipping descriptor for {}: no title", record.identifier);
            return Ok(None);
        }

        let path = companion_path(location, "", NFO_EXTENSION);
        std::fs::write(&path, self.render(record, thumb)?)?;
        info!("Wrote descriptor {}", path.display());
        Ok(Some(path))
    }
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    // an empty text event keeps the closing tag on the same line
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Metadata;
    use tempfile::TempDir;

    fn record(location: Option<PathBuf>) -> MediaRecord {
        let mut record = MediaRecord::new("ABC-123", location);
        record.metadata = Metadata {
            title: Some("A & B".into()),
            release_date: Some("2021-03-04".into()),
            studio: Some("Some Studio".into()),
            series: Some("Some Series".into()),
            category: Some(vec!["Drama".into(), "Romance".into()]),
            actors: Some(vec!["Jane Doe".into(), " Mary Roe ".into()]),
            ..Default::default()
        };
        record
    }

    #[test]
    fn test_render_contains_expected_elements() {
        let xml = String::from_utf8(NfoWriter::new().render(&record(None), Some("abc-123.jpg")).unwrap()).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<title>A &amp; B</title>"));
        assert!(xml.contains("<originaltitle>ABC-123</originaltitle>"));
        assert!(xml.contains("<year>2021</year>"));
        assert!(xml.contains("<releasedate>2021-03-04</releasedate>"));
        assert!(xml.contains("<set>Some Series</set>"));
        assert!(xml.contains("<genre>Drama</genre>"));
        assert!(xml.contains("<genre>Romance</genre>"));
        assert!(xml.contains("<name>Mary Roe</name>"));
        assert!(xml.contains("<thumb>abc-123.jpg</thumb>"));
        assert_eq!(xml.matches("<actor>").count(), 2);
    }

    #[test]
    fn test_render_without_optional_fields() {
        let record = MediaRecord::new("ABC-123", None);
        let xml = String::from_utf8(NfoWriter::new().render(&record, None).unwrap()).unwrap();
        assert!(xml.contains("<plot></plot>"));
        assert!(!xml.contains("<set>"));
        assert!(!xml.contains("<thumb>"));
    }

    #[test]
    fn test_write_places_nfo_next_to_media() {
        let dir = TempDir::new().unwrap();
        let media = dir.path().join("abc-123.mp4");
        let written = NfoWriter::new().write(&record(Some(media)), None).unwrap();
        let expected = dir.path().join("abc-123.nfo");
        assert_eq!(written, Some(expected.clone()));
        assert!(std::fs::read_to_string(expected).unwrap().contains("<movie>"));
    }

    #[test]
    fn test_write_skips_without_title() {
        let dir = TempDir::new().unwrap();
        let mut record = record(Some(dir.path().join("abc-123.mp4")));
        record.metadata.title = None;
        assert_eq!(NfoWriter::new().write(&record, None).unwrap(), None);
        assert!(!dir.path().join("abc-123.nfo").exists());
    }
}
