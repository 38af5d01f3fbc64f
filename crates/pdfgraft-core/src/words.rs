//! Word segmentation over structured text events

use crate::document::Page;
use crate::error::PdfGraftError;
use crate::geometry::{Matrix, Rect};
use crate::stext::{ImageRef, StextOptions, TextEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub rect: Rect,
    pub text: String,
    pub font: String,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageImage {
    pub bbox: Rect,
    pub matrix: Matrix,
    pub image: ImageRef,
}

/// Folds glyph events into words.
///
/// A word grows with every glyph it sees. Whitespace glyphs still extend the
/// rectangle before closing the word, so a word's box reaches the start of
/// the next one. Line and block ends close the word unconditionally.
#[derive(Debug, Default)]
pub struct WordSegmenter {
    rect: Option<Rect>,
    text: String,
    font: Option<String>,
    size: Option<f64>,
}

impl WordSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event; returns a word when this event completes one.
    pub fn push(&mut self, event: &TextEvent) -> Option<Word> {
        match event {
            TextEvent::Char(glyph) => {
                self.rect = Some(match self.rect {
                    Some(mut rect) => {
                        rect.include_quad(&glyph.quad);
                        rect
                    }
                    None => Rect::from_quad(&glyph.quad),
                });
                self.font = Some(glyph.font.clone());
                self.size = Some(glyph.size);

                if glyph.c.is_whitespace() {
                    self.close()
                } else {
                    self.text.push(glyph.c);
                    None
                }
            }
            TextEvent::EndLine | TextEvent::EndTextBlock => self.close(),
            TextEvent::Image(_) => None,
        }
    }

    /// Flush whatever word is still open at the end of the stream.
    pub fn finish(&mut self) -> Option<Word> {
        self.close()
    }

    fn close(&mut self) -> Option<Word> {
        let rect = self.rect.take();
        let font = self.font.take();
        let size = self.size.take();
        let text = std::mem::take(&mut self.text);
        match (rect, font, size) {
            (Some(rect), Some(font), Some(size)) if !text.is_empty() => Some(Word {
                rect,
                text,
                font,
                size,
            }),
            _ => None,
        }
    }
}

pub fn segment_words<'e>(events: impl IntoIterator<Item = &'e TextEvent>) -> Vec<Word> {
    let mut segmenter = WordSegmenter::new();
    let mut words: Vec<Word> = events
        .into_iter()
        .filter_map(|event| segmenter.push(event))
        .collect();
    words.extend(segmenter.finish());
    words
}

pub fn collect_images<'e>(events: impl IntoIterator<Item = &'e TextEvent>) -> Vec<PageImage> {
    events
        .into_iter()
        .filter_map(|event| match event {
            TextEvent::Image(block) => Some(PageImage {
                bbox: block.bbox,
                matrix: block.matrix,
                image: block.image.clone(),
            }),
            _ => None,
        })
        .collect()
}

impl<'a> Page<'a> {
    /// Words on this page, whitespace preserved so gaps split words.
    pub fn words(&self) -> Result<Vec<Word>, PdfGraftError> {
        let options = StextOptions {
            preserve_whitespace: true,
            ..Default::default()
        };
        let text = self.structured_text(&options)?;
        Ok(segment_words(&text.events))
    }

    pub fn images(&self) -> Result<Vec<PageImage>, PdfGraftError> {
        let options = StextOptions {
            preserve_images: true,
            ..Default::default()
        };
        let text = self.structured_text(&options)?;
        Ok(collect_images(&text.events))
    }
}
