//! Text message formats sent by the live pixel server
//!
//! Every format is recognized by a leading tag. Tags are checked in priority
//! order; text that matches no tag falls back to a single `x,y,color` pixel.
//!
//! | Tag           | Body                                   | Result             |
//! |---------------|----------------------------------------|--------------------|
//! | `full,`       | `hex,hex,...` (row-major)              | [`Message::FullFrame`] |
//! | `chunk;`      | `idx;total;count;x,y,hex;...`          | [`Message::Chunk`]     |
//! | `compressed;` | `count;x,y,hex;...`                    | [`Message::Compressed`] |
//! | `batch;`      | anything (deprecated)                  | [`Message::LegacyBatch`] |
//! | `-1,-1,`      | anything                               | [`Message::Clear`]     |
//! | (none)        | `x,y,hex`                              | [`Message::Pixel`]     |

use crate::pixel::{Batch, CanvasDim, PixelUpdate, MAX_BATCH_PIXELS};
use crate::raster::FullFrame;

/// Reasons a message (or a pixel inside it) was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Text matched no known format
    Unrecognized,
    /// Batch header field missing, non-numeric or inconsistent
    MalformedHeader,
    /// Pixel triple could not be parsed
    MalformedPixel,
    /// Pixel coordinates outside the canvas
    OutOfBounds,
}

/// Message format tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tag {
    Full,
    Chunk,
    Compressed,
    LegacyBatch,
    Clear,
}

/// Recognized tags in priority order
///
/// New wire formats are added here; the fallback single-pixel format is
/// implicit.
pub const TAG_TABLE: [(&str, Tag); 5] = [
    ("full,", Tag::Full),
    ("chunk;", Tag::Chunk),
    ("compressed;", Tag::Compressed),
    ("batch;", Tag::LegacyBatch),
    ("-1,-1,", Tag::Clear),
];

/// A decoded server message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a, const N: usize = MAX_BATCH_PIXELS> {
    /// Replace the whole canvas
    FullFrame(FullFrame<'a>),
    /// One fragment of a larger transfer, applied on its own
    Chunk {
        index: u16,
        total: u16,
        /// Pixel count announced by the sender (advisory)
        declared: u16,
        pixels: Batch<N>,
    },
    /// Unindexed batch (legacy chunk)
    Compressed {
        /// Pixel count announced by the sender (advisory)
        declared: u16,
        pixels: Batch<N>,
    },
    /// Deprecated `batch;` format, accepted and ignored
    LegacyBatch,
    /// Reset the canvas to the background color
    Clear,
    /// Single in-bounds pixel
    Pixel(PixelUpdate),
}

impl<'a, const N: usize> Message<'a, N> {
    /// Pixels carried by a batched message
    pub fn batch(&self) -> Option<&Batch<N>> {
        match self {
            Message::Chunk { pixels, .. } | Message::Compressed { pixels, .. } => Some(pixels),
            _ => None,
        }
    }
}

/// Message parser bound to a canvas dimension
///
/// `N` is the per-message batch capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageParser<const N: usize = MAX_BATCH_PIXELS> {
    dim: CanvasDim,
}

impl MessageParser {
    /// Create a parser with the default batch capacity
    pub const fn new(dim: CanvasDim) -> Self {
        Self { dim }
    }
}

impl<const N: usize> MessageParser<N> {
    /// Create a parser with an explicit batch capacity
    pub const fn with_capacity(dim: CanvasDim) -> Self {
        Self { dim }
    }

    /// Canvas dimension used for bounds checks
    pub const fn dim(&self) -> CanvasDim {
        self.dim
    }

    /// Decode one complete text message
    pub fn parse<'a>(&self, text: &'a str) -> Result<Message<'a, N>, ParseError> {
        for (prefix, tag) in TAG_TABLE {
            if let Some(body) = text.strip_prefix(prefix) {
                return self.parse_tagged(tag, body);
            }
        }

        self.parse_single(text)
    }

    fn parse_tagged<'a>(&self, tag: Tag, body: &'a str) -> Result<Message<'a, N>, ParseError> {
        match tag {
            Tag::Full => Ok(Message::FullFrame(FullFrame::new(body, self.dim))),
            Tag::Chunk => {
                // idx;total;count;<triples>
                let mut fields = body.splitn(4, ';');
                let index = parse_header_field(fields.next())?;
                let total = parse_header_field(fields.next())?;
                let declared = parse_header_field(fields.next())?;
                let triples = fields.next().ok_or(ParseError::MalformedHeader)?;

                if total == 0 || index >= total {
                    return Err(ParseError::MalformedHeader);
                }

                Ok(Message::Chunk {
                    index,
                    total,
                    declared,
                    pixels: Batch::from_triples(triples, self.dim),
                })
            }
            Tag::Compressed => {
                // count;<triples>
                let mut fields = body.splitn(2, ';');
                let declared = parse_header_field(fields.next())?;
                let triples = fields.next().unwrap_or("");

                Ok(Message::Compressed {
                    declared,
                    pixels: Batch::from_triples(triples, self.dim),
                })
            }
            Tag::LegacyBatch => Ok(Message::LegacyBatch),
            Tag::Clear => Ok(Message::Clear),
        }
    }

    fn parse_single<'a>(&self, text: &'a str) -> Result<Message<'a, N>, ParseError> {
        let text = text.trim();
        if text == "-1,-1" {
            return Ok(Message::Clear);
        }

        match PixelUpdate::parse(text, self.dim) {
            Ok(update) => Ok(Message::Pixel(update)),
            Err(ParseError::MalformedPixel) => Err(ParseError::Unrecognized),
            Err(e) => Err(e),
        }
    }
}

fn parse_header_field(field: Option<&str>) -> Result<u16, ParseError> {
    field
        .map(str::trim)
        .and_then(|f| f.parse::<u16>().ok())
        .ok_or(ParseError::MalformedHeader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::Color565;
    use proptest::prelude::*;

    fn parser() -> MessageParser {
        MessageParser::new(CanvasDim::D32)
    }

    #[test]
    fn test_single_pixel() {
        let msg = parser().parse("3,4,F800").unwrap();
        assert_eq!(msg, Message::Pixel(PixelUpdate::new(3, 4, Color565::RED)));
    }

    #[test]
    fn test_single_pixel_out_of_bounds() {
        assert_eq!(parser().parse("32,0,FFFF"), Err(ParseError::OutOfBounds));
        assert_eq!(parser().parse("0,-5,FFFF"), Err(ParseError::OutOfBounds));
    }

    #[test]
    fn test_unrecognized_text() {
        assert_eq!(parser().parse("hello"), Err(ParseError::Unrecognized));
        assert_eq!(parser().parse(""), Err(ParseError::Unrecognized));
        assert_eq!(parser().parse("fullframe"), Err(ParseError::Unrecognized));
    }

    #[test]
    fn test_clear_command() {
        assert_eq!(parser().parse("-1,-1,ffff"), Ok(Message::Clear));
        assert_eq!(parser().parse("-1,-1,anything at all"), Ok(Message::Clear));
        assert_eq!(parser().parse("-1,-1"), Ok(Message::Clear));
    }

    #[test]
    fn test_legacy_batch_is_ignored() {
        assert_eq!(parser().parse("batch;1,1,FFFF;2,2,0000"), Ok(Message::LegacyBatch));
    }

    #[test]
    fn test_full_frame_tag() {
        match parser().parse("full,ffff,0000") {
            Ok(Message::FullFrame(frame)) => {
                assert_eq!(frame.provided(), 2);
                assert_eq!(frame.dim(), CanvasDim::D32);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_chunk() {
        let msg = parser().parse("chunk;1;3;2;5,5,FFFF;6,5,0000").unwrap();
        match msg {
            Message::Chunk {
                index,
                total,
                declared,
                pixels,
            } => {
                assert_eq!((index, total, declared), (1, 3, 2));
                assert_eq!(
                    pixels.as_slice(),
                    &[
                        PixelUpdate::new(5, 5, Color565::WHITE),
                        PixelUpdate::new(6, 5, Color565::BLACK),
                    ]
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_chunk_malformed_header_is_rejected_whole() {
        // missing the separator after the count
        assert_eq!(
            parser().parse("chunk;1;3;25,5,FFFF;6,5,0000"),
            Err(ParseError::MalformedHeader)
        );
        // header with no pixel section
        assert_eq!(parser().parse("chunk;1;3;2"), Err(ParseError::MalformedHeader));
        // non-numeric field
        assert_eq!(
            parser().parse("chunk;x;3;2;5,5,FFFF"),
            Err(ParseError::MalformedHeader)
        );
        // index past total
        assert_eq!(
            parser().parse("chunk;3;3;1;5,5,FFFF"),
            Err(ParseError::MalformedHeader)
        );
        assert_eq!(
            parser().parse("chunk;0;0;1;5,5,FFFF"),
            Err(ParseError::MalformedHeader)
        );
    }

    #[test]
    fn test_chunk_drops_bad_triples_only() {
        let msg = parser().parse("chunk;0;1;3;1,1,FFFF;bad;99,1,0000").unwrap();
        let batch = msg.batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.malformed(), 1);
        assert_eq!(batch.out_of_bounds(), 1);
    }

    #[test]
    fn test_compressed() {
        let msg = parser().parse("compressed;2;0,0,001F;1,0,001F").unwrap();
        match msg {
            Message::Compressed { declared, pixels } => {
                assert_eq!(declared, 2);
                assert_eq!(pixels.len(), 2);
                assert_eq!(pixels.as_slice()[1], PixelUpdate::new(1, 0, Color565::BLUE));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_compressed_bad_count() {
        assert_eq!(
            parser().parse("compressed;many;0,0,001F"),
            Err(ParseError::MalformedHeader)
        );
    }

    #[test]
    fn test_batch_capacity_is_enforced() {
        let parser: MessageParser<4> = MessageParser::with_capacity(CanvasDim::D32);
        let msg = parser
            .parse("compressed;6;0,0,1;1,0,1;2,0,1;3,0,1;4,0,1;5,0,1")
            .unwrap();
        let batch = msg.batch().unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.overflow(), 2);
    }

    #[test]
    fn test_tag_priority() {
        // "full," wins even though the body would also look like a pixel list
        assert!(matches!(
            parser().parse("full,-1,-1,0"),
            Ok(Message::FullFrame(_))
        ));
    }

    #[test]
    fn test_larger_canvas() {
        let parser = MessageParser::new(CanvasDim::D64);
        assert_eq!(
            parser.parse("63,40,FFFF"),
            Ok(Message::Pixel(PixelUpdate::new(63, 40, Color565::WHITE)))
        );
        assert_eq!(parser.parse("64,40,FFFF"), Err(ParseError::OutOfBounds));
    }

    proptest! {
        #[test]
        fn prop_in_bounds_triple_parses(x in 0i32..32, y in 0i32..32, color in any::<u16>()) {
            let mut text = heapless::String::<32>::new();
            core::fmt::Write::write_fmt(&mut text, format_args!("{},{},{:X}", x, y, color))
                .unwrap();

            let msg = parser().parse(&text).unwrap();
            prop_assert_eq!(
                msg,
                Message::Pixel(PixelUpdate::new(x as u8, y as u8, Color565(color)))
            );
        }

        #[test]
        fn prop_out_of_bounds_triple_is_dropped(
            x in prop_oneof![-1000i32..0, 32i32..1000],
            y in -1000i32..1000,
            color in any::<u16>(),
        ) {
            // -1,-1 is the clear command
            prop_assume!(!(x == -1 && y == -1));

            let mut text = heapless::String::<32>::new();
            core::fmt::Write::write_fmt(&mut text, format_args!("{},{},{:x}", x, y, color))
                .unwrap();

            prop_assert_eq!(parser().parse(&text), Err(ParseError::OutOfBounds));
        }

        #[test]
        fn prop_parser_never_panics(text in "\\PC{0,64}") {
            let _ = parser().parse(&text);
        }
    }
}
