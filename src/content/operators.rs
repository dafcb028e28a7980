//! Content stream operators.
//!
//! Operators that matter for text extraction and redaction are strongly
//! typed. Everything else (paths, colors, shading, ...) is kept verbatim as
//! [`Operator::Other`] so a stream survives a parse/serialize round trip.

use crate::object::Object;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A content stream operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operator {
    // Text positioning operators
    /// Move text position (Td)
    Td {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Move text position and set leading (TD)
    TD {
        /// Horizontal offset
        tx: f32,
        /// Vertical offset
        ty: f32,
    },
    /// Set text matrix (Tm)
    Tm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e (x translation)
        e: f32,
        /// Matrix element f (y translation)
        f: f32,
    },
    /// Move to start of next line (T*)
    TStar,

    // Text showing operators
    /// Show text string (Tj)
    Tj {
        /// Text to show (byte array)
        text: Vec<u8>,
    },
    /// Show text with individual glyph positioning (TJ)
    TJ {
        /// Array of text strings and positioning adjustments
        array: Vec<TextElement>,
    },
    /// Move to next line and show text (')
    Quote {
        /// Text to show
        text: Vec<u8>,
    },
    /// Set spacing, move to next line and show text (")
    DoubleQuote {
        /// Word spacing
        word_space: f32,
        /// Character spacing
        char_space: f32,
        /// Text to show
        text: Vec<u8>,
    },

    // Text state operators
    /// Set character spacing (Tc)
    Tc {
        /// Character spacing
        char_space: f32,
    },
    /// Set word spacing (Tw)
    Tw {
        /// Word spacing
        word_space: f32,
    },
    /// Set horizontal scaling (Tz)
    Tz {
        /// Horizontal scaling percentage
        scale: f32,
    },
    /// Set text leading (TL)
    TL {
        /// Text leading
        leading: f32,
    },
    /// Set font and size (Tf)
    Tf {
        /// Font resource name
        font: String,
        /// Font size
        size: f32,
    },
    /// Set text rendering mode (Tr)
    Tr {
        /// Rendering mode (3 = invisible)
        render: u8,
    },
    /// Set text rise (Ts)
    Ts {
        /// Text rise
        rise: f32,
    },

    // Graphics state operators
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Modify current transformation matrix (cm)
    Cm {
        /// Matrix element a
        a: f32,
        /// Matrix element b
        b: f32,
        /// Matrix element c
        c: f32,
        /// Matrix element d
        d: f32,
        /// Matrix element e (x translation)
        e: f32,
        /// Matrix element f (y translation)
        f: f32,
    },

    // Text object operators
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,

    /// Paint XObject (Do)
    Do {
        /// XObject resource name
        name: String,
    },

    /// Inline image (BI ... ID ... EI)
    InlineImage {
        /// Inline image dictionary with abbreviated keys
        dict: HashMap<String, Object>,
        /// Raw image data bytes
        data: Vec<u8>,
    },

    // Marked content operators
    /// Begin marked content (BMC)
    BeginMarkedContent {
        /// Tag name
        tag: String,
    },
    /// Begin marked content with property list (BDC)
    BeginMarkedContentDict {
        /// Tag name
        tag: String,
        /// Inline property dictionary or name of a /Properties resource
        properties: Object,
    },
    /// End marked content (EMC)
    EndMarkedContent,

    /// Any operator without a typed variant, kept verbatim
    Other {
        /// Operator name
        name: String,
        /// Operands
        operands: Vec<Object>,
    },
}

/// Element in a TJ array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextElement {
    /// Text string to show
    String(Vec<u8>),
    /// Positioning adjustment (in thousandths of a unit of text space)
    Offset(f32),
}

impl Operator {
    /// The operator keyword as written in a content stream.
    pub fn name(&self) -> &str {
        match self {
            Operator::Td { .. } => "Td",
            Operator::TD { .. } => "TD",
            Operator::Tm { .. } => "Tm",
            Operator::TStar => "T*",
            Operator::Tj { .. } => "Tj",
            Operator::TJ { .. } => "TJ",
            Operator::Quote { .. } => "'",
            Operator::DoubleQuote { .. } => "\"",
            Operator::Tc { .. } => "Tc",
            Operator::Tw { .. } => "Tw",
            Operator::Tz { .. } => "Tz",
            Operator::TL { .. } => "TL",
            Operator::Tf { .. } => "Tf",
            Operator::Tr { .. } => "Tr",
            Operator::Ts { .. } => "Ts",
            Operator::SaveState => "q",
            Operator::RestoreState => "Q",
            Operator::Cm { .. } => "cm",
            Operator::BeginText => "BT",
            Operator::EndText => "ET",
            Operator::Do { .. } => "Do",
            Operator::InlineImage { .. } => "BI",
            Operator::BeginMarkedContent { .. } => "BMC",
            Operator::BeginMarkedContentDict { .. } => "BDC",
            Operator::EndMarkedContent => "EMC",
            Operator::Other { name, .. } => name,
        }
    }

    /// Whether this operator paints glyphs.
    pub fn is_text_show(&self) -> bool {
        matches!(
            self,
            Operator::Tj { .. }
                | Operator::TJ { .. }
                | Operator::Quote { .. }
                | Operator::DoubleQuote { .. }
        )
    }

    /// The string elements shown by a text-show operator, in order.
    ///
    /// Element indices match those used by glyph provenance: the position in
    /// a TJ array, or 0 for the single string of Tj, ' and ".
    pub fn shown_strings(&self) -> Vec<(usize, &[u8])> {
        match self {
            Operator::Tj { text }
            | Operator::Quote { text }
            | Operator::DoubleQuote { text, .. } => vec![(0, text.as_slice())],
            Operator::TJ { array } => array
                .iter()
                .enumerate()
                .filter_map(|(i, el)| match el {
                    TextElement::String(s) => Some((i, s.as_slice())),
                    TextElement::Offset(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `/ActualText` carried by a BDC property dictionary, if any.
    pub fn actual_text(&self) -> Option<&[u8]> {
        match self {
            Operator::BeginMarkedContentDict { properties, .. } => properties
                .as_dict()
                .and_then(|d| d.get("ActualText"))
                .and_then(|o| o.as_string()),
            _ => None,
        }
    }
}
