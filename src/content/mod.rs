//! PDF content stream parsing, serialization and execution state.
//!
//! Pages keep their content as a parsed operator list; redaction edits the
//! list and [`serialize_content_stream`] writes it back.

pub mod graphics_state;
pub mod operators;
pub mod parser;
pub mod writer;

pub use graphics_state::{GraphicsState, GraphicsStateStack, Matrix, TextState};
pub use operators::{Operator, TextElement};
pub use parser::parse_content_stream;
pub use writer::serialize_content_stream;
