//! Graphics and text state for content stream execution.
//!
//! Tracks the transformation matrices and text state parameters that decide
//! where each glyph lands on the page, and how far it advances.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};

/// A 2D transformation matrix.
///
/// PDF uses matrices of the form:
/// ```text
/// [ a  b  0 ]
/// [ c  d  0 ]
/// [ e  f  1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    /// Horizontal scaling component
    pub a: f32,
    /// Rotation/skew component
    pub b: f32,
    /// Rotation/skew component
    pub c: f32,
    /// Vertical scaling component
    pub d: f32,
    /// Horizontal translation
    pub e: f32,
    /// Vertical translation
    pub f: f32,
}

impl Matrix {
    /// The identity matrix.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// A matrix from its six components.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// A translation matrix.
    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Multiply this matrix with another.
    ///
    /// The result applies `self` first, then `other`, which is the order PDF
    /// uses for `cm` (new CTM = M × CTM) and for text rendering
    /// (Trm = params × Tm × CTM).
    ///
    /// ```
    /// use pdf_sanitizer::content::Matrix;
    ///
    /// let m = Matrix::translation(10.0, 0.0).multiply(&Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
    /// assert_eq!(m.transform_point(0.0, 0.0).x, 20.0);
    /// ```
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform a point using this matrix.
    pub fn transform_point(&self, x: f32, y: f32) -> Point {
        Point {
            x: self.a * x + self.c * y + self.e,
            y: self.b * x + self.d * y + self.f,
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// Text state parameters (ISO 32000-1 §9.3), saved and restored with q/Q.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    /// Character spacing (Tc)
    pub char_space: f32,
    /// Word spacing (Tw)
    pub word_space: f32,
    /// Horizontal scaling percentage (Tz)
    pub horizontal_scaling: f32,
    /// Text leading (TL)
    pub leading: f32,
    /// Current font resource name (Tf)
    pub font_name: Option<String>,
    /// Current font size (Tf)
    pub font_size: f32,
    /// Text rise (Ts)
    pub rise: f32,
    /// Text rendering mode (Tr)
    pub render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_space: 0.0,
            word_space: 0.0,
            horizontal_scaling: 100.0,
            leading: 0.0,
            font_name: None,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// Graphics state subset needed for text placement.
#[derive(Debug, Clone, Default)]
pub struct GraphicsState {
    /// Current transformation matrix
    pub ctm: Matrix,
    /// Text state parameters
    pub text: TextState,
}

/// Graphics state with its q/Q save stack.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStateStack {
    /// The current graphics state.
    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    /// Mutable access to the current graphics state.
    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    /// Save the current state (q).
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// Restore the last saved state (Q). Unbalanced Q is ignored.
    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.current = state;
        }
    }

    /// Number of saved states.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}
