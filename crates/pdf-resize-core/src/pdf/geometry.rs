//! Page geometry in PDF user-space points.
//!
//! PDF rectangles are written as `[llx lly urx ury]`. Nothing requires the
//! corners to be in that order, so [`PageBox::from_pdf_array`] normalises them.

use lopdf::Object;

use crate::error::{Error, Result};

/// US Letter media box, used when a page carries no MediaBox at all.
pub const DEFAULT_MEDIA_BOX: PageBox = PageBox::new(0.0, 0.0, 612.0, 792.0);

/// Width and height in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Reject sizes that cannot describe a page.
    pub fn validate(self) -> Result<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(self)
        } else {
            Err(Error::InvalidTargetSize {
                width: self.width,
                height: self.height,
            })
        }
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A page box: origin plus size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from a four-number PDF rectangle, in any corner order.
    pub fn from_pdf_array(array: &[Object]) -> Option<Self> {
        let [a, b, c, d] = array else {
            return None;
        };
        let (x0, y0, x1, y1) = (number(a)?, number(b)?, number(c)?, number(d)?);

        Some(Self::new(
            x0.min(x1),
            y0.min(y1),
            (x1 - x0).abs(),
            (y1 - y0).abs(),
        ))
    }

    /// Encode as a PDF rectangle array.
    pub fn to_pdf_array(self) -> Vec<Object> {
        vec![
            Object::Real(self.x),
            Object::Real(self.y),
            Object::Real(self.right()),
            Object::Real(self.top()),
        ]
    }

    pub fn right(self) -> f32 {
        self.x + self.width
    }

    pub fn top(self) -> f32 {
        self.y + self.height
    }

    pub const fn size(self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Same origin, new size.
    pub const fn with_size(self, size: PageSize) -> Self {
        Self::new(self.x, self.y, size.width, size.height)
    }

    /// Overlapping region of two boxes, or `None` when they only touch or are disjoint.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());

        (x1 > x0 && y1 > y0).then(|| Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Read a PDF number object as f32.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}
