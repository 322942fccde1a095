// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Piecewise cubic curves deriving secondary content motion from the primary content.
//!
//! A [`CurveSet`] holds, for each driven [`Property`], an ordered list of
//! [`CurveSegment`]s. A segment covers source values from its begin offset up
//! to the begin offset of the next segment for the same property; the first
//! segment also covers everything before its own begin offset. The segment
//! polynomial is evaluated in `d = source - begin`.
//!
//! ```rust
//! use understory_manipulation::curve::{CurveSegment, CurveSet, Property};
//!
//! // A header that follows horizontal panning and stays put vertically.
//! let curves = CurveSet::new()
//!     .with(CurveSegment::linear(Property::TranslationX, 0.0, 0.0, 1.0))
//!     .with(CurveSegment::constant(Property::TranslationY, 0.0, 0.0));
//!
//! let source = |p: Property| match p {
//!     Property::TranslationX => -40.0,
//!     Property::TranslationY => -300.0,
//!     Property::Zoom => 1.0,
//! };
//! assert_eq!(curves.evaluate(Property::TranslationX, source), Some(-40.0));
//! assert_eq!(curves.evaluate(Property::TranslationY, source), Some(0.0));
//! assert_eq!(curves.evaluate(Property::Zoom, source), None);
//! ```

use smallvec::SmallVec;

use crate::types::ContentType;

/// A transform component of a content object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    /// Horizontal translation.
    TranslationX,
    /// Vertical translation.
    TranslationY,
    /// Uniform zoom.
    Zoom,
}

impl Property {
    /// All properties, in evaluation order.
    pub const ALL: [Self; 3] = [Self::TranslationX, Self::TranslationY, Self::Zoom];
}

/// One cubic piece of a curve.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurveSegment {
    /// Property this segment drives.
    pub property: Property,
    /// Primary content property the segment reads.
    pub source: Property,
    /// Source value at which the segment starts.
    pub begin: f64,
    /// Constant, linear, quadratic and cubic coefficients.
    pub coefficients: [f64; 4],
}

impl CurveSegment {
    /// Creates a segment driving `property` from the same primary property.
    #[must_use]
    pub const fn new(property: Property, begin: f64, coefficients: [f64; 4]) -> Self {
        Self {
            property,
            source: property,
            begin,
            coefficients,
        }
    }

    /// A segment holding `value`.
    #[must_use]
    pub const fn constant(property: Property, begin: f64, value: f64) -> Self {
        Self::new(property, begin, [value, 0.0, 0.0, 0.0])
    }

    /// A segment starting at `value` and changing by `slope` per unit of source.
    #[must_use]
    pub const fn linear(property: Property, begin: f64, value: f64, slope: f64) -> Self {
        Self::new(property, begin, [value, slope, 0.0, 0.0])
    }

    /// Reads a different primary property.
    #[must_use]
    pub const fn with_source(mut self, source: Property) -> Self {
        self.source = source;
        self
    }

    /// Evaluates the polynomial at `source`.
    #[must_use]
    pub fn evaluate(&self, source: f64) -> f64 {
        let d = source - self.begin;
        let [c0, c1, c2, c3] = self.coefficients;
        c0 + d * (c1 + d * (c2 + d * c3))
    }
}

/// Ordered curve segments for any subset of [`Property`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurveSet {
    segments: SmallVec<[CurveSegment; 8]>,
}

impl CurveSet {
    /// Creates an empty set. Undriven properties follow the primary content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment.
    ///
    /// Segments of one property must be pushed in ascending begin order and
    /// must share the same source.
    pub fn push(&mut self, segment: CurveSegment) {
        debug_assert!(
            self.segments_for(segment.property)
                .last()
                .is_none_or(|last| last.begin <= segment.begin && last.source == segment.source),
            "segments of one property must be ordered and share a source"
        );
        self.segments.push(segment);
    }

    /// Appends a segment, builder style.
    #[must_use]
    pub fn with(mut self, segment: CurveSegment) -> Self {
        self.push(segment);
        self
    }

    /// Appends every segment of `other`.
    pub fn extend(&mut self, other: &Self) {
        for segment in &other.segments {
            self.push(*segment);
        }
    }

    /// All segments in insertion order.
    #[must_use]
    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    /// Segments driving `property`.
    pub fn segments_for(&self, property: Property) -> impl Iterator<Item = &CurveSegment> + '_ {
        self.segments.iter().filter(move |s| s.property == property)
    }

    /// Returns `true` if at least one segment drives `property`.
    #[must_use]
    pub fn drives(&self, property: Property) -> bool {
        self.segments_for(property).next().is_some()
    }

    /// Returns `true` if no property is driven.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Evaluates `property`, reading primary values through `source`.
    ///
    /// Returns `None` when no segment drives `property`.
    pub fn evaluate(&self, property: Property, source: impl Fn(Property) -> f64) -> Option<f64> {
        let mut segments = self.segments_for(property);
        let first = segments.next()?;
        let s = source(first.source);
        let mut current = first;
        for segment in segments {
            if segment.begin > s {
                break;
            }
            current = segment;
        }
        Some(current.evaluate(s))
    }

    /// Curves following the primary content on every property.
    #[must_use]
    pub fn pass_through() -> Self {
        let mut set = Self::new();
        for property in Property::ALL {
            set.push(CurveSegment::linear(property, 0.0, 0.0, 1.0));
        }
        set
    }

    /// Default curves for secondary content of the given type.
    ///
    /// Headers follow the primary content along their scrolling axis only and
    /// every type follows its zoom. Returns `None` for
    /// [`ContentType::Primary`], which is not secondary content.
    #[must_use]
    pub fn for_content_type(content_type: ContentType) -> Option<Self> {
        let follow = |p| CurveSegment::linear(p, 0.0, 0.0, 1.0);
        let fixed = |p| CurveSegment::constant(p, 0.0, 0.0);
        let (x, y) = match content_type {
            ContentType::Primary => return None,
            ContentType::TopHeader => (follow(Property::TranslationX), fixed(Property::TranslationY)),
            ContentType::LeftHeader => (fixed(Property::TranslationX), follow(Property::TranslationY)),
            ContentType::TopLeftHeader => (fixed(Property::TranslationX), fixed(Property::TranslationY)),
            ContentType::Descendant | ContentType::Custom => {
                (follow(Property::TranslationX), follow(Property::TranslationY))
            }
        };
        Some(Self::new().with(x).with(y).with(follow(Property::Zoom)))
    }
}
