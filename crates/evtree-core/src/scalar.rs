//! Simple leaf datums.

use crate::datum::{Datum, DatumHeader};

/// A leaf with no payload beyond its name and title.
#[derive(Debug)]
pub struct PlainDatum {
    header: DatumHeader,
}

impl PlainDatum {
    pub const DEFAULT_TITLE: &'static str = "Event Datum";

    /// A datum with the default title.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_title(name, Self::DEFAULT_TITLE)
    }

    /// A datum with an explicit title.
    pub fn with_title(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            header: DatumHeader::new(name, title),
        }
    }
}

crate::impl_object!(PlainDatum, datum);

impl Datum for PlainDatum {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }
}

/// A named vector of reals; the first element is "the" value.
#[derive(Debug)]
pub struct RealDatum {
    header: DatumHeader,
    values: Vec<f64>,
}

impl RealDatum {
    pub const DEFAULT_TITLE: &'static str = "Real Value";

    /// A datum holding the single value `value`.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self::with_title(name, Self::DEFAULT_TITLE, value)
    }

    /// Like [`new`](Self::new), with an explicit title.
    pub fn with_title(name: impl Into<String>, title: impl Into<String>, value: f64) -> Self {
        Self {
            header: DatumHeader::new(name, title),
            values: vec![value],
        }
    }

    /// The first element, or zero when cleared.
    pub fn value(&self) -> f64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// Set the first element, adding it if cleared.
    pub fn set_value(&mut self, value: f64) {
        match self.values.first_mut() {
            Some(first) => *first = value,
            None => self.values.push(value),
        }
    }

    /// Every stored value.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Append a value.
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

crate::impl_object!(RealDatum, datum);

impl Datum for RealDatum {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }

    fn summary(&self) -> Option<String> {
        Some(format!("{:?}", self.values))
    }
}

/// A named vector of integers; the first element is "the" value.
#[derive(Debug)]
pub struct IntegerDatum {
    header: DatumHeader,
    values: Vec<i64>,
}

impl IntegerDatum {
    pub const DEFAULT_TITLE: &'static str = "Integer Value";

    /// A datum holding the single value `value`.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self::with_title(name, Self::DEFAULT_TITLE, value)
    }

    /// Like [`new`](Self::new), with an explicit title.
    pub fn with_title(name: impl Into<String>, title: impl Into<String>, value: i64) -> Self {
        Self {
            header: DatumHeader::new(name, title),
            values: vec![value],
        }
    }

    /// The first element, or zero when cleared.
    pub fn value(&self) -> i64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// Set the first element, adding it if cleared.
    pub fn set_value(&mut self, value: i64) {
        match self.values.first_mut() {
            Some(first) => *first = value,
            None => self.values.push(value),
        }
    }

    /// Every stored value.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Append a value.
    pub fn push(&mut self, value: i64) {
        self.values.push(value);
    }

    /// Drop every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

crate::impl_object!(IntegerDatum, datum);

impl Datum for IntegerDatum {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }

    fn summary(&self) -> Option<String> {
        Some(format!("{:?}", self.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_the_first_element() {
        let mut d = RealDatum::new("x", 1.0);
        d.push(2.0);
        d.set_value(3.0);
        assert_eq!(d.values(), &[3.0, 2.0]);
        d.clear();
        assert_eq!(d.value(), 0.0);
        d.set_value(4.0);
        assert_eq!(d.values(), &[4.0]);
    }

    #[test]
    fn defaults() {
        let i = IntegerDatum::new("n", 7);
        assert_eq!(i.title(), IntegerDatum::DEFAULT_TITLE);
        assert_eq!(i.summary().as_deref(), Some("[7]"));
        assert_eq!(PlainDatum::new("p").title(), "Event Datum");
        assert_eq!(RealDatum::new("r", 0.5).summary().as_deref(), Some("[0.5]"));
    }
}
