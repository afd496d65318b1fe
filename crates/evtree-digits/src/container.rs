//! Containers of raw digits.
//!
//! A [`DigitContainer`] is a datum holding the digits of one source (its
//! name, e.g. `tpc`, is also the proxy type name). Its signature is a
//! Fowler/Noll/Vo style hash of the name, the title and every channel id,
//! so a container regenerated with the same contents has the same
//! signature, and one regenerated with different contents almost surely
//! does not.

use std::cell::Cell;
use std::rc::Rc;

use evtree_core::{Datum, DatumHeader, DatumRef, DatumResult, Handle, OrderedContainer, View};

use crate::channel::Digit;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn mix(signature: u32, byte: u8) -> u32 {
    signature.wrapping_mul(FNV_PRIME) ^ u32::from(byte)
}

/// Metadata about a range of digits in a container.
#[derive(Debug, Default)]
pub struct DigitHeader {
    name: String,
    begin_valid: u32,
    end_valid: u32,
    data: Option<DatumRef>,
}

impl DigitHeader {
    /// A header with an empty valid range and no data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The header's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the header.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Offsets `[begin, end)` of the digits this header describes.
    pub fn valid_range(&self) -> (u32, u32) {
        (self.begin_valid, self.end_valid)
    }

    /// Set the `[begin, end)` offsets.
    pub fn set_valid_range(&mut self, begin: u32, end: u32) {
        self.begin_valid = begin;
        self.end_valid = end;
    }

    /// Attach auxiliary data to the header.
    pub fn add_datum(&mut self, item: DatumRef, name: Option<&str>) -> DatumResult<()> {
        let data = self
            .data
            .get_or_insert_with(|| DatumRef::new(OrderedContainer::new("data")));
        data.add_datum(item, name)
    }

    /// Look up auxiliary data; a null handle when there is none.
    pub fn get<T: ?Sized + View>(&self, path: &str) -> DatumResult<Handle<T>> {
        match &self.data {
            Some(data) => data.get::<T>(path),
            None => Ok(Handle::null()),
        }
    }
}

/// The digits of one source, plus their headers.
#[derive(Debug)]
pub struct DigitContainer {
    header: DatumHeader,
    digits: Vec<Rc<dyn Digit>>,
    headers: Vec<DigitHeader>,
    signature: Cell<Option<u32>>,
}

impl DigitContainer {
    pub const DEFAULT_NAME: &'static str = "digits";
    pub const DEFAULT_TITLE: &'static str = "Digit Pointers";

    /// An empty container with the default title.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_title(name, Self::DEFAULT_TITLE)
    }

    /// An empty container with an explicit title.
    pub fn with_title(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            header: DatumHeader::new(name, title),
            digits: Vec::new(),
            headers: Vec::new(),
            signature: Cell::new(None),
        }
    }

    /// Append a digit.
    pub fn push(&mut self, digit: impl Digit + 'static) {
        self.push_shared(Rc::new(digit));
    }

    /// Append a digit that may be shared elsewhere.
    pub fn push_shared(&mut self, digit: Rc<dyn Digit>) {
        self.signature.set(None);
        self.digits.push(digit);
    }

    /// The digit at `offset`.
    pub fn get(&self, offset: usize) -> Option<&Rc<dyn Digit>> {
        self.digits.get(offset)
    }

    /// Number of digits.
    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// True when there are no digits.
    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    /// Digits in offset order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Rc<dyn Digit>> + ExactSizeIterator {
        self.digits.iter()
    }

    /// Offset of a digit held by this container, by identity.
    pub fn position(&self, digit: &Rc<dyn Digit>) -> Option<usize> {
        let wanted = Rc::as_ptr(digit) as *const ();
        self.digits
            .iter()
            .position(|d| std::ptr::eq(Rc::as_ptr(d) as *const (), wanted))
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> &[DigitHeader] {
        &self.headers
    }

    /// Append a header.
    pub fn add_header(&mut self, header: DigitHeader) {
        self.headers.push(header);
    }

    /// Hash of name, title and channel ids; cached until the next change.
    pub fn signature(&self) -> u32 {
        if let Some(signature) = self.signature.get() {
            return signature;
        }
        let mut signature = FNV_OFFSET;
        for byte in self.header.name().bytes().chain(self.header.title().bytes()) {
            signature = mix(signature, byte);
        }
        for digit in &self.digits {
            for byte in digit.channel_id().as_u32().to_le_bytes() {
                signature = mix(signature, byte);
            }
        }
        self.signature.set(Some(signature));
        signature
    }
}

impl Default for DigitContainer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

evtree_core::impl_object!(DigitContainer, datum);

impl Datum for DigitContainer {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    // Renaming changes the signature.
    fn header_mut(&mut self) -> &mut DatumHeader {
        self.signature.set(None);
        &mut self.header
    }

    fn summary(&self) -> Option<String> {
        Some(format!(
            "{} digits, signature {:#010x}",
            self.digits.len(),
            self.signature()
        ))
    }
}
