//! The conventional root of an event tree.
//!
//! An [`Event`] is an ordered container named after its run and event
//! numbers, built with the standard `digits`, `hits` and `fits` folders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::container::{Container, OrderedContainer};
use crate::datum::{Datum, DatumHeader, DatumRef};
use crate::error::DatumResult;
use crate::object::ObjectRef;

/// Name used when the run or event number is unknown.
pub const UNINITIALIZED_EVENT: &str = "event.uninitialized";

/// Standard top-level folders: name and title.
pub const EVENT_FOLDERS: [(&str, &str); 3] = [
    ("digits", "Uncalibrated digit data"),
    ("hits", "Calibrated hit data"),
    ("fits", "Fit results from reconstruction"),
];

/// Where an event came from. Unset fields are `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventContext {
    pub partition: Option<u32>,
    pub run: Option<u32>,
    pub sub_run: Option<u32>,
    pub event: Option<u32>,
    pub spill: Option<u32>,
    /// Seconds since the Unix epoch.
    pub time_stamp: Option<u64>,
}

impl EventContext {
    /// Partition bit marking simulated data.
    pub const MC_DATA: u32 = 1 << 16;

    pub fn new(run: u32, event: u32) -> Self {
        Self {
            run: Some(run),
            event: Some(event),
            ..Default::default()
        }
    }

    /// `None` when the partition is unknown.
    pub fn is_mc(&self) -> Option<bool> {
        self.partition.map(|p| p & Self::MC_DATA != 0)
    }

    /// `event.RRRRREEEEEEEE`, or [`UNINITIALIZED_EVENT`].
    pub fn event_name(&self) -> String {
        match (self.run, self.event) {
            (Some(run), Some(event)) => format!("event.{run:05}{event:08}"),
            _ => UNINITIALIZED_EVENT.to_string(),
        }
    }
}

impl fmt::Display for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(p) = self.partition {
            fields.push(format!("P: {p:#x}"));
        }
        if let Some(r) = self.run {
            fields.push(format!("R: {r}"));
        }
        if let Some(sr) = self.sub_run {
            fields.push(format!("SR: {sr}"));
        }
        if let Some(e) = self.event {
            fields.push(format!("E: {e}"));
        }
        if let Some(s) = self.spill {
            fields.push(format!("S: {s}"));
        }
        if let Some(t) = self.time_stamp {
            fields.push(format!("T: {t}"));
        }
        if fields.is_empty() {
            return f.write_str("<invalid context>");
        }
        write!(f, "<{}>", fields.join(" "))
    }
}

/// Root datum of one event.
#[derive(Debug)]
pub struct Event {
    contents: OrderedContainer,
    context: EventContext,
}

impl Event {
    pub const DEFAULT_TITLE: &'static str = "Event";

    /// A bare event without the standard folders.
    pub fn new(context: EventContext) -> Self {
        Self {
            contents: OrderedContainer::with_title(context.event_name(), Self::DEFAULT_TITLE),
            context,
        }
    }

    /// Allocate an event and add the standard folders.
    pub fn build(context: EventContext) -> DatumResult<DatumRef> {
        let event = DatumRef::new(Self::new(context));
        for (name, title) in EVENT_FOLDERS {
            if !event.has::<OrderedContainer>(name) {
                event.add(OrderedContainer::with_title(name, title))?;
            }
        }
        tracing::debug!(event = %event.name(), "built event");
        Ok(event)
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    /// Replace the context and rename the event to match.
    pub fn set_context(&mut self, context: EventContext) {
        self.context = context;
        self.contents.header_mut().set_name(context.event_name());
    }
}

crate::impl_object!(Event, datum);

impl Datum for Event {
    fn header(&self) -> &DatumHeader {
        self.contents.header()
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        self.contents.header_mut()
    }

    fn find_datum(&self, name: &str) -> DatumResult<Option<ObjectRef>> {
        self.contents.find_datum(name)
    }

    fn as_container(&self) -> Option<&(dyn Container + 'static)> {
        Some(&self.contents)
    }

    fn as_container_mut(&mut self) -> Option<&mut (dyn Container + 'static)> {
        Some(&mut self.contents)
    }

    fn as_ordered(&self) -> Option<&OrderedContainer> {
        Some(&self.contents)
    }

    fn as_ordered_mut(&mut self) -> Option<&mut OrderedContainer> {
        Some(&mut self.contents)
    }

    fn summary(&self) -> Option<String> {
        Some(self.context.to_string())
    }
}
