//! Test digits and a configurable factory.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use evtree_core::DatumRef;

use crate::channel::{ChannelId, Digit};
use crate::container::DigitContainer;
use crate::manager::DigitFactory;

pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
pub(crate) struct TestDigit {
    channel: ChannelId,
}

impl TestDigit {
    pub(crate) fn new(channel: u32) -> Self {
        Self {
            channel: ChannelId::new(channel),
        }
    }
}

impl Digit for TestDigit {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }
}

/// A container holding one [`TestDigit`] per channel.
pub(crate) fn container(name: &str, channels: &[u32]) -> DigitContainer {
    let mut digits = DigitContainer::new(name);
    for &channel in channels {
        digits.push(TestDigit::new(channel));
    }
    digits
}

/// Produces digits from a channel list the test can change between calls.
pub(crate) struct TestFactory {
    pub(crate) name: String,
    pub(crate) channels: Rc<RefCell<Vec<u32>>>,
    pub(crate) fail: Rc<Cell<bool>>,
    pub(crate) calls: Rc<Cell<u32>>,
}

impl TestFactory {
    pub(crate) fn new(name: &str, channels: &[u32]) -> Self {
        Self {
            name: name.to_string(),
            channels: Rc::new(RefCell::new(channels.to_vec())),
            fail: Rc::new(Cell::new(false)),
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl DigitFactory for TestFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn make_digits(&self, _event: &DatumRef) -> Option<DigitContainer> {
        self.calls.set(self.calls.get() + 1);
        if self.fail.get() {
            return None;
        }
        // Unnamed; the manager names the result.
        Some(container("", &self.channels.borrow()))
    }
}
