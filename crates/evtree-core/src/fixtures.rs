//! Shared test trees.

use crate::container::OrderedContainer;
use crate::datum::DatumRef;
use crate::scalar::PlainDatum;

/// Route tracing output through the test harness. Safe to call repeatedly.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `parent` holding `child.1`..`child.3`, each holding `child.i.1`..`child.i.3`.
pub(crate) fn sample_tree() -> DatumRef {
    init_logging();
    let parent = DatumRef::new(OrderedContainer::new("parent"));
    for i in 1..=3 {
        let child = parent
            .add(OrderedContainer::new(format!("child.{i}")))
            .unwrap();
        for j in 1..=3 {
            child.add(PlainDatum::new(format!("child.{i}.{j}"))).unwrap();
        }
    }
    parent
}
