//! Multi-container resource distribution.
//!
//! A vessel's containers for one resource form a fixed, ordered sequence
//! (captured at record-build time). Distribution walks that sequence left
//! to right carrying overflow/underflow forward; the final container is
//! allowed to go out of bounds until the clamp pass reconciles it and
//! reports the loss.

use ahash::AHashSet;
use smallvec::SmallVec;
use std::collections::HashMap;

use crate::PartSnapshot;

/// Index of one resource container inside a vessel snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerRef {
    pub part: usize,
    pub slot: usize,
}

/// Resource name → flow-enabled containers in part-traversal order.
pub type StorageIndex = HashMap<String, SmallVec<[ContainerRef; 4]>>;

/// Set of containers touched by distribution since the last clamp pass.
pub type ModifiedSet = AHashSet<ContainerRef>;

fn container_mut<'a>(
    parts: &'a mut [PartSnapshot],
    r: ContainerRef,
) -> Option<&'a mut crate::ResourceContainer> {
    parts.get_mut(r.part)?.resources.get_mut(r.slot)
}

/// Distribute `amount` (signed) of `resource` across the vessel's container
/// sequence. No-op when the vessel has no flow-enabled containers for it.
///
/// Every container reached is inserted into `modified` whether or not its
/// value changed. A container whose amount text fails to parse is skipped
/// and the full carried amount passes to the next one.
#[allow(clippy::float_cmp)] // the carry stops only on an exact zero remainder
pub(crate) fn add_resource(
    parts: &mut [PartSnapshot],
    storage: &StorageIndex,
    mut amount: f64,
    resource: &str,
    modified: &mut ModifiedSet,
) {
    let Some(refs) = storage.get(resource) else {
        return;
    };
    let reduce = amount < 0.0;
    let last = refs.len().saturating_sub(1);

    for (i, r) in refs.iter().enumerate() {
        if amount == 0.0 {
            break;
        }
        let Some(container) = container_mut(parts, *r) else {
            continue;
        };
        if let Some((current, max)) = container.read() {
            let mut next = current + amount;
            amount = 0.0;
            if reduce {
                if next < 0.0 && i < last {
                    amount = next;
                    next = 0.0;
                }
            } else if next > max && i < last {
                amount = next - max;
                next = max;
            }
            container.write_amount(next);
        }
        modified.insert(*r);
    }
}

/// Clamp every touched container back into `[0, max]` and return the total
/// loss: sum of `(clamped − pre-clamp)` deltas. Positive loss = resource
/// created covering an underflow, negative = overflow destroyed.
///
/// Containers with a non-finite max (unbounded capacity) are exempt.
pub(crate) fn clamp_resource(parts: &mut [PartSnapshot], modified: &ModifiedSet) -> f64 {
    // Sorted order keeps the f64 sum identical across runs.
    let mut refs: Vec<ContainerRef> = modified.iter().copied().collect();
    refs.sort_unstable();

    let mut loss = 0.0;
    for r in refs {
        let Some(container) = container_mut(parts, r) else {
            continue;
        };
        if let Some((current, max)) = container.read() {
            if !max.is_finite() {
                continue;
            }
            let clamped = current.clamp(0.0, max);
            loss += clamped - current;
            container.write_amount(clamped);
        }
    }
    loss
}

/// Withdraw `amount` of `resource` (negative = deposit) and return
/// `amount` minus the clamp loss. This is the one path host callbacks use,
/// so ordering and capacity invariants are never bypassed.
///
/// A resource with no flow-enabled containers distributes and clamps
/// nothing, so the full `amount` comes back unreduced.
pub(crate) fn request_resource(
    parts: &mut [PartSnapshot],
    storage: &StorageIndex,
    amount: f64,
    resource: &str,
) -> f64 {
    let mut modified = ModifiedSet::default();
    add_resource(parts, storage, -amount, resource, &mut modified);
    let loss = clamp_resource(parts, &modified);
    amount - loss
}
