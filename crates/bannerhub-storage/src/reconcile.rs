//! Positional reconciliation of a banner's tag associations.
//!
//! Backends compute a plan with [`plan_reconciliation`] and apply every step
//! inside one transaction. Association identity is preserved wherever an
//! existing row covers a target position.

use crate::types::{AssociationId, TagAssociation, TagId, TagSlot};

/// A single write produced by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    /// Point an existing association row at a new slot.
    Overwrite {
        association_id: AssociationId,
        slot: TagSlot,
    },
    /// Insert a new association row for a tag.
    Create { tag_id: TagId },
}

/// Computes the writes that turn `current` into `target`.
///
/// Rows are compared positionally:
/// - rows covered by the target are overwritten with the target tag,
/// - surplus target tags become new rows,
/// - surplus current rows are retired, never deleted.
///
/// Retired rows count as current rows, so they are reused before any new row
/// is created.
#[must_use]
pub fn plan_reconciliation(current: &[TagAssociation], target: &[TagId]) -> Vec<TagOp> {
    let mut ops = Vec::with_capacity(current.len().max(target.len()));

    for (index, association) in current.iter().enumerate() {
        let slot = match target.get(index) {
            Some(&tag_id) => TagSlot::Active(tag_id),
            None => TagSlot::Retired,
        };
        ops.push(TagOp::Overwrite {
            association_id: association.id,
            slot,
        });
    }

    ops.extend(
        target
            .iter()
            .skip(current.len())
            .map(|&tag_id| TagOp::Create { tag_id }),
    );

    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(tags: &[Option<TagId>]) -> Vec<TagAssociation> {
        tags.iter()
            .enumerate()
            .map(|(i, tag)| TagAssociation {
                id: i as AssociationId + 100,
                banner_id: 1,
                slot: TagSlot::from(*tag),
            })
            .collect()
    }

    #[test]
    fn test_equal_length_overwrites_in_place() {
        let ops = plan_reconciliation(&rows(&[Some(1), Some(2)]), &[5, 6]);
        assert_eq!(
            ops,
            vec![
                TagOp::Overwrite { association_id: 100, slot: TagSlot::Active(5) },
                TagOp::Overwrite { association_id: 101, slot: TagSlot::Active(6) },
            ]
        );
    }

    #[test]
    fn test_longer_target_creates_surplus() {
        let ops = plan_reconciliation(&rows(&[Some(1)]), &[5, 6, 7]);
        assert_eq!(
            ops,
            vec![
                TagOp::Overwrite { association_id: 100, slot: TagSlot::Active(5) },
                TagOp::Create { tag_id: 6 },
                TagOp::Create { tag_id: 7 },
            ]
        );
    }

    #[test]
    fn test_shorter_target_retires_surplus() {
        let ops = plan_reconciliation(&rows(&[Some(1), Some(2), Some(3)]), &[9, 9]);
        assert_eq!(
            ops,
            vec![
                TagOp::Overwrite { association_id: 100, slot: TagSlot::Active(9) },
                TagOp::Overwrite { association_id: 101, slot: TagSlot::Active(9) },
                TagOp::Overwrite { association_id: 102, slot: TagSlot::Retired },
            ]
        );
        assert!(!ops.iter().any(|op| matches!(op, TagOp::Create { .. })));
    }

    #[test]
    fn test_retired_rows_are_reused_first() {
        let ops = plan_reconciliation(&rows(&[Some(1), None]), &[4, 5]);
        assert_eq!(
            ops,
            vec![
                TagOp::Overwrite { association_id: 100, slot: TagSlot::Active(4) },
                TagOp::Overwrite { association_id: 101, slot: TagSlot::Active(5) },
            ]
        );
    }

    #[test]
    fn test_empty_target_retires_everything() {
        let ops = plan_reconciliation(&rows(&[Some(1), Some(2)]), &[]);
        assert!(ops.iter().all(|op| matches!(
            op,
            TagOp::Overwrite { slot: TagSlot::Retired, .. }
        )));
        assert_eq!(ops.len(), 2);
    }
}
