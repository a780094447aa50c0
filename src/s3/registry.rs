//! Part registry for a multipart upload session
//!
//! The producer owns the shape of the registry: it assigns part numbers and
//! pre-allocates the matching slot before a chunk is dispatched. Workers own
//! the content: each slot is filled exactly once, by the worker that uploaded
//! that part. Both happen under one mutex, so a fill can never race a resize.

use super::error::{S3Error, S3Result};
use super::xml::CompletedPart;
use super::MAX_PARTS;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct PartRegistry {
    slots: Mutex<Vec<Option<String>>>,
}

impl PartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next part number and allocate its empty slot
    ///
    /// Numbers are contiguous from 1. Fails without growing once
    /// [`MAX_PARTS`] numbers have been handed out.
    pub fn assign(&self) -> S3Result<u32> {
        let mut slots = self.lock();
        if slots.len() >= MAX_PARTS as usize {
            return Err(S3Error::LimitExceeded(format!(
                "S3 limits multipart uploads to {} parts",
                MAX_PARTS
            )));
        }
        slots.push(None);
        Ok(slots.len() as u32)
    }

    /// Record the integrity tag returned for an uploaded part
    pub fn record(&self, part_number: u32, etag: String) -> S3Result<()> {
        let mut slots = self.lock();
        let index = (part_number as usize)
            .checked_sub(1)
            .filter(|i| *i < slots.len())
            .ok_or_else(|| {
                S3Error::IncompleteUpload(format!("part {} was never assigned", part_number))
            })?;

        let slot = &mut slots[index];
        if slot.is_some() {
            return Err(S3Error::IncompleteUpload(format!(
                "part {} was already recorded",
                part_number
            )));
        }
        *slot = Some(etag);
        Ok(())
    }

    /// Number of part numbers assigned so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of parts whose upload has been acknowledged
    pub fn completed(&self) -> usize {
        self.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Build the completion manifest, ascending by part number
    ///
    /// Fails if nothing was assigned or if any assigned part is still missing
    /// its tag, since the service would reject a manifest with gaps.
    pub fn manifest(&self) -> S3Result<Vec<CompletedPart>> {
        let slots = self.lock();
        if slots.is_empty() {
            return Err(S3Error::IncompleteUpload(
                "no parts have been uploaded".to_string(),
            ));
        }

        let mut parts = slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let part_number = index as u32 + 1;
                slot.as_ref()
                    .map(|etag| CompletedPart {
                        part_number,
                        etag: etag.clone(),
                    })
                    .ok_or_else(|| {
                        S3Error::IncompleteUpload(format!("part {} has no ETag", part_number))
                    })
            })
            .collect::<S3Result<Vec<_>>>()?;

        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Option<String>>> {
        // A poisoned lock only means a worker panicked mid-fill; the slots
        // themselves are still consistent.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
