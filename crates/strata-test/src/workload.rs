//! Seeded create/destroy workloads.
//!
//! A [`Workload`] drives an [`ObjectManager`] file with a random mix of
//! creates (with and without near hints) and destroys, and keeps a
//! [`Model`] of what the file must contain afterwards.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_common::types::ObjectId;
use strata_object::{CatalogRef, DeallocList, ObjectManager, ObjectResult, ObjectSpec};
use tracing::debug;

use crate::utils::{scan_backward, scan_forward};

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of operations.
    pub steps: usize,
    /// Largest payload length.
    pub max_len: usize,
    /// Probability that a step destroys an object (when one exists).
    pub destroy_ratio: f64,
    /// Probability that a create passes a near hint.
    pub near_ratio: f64,
    /// Release the dealloc list every this many steps (0 = only at the end).
    pub release_every: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            steps: 2_000,
            max_len: 1_500,
            destroy_ratio: 0.4,
            near_ratio: 0.25,
            release_every: 100,
        }
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStats {
    /// Objects created.
    pub created: usize,
    /// Objects created with a near hint.
    pub near_hints: usize,
    /// Objects destroyed.
    pub destroyed: usize,
    /// Pages returned to the allocator.
    pub released_pages: usize,
}

/// Expected contents of a file.
#[derive(Debug, Default)]
pub struct Model {
    objects: HashMap<ObjectId, Vec<u8>>,
    order: Vec<ObjectId>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a created object.
    pub fn insert(&mut self, oid: ObjectId, payload: Vec<u8>) {
        assert!(
            self.objects.insert(oid, payload).is_none(),
            "object id {} handed out twice",
            oid
        );
        self.order.push(oid);
    }

    /// Forgets a destroyed object.
    pub fn remove(&mut self, oid: ObjectId) {
        self.objects.remove(&oid);
        self.order.retain(|live| *live != oid);
    }

    /// Returns the number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no object is live.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the live object ids in creation order.
    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// Checks `file` against the model.
    ///
    /// Every object reads back its payload, both scan directions visit
    /// exactly the live objects in mirrored order, and the file passes
    /// [`ObjectManager::verify_file`].
    pub fn check(&self, manager: &ObjectManager, file: CatalogRef) -> ObjectResult<()> {
        for (oid, payload) in &self.objects {
            let stored = manager.read_object(file, *oid, 0, None)?;
            assert_eq!(&stored, payload, "payload of {} differs", oid);
            let header = manager.object_header(file, *oid)?;
            assert_eq!(header.length as usize, payload.len());
        }

        let forward: Vec<ObjectId> = scan_forward(manager, file)?.iter().map(|item| item.oid).collect();
        let mut backward: Vec<ObjectId> =
            scan_backward(manager, file)?.iter().map(|item| item.oid).collect();
        backward.reverse();
        assert_eq!(forward, backward, "scan directions disagree");

        let scanned: HashSet<ObjectId> = forward.iter().copied().collect();
        assert_eq!(scanned.len(), forward.len(), "scan visits an object twice");
        let expected: HashSet<ObjectId> = self.objects.keys().copied().collect();
        assert_eq!(scanned, expected, "scan does not match live objects");

        let report = manager.verify_file(file)?;
        assert_eq!(report.objects, self.objects.len());
        Ok(())
    }
}

/// Seeded random workload.
#[derive(Debug)]
pub struct Workload {
    rng: StdRng,
    config: WorkloadConfig,
}

impl Workload {
    /// Creates a workload seeded with `seed`.
    pub fn new(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Runs the workload against `file`, recording the outcome in `model`.
    pub fn run(
        &mut self,
        manager: &ObjectManager,
        file: CatalogRef,
        model: &mut Model,
    ) -> ObjectResult<WorkloadStats> {
        let mut stats = WorkloadStats::default();
        let mut dealloc = DeallocList::new();

        for step in 0..self.config.steps {
            let destroy = !model.is_empty() && self.rng.gen_bool(self.config.destroy_ratio);
            if destroy {
                let victim = model.ids()[self.rng.gen_range(0..model.len())];
                manager.destroy_object(file, victim, &mut dealloc)?;
                model.remove(victim);
                stats.destroyed += 1;
            } else {
                let len = self.rng.gen_range(0..=self.config.max_len);
                let payload: Vec<u8> = (0..len).map(|_| self.rng.gen()).collect();
                let near = if !model.is_empty() && self.rng.gen_bool(self.config.near_ratio) {
                    stats.near_hints += 1;
                    Some(model.ids()[self.rng.gen_range(0..model.len())])
                } else {
                    None
                };
                let spec = ObjectSpec::new(&payload).with_tag(step as u16);
                let oid = manager.create_object(file, near, &spec)?;
                model.insert(oid, payload);
                stats.created += 1;
            }

            if self.config.release_every > 0 && (step + 1) % self.config.release_every == 0 {
                stats.released_pages += manager.release(&mut dealloc)?;
            }
        }

        stats.released_pages += manager.release(&mut dealloc)?;
        debug!(
            "Workload finished: {} created, {} destroyed, {} pages released",
            stats.created, stats.destroyed, stats.released_pages
        );
        Ok(stats)
    }
}
