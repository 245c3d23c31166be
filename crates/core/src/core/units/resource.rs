//! Functional-unit resource pool.
//!
//! Each configured unit (for example "integer-MULT/DIV" x 1) is expanded into
//! `quantity` instances. An instance serves every class its templates name; a
//! grant keeps the instance busy for the template's issue latency, while the
//! operation itself completes after its operation latency.
//!
//! The pool also tracks a per-class in-flight quota. Dispatch reserves a unit of
//! quota for each instruction and the instruction gives it back when it completes
//! (or is squashed), bounding how many operations of one class can be queued.

use serde::Serialize;

use crate::config::{ResourcesConfig, TemplateConfig};
use crate::isa::FuClass;

/// A successful unit acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
    /// Index of the granted instance.
    pub unit: usize,
    /// Cycles until the result is available.
    pub op_latency: u64,
    /// Cycles the instance stays busy.
    pub issue_latency: u64,
}

/// One functional-unit instance.
#[derive(Clone, Debug, Serialize)]
pub struct UnitInstance {
    /// Name of the unit descriptor it was expanded from.
    pub name: String,
    /// Remaining busy cycles.
    pub busy: u64,
    #[serde(skip)]
    templates: Vec<TemplateConfig>,
}

/// Pool of functional-unit instances with per-class in-flight quotas.
#[derive(Clone, Debug)]
pub struct ResourcePool {
    units: Vec<UnitInstance>,
    quota: usize,
    in_flight: [usize; FuClass::COUNT],
}

impl ResourcePool {
    /// Expands the configured unit descriptors into instances.
    pub fn new(config: &ResourcesConfig) -> Self {
        let units = config
            .units
            .iter()
            .flat_map(|u| {
                (0..u.quantity).map(move |_| UnitInstance {
                    name: u.name.clone(),
                    busy: 0,
                    templates: u.templates.clone(),
                })
            })
            .collect();
        Self {
            units,
            quota: config.class_quota,
            in_flight: [0; FuClass::COUNT],
        }
    }

    /// Acquires a free instance serving `class`, marking it busy.
    pub fn acquire(&mut self, class: FuClass) -> Option<Grant> {
        self.units.iter_mut().enumerate().find_map(|(idx, unit)| {
            if unit.busy > 0 {
                return None;
            }
            let t = unit.templates.iter().find(|t| t.class == class)?;
            unit.busy = t.issue_latency;
            Some(Grant {
                unit: idx,
                op_latency: t.op_latency,
                issue_latency: t.issue_latency,
            })
        })
    }

    /// Advances every busy instance by one cycle.
    pub fn tick(&mut self) {
        for unit in &mut self.units {
            unit.busy = unit.busy.saturating_sub(1);
        }
    }

    /// Reserves one in-flight quota unit for `class`; false if the quota is full.
    pub fn try_reserve(&mut self, class: FuClass) -> bool {
        let held = &mut self.in_flight[class.index()];
        if *held >= self.quota {
            return false;
        }
        *held += 1;
        true
    }

    /// Returns a quota unit taken by [`Self::try_reserve`].
    pub fn release(&mut self, class: FuClass) {
        let held = &mut self.in_flight[class.index()];
        *held = held.saturating_sub(1);
    }

    /// In-flight operations of `class`.
    pub fn in_flight(&self, class: FuClass) -> usize {
        self.in_flight[class.index()]
    }

    /// Every instance, for dumps.
    pub fn units(&self) -> &[UnitInstance] {
        &self.units
    }

    /// Instances currently busy.
    pub fn busy_count(&self) -> usize {
        self.units.iter().filter(|u| u.busy > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitConfig;

    fn one_multiplier() -> ResourcesConfig {
        ResourcesConfig {
            units: vec![UnitConfig {
                name: "mult".into(),
                quantity: 1,
                templates: vec![
                    TemplateConfig {
                        class: FuClass::IntMult,
                        op_latency: 3,
                        issue_latency: 1,
                    },
                    TemplateConfig {
                        class: FuClass::IntDiv,
                        op_latency: 20,
                        issue_latency: 19,
                    },
                ],
            }],
            class_quota: 2,
        }
    }

    #[test]
    fn test_busy_until_tick() {
        let mut pool = ResourcePool::new(&one_multiplier());
        let g = pool.acquire(FuClass::IntMult).unwrap();
        assert_eq!((g.op_latency, g.issue_latency), (3, 1));
        assert!(pool.acquire(FuClass::IntMult).is_none());
        pool.tick();
        assert!(pool.acquire(FuClass::IntDiv).is_some());
        pool.tick();
        assert!(pool.acquire(FuClass::IntMult).is_none());
    }

    #[test]
    fn test_unserved_class() {
        let mut pool = ResourcePool::new(&one_multiplier());
        assert!(pool.acquire(FuClass::FpAdd).is_none());
    }

    #[test]
    fn test_quota() {
        let mut pool = ResourcePool::new(&one_multiplier());
        assert!(pool.try_reserve(FuClass::IntAlu));
        assert!(pool.try_reserve(FuClass::IntAlu));
        assert!(!pool.try_reserve(FuClass::IntAlu));
        pool.release(FuClass::IntAlu);
        assert_eq!(pool.in_flight(FuClass::IntAlu), 1);
        assert!(pool.try_reserve(FuClass::IntAlu));
    }
}
