//! Explicit registration table for module behavior.
//!
//! Host code declares, up front, which module type names carry flat
//! production rates, which have custom classification logic, and which get
//! per-tick callbacks. Module type names are matched exactly against the
//! `type_name` of each [`ModuleSnapshot`](crate::ModuleSnapshot).

use std::any::Any;
use std::collections::{HashMap, HashSet};

use crate::engine::ResourceBroker;
use crate::{ModuleSnapshot, PartId, PartSnapshot, RateEntry, VesselState};

/// Opaque per-callback state slot, owned by the engine cache and threaded
/// through load/update/save calls.
pub type HookState = Option<Box<dyn Any>>;

/// Per-tick callback for a registered module type.
pub enum UpdateHook {
    /// Read-only view of the vessel.
    Plain(Box<dyn FnMut(&VesselState, PartId, &mut HookState)>),
    /// Callback that draws or deposits resources through the broker.
    WithResources(Box<dyn FnMut(&mut ResourceBroker<'_>, PartId, &mut HookState)>),
}

pub type LoadFn = Box<dyn FnMut(&VesselState, PartId, &mut HookState)>;
pub type SaveFn = Box<dyn FnMut(&VesselState, PartId, &HookState)>;

/// Host classification of a module snapshot into flat rates, for types
/// whose behavior depends on saved module values.
pub type ClassifierFn = Box<dyn Fn(&ModuleSnapshot, &PartSnapshot) -> Vec<RateEntry>>;

/// Callbacks registered for one module type name.
#[derive(Default)]
pub struct HookSet {
    pub update: Option<UpdateHook>,
    pub load: Option<LoadFn>,
    pub save: Option<SaveFn>,
}

impl HookSet {
    pub(crate) fn invoke_load(&mut self, vessel: &VesselState, part: PartId, state: &mut HookState) {
        if let Some(load) = &mut self.load {
            load(vessel, part, state);
        }
    }

    pub(crate) fn invoke_save(&mut self, vessel: &VesselState, part: PartId, state: &HookState) {
        if let Some(save) = &mut self.save {
            save(vessel, part, state);
        }
    }
}

/// Lookup table consulted while building vessel records and while ticking
/// cached vessels. Injected into the engine at construction.
#[derive(Default)]
pub struct ModuleRegistry {
    handlers: HashMap<String, HookSet>,
    custom_rates: HashMap<String, Vec<RateEntry>>,
    classifiers: HashMap<String, ClassifierFn>,
    interesting: HashSet<String>,
}

impl ModuleRegistry {
    /// Empty registry with the default interesting-resource set.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.mark_interesting("ElectricCharge");
        registry
    }

    /// Mark a resource name as tracked: panels, generators and command
    /// draws only touch resources in this set.
    pub fn mark_interesting(&mut self, resource_name: &str) {
        self.interesting.insert(resource_name.to_owned());
    }

    pub fn is_interesting(&self, resource_name: &str) -> bool {
        self.interesting.contains(resource_name)
    }

    /// Attach flat per-second rates to a module type name. Overrides any
    /// earlier registration for the same name.
    pub fn register_rates(&mut self, type_name: &str, rates: Vec<RateEntry>) {
        self.custom_rates.insert(type_name.to_owned(), rates);
    }

    /// Attach a snapshot classifier to a module type name; it is consulted
    /// before the built-in rules and before flat rates.
    pub fn register_classifier(&mut self, type_name: &str, classifier: ClassifierFn) {
        self.classifiers.insert(type_name.to_owned(), classifier);
    }

    /// Attach load/update/save callbacks to a module type name.
    pub fn register_hooks(&mut self, type_name: &str, hooks: HookSet) {
        self.handlers.insert(type_name.to_owned(), hooks);
    }

    pub fn rates_for(&self, type_name: &str) -> Option<&[RateEntry]> {
        self.custom_rates.get(type_name).map(Vec::as_slice)
    }

    /// Run the host classifier for `type_name`, if one is registered.
    pub fn classify_custom(
        &self,
        type_name: &str,
        module: &ModuleSnapshot,
        part: &PartSnapshot,
    ) -> Option<Vec<RateEntry>> {
        self.classifiers
            .get(type_name)
            .map(|classifier| classifier(module, part))
    }

    pub fn has_hooks(&self, type_name: &str) -> bool {
        self.handlers.contains_key(type_name)
    }

    pub(crate) fn hooks_for_mut(&mut self, type_name: &str) -> Option<&mut HookSet> {
        self.handlers.get_mut(type_name)
    }
}
