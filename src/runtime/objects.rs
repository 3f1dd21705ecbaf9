//! Minimal object space - class identity and relocation for managed objects
//!
//! Stands in for the heap. Objects carry no fields; what matters at the call
//! boundary is their identity, their class, and that they can move.

use super::value::ObjectRef;
use crate::signature::{HolderType, OBJECT_CLASS};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Class of every class mirror
pub const CLASS_CLASS: &str = "java/lang/Class";

const HEAP_BASE: usize = 0x1000;
const OBJECT_ALIGN: usize = 16;

/// Concurrent table of live objects
pub struct ObjectSpace {
    /// Address -> binary class name
    objects: DashMap<ObjectRef, String>,
    /// Binary class name -> class mirror
    mirrors: DashMap<String, ObjectRef>,
    /// Binary class name -> superclass binary name
    supers: DashMap<String, String>,
    next: AtomicUsize,
}

impl ObjectSpace {
    pub fn new() -> Self {
        Self {
            objects: DashMap::with_capacity(256),
            mirrors: DashMap::new(),
            supers: DashMap::new(),
            next: AtomicUsize::new(HEAP_BASE),
        }
    }

    fn fresh_address(&self) -> ObjectRef {
        let address = self.next.fetch_add(OBJECT_ALIGN, Ordering::Relaxed);
        // HEAP_BASE is non-zero and the counter only grows
        ObjectRef::from_address(address).unwrap_or_else(|| unreachable!("object address wrapped to zero"))
    }

    /// Allocate an object of class `class` (binary or dotted name)
    pub fn allocate(&self, class: &str) -> ObjectRef {
        let object = self.fresh_address();
        self.objects.insert(object, class.replace('.', "/"));
        object
    }

    /// Record `superclass` as the direct superclass of `class`
    pub fn define_class(&self, class: &str, superclass: &str) {
        self.supers
            .insert(class.replace('.', "/"), superclass.replace('.', "/"));
    }

    pub fn class_of(&self, object: ObjectRef) -> Option<String> {
        self.objects.get(&object).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, object: ObjectRef) -> bool {
        self.objects.contains_key(&object)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Mirror object for `holder`, created on first request
    pub fn class_mirror(&self, holder: &HolderType) -> ObjectRef {
        if let Some(mirror) = self.mirrors.get(holder.binary_name()) {
            return *mirror;
        }
        *self
            .mirrors
            .entry(holder.binary_name().to_string())
            .or_insert_with(|| self.allocate(CLASS_CLASS))
    }

    /// Subclass test along the recorded superclass chain. Every object is
    /// an instance of `java/lang/Object`.
    pub fn is_instance(&self, object: ObjectRef, class: &str) -> bool {
        let target = class.replace('.', "/");
        if target == OBJECT_CLASS {
            return self.contains(object);
        }
        let mut current = match self.class_of(object) {
            Some(name) => name,
            None => return false,
        };
        // bounded walk guards against a cyclic define_class
        for _ in 0..=self.supers.len() {
            if current == target {
                return true;
            }
            current = match self.supers.get(&current) {
                Some(parent) => parent.value().clone(),
                None => return false,
            };
        }
        false
    }

    /// Move `object` to a fresh address, as a copying collector would.
    /// Callers must then rewrite every root through `relocate_references`.
    pub fn relocate(&self, object: ObjectRef) -> Option<ObjectRef> {
        let (_, class) = self.objects.remove(&object)?;
        let moved = self.fresh_address();
        self.objects.insert(moved, class);
        for mut mirror in self.mirrors.iter_mut() {
            if *mirror.value() == object {
                *mirror.value_mut() = moved;
            }
        }
        Some(moved)
    }
}

impl Default for ObjectSpace {
    fn default() -> Self {
        Self::new()
    }
}
