//! System/page splitter.
//!
//! Cuts a continuous part at its layout breaks into one fragment per
//! engraved system. Each fragment must decode on its own, so the first
//! measure of every system after the first receives the divisions, key,
//! time, staves and clefs in force at that point, unless it already
//! restates them.

use std::collections::BTreeMap;

use crate::model::{Attributes, Clef, Key, MeasureElement, Part, TimeSignature};

/// One engraved line of music, as a standalone part fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    pub part: Part,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub systems: Vec<System>,
}

/// Last value seen for each head-attribute category.
#[derive(Debug, Default)]
struct TrackedAttributes {
    divisions: Option<i64>,
    key: Option<Key>,
    time: Option<TimeSignature>,
    staves: Option<u8>,
    clefs: BTreeMap<u8, Clef>,
}

impl TrackedAttributes {
    fn update(&mut self, attrs: &Attributes) {
        if attrs.divisions.is_some() {
            self.divisions = attrs.divisions;
        }
        if attrs.key.is_some() {
            self.key = attrs.key;
        }
        if attrs.time.is_some() {
            self.time = attrs.time;
        }
        if let Some(staves) = attrs.staves {
            self.staves = Some(staves);
            // a new staff layout invalidates the clefs of its staves
            self.clefs.retain(|&staff, _| staff > staves);
        }
        for clef in &attrs.clefs {
            self.clefs.insert(clef.staff(), clef.clone());
        }
    }

    fn is_empty(&self) -> bool {
        self.divisions.is_none()
            && self.key.is_none()
            && self.time.is_none()
            && self.staves.is_none()
            && self.clefs.is_empty()
    }

    /// Fill in every category the attributes do not set themselves.
    fn restate_into(&self, attrs: &mut Attributes) {
        if attrs.divisions.is_none() {
            attrs.divisions = self.divisions;
        }
        if attrs.key.is_none() {
            attrs.key = self.key;
        }
        if attrs.time.is_none() {
            attrs.time = self.time;
        }
        if attrs.staves.is_none() {
            attrs.staves = self.staves;
        }
        for (&staff, clef) in &self.clefs {
            if !attrs.clefs.iter().any(|c| c.staff() == staff) {
                attrs.clefs.push(clef.clone());
            }
        }
        attrs.clefs.sort_by_key(Clef::staff);
    }
}

/// Split a part into pages of systems.
///
/// A measure flagged `new_page` starts a new page and system, a measure
/// flagged `new_system` a new system. Breaks on a still empty system are
/// ignored, so a flagged first measure does not leave an empty system.
pub fn split_to_systems(part: &Part) -> Vec<Page> {
    let new_system = || System {
        part: Part {
            id: part.id.clone(),
            name: part.name.clone(),
            measures: Vec::new(),
        },
    };

    let mut pages = vec![Page {
        systems: vec![new_system()],
    }];
    let mut tracked = TrackedAttributes::default();

    for original in &part.measures {
        let mut measure = original.clone();

        let current_is_empty = pages
            .last()
            .and_then(|page| page.systems.last())
            .map_or(true, |system| system.part.measures.is_empty());

        let mut at_break = false;
        if !current_is_empty {
            if measure.new_page {
                pages.push(Page {
                    systems: vec![new_system()],
                });
                at_break = true;
            } else if measure.new_system {
                if let Some(page) = pages.last_mut() {
                    page.systems.push(new_system());
                }
                at_break = true;
            }
        }

        if let Some(head) = measure.head_attributes() {
            tracked.update(head);
        }
        if at_break && !tracked.is_empty() {
            tracked.restate_into(measure.head_attributes_mut());
        }
        for element in &measure.elements {
            if let MeasureElement::Attributes(attrs) = element {
                tracked.update(attrs);
            }
        }

        if let Some(system) = pages.last_mut().and_then(|page| page.systems.last_mut()) {
            system.part.measures.push(measure);
        }
    }

    log::debug!(
        "split part '{}' into {} pages, {} systems",
        part.id,
        pages.len(),
        pages.iter().map(|p| p.systems.len()).sum::<usize>()
    );
    pages
}
