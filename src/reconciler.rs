use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::entities::{BathroomRecord, Coordinate, DisplayAnnotation, MapAnnotation};

/// Changes needed to bring the displayed set in line with a snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderDiff {
    pub to_remove: Vec<DisplayAnnotation>,
    pub to_add: Vec<DisplayAnnotation>,
}

impl RenderDiff {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

/// Diffs the displayed annotations against a snapshot, keyed by record id.
///
/// The user position marker is never touched. A record whose projection
/// changed is removed and re-added; unchanged ones are left alone. When a
/// snapshot repeats an id the last occurrence wins.
pub fn reconcile(previous: &[MapAnnotation], snapshot: &[BathroomRecord]) -> RenderDiff {
    let mut latest: HashMap<Uuid, DisplayAnnotation> = HashMap::with_capacity(snapshot.len());
    let mut order: Vec<Uuid> = Vec::with_capacity(snapshot.len());

    for record in snapshot {
        match DisplayAnnotation::project(record) {
            Some(annotation) => {
                let id = annotation.id;
                if latest.insert(id, annotation).is_none() {
                    order.push(id);
                }
            }
            None => tracing::warn!("ignoring unsaved bathroom {:?} in snapshot", record.name),
        }
    }

    let mut diff = RenderDiff::default();
    let mut kept: HashSet<Uuid> = HashSet::new();

    for annotation in previous.iter().filter_map(MapAnnotation::bathroom) {
        match latest.get(&annotation.id) {
            Some(current) if current == annotation && !kept.contains(&annotation.id) => {
                kept.insert(annotation.id);
            }
            _ => diff.to_remove.push(annotation.clone()),
        }
    }

    for id in order {
        if kept.contains(&id) {
            continue;
        }

        if let Some(annotation) = latest.remove(&id) {
            diff.to_add.push(annotation);
        }
    }

    diff
}

/// Owns the displayed annotation set and keeps it in step with the store.
#[derive(Debug, Default)]
pub struct Reconciler {
    user_position: Option<Coordinate>,
    displayed: HashMap<Uuid, DisplayAnnotation>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconciles against a snapshot and applies the resulting diff.
    #[tracing::instrument(skip_all, fields(records = snapshot.len()))]
    pub fn apply(&mut self, snapshot: &[BathroomRecord]) -> RenderDiff {
        let diff = reconcile(&self.annotations(), snapshot);

        for annotation in &diff.to_remove {
            self.displayed.remove(&annotation.id);
        }

        for annotation in &diff.to_add {
            self.displayed.insert(annotation.id, annotation.clone());
        }

        tracing::debug!(
            removed = diff.to_remove.len(),
            added = diff.to_add.len(),
            displayed = self.displayed.len(),
            "applied snapshot"
        );

        diff
    }

    pub fn annotations(&self) -> Vec<MapAnnotation> {
        self.user_position
            .map(MapAnnotation::UserPosition)
            .into_iter()
            .chain(self.displayed.values().cloned().map(MapAnnotation::Bathroom))
            .collect()
    }

    pub fn find(&self, id: &Uuid) -> Option<&DisplayAnnotation> {
        self.displayed.get(id)
    }

    pub fn len(&self) -> usize {
        self.displayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displayed.is_empty()
    }

    pub fn set_user_position(&mut self, coordinate: Coordinate) {
        self.user_position = Some(coordinate);
    }
}

#[cfg(test)]
fn saved(name: &str) -> BathroomRecord {
    BathroomRecord {
        id: Some(Uuid::new_v4()),
        name: name.into(),
        code: Some("1234".into()),
        notes: "".into(),
        is_unisex: false,
        clean_rating: Some(3),
        bathroom_rating: Some(4),
        location: Coordinate::new(47.6, -122.3),
    }
}

#[cfg(test)]
fn displayed(records: &[&BathroomRecord]) -> Vec<MapAnnotation> {
    records
        .iter()
        .map(|record| MapAnnotation::Bathroom(DisplayAnnotation::project(record).unwrap()))
        .collect()
}

#[test]
fn first_snapshot_adds_everything() {
    let a = saved("A");
    let b = saved("B");

    let diff = reconcile(&[], &[a.clone(), b.clone()]);

    assert!(diff.to_remove.is_empty());
    assert_eq!(diff.to_add.len(), 2);
    assert_eq!(diff.to_add[0].title, "A");
    assert_eq!(diff.to_add[1].title, "B");
}

#[test]
fn missing_ids_are_removed() {
    let a = saved("A");
    let b = saved("B");

    let diff = reconcile(&displayed(&[&a, &b]), &[b.clone()]);

    assert_eq!(diff.to_remove, vec![DisplayAnnotation::project(&a).unwrap()]);
    assert!(diff.to_add.is_empty());
}

#[test]
fn reconciling_the_same_snapshot_twice_is_a_no_op() {
    let snapshot = vec![saved("A"), saved("B"), saved("C")];
    let mut reconciler = Reconciler::new();

    let first = reconciler.apply(&snapshot);
    assert_eq!(first.to_add.len(), 3);

    let second = reconcile(&reconciler.annotations(), &snapshot);
    assert!(second.is_empty());

    assert!(reconciler.apply(&snapshot).is_empty());
    assert_eq!(reconciler.len(), 3);
}

#[test]
fn changed_records_are_replaced() {
    let a = saved("A");
    let mut renamed = a.clone();
    renamed.name = "A2".into();

    let diff = reconcile(&displayed(&[&a]), &[renamed.clone()]);

    assert_eq!(diff.to_remove[0].title, "A");
    assert_eq!(diff.to_add[0].title, "A2");
    assert_eq!(diff.to_add[0].id, diff.to_remove[0].id);
}

#[test]
fn user_position_is_never_removed() {
    let a = saved("A");
    let mut previous = displayed(&[&a]);
    previous.push(MapAnnotation::UserPosition(Coordinate::new(1.0, 1.0)));

    let diff = reconcile(&previous, &[]);

    assert_eq!(diff.to_remove.len(), 1);
    assert_eq!(diff.to_remove[0].title, "A");

    let mut reconciler = Reconciler::new();
    reconciler.set_user_position(Coordinate::new(1.0, 1.0));
    reconciler.apply(&[a]);
    reconciler.apply(&[]);

    let annotations = reconciler.annotations();
    assert_eq!(annotations.len(), 1);
    assert!(annotations[0].is_user_position());
}

#[test]
fn duplicate_and_unsaved_records_collapse() {
    let a = saved("A");
    let mut a_again = a.clone();
    a_again.notes = "newer".into();
    let mut unsaved = saved("draft");
    unsaved.id = None;

    let mut reconciler = Reconciler::new();
    let diff = reconciler.apply(&[a.clone(), unsaved, a_again]);

    assert_eq!(diff.to_add.len(), 1);
    assert_eq!(reconciler.len(), 1);
    assert_eq!(reconciler.find(&a.id.unwrap()).unwrap().notes, "newer");
}

#[test]
fn duplicated_displayed_entries_are_pruned() {
    let a = saved("A");
    let previous = displayed(&[&a, &a]);

    let diff = reconcile(&previous, &[a.clone()]);

    assert_eq!(diff.to_remove.len(), 1);
    assert!(diff.to_add.is_empty());
}

#[test]
fn end_state_matches_the_latest_snapshot() {
    let a = saved("A");
    let b = saved("B");
    let c = saved("C");

    let mut reconciler = Reconciler::new();
    reconciler.apply(&[a.clone(), b.clone()]);
    reconciler.apply(&[b.clone(), c.clone()]);

    let mut titles: Vec<_> = reconciler
        .annotations()
        .iter()
        .filter_map(MapAnnotation::bathroom)
        .map(|annotation| annotation.title.clone())
        .collect();
    titles.sort();

    assert_eq!(titles, vec!["B", "C"]);
    assert!(reconciler.find(&a.id.unwrap()).is_none());
}
