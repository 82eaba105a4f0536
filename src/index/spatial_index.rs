use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

use super::band::{Band, EntityBuilder, EventEntities};
use super::offsets::RangeOffsets;
use super::snapshot::{DrawSnapshot, EntityRenderer};
use crate::entity::{EntityIdentifier, SpatialEntity};
use crate::error::IndexError;
use crate::event::{EventId, HazardEvent};

/// Ordered collection of spatial entities split into four z-order bands.
///
/// The flat entity list is the draw order: hatching, then unselected events,
/// then selected events, then tool overlays. Within the event bands entities
/// follow the order of their events in the caller's ordered event list.
///
/// Besides the list, the index caches where the unselected, selected and
/// tool bands start, and where each event's first entity sits within each
/// band. Every insertion or removal of a run of entities pushes all cached
/// positions through a [`RangeOffsets`] table so they stay exact without
/// rescanning the list.
///
/// The index is single-threaded: each call completes its full update before
/// returning. Renderers on another thread should draw from [`Self::snapshot`].
///
/// Mutations never notify the renderer themselves. The owner calls
/// [`Self::publish`] once after each change (or batch of changes) so the
/// renderer sees the new draw list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialEntityIndex {
    entities: Vec<Arc<SpatialEntity>>,
    entity_by_identifier: HashMap<EntityIdentifier, Arc<SpatialEntity>>,
    /// Each event's entities: hatching first, then its single other band.
    entities_by_event: HashMap<EventId, Vec<Arc<SpatialEntity>>>,
    unselected_start: Option<usize>,
    selected_start: Option<usize>,
    tool_start: Option<usize>,
    hatching_index_for_event: HashMap<EventId, usize>,
    unselected_index_for_event: HashMap<EventId, usize>,
    selected_index_for_event: HashMap<EventId, usize>,
    selected_identifiers: HashSet<EntityIdentifier>,
}

impl SpatialEntityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    /// All entities in draw order.
    #[must_use]
    pub fn entities(&self) -> &[Arc<SpatialEntity>] {
        &self.entities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up an entity by identifier.
    #[must_use]
    pub fn entity(&self, identifier: &EntityIdentifier) -> Option<&Arc<SpatialEntity>> {
        self.entity_by_identifier.get(identifier)
    }

    /// An event's entities, hatching first.
    #[must_use]
    pub fn entities_for_event(&self, event_id: &EventId) -> Option<&[Arc<SpatialEntity>]> {
        self.entities_by_event.get(event_id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains_event(&self, event_id: &EventId) -> bool {
        self.entities_by_event.contains_key(event_id)
    }

    /// Tool overlay entities in draw order.
    #[must_use]
    pub fn tool_entities(&self) -> &[Arc<SpatialEntity>] {
        &self.entities[self.band_range(Band::Tool)]
    }

    /// Positions occupied by `band` in the entity list.
    #[must_use]
    pub fn band_range(&self, band: Band) -> Range<usize> {
        let end = self.band_end(band);
        let start = match band {
            Band::Hatching => 0,
            _ => self.recorded_start(band).unwrap_or(end),
        };
        start..end
    }

    /// The band containing `position`, or `None` if out of bounds.
    #[must_use]
    pub fn band_of(&self, position: usize) -> Option<Band> {
        Band::ALL
            .into_iter()
            .find(|&band| self.band_range(band).contains(&position))
    }

    /// Position of an event's first entity within `band`.
    #[must_use]
    pub fn event_start(&self, band: Band, event_id: &EventId) -> Option<usize> {
        self.event_map(band)?.get(event_id).copied()
    }

    /// The first of an event's entities whose geometry is or contains a
    /// polygon.
    #[must_use]
    pub fn first_polygonal_entity_for_event(&self, event_id: &EventId) -> Option<&Arc<SpatialEntity>> {
        self.entities_by_event
            .get(event_id)?
            .iter()
            .find(|entity| entity.is_polygonal())
    }

    /// Identifiers the renderer should draw as selected.
    #[must_use]
    pub fn selected_identifiers(&self) -> &HashSet<EntityIdentifier> {
        &self.selected_identifiers
    }

    /// Replaces the set of selected identifiers. Follow with
    /// [`Self::publish`].
    pub fn set_selected_identifiers(&mut self, identifiers: impl IntoIterator<Item = EntityIdentifier>) {
        self.selected_identifiers = identifiers.into_iter().collect();
    }

    /// Copies the draw list and selection for a renderer.
    #[must_use]
    pub fn snapshot(&self) -> DrawSnapshot {
        DrawSnapshot::new(self.entities.clone(), self.selected_identifiers.clone())
    }

    /// Hands a fresh snapshot to `renderer`.
    pub fn publish(&self, renderer: &mut dyn EntityRenderer) {
        renderer.draw(self.snapshot());
    }

    // --- Event mutations ---

    /// Inserts the entities of `event_id`.
    ///
    /// `ordered_events` is the full z-ordered list of visible events; the new
    /// entities go in front of the first later event already present in the
    /// same band, or at the end of the band if there is none. An empty batch
    /// is a no-op. Follow with [`Self::publish`].
    ///
    /// # Errors
    ///
    /// - `IndexError::EventNotInOrder` if `event_id` is missing from `ordered_events`
    /// - `IndexError::EventAlreadyIndexed` if the event already has entities
    /// - `IndexError::MixedSelectionBands` if both unselected and selected
    ///   entities are supplied
    /// - `IndexError::MisplacedIdentifier` if an identifier is not owned by the
    ///   event or sits in the wrong group
    /// - `IndexError::DuplicateIdentifier` if an identifier is already indexed
    pub fn add_entities_for_event(
        &mut self,
        event_id: &EventId,
        ordered_events: &[EventId],
        entities: EventEntities,
    ) -> Result<(), IndexError> {
        if entities.is_empty() {
            trace!(event = %event_id, "no entities to add");
            return Ok(());
        }
        let position = self.check_batch(event_id, ordered_events, &entities, false)?;
        let count = entities.len();
        self.insert_checked(event_id, &ordered_events[position + 1..], entities);
        debug!(event = %event_id, count, total = self.entities.len(), "added event entities");
        Ok(())
    }

    /// Removes every entity of `event_id`, returning them hatching first.
    /// Follow with [`Self::publish`].
    ///
    /// # Errors
    ///
    /// - `IndexError::EventNotIndexed` if the event has no entities
    /// - `IndexError::InvariantViolated` if the cached starts for the event
    ///   disagree with its entity list
    pub fn remove_entities_for_event(&mut self, event_id: &EventId) -> Result<Vec<Arc<SpatialEntity>>, IndexError> {
        let owned = self
            .entities_by_event
            .get(event_id)
            .ok_or_else(|| IndexError::EventNotIndexed(event_id.clone()))?;
        let hatching_count = owned
            .iter()
            .take_while(|entity| entity.identifier().is_hatching())
            .count();
        let primary_count = owned.len() - hatching_count;

        let hatching_start = self.hatching_index_for_event.get(event_id).copied();
        let primary = self
            .unselected_index_for_event
            .get(event_id)
            .map(|&start| (Band::Unselected, start))
            .or_else(|| {
                self.selected_index_for_event
                    .get(event_id)
                    .map(|&start| (Band::Selected, start))
            });
        if (hatching_count > 0) != hatching_start.is_some() || (primary_count > 0) != primary.is_some() {
            return Err(IndexError::InvariantViolated(format!(
                "cached starts of event {event_id} disagree with its {hatching_count} hatching \
                 and {primary_count} other entities"
            )));
        }

        let owned = self.entities_by_event.remove(event_id).unwrap_or_default();
        self.hatching_index_for_event.remove(event_id);
        self.unselected_index_for_event.remove(event_id);
        self.selected_index_for_event.remove(event_id);

        // The later run goes first so the hatching start is still exact when
        // its own shift is computed.
        if let Some((band, start)) = primary {
            self.shift_for_removal(band, start, primary_count);
        }
        if let Some(start) = hatching_start {
            self.shift_for_removal(Band::Hatching, start, hatching_count);
        }
        if let Some((_, start)) = primary {
            self.remove_run(start, primary_count);
        }
        if let Some(start) = hatching_start {
            self.remove_run(start, hatching_count);
        }
        for entity in &owned {
            self.entity_by_identifier.remove(entity.identifier());
        }

        debug!(event = %event_id, count = owned.len(), total = self.entities.len(), "removed event entities");
        Ok(owned)
    }

    /// Replaces the entities of `event_id` (removing any it has) with
    /// `entities`. The batch is checked before anything is removed. Follow
    /// with [`Self::publish`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_entities_for_event`], except that the event may
    /// already be indexed.
    pub fn replace_entities_for_event(
        &mut self,
        event_id: &EventId,
        ordered_events: &[EventId],
        entities: EventEntities,
    ) -> Result<(), IndexError> {
        self.check_batch(event_id, ordered_events, &entities, true)?;
        if self.contains_event(event_id) {
            self.remove_entities_for_event(event_id)?;
        }
        self.add_entities_for_event(event_id, ordered_events, entities)
    }

    /// Discards all state and rebuilds the index from `events`, given in
    /// z-order, followed by `tool_entities`.
    ///
    /// The selection set is kept. On error the index is left untouched.
    /// Follow with [`Self::publish`].
    ///
    /// # Errors
    ///
    /// - `IndexError::EventAlreadyIndexed` if an event appears twice
    /// - any batch error of [`Self::add_entities_for_event`] or
    ///   [`Self::replace_tool_entities`]
    pub fn recreate_all(
        &mut self,
        events: Vec<(EventId, EventEntities)>,
        tool_entities: Vec<SpatialEntity>,
    ) -> Result<(), IndexError> {
        let mut hatching: Vec<Arc<SpatialEntity>> = Vec::new();
        let mut unselected: Vec<Arc<SpatialEntity>> = Vec::new();
        let mut selected: Vec<Arc<SpatialEntity>> = Vec::new();
        let mut hatching_index = HashMap::new();
        let mut unselected_index = HashMap::new();
        let mut selected_index = HashMap::new();
        let mut by_event: HashMap<EventId, Vec<Arc<SpatialEntity>>> = HashMap::new();
        let mut seen: HashSet<EntityIdentifier> = HashSet::new();

        for (event_id, entities) in events {
            if entities.is_empty() {
                continue;
            }
            if by_event.contains_key(&event_id) {
                return Err(IndexError::EventAlreadyIndexed(event_id));
            }
            Self::check_entities(&event_id, &entities)?;
            for (_, group) in entities.groups() {
                for entity in group {
                    if !seen.insert(entity.identifier().clone()) {
                        return Err(IndexError::DuplicateIdentifier(entity.identifier().clone()));
                    }
                }
            }

            let EventEntities {
                hatching: event_hatching,
                unselected: event_unselected,
                selected: event_selected,
            } = entities;
            let mut owned = Vec::with_capacity(
                event_hatching.len() + event_unselected.len() + event_selected.len(),
            );
            for (list, index, group) in [
                (&mut hatching, &mut hatching_index, event_hatching),
                (&mut unselected, &mut unselected_index, event_unselected),
                (&mut selected, &mut selected_index, event_selected),
            ] {
                if group.is_empty() {
                    continue;
                }
                index.insert(event_id.clone(), list.len());
                for entity in group {
                    let entity = Arc::new(entity);
                    owned.push(Arc::clone(&entity));
                    list.push(entity);
                }
            }
            by_event.insert(event_id, owned);
        }

        Self::check_tool_batch(&tool_entities)?;

        let unselected_offset = hatching.len();
        let selected_offset = unselected_offset + unselected.len();
        let tool_offset = selected_offset + selected.len();
        for index in unselected_index.values_mut() {
            *index += unselected_offset;
        }
        for index in selected_index.values_mut() {
            *index += selected_offset;
        }

        self.unselected_start = (!unselected.is_empty()).then_some(unselected_offset);
        self.selected_start = (!selected.is_empty()).then_some(selected_offset);
        self.tool_start = (!tool_entities.is_empty()).then_some(tool_offset);
        self.hatching_index_for_event = hatching_index;
        self.unselected_index_for_event = unselected_index;
        self.selected_index_for_event = selected_index;
        self.entities_by_event = by_event;

        self.entities = hatching;
        self.entities.extend(unselected);
        self.entities.extend(selected);
        self.entities
            .extend(tool_entities.into_iter().map(Arc::new));
        self.entity_by_identifier = self
            .entities
            .iter()
            .map(|entity| (entity.identifier().clone(), Arc::clone(entity)))
            .collect();

        debug!(
            events = self.entities_by_event.len(),
            total = self.entities.len(),
            "recreated spatial entity index"
        );
        Ok(())
    }

    /// Rebuilds the index by running `builder` over `events`, given in z-order.
    ///
    /// # Errors
    ///
    /// Same as [`Self::recreate_all`].
    pub fn rebuild(
        &mut self,
        events: &[HazardEvent],
        builder: &dyn EntityBuilder,
        tool_entities: Vec<SpatialEntity>,
    ) -> Result<(), IndexError> {
        let built = events
            .iter()
            .map(|event| (event.id.clone(), builder.build_entities(event)))
            .collect();
        self.recreate_all(built, tool_entities)
    }

    // --- Tool overlay mutations ---

    /// Replaces every tool overlay entity with `entities`. Follow with
    /// [`Self::publish`].
    ///
    /// # Errors
    ///
    /// - `IndexError::MisplacedIdentifier` if an identifier is not a tool identifier
    /// - `IndexError::DuplicateIdentifier` if the batch repeats an identifier
    pub fn replace_tool_entities(&mut self, entities: Vec<SpatialEntity>) -> Result<(), IndexError> {
        Self::check_tool_batch(&entities)?;
        self.clear_tool_entities();
        if entities.is_empty() {
            return Ok(());
        }
        self.tool_start = Some(self.entities.len());
        for entity in entities {
            let entity = Arc::new(entity);
            self.entity_by_identifier
                .insert(entity.identifier().clone(), Arc::clone(&entity));
            self.entities.push(entity);
        }
        trace!(count = self.tool_entities().len(), "replaced tool entities");
        Ok(())
    }

    /// Removes every tool overlay entity. Follow with [`Self::publish`].
    pub fn clear_tool_entities(&mut self) {
        if let Some(start) = self.tool_start.take() {
            for entity in self.entities.split_off(start) {
                self.entity_by_identifier.remove(entity.identifier());
            }
        }
    }

    // --- Consistency ---

    /// Checks every invariant of the index.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::InvariantViolated` describing the first broken
    /// invariant found.
    pub fn validate(&self) -> Result<(), IndexError> {
        let violated = |message: String| Err(IndexError::InvariantViolated(message));

        if self.entity_by_identifier.len() != self.entities.len() {
            return violated(format!(
                "{} identifiers keyed for {} entities",
                self.entity_by_identifier.len(),
                self.entities.len()
            ));
        }

        let mut previous = Band::Hatching;
        let mut event_owned = 0;
        for (position, entity) in self.entities.iter().enumerate() {
            match self.entity_by_identifier.get(entity.identifier()) {
                Some(keyed) if Arc::ptr_eq(keyed, entity) => {}
                _ => return violated(format!("entity at {position} is not keyed by its identifier")),
            }
            let Some(band) = self.expected_band(entity) else {
                return violated(format!("entity at {position} belongs to no band"));
            };
            if band < previous {
                return violated(format!("{band} entity at {position} follows a {previous} entity"));
            }
            if !self.band_range(band).contains(&position) {
                return violated(format!("{band} entity at {position} lies outside its band"));
            }
            if entity.event_id().is_some() {
                event_owned += 1;
            }
            previous = band;
        }

        for band in [Band::Unselected, Band::Selected, Band::Tool] {
            let first = self
                .entities
                .iter()
                .position(|entity| self.expected_band(entity) == Some(band));
            if first != self.recorded_start(band) {
                return violated(format!(
                    "{band} band starts at {first:?} but {:?} is recorded",
                    self.recorded_start(band)
                ));
            }
        }

        for band in [Band::Hatching, Band::Unselected, Band::Selected] {
            if let Some(map) = self.event_map(band) {
                if let Some(stray) = map.keys().find(|event_id| !self.entities_by_event.contains_key(*event_id)) {
                    return violated(format!("{band} start recorded for unindexed event {stray}"));
                }
            }
        }

        let mut listed = 0;
        for (event_id, owned) in &self.entities_by_event {
            if owned.iter().any(|entity| entity.event_id() != Some(event_id)) {
                return violated(format!("event {event_id} lists an entity it does not own"));
            }
            let hatching_count = owned
                .iter()
                .take_while(|entity| entity.identifier().is_hatching())
                .count();
            if owned[hatching_count..].iter().any(|entity| entity.identifier().is_hatching()) {
                return violated(format!("hatching entities of event {event_id} are not leading"));
            }
            let unselected = self.unselected_index_for_event.get(event_id).copied();
            let selected = self.selected_index_for_event.get(event_id).copied();
            if unselected.is_some() && selected.is_some() {
                return violated(format!("event {event_id} is both selected and unselected"));
            }
            self.check_run(
                event_id,
                self.hatching_index_for_event.get(event_id).copied(),
                &owned[..hatching_count],
            )?;
            self.check_run(event_id, unselected.or(selected), &owned[hatching_count..])?;
            listed += owned.len();
        }
        if listed != event_owned {
            return violated(format!(
                "{listed} entities listed per event but {event_owned} event entities indexed"
            ));
        }

        Ok(())
    }

    // --- Internals ---

    fn recorded_start(&self, band: Band) -> Option<usize> {
        match band {
            Band::Hatching => Some(0),
            Band::Unselected => self.unselected_start,
            Band::Selected => self.selected_start,
            Band::Tool => self.tool_start,
        }
    }

    fn recorded_start_mut(&mut self, band: Band) -> Option<&mut Option<usize>> {
        match band {
            Band::Hatching => None,
            Band::Unselected => Some(&mut self.unselected_start),
            Band::Selected => Some(&mut self.selected_start),
            Band::Tool => Some(&mut self.tool_start),
        }
    }

    fn event_map(&self, band: Band) -> Option<&HashMap<EventId, usize>> {
        match band {
            Band::Hatching => Some(&self.hatching_index_for_event),
            Band::Unselected => Some(&self.unselected_index_for_event),
            Band::Selected => Some(&self.selected_index_for_event),
            Band::Tool => None,
        }
    }

    fn event_map_mut(&mut self, band: Band) -> Option<&mut HashMap<EventId, usize>> {
        match band {
            Band::Hatching => Some(&mut self.hatching_index_for_event),
            Band::Unselected => Some(&mut self.unselected_index_for_event),
            Band::Selected => Some(&mut self.selected_index_for_event),
            Band::Tool => None,
        }
    }

    /// Start of the first non-empty band after `band`.
    fn next_band_start(&self, band: Band) -> Option<usize> {
        Band::ALL
            .into_iter()
            .filter(|&later| later > band)
            .find_map(|later| self.recorded_start(later))
    }

    fn band_end(&self, band: Band) -> usize {
        self.next_band_start(band).unwrap_or(self.entities.len())
    }

    fn expected_band(&self, entity: &SpatialEntity) -> Option<Band> {
        let identifier = entity.identifier();
        if identifier.is_tool() {
            return Some(Band::Tool);
        }
        if identifier.is_hatching() {
            return Some(Band::Hatching);
        }
        let event_id = identifier.event_id()?;
        if self.unselected_index_for_event.contains_key(event_id) {
            Some(Band::Unselected)
        } else if self.selected_index_for_event.contains_key(event_id) {
            Some(Band::Selected)
        } else {
            None
        }
    }

    fn check_run(
        &self,
        event_id: &EventId,
        start: Option<usize>,
        run: &[Arc<SpatialEntity>],
    ) -> Result<(), IndexError> {
        let matches = match start {
            None => run.is_empty(),
            Some(start) => {
                !run.is_empty()
                    && self
                        .entities
                        .get(start..start + run.len())
                        .is_some_and(|slice| slice.iter().zip(run).all(|(a, b)| Arc::ptr_eq(a, b)))
            }
        };
        if matches {
            Ok(())
        } else {
            Err(IndexError::InvariantViolated(format!(
                "recorded start {start:?} of event {event_id} does not name its {} entities",
                run.len()
            )))
        }
    }

    /// Validates an event's batch in isolation.
    fn check_entities(event_id: &EventId, entities: &EventEntities) -> Result<(), IndexError> {
        if !entities.unselected.is_empty() && !entities.selected.is_empty() {
            return Err(IndexError::MixedSelectionBands(event_id.clone()));
        }
        let mut seen = HashSet::new();
        for (band, group) in entities.groups() {
            for entity in group {
                let identifier = entity.identifier();
                let belongs = identifier.event_id() == Some(event_id)
                    && identifier.is_hatching() == (band == Band::Hatching);
                if !belongs {
                    return Err(IndexError::MisplacedIdentifier {
                        identifier: identifier.clone(),
                        band: band.name(),
                    });
                }
                if !seen.insert(identifier) {
                    return Err(IndexError::DuplicateIdentifier(identifier.clone()));
                }
            }
        }
        Ok(())
    }

    /// Validates an event's batch against the index, returning the event's
    /// position in `ordered_events`.
    ///
    /// When `replacing`, the event's current entities are about to go, so
    /// neither its presence nor its current identifiers count as clashes.
    fn check_batch(
        &self,
        event_id: &EventId,
        ordered_events: &[EventId],
        entities: &EventEntities,
        replacing: bool,
    ) -> Result<usize, IndexError> {
        let position = ordered_events
            .iter()
            .position(|candidate| candidate == event_id)
            .ok_or_else(|| IndexError::EventNotInOrder(event_id.clone()))?;
        if !replacing && self.contains_event(event_id) {
            return Err(IndexError::EventAlreadyIndexed(event_id.clone()));
        }
        Self::check_entities(event_id, entities)?;
        if !replacing {
            for (_, group) in entities.groups() {
                if let Some(clash) = group
                    .iter()
                    .find(|entity| self.entity_by_identifier.contains_key(entity.identifier()))
                {
                    return Err(IndexError::DuplicateIdentifier(clash.identifier().clone()));
                }
            }
        }
        Ok(position)
    }

    fn check_tool_batch(entities: &[SpatialEntity]) -> Result<(), IndexError> {
        let mut seen = HashSet::new();
        for entity in entities {
            let identifier = entity.identifier();
            if !identifier.is_tool() {
                return Err(IndexError::MisplacedIdentifier {
                    identifier: identifier.clone(),
                    band: Band::Tool.name(),
                });
            }
            if !seen.insert(identifier) {
                return Err(IndexError::DuplicateIdentifier(identifier.clone()));
            }
        }
        Ok(())
    }

    /// Inserts a batch that already passed [`Self::check_batch`].
    fn insert_checked(&mut self, event_id: &EventId, successors: &[EventId], entities: EventEntities) {
        let primary_band = entities.primary_band();
        let EventEntities {
            hatching,
            unselected,
            selected,
        } = entities;
        let primary = if primary_band == Some(Band::Selected) {
            selected
        } else {
            unselected
        };

        let hatching: Vec<Arc<SpatialEntity>> = hatching.into_iter().map(Arc::new).collect();
        let primary: Vec<Arc<SpatialEntity>> = primary.into_iter().map(Arc::new).collect();
        let owned: Vec<Arc<SpatialEntity>> = hatching.iter().chain(&primary).cloned().collect();

        if !hatching.is_empty() {
            self.insert_run(Band::Hatching, event_id, successors, hatching);
        }
        if let Some(band) = primary_band {
            self.insert_run(band, event_id, successors, primary);
        }
        for entity in &owned {
            self.entity_by_identifier
                .insert(entity.identifier().clone(), Arc::clone(entity));
        }
        self.entities_by_event.insert(event_id.clone(), owned);
    }

    /// Where a new event's run goes in `band`: in front of the first later
    /// event with entities in the band, else at the start of the next
    /// non-empty band, else at the end of the list.
    fn insertion_point(&self, band: Band, successors: &[EventId]) -> usize {
        let map = self.event_map(band);
        successors
            .iter()
            .find_map(|event_id| map.and_then(|map| map.get(event_id).copied()))
            .or_else(|| self.next_band_start(band))
            .unwrap_or(self.entities.len())
    }

    fn insert_run(&mut self, band: Band, event_id: &EventId, successors: &[EventId], run: Vec<Arc<SpatialEntity>>) {
        let position = self.insertion_point(band, successors);
        let count = run.len();

        // The target band's own start never moves: the run lands at or
        // after it.
        self.shift_recorded(&RangeOffsets::insertion(position, count), Some(band));

        let tail = self.entities.split_off(position);
        self.entities.extend(run);
        self.entities.extend(tail);

        if let Some(start) = self.recorded_start_mut(band) {
            start.get_or_insert(position);
        }
        if let Some(map) = self.event_map_mut(band) {
            map.insert(event_id.clone(), position);
        }
        trace!(event = %event_id, %band, position, count, "inserted run");
    }

    fn shift_for_removal(&mut self, band: Band, start: usize, count: usize) {
        let empties_band =
            band != Band::Hatching && self.recorded_start(band) == Some(start) && self.band_end(band) == start + count;
        self.shift_recorded(&RangeOffsets::removal(start, count), None);
        if empties_band {
            if let Some(recorded) = self.recorded_start_mut(band) {
                *recorded = None;
            }
        }
    }

    fn remove_run(&mut self, start: usize, count: usize) {
        let tail = self.entities.split_off(start + count);
        self.entities.truncate(start);
        self.entities.extend(tail);
    }

    /// Pushes every cached position through `offsets`, skipping the start of
    /// `exempt`.
    fn shift_recorded(&mut self, offsets: &RangeOffsets, exempt: Option<Band>) {
        for band in [Band::Unselected, Band::Selected, Band::Tool] {
            if exempt == Some(band) {
                continue;
            }
            if let Some(Some(start)) = self.recorded_start_mut(band) {
                *start = offsets.apply(*start);
            }
        }
        for map in [
            &mut self.hatching_index_for_event,
            &mut self.unselected_index_for_event,
            &mut self.selected_index_for_event,
        ] {
            for index in map.values_mut() {
                *index = offsets.apply(*index);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use geo::{Geometry, Point};

    use super::*;
    use crate::entity::ToolType;
    use crate::test_support::{init_tracing, square};

    fn order(names: &[&str]) -> Vec<EventId> {
        names.iter().map(|&name| EventId::new(name)).collect()
    }

    fn polygon(identifier: EntityIdentifier) -> SpatialEntity {
        SpatialEntity::new(identifier, Geometry::Polygon(square(0.0, 0.0, 1.0)))
    }

    fn point(identifier: EntityIdentifier) -> SpatialEntity {
        SpatialEntity::new(identifier, Geometry::Point(Point::new(0.5, 0.5)))
    }

    fn batch(event: &str, hatching: usize, features: usize, selected: bool) -> EventEntities {
        let hatching = (0..hatching)
            .map(|i| polygon(EntityIdentifier::hatching(event, format!("zone{i}"))))
            .collect();
        let features = (0..features)
            .map(|i| polygon(EntityIdentifier::event_visual_feature(event, format!("f{i}"))))
            .collect();
        if selected {
            EventEntities::selected(hatching, features)
        } else {
            EventEntities::unselected(hatching, features)
        }
    }

    fn tools(count: usize) -> Vec<SpatialEntity> {
        (0..count)
            .map(|i| point(EntityIdentifier::tool_visual_feature(ToolType::Recommender, "dam-break", format!("t{i}"))))
            .collect()
    }

    /// Owning event of every entity in draw order, "tool" for overlays.
    fn owners(index: &SpatialEntityIndex) -> Vec<String> {
        index
            .entities()
            .iter()
            .map(|entity| entity.event_id().map_or_else(|| "tool".to_owned(), |id| id.as_str().to_owned()))
            .collect()
    }

    fn add(index: &mut SpatialEntityIndex, event: &str, ordered: &[EventId], entities: EventEntities) {
        index
            .add_entities_for_event(&EventId::new(event), ordered, entities)
            .unwrap();
        index.validate().unwrap();
    }

    #[test]
    fn single_event_fills_its_bands() {
        init_tracing();
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 2, false));

        let a = EventId::new("A");
        assert_eq!(index.len(), 3);
        assert_eq!(index.band_range(Band::Hatching), 0..1);
        assert_eq!(index.band_range(Band::Unselected), 1..3);
        assert!(index.band_range(Band::Selected).is_empty());
        assert!(index.band_range(Band::Tool).is_empty());
        assert_eq!(index.event_start(Band::Hatching, &a), Some(0));
        assert_eq!(index.event_start(Band::Unselected, &a), Some(1));
        assert_eq!(index.event_start(Band::Selected, &a), None);
        assert_eq!(index.entities_for_event(&a).unwrap().len(), 3);
    }

    #[test]
    fn z_order_follows_event_order_not_call_order() {
        let ordered = order(&["A", "B", "C"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "C", &ordered, batch("C", 1, 2, false));
        add(&mut index, "A", &ordered, batch("A", 1, 2, false));
        add(&mut index, "B", &ordered, batch("B", 1, 2, false));

        assert_eq!(owners(&index), ["A", "B", "C", "A", "A", "B", "B", "C", "C"]);
    }

    #[test]
    fn later_event_lands_right_after_its_predecessor() {
        let ordered = order(&["A", "B", "C"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 0, 2, false));
        add(&mut index, "C", &ordered, batch("C", 0, 1, false));
        add(&mut index, "B", &ordered, batch("B", 0, 3, false));

        let a_start = index.event_start(Band::Unselected, &EventId::new("A")).unwrap();
        let b_start = index.event_start(Band::Unselected, &EventId::new("B")).unwrap();
        let c_start = index.event_start(Band::Unselected, &EventId::new("C")).unwrap();
        assert_eq!(b_start, a_start + 2);
        assert_eq!(c_start, b_start + 3);
    }

    #[test]
    fn selected_events_draw_above_unselected() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, true));
        add(&mut index, "B", &ordered, batch("B", 1, 1, false));

        assert_eq!(owners(&index), ["A", "B", "B", "A"]);
        assert_eq!(index.band_of(0), Some(Band::Hatching));
        assert_eq!(index.band_of(2), Some(Band::Unselected));
        assert_eq!(index.band_of(3), Some(Band::Selected));
        assert_eq!(index.band_of(4), None);
    }

    #[test]
    fn add_then_remove_restores_prior_state() {
        let base = ["E1", "E2", "E3", "E4"];
        for position in 0..=base.len() {
            for selected in [false, true] {
                let mut names = base.to_vec();
                names.insert(position, "X");
                let ordered = order(&names);

                let mut index = SpatialEntityIndex::new();
                index
                    .recreate_all(
                        vec![
                            (EventId::new("E1"), batch("E1", 2, 1, false)),
                            (EventId::new("E2"), batch("E2", 1, 2, true)),
                            (EventId::new("E3"), batch("E3", 0, 1, false)),
                            (EventId::new("E4"), batch("E4", 1, 1, true)),
                        ],
                        tools(2),
                    )
                    .unwrap();
                index.set_selected_identifiers([EntityIdentifier::event_visual_feature("E2", "f0")]);
                index.validate().unwrap();
                let before = index.clone();

                add(&mut index, "X", &ordered, batch("X", 2, 3, selected));
                assert_eq!(index.len(), before.len() + 5);

                let removed = index.remove_entities_for_event(&EventId::new("X")).unwrap();
                assert_eq!(removed.len(), 5);
                index.validate().unwrap();
                assert_eq!(index, before, "position {position}, selected {selected}");
            }
        }
    }

    #[test]
    fn add_then_remove_on_empty_index() {
        let ordered = order(&["A"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, true));
        index.remove_entities_for_event(&EventId::new("A")).unwrap();
        assert_eq!(index, SpatialEntityIndex::new());
    }

    #[test]
    fn removing_last_event_of_band_clears_band_start() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 0, 2, false));
        add(&mut index, "B", &ordered, batch("B", 0, 2, true));
        index.replace_tool_entities(tools(1)).unwrap();

        index.remove_entities_for_event(&EventId::new("B")).unwrap();
        index.validate().unwrap();
        assert!(index.band_range(Band::Selected).is_empty());
        assert_eq!(index.band_range(Band::Tool), 2..3);

        index.remove_entities_for_event(&EventId::new("A")).unwrap();
        index.validate().unwrap();
        assert_eq!(owners(&index), ["tool"]);

        add(&mut index, "B", &ordered, batch("B", 1, 1, true));
        assert_eq!(owners(&index), ["B", "B", "tool"]);
    }

    #[test]
    fn removing_first_event_keeps_band_start() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 2, false));
        add(&mut index, "B", &ordered, batch("B", 1, 2, false));

        index.remove_entities_for_event(&EventId::new("A")).unwrap();
        index.validate().unwrap();
        let b = EventId::new("B");
        assert_eq!(index.event_start(Band::Hatching, &b), Some(0));
        assert_eq!(index.event_start(Band::Unselected, &b), Some(1));
        assert_eq!(index.band_range(Band::Unselected), 1..3);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut index = SpatialEntityIndex::new();
        index
            .add_entities_for_event(&EventId::new("A"), &[], EventEntities::default())
            .unwrap();
        assert!(index.is_empty());
        assert!(!index.contains_event(&EventId::new("A")));
    }

    #[test]
    fn caller_bugs_fail_loudly_and_leave_index_untouched() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, false));
        let before = index.clone();
        let b = EventId::new("B");

        let err = index
            .add_entities_for_event(&EventId::new("Z"), &ordered, batch("Z", 0, 1, false))
            .unwrap_err();
        assert!(matches!(err, IndexError::EventNotInOrder(_)));

        let err = index
            .add_entities_for_event(&EventId::new("A"), &ordered, batch("A", 0, 1, true))
            .unwrap_err();
        assert!(matches!(err, IndexError::EventAlreadyIndexed(_)));

        let mixed = EventEntities {
            hatching: Vec::new(),
            unselected: vec![polygon(EntityIdentifier::event_visual_feature("B", "u"))],
            selected: vec![polygon(EntityIdentifier::event_visual_feature("B", "s"))],
        };
        let err = index.add_entities_for_event(&b, &ordered, mixed).unwrap_err();
        assert!(matches!(err, IndexError::MixedSelectionBands(_)));

        let hatching_as_feature = EventEntities::unselected(vec![], vec![polygon(EntityIdentifier::hatching("B", "z"))]);
        let err = index
            .add_entities_for_event(&b, &ordered, hatching_as_feature)
            .unwrap_err();
        assert!(matches!(err, IndexError::MisplacedIdentifier { .. }));

        let foreign = EventEntities::unselected(vec![], vec![polygon(EntityIdentifier::event_geometry("A"))]);
        let err = index.add_entities_for_event(&b, &ordered, foreign).unwrap_err();
        assert!(matches!(err, IndexError::MisplacedIdentifier { .. }));

        let repeated = EventEntities::unselected(
            vec![],
            vec![
                polygon(EntityIdentifier::event_geometry("B")),
                point(EntityIdentifier::event_geometry("B")),
            ],
        );
        let err = index.add_entities_for_event(&b, &ordered, repeated).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateIdentifier(_)));

        let err = index.remove_entities_for_event(&b).unwrap_err();
        assert!(matches!(err, IndexError::EventNotIndexed(_)));

        assert_eq!(index, before);
    }

    #[test]
    fn replace_moves_event_between_bands() {
        let ordered = order(&["A", "B", "C"]);
        let mut index = SpatialEntityIndex::new();
        for name in ["A", "B", "C"] {
            add(&mut index, name, &ordered, batch(name, 1, 1, false));
        }

        let b = EventId::new("B");
        index
            .replace_entities_for_event(&b, &ordered, batch("B", 1, 2, true))
            .unwrap();
        index.validate().unwrap();
        assert_eq!(owners(&index), ["A", "B", "C", "A", "C", "B", "B"]);
        assert_eq!(index.event_start(Band::Selected, &b), Some(5));
        assert_eq!(index.event_start(Band::Unselected, &b), None);

        // Replacing with nothing drops the event.
        index
            .replace_entities_for_event(&b, &ordered, EventEntities::default())
            .unwrap();
        index.validate().unwrap();
        assert!(!index.contains_event(&b));
        assert_eq!(owners(&index), ["A", "C", "A", "C"]);
    }

    #[test]
    fn recreate_all_and_first_polygonal_entity() {
        let events: Vec<(EventId, EventEntities)> = ["E1", "E2", "E3"]
            .iter()
            .map(|&name| {
                let entities = EventEntities::unselected(
                    vec![],
                    vec![
                        point(EntityIdentifier::event_visual_feature(name, "label")),
                        polygon(EntityIdentifier::event_visual_feature(name, "outline")),
                    ],
                );
                (EventId::new(name), entities)
            })
            .chain(std::iter::once((
                EventId::new("P"),
                EventEntities::selected(vec![], vec![point(EntityIdentifier::event_geometry("P"))]),
            )))
            .collect();

        let mut index = SpatialEntityIndex::new();
        index.recreate_all(events, tools(1)).unwrap();
        index.validate().unwrap();
        assert_eq!(index.len(), 8);

        for name in ["E1", "E2", "E3"] {
            let event_id = EventId::new(name);
            let first = index.first_polygonal_entity_for_event(&event_id).unwrap();
            assert_eq!(first.event_id(), Some(&event_id));
            assert_eq!(
                first.identifier(),
                &EntityIdentifier::event_visual_feature(name, "outline")
            );
        }
        assert!(index.first_polygonal_entity_for_event(&EventId::new("P")).is_none());
        assert!(index.first_polygonal_entity_for_event(&EventId::new("missing")).is_none());
    }

    #[test]
    fn recreate_all_rejects_bad_input_without_side_effects() {
        let mut index = SpatialEntityIndex::new();
        index
            .recreate_all(vec![(EventId::new("A"), batch("A", 1, 1, false))], vec![])
            .unwrap();
        let before = index.clone();

        let err = index
            .recreate_all(
                vec![
                    (EventId::new("B"), batch("B", 0, 1, false)),
                    (EventId::new("B"), batch("B", 0, 1, true)),
                ],
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, IndexError::EventAlreadyIndexed(_)));

        let err = index
            .recreate_all(vec![], vec![polygon(EntityIdentifier::event_geometry("A"))])
            .unwrap_err();
        assert!(matches!(err, IndexError::MisplacedIdentifier { .. }));
        assert_eq!(index, before);
    }

    #[test]
    fn tool_band_is_replaced_wholesale_and_stays_last() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, false));

        index.replace_tool_entities(tools(3)).unwrap();
        index.validate().unwrap();
        assert_eq!(index.tool_entities().len(), 3);

        index.replace_tool_entities(tools(1)).unwrap();
        index.validate().unwrap();
        assert_eq!(index.tool_entities().len(), 1);

        add(&mut index, "B", &ordered, batch("B", 1, 1, true));
        assert_eq!(owners(&index), ["A", "B", "A", "B", "tool"]);

        index.clear_tool_entities();
        index.validate().unwrap();
        assert!(index.tool_entities().is_empty());
        assert!(index.band_range(Band::Tool).is_empty());

        let err = index
            .replace_tool_entities(vec![polygon(EntityIdentifier::event_geometry("A"))])
            .unwrap_err();
        assert!(matches!(err, IndexError::MisplacedIdentifier { .. }));
    }

    #[test]
    fn bands_stay_ordered_under_mixed_operations() {
        let names: Vec<String> = (0..12).map(|i| format!("EV{i}")).collect();
        let ordered: Vec<EventId> = names.iter().map(|name| EventId::new(name.as_str())).collect();
        let mut index = SpatialEntityIndex::new();
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = |bound: u64| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            usize::try_from((state >> 33) % bound).unwrap()
        };

        for step in 0..300 {
            let pick = next(12);
            let name = &names[pick];
            let event_id = &ordered[pick];
            let entities = batch(name, next(3), next(4), next(2) == 1);
            match next(10) {
                0 => index.replace_tool_entities(tools(next(4))).unwrap(),
                1 => index.replace_entities_for_event(event_id, &ordered, entities).unwrap(),
                _ if index.contains_event(event_id) => {
                    index.remove_entities_for_event(event_id).unwrap();
                }
                _ => index.add_entities_for_event(event_id, &ordered, entities).unwrap(),
            }
            index.validate().unwrap_or_else(|err| panic!("step {step}: {err}"));

            let bands: Vec<Band> = (0..index.len()).map(|i| index.band_of(i).unwrap()).collect();
            assert!(bands.windows(2).all(|pair| pair[0] <= pair[1]), "step {step}");

            // Within each event band, owners follow the ordered event list.
            for band in [Band::Hatching, Band::Unselected, Band::Selected] {
                let ranks: Vec<usize> = index.entities()[index.band_range(band)]
                    .iter()
                    .filter_map(|entity| entity.event_id())
                    .map(|id| ordered.iter().position(|candidate| candidate == id).unwrap())
                    .collect();
                assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]), "step {step}");
            }
        }
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutation() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, false));
        add(&mut index, "B", &ordered, batch("B", 1, 1, false));

        let snapshot = index.snapshot();
        index.remove_entities_for_event(&EventId::new("A")).unwrap();
        index.replace_tool_entities(tools(2)).unwrap();
        assert_eq!(index.len(), 4);

        let drawn = std::thread::spawn(move || {
            snapshot
                .entities()
                .iter()
                .filter_map(|entity| entity.event_id().map(|id| id.as_str().to_owned()))
                .collect::<Vec<_>>()
        })
        .join()
        .unwrap();
        assert_eq!(drawn, ["A", "B", "A", "B"]);
    }

    #[test]
    fn publish_hands_selection_to_renderer() {
        #[derive(Default)]
        struct Recorder {
            frames: Vec<DrawSnapshot>,
        }

        impl EntityRenderer for Recorder {
            fn draw(&mut self, snapshot: DrawSnapshot) {
                self.frames.push(snapshot);
            }
        }

        let ordered = order(&["A"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 0, 2, true));
        let chosen = EntityIdentifier::event_visual_feature("A", "f1");
        index.set_selected_identifiers([chosen.clone()]);

        let mut recorder = Recorder::default();
        index.publish(&mut recorder);
        assert_eq!(recorder.frames.len(), 1);
        assert_eq!(recorder.frames[0].len(), 2);
        assert!(recorder.frames[0].is_selected(&chosen));
        assert!(!recorder.frames[0].is_selected(&EntityIdentifier::event_visual_feature("A", "f0")));
    }

    #[test]
    fn publishing_after_each_change_tracks_the_index() {
        #[derive(Default)]
        struct Frames(Vec<Vec<String>>);

        impl EntityRenderer for Frames {
            fn draw(&mut self, snapshot: DrawSnapshot) {
                let owners = snapshot
                    .entities()
                    .iter()
                    .map(|entity| entity.event_id().map_or_else(|| "tool".to_owned(), |id| id.as_str().to_owned()))
                    .collect();
                self.0.push(owners);
            }
        }

        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        let mut frames = Frames::default();

        add(&mut index, "B", &ordered, batch("B", 0, 1, false));
        index.publish(&mut frames);
        add(&mut index, "A", &ordered, batch("A", 0, 1, true));
        index.publish(&mut frames);
        index.replace_tool_entities(tools(1)).unwrap();
        index.publish(&mut frames);
        index.remove_entities_for_event(&EventId::new("B")).unwrap();
        index.publish(&mut frames);

        assert_eq!(
            frames.0,
            vec![
                vec!["B"],
                vec!["B", "A"],
                vec!["B", "A", "tool"],
                vec!["A", "tool"],
            ]
        );
        assert_eq!(frames.0.last().unwrap(), &owners(&index));
    }

    #[test]
    fn rebuild_runs_the_entity_builder() {
        struct OutlineBuilder;

        impl EntityBuilder for OutlineBuilder {
            fn build_entities(&self, event: &HazardEvent) -> EventEntities {
                let outline = SpatialEntity::new(
                    EntityIdentifier::event_geometry(event.id.clone()),
                    event.geometry.clone(),
                );
                if event.attributes.get("selected").is_some_and(|v| v == "true") {
                    EventEntities::selected(vec![], vec![outline])
                } else {
                    EventEntities::unselected(vec![], vec![outline])
                }
            }
        }

        let events = vec![
            HazardEvent::new("A", Geometry::Polygon(square(0.0, 0.0, 1.0))).with_attribute("selected", "true"),
            HazardEvent::new("B", Geometry::Polygon(square(2.0, 0.0, 1.0))),
        ];
        let mut index = SpatialEntityIndex::new();
        index.rebuild(&events, &OutlineBuilder, tools(1)).unwrap();
        index.validate().unwrap();
        assert_eq!(owners(&index), ["B", "A", "tool"]);
        assert_eq!(index.event_start(Band::Selected, &EventId::new("A")), Some(1));
    }

    #[test]
    fn validate_detects_corrupted_starts() {
        let ordered = order(&["A", "B"]);
        let mut index = SpatialEntityIndex::new();
        add(&mut index, "A", &ordered, batch("A", 1, 1, false));
        add(&mut index, "B", &ordered, batch("B", 1, 1, false));

        let mut shifted = index.clone();
        shifted.unselected_index_for_event.insert(EventId::new("B"), 2);
        assert!(shifted.validate().is_err());

        let mut wrong_band = index.clone();
        wrong_band.unselected_start = Some(1);
        assert!(wrong_band.validate().is_err());

        let mut removed = index;
        removed.entities.pop();
        assert!(removed.validate().is_err());
    }
}
