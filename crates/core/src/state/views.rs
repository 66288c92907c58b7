//! Deduplicated stop list and its filtered views.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use itertools::Itertools;
use nearby_transit::{Mode, Stop, StopIdentifier};

use crate::state::ModeFilter;

/// What to do with the patterns of a stop that appears more than once in a fetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DuplicatePatterns {
    /// The first occurrence wins and later patterns are dropped
    #[default]
    KeepFirst,
    /// The first occurrence keeps its position and gains the later patterns
    Union,
}

/// Collapse repeated stop ids, keeping provider order
pub fn dedup_stops(raw: Vec<Stop>, policy: DuplicatePatterns) -> Vec<Stop> {
    match policy {
        DuplicatePatterns::KeepFirst => raw.into_iter().unique_by(|stop| stop.id.clone()).collect(),
        DuplicatePatterns::Union => {
            let mut position: HashMap<StopIdentifier, usize> = HashMap::with_capacity(raw.len());
            let mut stops: Vec<Stop> = Vec::with_capacity(raw.len());

            for stop in raw {
                match position.get(&stop.id) {
                    Some(&index) => stops[index].absorb_patterns(&stop),
                    None => {
                        position.insert(stop.id.clone(), stops.len());
                        stops.push(stop);
                    }
                }
            }

            stops
        }
    }
}

/// The ALL view plus one view per mode and the FAVORITES view.
///
/// Every view preserves the order of ALL (ascending distance).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StopViews {
    all: Vec<Arc<Stop>>,
    by_mode: HashMap<Mode, Vec<Arc<Stop>>>,
    favorites: Vec<Arc<Stop>>,
}

impl StopViews {
    pub fn build(raw: Vec<Stop>, favorites: &BTreeSet<StopIdentifier>, policy: DuplicatePatterns) -> Self {
        let all: Vec<Arc<Stop>> = dedup_stops(raw, policy).into_iter().map(Arc::new).collect();

        let by_mode = Mode::ALL
            .into_iter()
            .map(|mode| {
                let view = all.iter().filter(|stop| stop.serves(mode)).cloned().collect();
                (mode, view)
            })
            .collect();

        let mut views = Self {
            all,
            by_mode,
            favorites: Vec::new(),
        };
        views.refresh_favorites(favorites);
        views
    }

    /// Recompute FAVORITES from ALL
    pub fn refresh_favorites(&mut self, favorites: &BTreeSet<StopIdentifier>) {
        self.favorites = self
            .all
            .iter()
            .filter(|stop| favorites.contains(&stop.id))
            .cloned()
            .collect();
    }

    pub fn all(&self) -> &[Arc<Stop>] {
        &self.all
    }

    pub fn mode(&self, mode: Mode) -> &[Arc<Stop>] {
        self.by_mode.get(&mode).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn favorites(&self) -> &[Arc<Stop>] {
        &self.favorites
    }

    /// The view selected by `filter`, ALL when there is none
    pub fn view(&self, filter: Option<ModeFilter>) -> &[Arc<Stop>] {
        match filter {
            None => self.all(),
            Some(ModeFilter::Favorites) => self.favorites(),
            Some(other) => other.mode().map(|mode| self.mode(mode)).unwrap_or_default(),
        }
    }

    pub fn get(&self, id: &StopIdentifier) -> Option<&Arc<Stop>> {
        self.all.iter().find(|stop| &stop.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
