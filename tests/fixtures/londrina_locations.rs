//! Real Londrina / Ibiporã locations for realistic test fixtures.
//!
//! Coordinates sourced from OpenStreetMap. They sit inside the Paraná
//! extract, so they also route against an OSRM dataset for the state.

use dispatch_planner::waypoint::Location;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct NamedPlace {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl NamedPlace {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }
}

/// The store every run leaves from.
pub const DEPOT: NamedPlace = NamedPlace::new("Loja Ibiporã", -23.265772537179835, -51.05287288263555);

// ============================================================================
// Central Londrina
// ============================================================================

pub const CENTRAL: &[NamedPlace] = &[
    NamedPlace::new("Catedral Metropolitana", -23.3105, -51.1595),
    NamedPlace::new("Calçadão", -23.3114, -51.1626),
    NamedPlace::new("Lago Igapó", -23.3247, -51.1607),
    NamedPlace::new("Museu Histórico", -23.3071, -51.1617),
    NamedPlace::new("Terminal Rodoviário", -23.3059, -51.1452),
];

// ============================================================================
// Outer neighbourhoods
// ============================================================================

pub const OUTER: &[NamedPlace] = &[
    NamedPlace::new("Shopping Catuaí", -23.3463, -51.1809),
    NamedPlace::new("Universidade Estadual", -23.3262, -51.2004),
    NamedPlace::new("Aeroporto", -23.3336, -51.1301),
    NamedPlace::new("Cinco Conjuntos", -23.2588, -51.1716),
    NamedPlace::new("Centro de Ibiporã", -23.2690, -51.0479),
];

/// Every fixture place, central first.
pub fn all_places() -> Vec<NamedPlace> {
    CENTRAL.iter().chain(OUTER).cloned().collect()
}
