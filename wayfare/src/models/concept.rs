use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::{Validate, ValidationError};

/// Closed set of place categories shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlaceCategory {
    Restaurant,
    Hotel,
    Attraction,
    Activity,
    Transport,
    Shopping,
    Nightlife,
    Cafe,
    Bar,
}

/// Coarse grouping used when two providers disagree on the exact category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryFamily {
    Dining,
    Stay,
    Sightseeing,
    Travel,
    Retail,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 9] = [
        PlaceCategory::Restaurant,
        PlaceCategory::Hotel,
        PlaceCategory::Attraction,
        PlaceCategory::Activity,
        PlaceCategory::Transport,
        PlaceCategory::Shopping,
        PlaceCategory::Nightlife,
        PlaceCategory::Cafe,
        PlaceCategory::Bar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceCategory::Restaurant => "restaurant",
            PlaceCategory::Hotel => "hotel",
            PlaceCategory::Attraction => "attraction",
            PlaceCategory::Activity => "activity",
            PlaceCategory::Transport => "transport",
            PlaceCategory::Shopping => "shopping",
            PlaceCategory::Nightlife => "nightlife",
            PlaceCategory::Cafe => "cafe",
            PlaceCategory::Bar => "bar",
        }
    }

    pub fn family(&self) -> CategoryFamily {
        match self {
            PlaceCategory::Restaurant
            | PlaceCategory::Cafe
            | PlaceCategory::Bar
            | PlaceCategory::Nightlife => CategoryFamily::Dining,
            PlaceCategory::Hotel => CategoryFamily::Stay,
            PlaceCategory::Attraction | PlaceCategory::Activity => CategoryFamily::Sightseeing,
            PlaceCategory::Transport => CategoryFamily::Travel,
            PlaceCategory::Shopping => CategoryFamily::Retail,
        }
    }

    /// Map a Yelp category alias (e.g. `"italian"`, `"hotels"`) onto a category.
    pub fn from_yelp_alias(alias: &str) -> Option<Self> {
        let alias = alias.to_lowercase();
        let category = match alias.as_str() {
            "restaurants" | "food" => PlaceCategory::Restaurant,
            "bars" | "cocktailbars" | "wine_bars" | "pubs" => PlaceCategory::Bar,
            "nightlife" | "danceclubs" => PlaceCategory::Nightlife,
            "hotels" | "hotelstravel" | "bedbreakfast" | "hostels" => PlaceCategory::Hotel,
            "tours" | "active" => PlaceCategory::Activity,
            "shopping" | "shoppingcenters" => PlaceCategory::Shopping,
            "cafes" | "coffee" | "coffeeroasteries" => PlaceCategory::Cafe,
            "arts" | "landmarks" | "museums" => PlaceCategory::Attraction,
            "transport" | "airports" | "trainstations" => PlaceCategory::Transport,
            other if other.contains("restaurant") || other.contains("food") => {
                PlaceCategory::Restaurant
            }
            other if other.contains("hotel") => PlaceCategory::Hotel,
            other if other.contains("bar") => PlaceCategory::Bar,
            _ => return None,
        };
        Some(category)
    }

    /// Map a Google Places `types[]` entry onto a category.
    pub fn from_google_type(place_type: &str) -> Option<Self> {
        let category = match place_type {
            "restaurant" | "food" | "meal_takeaway" | "meal_delivery" => PlaceCategory::Restaurant,
            "lodging" => PlaceCategory::Hotel,
            "tourist_attraction" | "museum" | "art_gallery" | "church" | "park" => {
                PlaceCategory::Attraction
            }
            "amusement_park" | "aquarium" | "zoo" | "travel_agency" => PlaceCategory::Activity,
            "bar" => PlaceCategory::Bar,
            "night_club" => PlaceCategory::Nightlife,
            "cafe" | "bakery" => PlaceCategory::Cafe,
            "shopping_mall" | "store" | "clothing_store" | "department_store" => {
                PlaceCategory::Shopping
            }
            "airport" | "train_station" | "transit_station" | "bus_station" => {
                PlaceCategory::Transport
            }
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlaceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        PlaceCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == needle)
            .ok_or_else(|| format!("unknown place category '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct Coordinates {
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be within [-180, 180]"))]
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ConceptLocation {
    #[validate(length(max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 120))]
    pub country: Option<String>,
    #[validate(nested)]
    pub coordinates: Option<Coordinates>,
}

impl ConceptLocation {
    /// `"Paris, France"`, `"Paris"` or `None`.
    pub fn display(&self) -> Option<String> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        match self.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(country) => Some(format!("{city}, {country}")),
            None => Some(city.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ConceptContext {
    #[validate(range(min = 1, max = 365))]
    pub day_number: Option<u32>,
    #[validate(length(max = 40))]
    pub time_of_day: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// A caller's request for one place to be resolved and enriched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PlaceConcept {
    #[validate(
        length(max = 200, message = "must be at most 200 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    pub category: PlaceCategory,
    #[validate(length(max = 200))]
    pub search_hint: Option<String>,
    #[validate(nested)]
    pub location: Option<ConceptLocation>,
    #[validate(nested)]
    pub context: Option<ConceptContext>,
}

impl PlaceConcept {
    pub fn new(name: impl Into<String>, category: PlaceCategory) -> Self {
        Self {
            name: name.into(),
            category,
            search_hint: None,
            location: None,
            context: None,
        }
    }

    pub fn with_coordinates(mut self, lat: f64, lng: f64) -> Self {
        let location = self.location.get_or_insert_with(ConceptLocation::default);
        location.coordinates = Some(Coordinates::new(lat, lng));
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        let location = self.location.get_or_insert_with(ConceptLocation::default);
        location.city = Some(city.into());
        self
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.location.as_ref().and_then(|l| l.coordinates)
    }

    pub fn city(&self) -> Option<&str> {
        self.location.as_ref().and_then(|l| l.city.as_deref())
    }

    pub fn location_display(&self) -> Option<String> {
        self.location.as_ref().and_then(ConceptLocation::display)
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be empty".into());
        return Err(error);
    }
    Ok(())
}
