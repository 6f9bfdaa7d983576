use std::collections::HashMap;

use crate::config::RoutingConfig;
use crate::models::{PlaceCategory, Provider};

/// Which place providers are asked about each category, in call order.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: HashMap<PlaceCategory, Vec<Provider>>,
}

fn default_route(category: PlaceCategory) -> Vec<Provider> {
    use PlaceCategory::*;
    use Provider::*;

    match category {
        Restaurant | Cafe | Bar | Nightlife => vec![Yelp, Google],
        Hotel | Attraction => vec![Google, Amadeus],
        Activity => vec![Amadeus, Google],
        Transport => vec![Amadeus],
        Shopping => vec![Google, Yelp],
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

impl RoutingTable {
    pub fn from_config(config: &RoutingConfig) -> Self {
        let routes = PlaceCategory::ALL
            .iter()
            .map(|category| {
                let route = config
                    .overrides
                    .get(category)
                    .cloned()
                    .unwrap_or_else(|| default_route(*category));
                (*category, route)
            })
            .collect();
        Self { routes }
    }

    pub fn providers_for(&self, category: PlaceCategory) -> &[Provider] {
        self.routes.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}
