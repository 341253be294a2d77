//! `VectorSource`: the external collaborator that answers feature queries
//! for an extent, adapted from the OpenLayers `loader`
//! convention to a trait method returning a future rather than an async
//! generator.

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::extent::Extent;
use crate::feature::geometry_converter::Geometry;

#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry,
    properties: Vec<(String, String)>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, properties: Vec::new() }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.properties.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.properties.push((key, value));
        }
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }
}

pub trait VectorSource: Send + Sync {
    fn load(&self, extent: &Extent, resolution: f64, target_crs: &str) -> Pin<Box<dyn Future<Output = Result<Vec<Feature>>> + Send>>;
}
