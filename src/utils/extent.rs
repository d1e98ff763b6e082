use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FormatResult;

use geo::BoundingRect as _;
use geo_types::MultiPolygon;
use ordered_float::NotNan;

use crate::errors::CommandError;

/// A north/south/east/west bounding record, as reported for a feature or a processing window.
#[derive(Clone,Debug,PartialEq)]
pub(crate) struct Extent {
    pub(crate) height: f64,
    pub(crate) width: f64,
    pub(crate) south: f64,
    pub(crate) west: f64,
}

impl Extent {

    pub(crate) fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self,CommandError> {
        // a bad geometry can produce NaN bounds, which would silently create an empty window later.
        let west = NotNan::new(west)?.into_inner();
        let south = NotNan::new(south)?.into_inner();
        let east = NotNan::new(east)?.into_inner();
        let north = NotNan::new(north)?.into_inner();
        Ok(Self {
            height: north - south,
            width: east - west,
            south,
            west
        })
    }

    pub(crate) fn of_polygons(geometry: &MultiPolygon<f64>) -> Result<Option<Self>,CommandError> {
        geometry.bounding_rect().map(|rect| Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)).transpose()
    }

    pub(crate) fn east(&self) -> f64 {
        self.west + self.width
    }

    pub(crate) fn north(&self) -> f64 {
        self.south + self.height
    }

    pub(crate) fn contains(&self, x: f64, y: f64) -> bool {
        (x >= self.west) &&
           (x <= self.east()) &&
           (y >= self.south) &&
           (y <= self.north())
    }

}

impl Display for Extent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f,"n={} s={} e={} w={}",self.north(),self.south,self.east(),self.west)
    }
}
