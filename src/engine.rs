/*!
The command surface of a GIS engine, as needed to compute zonal statistics. The driver only talks to the engine
through this trait, so everything it knows about the maps comes back as typed records rather than text output.

The processing window and the active mask are session state of the engine. Whoever holds the engine mutably owns
that state, which is why the driver borrows the engine exclusively for a whole run.
*/

use std::path::Path;

use crate::attributes::AttributeValue;
use crate::attributes::ColumnType;
use crate::attributes::FeatureId;
use crate::errors::CommandError;
use crate::utils::extent::Extent;

/// A cell grid: bounds plus resolution. The processing window is one of these.
#[derive(Clone,Debug,PartialEq)]
pub(crate) struct Grid {
    pub(crate) west: f64,
    pub(crate) north: f64,
    pub(crate) ew_resolution: f64,
    pub(crate) ns_resolution: f64,
    pub(crate) columns: usize,
    pub(crate) rows: usize,
}

/// One row of a value-frequency table. A `None` value counts the null cells.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) struct CellCount {
    pub(crate) value: Option<i64>,
    pub(crate) count: u64
}

impl CellCount {

    pub(crate) const fn new(value: Option<i64>, count: u64) -> Self {
        Self {
            value,
            count
        }
    }
}

/// Raster algebra understood by `GisEngine::evaluate`. Results are computed over the current window and respect
/// the active mask.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) enum RasterExpression {
    /// `output = source`
    Copy { source: String },
    /// `output = if(condition == equals, source, null())`
    WhereEquals { condition: String, equals: i64, source: String },
}

impl RasterExpression {

    pub(crate) fn masked_copy<Raster: Into<String>>(source: Raster) -> Self {
        Self::Copy {
            source: source.into()
        }
    }

    pub(crate) fn clip_to<Footprint: Into<String>, Raster: Into<String>>(footprint: Footprint, source: Raster) -> Self {
        Self::WhereEquals {
            condition: footprint.into(),
            equals: 1,
            source: source.into()
        }
    }
}

pub(crate) trait GisEngine {

    // vector catalog and attribute tables

    fn has_vector(&self, name: &str) -> bool;

    fn import_vector(&mut self, name: &str, source: &Path) -> Result<(),CommandError>;

    /// Lists the attribute columns of the vector's table in table order, not including the key column.
    fn vector_columns(&self, vector: &str) -> Result<Vec<(String,ColumnType)>,CommandError>;

    fn add_columns(&mut self, vector: &str, columns: &[(String,ColumnType)]) -> Result<(),CommandError>;

    fn drop_columns(&mut self, vector: &str, columns: &[String]) -> Result<(),CommandError>;

    /// Lists the identifiers of all rows, in the order the table returns them.
    fn feature_ids(&self, vector: &str) -> Result<Vec<FeatureId>,CommandError>;

    fn feature_extent(&self, vector: &str, id: FeatureId) -> Result<Extent,CommandError>;

    fn read_attribute(&self, vector: &str, id: FeatureId, column: &str) -> Result<AttributeValue,CommandError>;

    fn update_attribute(&mut self, vector: &str, id: FeatureId, column: &str, value: AttributeValue) -> Result<(),CommandError>;

    // raster catalog

    fn has_raster(&self, name: &str) -> bool;

    fn import_raster(&mut self, name: &str, source: &Path) -> Result<(),CommandError>;

    fn raster_grid(&self, raster: &str) -> Result<Grid,CommandError>;

    /// False only if both maps have a coordinate reference system and they differ.
    fn same_crs(&self, vector: &str, raster: &str) -> Result<bool,CommandError>;

    /// Returns a raster name, starting with the prefix, that is not in use.
    fn temporary_name(&mut self, prefix: &str) -> String;

    fn remove_raster(&mut self, raster: &str) -> Result<(),CommandError>;

    // raster queries, all restricted to the current window and mask

    /// Counts cells by value. Values are reported in ascending order with the null count, if any, last.
    fn value_frequencies(&self, raster: &str) -> Result<Vec<CellCount>,CommandError>;

    /// Lists the distinct non-null category labels stored in the map. This is a property of the map, so it
    /// is not restricted to the window or mask.
    fn categories(&self, raster: &str) -> Result<Vec<i64>,CommandError>;

    fn evaluate(&mut self, output: &str, expression: &RasterExpression) -> Result<(),CommandError>;

    fn rasterize_feature(&mut self, vector: &str, id: FeatureId, output: &str) -> Result<(),CommandError>;

    // window and mask

    fn window(&self) -> Option<Grid>;

    /// Sets the window to the extent, expanded outward to the cell boundaries of the raster and at its resolution.
    fn set_window_aligned(&mut self, extent: &Extent, align_to: &str) -> Result<(),CommandError>;

    /// Shrinks the window to the smallest block of its cells that holds all of the non-null cells of the raster.
    fn zoom_window(&mut self, raster: &str) -> Result<(),CommandError>;

    fn restore_window(&mut self, window: Option<Grid>);

    fn set_mask_from_feature(&mut self, vector: &str, id: FeatureId) -> Result<(),CommandError>;

    fn has_mask(&self) -> bool;

    fn remove_mask(&mut self) -> Result<(),CommandError>;

}
