/*!
An in-process GIS engine. It keeps a catalog of vector and raster maps, imported through GDAL, along with the processing
window and active mask of the current session.

Raster queries are evaluated on the cells of the window (or on the raster's own cells, if no window is set), sampling
every raster at the cell centre. Cells outside a raster, and cells outside the active mask, read as null.
*/

use std::collections::BTreeMap;
use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use geo::Contains as _;
use geo_types::Point;
use indexmap::IndexMap;

use crate::attributes::AttributeValue;
use crate::attributes::ColumnType;
use crate::attributes::FeatureId;
use crate::engine::CellCount;
use crate::engine::GisEngine;
use crate::engine::Grid;
use crate::engine::RasterExpression;
use crate::errors::CommandError;
use crate::utils::extent::Extent;

pub(crate) mod grid;
pub(crate) mod raster;
pub(crate) mod vector;

use raster::RasterMap;
use vector::VectorMap;

#[derive(Default)]
pub(crate) struct Workspace {
    vectors: IndexMap<String,VectorMap>,
    rasters: IndexMap<String,RasterMap>,
    window: Option<Grid>,
    mask: Option<RasterMap>,
    temporary_counter: usize
}

impl Workspace {

    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_vector<Name: Into<String>>(&mut self, name: Name, map: VectorMap) {
        _ = self.vectors.insert(name.into(), map);
    }

    pub(crate) fn insert_raster<Name: Into<String>>(&mut self, name: Name, map: RasterMap) {
        _ = self.rasters.insert(name.into(), map);
    }

    #[cfg(test)]
    pub(crate) fn raster_names(&self) -> Vec<String> {
        self.rasters.keys().cloned().collect()
    }

    pub(crate) fn vector(&self, name: &str) -> Result<&VectorMap,CommandError> {
        self.vectors.get(name).ok_or_else(|| CommandError::MissingVectorMap(name.to_owned()))
    }

    fn vector_mut(&mut self, name: &str) -> Result<&mut VectorMap,CommandError> {
        self.vectors.get_mut(name).ok_or_else(|| CommandError::MissingVectorMap(name.to_owned()))
    }

    pub(crate) fn raster(&self, name: &str) -> Result<&RasterMap,CommandError> {
        self.rasters.get(name).ok_or_else(|| CommandError::MissingRasterMap(name.to_owned()))
    }

    fn query_grid(&self, raster: &RasterMap) -> Grid {
        self.window.clone().unwrap_or_else(|| raster.grid().clone())
    }

    fn sample(&self, raster: &RasterMap, x: f64, y: f64) -> Option<i64> {
        match &self.mask {
            Some(mask) if mask.value_at(x, y).is_none() => None,
            Some(_) | None => raster.value_at(x, y)
        }
    }

    fn footprint(&self, vector: &str, id: FeatureId) -> Result<RasterMap,CommandError> {
        let window = self.window.clone().ok_or(CommandError::NoProcessingWindow)?;
        let geometry = self.vector(vector)?.feature(id)?.geometry();
        let bounds = Extent::of_polygons(geometry)?.ok_or_else(|| CommandError::MissingGeometry(vector.to_owned(), id))?;
        Ok(RasterMap::from_fn(window, |x,y| (bounds.contains(x, y) && geometry.contains(&Point::new(x, y))).then_some(1)))
    }

    fn insert_new_raster(&mut self, name: &str, map: RasterMap) -> Result<(),CommandError> {
        if self.rasters.contains_key(name) {
            Err(CommandError::RasterExists(name.to_owned()))
        } else {
            self.insert_raster(name, map);
            Ok(())
        }
    }

}

impl GisEngine for Workspace {

    fn has_vector(&self, name: &str) -> bool {
        self.vectors.contains_key(name)
    }

    fn import_vector(&mut self, name: &str, source: &Path) -> Result<(),CommandError> {
        let map = VectorMap::open(name, source).map_err(|e| CommandError::LayerImport(name.to_owned(), Box::new(e)))?;
        self.insert_vector(name, map);
        Ok(())
    }

    fn vector_columns(&self, vector: &str) -> Result<Vec<(String,ColumnType)>,CommandError> {
        Ok(self.vector(vector)?.columns().iter().map(|(name,column_type)| (name.clone(),*column_type)).collect())
    }

    fn add_columns(&mut self, vector: &str, columns: &[(String,ColumnType)]) -> Result<(),CommandError> {
        self.vector_mut(vector)?.add_columns(columns)
    }

    fn drop_columns(&mut self, vector: &str, columns: &[String]) -> Result<(),CommandError> {
        self.vector_mut(vector)?.drop_columns(columns)
    }

    fn feature_ids(&self, vector: &str) -> Result<Vec<FeatureId>,CommandError> {
        Ok(self.vector(vector)?.feature_ids())
    }

    fn feature_extent(&self, vector: &str, id: FeatureId) -> Result<Extent,CommandError> {
        let geometry = self.vector(vector)?.feature(id)?.geometry();
        Extent::of_polygons(geometry)?.ok_or_else(|| CommandError::MissingGeometry(vector.to_owned(), id))
    }

    fn read_attribute(&self, vector: &str, id: FeatureId, column: &str) -> Result<AttributeValue,CommandError> {
        self.vector(vector)?.read_attribute(id, column)
    }

    fn update_attribute(&mut self, vector: &str, id: FeatureId, column: &str, value: AttributeValue) -> Result<(),CommandError> {
        self.vector_mut(vector)?.update_attribute(id, column, value)
    }

    fn has_raster(&self, name: &str) -> bool {
        self.rasters.contains_key(name)
    }

    fn import_raster(&mut self, name: &str, source: &Path) -> Result<(),CommandError> {
        let map = RasterMap::open(source).map_err(|e| CommandError::LayerImport(name.to_owned(), Box::new(e)))?;
        self.insert_raster(name, map);
        Ok(())
    }

    fn raster_grid(&self, raster: &str) -> Result<Grid,CommandError> {
        Ok(self.raster(raster)?.grid().clone())
    }

    fn same_crs(&self, vector: &str, raster: &str) -> Result<bool,CommandError> {
        match (self.vector(vector)?.crs(), self.raster(raster)?.crs()) {
            (Some(vector_crs), Some(raster_crs)) => Ok(SpatialRef::from_wkt(vector_crs)? == SpatialRef::from_wkt(raster_crs)?),
            _ => Ok(true)
        }
    }

    fn temporary_name(&mut self, prefix: &str) -> String {
        loop {
            self.temporary_counter += 1;
            let name = format!("{prefix}_{}",self.temporary_counter);
            if !self.rasters.contains_key(&name) {
                break name
            }
        }
    }

    fn remove_raster(&mut self, raster: &str) -> Result<(),CommandError> {
        match self.rasters.shift_remove(raster) {
            Some(_) => Ok(()),
            None => Err(CommandError::MissingRasterMap(raster.to_owned()))
        }
    }

    fn value_frequencies(&self, raster: &str) -> Result<Vec<CellCount>,CommandError> {
        let map = self.raster(raster)?;
        let mut counts = BTreeMap::new();
        let mut nulls = 0;
        for (x,y) in self.query_grid(map).cell_centers() {
            match self.sample(map, x, y) {
                Some(value) => *counts.entry(value).or_insert(0) += 1,
                None => nulls += 1
            }
        }
        let mut result: Vec<CellCount> = counts.into_iter().map(|(value,count)| CellCount::new(Some(value), count)).collect();
        if nulls > 0 {
            result.push(CellCount::new(None, nulls));
        }
        Ok(result)
    }

    fn categories(&self, raster: &str) -> Result<Vec<i64>,CommandError> {
        Ok(self.raster(raster)?.categories())
    }

    fn evaluate(&mut self, output: &str, expression: &RasterExpression) -> Result<(),CommandError> {
        let result = match expression {
            RasterExpression::Copy { source } => {
                let source = self.raster(source)?;
                RasterMap::from_fn(self.query_grid(source), |x,y| self.sample(source, x, y))
            },
            RasterExpression::WhereEquals { condition, equals, source } => {
                let condition = self.raster(condition)?;
                let source = self.raster(source)?;
                RasterMap::from_fn(self.query_grid(source), |x,y| {
                    if self.sample(condition, x, y) == Some(*equals) {
                        self.sample(source, x, y)
                    } else {
                        None
                    }
                })
            }
        };
        self.insert_new_raster(output, result)
    }

    fn rasterize_feature(&mut self, vector: &str, id: FeatureId, output: &str) -> Result<(),CommandError> {
        let footprint = self.footprint(vector, id)?;
        self.insert_new_raster(output, footprint)
    }

    fn window(&self) -> Option<Grid> {
        self.window.clone()
    }

    fn set_window_aligned(&mut self, extent: &Extent, align_to: &str) -> Result<(),CommandError> {
        let window = Grid::aligned(extent, self.raster(align_to)?.grid());
        self.window = Some(window);
        Ok(())
    }

    fn zoom_window(&mut self, raster: &str) -> Result<(),CommandError> {
        let map = self.raster(raster)?;
        let window = self.query_grid(map);
        // (first row, last row, first column, last column)
        let mut bounds: Option<(usize,usize,usize,usize)> = None;
        for row in 0..window.rows {
            for column in 0..window.columns {
                let (x,y) = window.cell_center(row, column);
                if map.value_at(x, y).is_some() {
                    bounds = Some(match bounds {
                        Some((first_row,last_row,first_column,last_column)) => (first_row.min(row),last_row.max(row),first_column.min(column),last_column.max(column)),
                        None => (row,row,column,column)
                    });
                }
            }
        }
        let (first_row,last_row,first_column,last_column) = bounds.ok_or_else(|| CommandError::EmptyRasterFootprint(raster.to_owned()))?;
        self.window = Some(window.sub_grid(first_row, first_column, last_row - first_row + 1, last_column - first_column + 1));
        Ok(())
    }

    fn restore_window(&mut self, window: Option<Grid>) {
        self.window = window;
    }

    fn set_mask_from_feature(&mut self, vector: &str, id: FeatureId) -> Result<(),CommandError> {
        if self.mask.is_some() {
            return Err(CommandError::MaskAlreadyActive)
        }
        self.mask = Some(self.footprint(vector, id)?);
        Ok(())
    }

    fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    fn remove_mask(&mut self) -> Result<(),CommandError> {
        self.mask = None;
        Ok(())
    }

}

#[cfg(test)]
mod test {

    use geo_types::polygon;
    use geo_types::MultiPolygon;
    use indexmap::IndexMap;

    use super::vector::VectorMap;
    use crate::attributes::FeatureId;
    use crate::engine::CellCount;
    use crate::engine::GisEngine as _;
    use crate::engine::RasterExpression;
    use crate::errors::CommandError;
    use crate::test::fixture_workspace;
    use crate::test::HABITAT;
    use crate::test::PATCHES;
    use crate::test::ZONES;

    #[test]
    fn frequencies_without_window_cover_whole_raster() {
        let workspace = fixture_workspace();
        let counts = workspace.value_frequencies(HABITAT).unwrap();
        assert_eq!(counts,vec![
            CellCount::new(Some(0), 17),
            CellCount::new(Some(1), 23),
            CellCount::new(None, 8),
        ]);
    }

    #[test]
    fn window_and_mask_restrict_frequencies() {
        let mut workspace = fixture_workspace();
        let extent = workspace.feature_extent(ZONES, FeatureId::new(2)).unwrap();
        workspace.set_window_aligned(&extent, HABITAT).unwrap();
        assert_eq!(workspace.value_frequencies(HABITAT).unwrap(),vec![
            CellCount::new(Some(0), 12),
            CellCount::new(Some(1), 4),
        ]);

        // a mask for a feature outside the window hides everything
        workspace.set_mask_from_feature(ZONES, FeatureId::new(1)).unwrap();
        assert_eq!(workspace.value_frequencies(HABITAT).unwrap(),vec![CellCount::new(None, 16)]);
        assert!(matches!(workspace.set_mask_from_feature(ZONES, FeatureId::new(2)),Err(CommandError::MaskAlreadyActive)));
        workspace.remove_mask().unwrap();
        assert!(!workspace.has_mask());
    }

    #[test]
    fn rasterize_and_zoom_to_triangle() {
        let mut workspace = fixture_workspace();
        let mut triangles = VectorMap::new("triangles", IndexMap::new());
        triangles.add_feature(FeatureId::new(1), MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 3.2, y: 0.0), (x: 0.0, y: 3.2), (x: 0.0, y: 0.0)]]), IndexMap::new()).unwrap();
        workspace.insert_vector("triangles", triangles);

        let extent = workspace.feature_extent("triangles", FeatureId::new(1)).unwrap();
        workspace.set_window_aligned(&extent, HABITAT).unwrap();
        let window = workspace.window().unwrap();
        assert_eq!((window.rows,window.columns),(4,4));

        workspace.rasterize_feature("triangles", FeatureId::new(1), "footprint").unwrap();
        workspace.zoom_window("footprint").unwrap();
        let window = workspace.window().unwrap();
        // no cell centre of the top row falls inside the triangle
        assert_eq!((window.rows,window.columns),(3,3));
        assert_eq!((window.west,window.north),(0.0,3.0));
        assert!(matches!(workspace.rasterize_feature("triangles", FeatureId::new(1), "footprint"),Err(CommandError::RasterExists(_))));
    }

    #[test]
    fn conditional_copy_clips_to_footprint() {
        let mut workspace = fixture_workspace();
        let extent = workspace.feature_extent(ZONES, FeatureId::new(1)).unwrap();
        workspace.set_window_aligned(&extent, PATCHES).unwrap();
        workspace.rasterize_feature(ZONES, FeatureId::new(1), "footprint").unwrap();
        workspace.evaluate("clipped", &RasterExpression::clip_to("footprint", PATCHES)).unwrap();
        assert_eq!(workspace.categories("clipped").unwrap(),vec![2,7,9]);
        assert_eq!(workspace.categories(PATCHES).unwrap(),vec![2,3,4,5,7,9]);
    }

    #[test]
    fn temporary_names_are_unused() {
        let mut workspace = fixture_workspace();
        let first = workspace.temporary_name("scratch");
        workspace.evaluate(&first, &RasterExpression::masked_copy(HABITAT)).unwrap();
        let second = workspace.temporary_name("scratch");
        assert_ne!(first,second);
        workspace.remove_raster(&first).unwrap();
        assert!(workspace.remove_raster(&first).is_err());
    }
}
