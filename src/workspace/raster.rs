use std::collections::BTreeSet;
use std::path::Path;

use gdal::Dataset;

use crate::engine::Grid;
use crate::errors::CommandError;

/// An integer raster held in memory. `None` cells are null.
#[derive(Clone,Debug)]
pub(crate) struct RasterMap {
    grid: Grid,
    /// The coordinate reference system as WKT, if the source had one. Rasters computed in the workspace have none.
    crs: Option<String>,
    cells: Vec<Option<i64>>
}

impl RasterMap {

    pub(crate) fn from_fn<Callback: FnMut(f64,f64) -> Option<i64>>(grid: Grid, mut callback: Callback) -> Self {
        let cells = grid.cell_centers().map(|(x,y)| callback(x,y)).collect();
        Self {
            grid,
            crs: None,
            cells
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(grid: Grid, rows: &[&[Option<i64>]]) -> Self {
        assert_eq!(rows.len(),grid.rows,"row count does not match grid");
        let cells: Vec<Option<i64>> = rows.iter().flat_map(|row| {
            assert_eq!(row.len(),grid.columns,"column count does not match grid");
            row.iter().copied()
        }).collect();
        Self {
            grid,
            crs: None,
            cells
        }
    }

    #[cfg(test)]
    pub(crate) fn with_crs<Wkt: Into<String>>(mut self, crs: Wkt) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Reads the first band of a GDAL raster. Only north-up rasters are supported.
    pub(crate) fn open<FilePath: AsRef<Path>>(path: FilePath) -> Result<Self,CommandError> {
        let source = path.as_ref().display().to_string();
        let dataset = Dataset::open(path.as_ref())?;
        let [west,ew_resolution,_,north,_,ns_factor] = dataset.geo_transform()?;
        let (columns,rows) = dataset.raster_size();
        let band = dataset.rasterband(1)?; // 1-based array
        let no_data = band.no_data_value();
        let buffer = band.read_band_as::<f64>()?;
        // a raster without a projection has no spatial reference, which is not an error here
        let crs = dataset.spatial_ref().ok().map(|srs| srs.to_wkt()).transpose()?;

        let mut cells = Vec::with_capacity(buffer.data().len());
        for value in buffer.data() {
            cells.push(Self::to_cell(&source, *value, no_data)?);
        }

        Ok(Self {
            grid: Grid {
                west,
                north,
                ew_resolution,
                ns_resolution: ns_factor.abs(),
                columns,
                rows
            },
            crs,
            cells
        })
    }

    #[allow(clippy::float_cmp)] // no-data values are compared exactly, that's how gdal stores them.
    fn to_cell(source: &str, value: f64, no_data: Option<f64>) -> Result<Option<i64>,CommandError> {
        if value.is_nan() || no_data.is_some_and(|no_data| no_data == value) {
            Ok(None)
        } else if value.fract() == 0.0 {
            Ok(Some(value as i64))
        } else {
            Err(CommandError::NonIntegerCellValue(source.to_owned(), value))
        }
    }

    pub(crate) fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub(crate) const fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn value_at(&self, x: f64, y: f64) -> Option<i64> {
        let (row,column) = self.grid.cell_at(x, y)?;
        self.cells.get(row * self.grid.columns + column).copied().flatten()
    }

    /// Distinct non-null values in ascending order.
    pub(crate) fn categories(&self) -> Vec<i64> {
        self.cells.iter().flatten().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    pub(crate) fn null_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

}

#[cfg(test)]
mod test {

    use super::RasterMap;
    use crate::engine::Grid;

    #[test]
    fn sample_and_categories() {
        let grid = Grid {
            west: 10.0,
            north: 20.0,
            ew_resolution: 2.0,
            ns_resolution: 2.0,
            columns: 3,
            rows: 2
        };
        let raster = RasterMap::from_rows(grid, &[
            &[Some(4), None, Some(1)],
            &[Some(4), Some(9), None],
        ]);
        assert_eq!(raster.value_at(11.0, 19.0),Some(4));
        assert_eq!(raster.value_at(13.0, 19.0),None);
        assert_eq!(raster.value_at(13.0, 17.0),Some(9));
        assert_eq!(raster.value_at(17.0, 19.0),None);
        assert_eq!(raster.categories(),vec![1,4,9]);
        assert_eq!(raster.null_count(),2);
    }

    #[test]
    fn from_fn_fills_by_cell_center() {
        let grid = Grid {
            west: 0.0,
            north: 2.0,
            ew_resolution: 1.0,
            ns_resolution: 1.0,
            columns: 2,
            rows: 2
        };
        let raster = RasterMap::from_fn(grid, |x,y| (x > 1.0 && y > 1.0).then_some(1));
        assert_eq!(raster.categories(),vec![1]);
        assert_eq!(raster.null_count(),3);
        assert_eq!(raster.value_at(1.5, 1.5),Some(1));
    }

    #[test]
    fn no_data_cells_become_null() {
        assert_eq!(RasterMap::to_cell("r", -9999.0, Some(-9999.0)).unwrap(),None);
        assert_eq!(RasterMap::to_cell("r", f64::NAN, None).unwrap(),None);
        assert_eq!(RasterMap::to_cell("r", 3.0, None).unwrap(),Some(3));
        assert!(RasterMap::to_cell("r", 0.5, None).is_err());
    }
}
