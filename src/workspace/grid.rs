use crate::engine::Grid;
use crate::utils::extent::Extent;

// Tolerance, in cells, for treating a coordinate as lying exactly on a cell boundary when aligning.
const SNAP_TOLERANCE: f64 = 1e-9;

impl Grid {

    pub(crate) fn extent(&self) -> Extent {
        let height = self.rows as f64 * self.ns_resolution;
        let width = self.columns as f64 * self.ew_resolution;
        Extent {
            height,
            width,
            south: self.north - height,
            west: self.west
        }
    }

    pub(crate) const fn cell_count(&self) -> usize {
        self.rows * self.columns
    }

    pub(crate) fn cell_center(&self, row: usize, column: usize) -> (f64,f64) {
        let x = self.ew_resolution.mul_add(column as f64 + 0.5, self.west);
        let y = (-self.ns_resolution).mul_add(row as f64 + 0.5, self.north);
        (x,y)
    }

    /// Row-major cell centres, starting in the north-west corner.
    pub(crate) fn cell_centers(&self) -> impl Iterator<Item = (f64,f64)> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |column| self.cell_center(row, column)))
    }

    pub(crate) fn cell_at(&self, x: f64, y: f64) -> Option<(usize,usize)> {
        let column = ((x - self.west) / self.ew_resolution).floor();
        let row = ((self.north - y) / self.ns_resolution).floor();
        if column < 0.0 || row < 0.0 || column >= self.columns as f64 || row >= self.rows as f64 {
            None
        } else {
            Some((row as usize, column as usize))
        }
    }

    /// Expands the extent outward to the cell boundaries of another grid, taking its resolution.
    pub(crate) fn aligned(extent: &Extent, to: &Self) -> Self {
        let ew = to.ew_resolution;
        let ns = to.ns_resolution;
        let west = ((extent.west - to.west) / ew + SNAP_TOLERANCE).floor().mul_add(ew, to.west);
        let east = ((extent.east() - to.west) / ew - SNAP_TOLERANCE).ceil().mul_add(ew, to.west);
        let north = (-((to.north - extent.north()) / ns + SNAP_TOLERANCE).floor()).mul_add(ns, to.north);
        let south = (-((to.north - extent.south) / ns - SNAP_TOLERANCE).ceil()).mul_add(ns, to.north);
        // a zone narrower than a cell still gets one cell
        let columns = ((east - west) / ew).round().max(1.0) as usize;
        let rows = ((north - south) / ns).round().max(1.0) as usize;
        Self {
            west,
            north,
            ew_resolution: ew,
            ns_resolution: ns,
            columns,
            rows
        }
    }

    pub(crate) fn sub_grid(&self, first_row: usize, first_column: usize, rows: usize, columns: usize) -> Self {
        Self {
            west: self.ew_resolution.mul_add(first_column as f64, self.west),
            north: (-self.ns_resolution).mul_add(first_row as f64, self.north),
            ew_resolution: self.ew_resolution,
            ns_resolution: self.ns_resolution,
            columns,
            rows
        }
    }

}

#[cfg(test)]
mod test {

    use crate::engine::Grid;
    use crate::utils::extent::Extent;

    fn unit_grid() -> Grid {
        Grid {
            west: 0.0,
            north: 10.0,
            ew_resolution: 1.0,
            ns_resolution: 1.0,
            columns: 10,
            rows: 10
        }
    }

    #[test]
    fn align_expands_to_cell_boundaries() {
        let extent = Extent::new(2.3, 4.5, 5.1, 7.9).unwrap();
        let aligned = Grid::aligned(&extent, &unit_grid());
        assert_eq!(aligned,Grid {
            west: 2.0,
            north: 8.0,
            ew_resolution: 1.0,
            ns_resolution: 1.0,
            columns: 4,
            rows: 4
        });
    }

    #[test]
    fn align_keeps_exact_boundaries() {
        let extent = Extent::new(4.0, 0.0, 8.0, 4.0).unwrap();
        let aligned = Grid::aligned(&extent, &unit_grid());
        assert_eq!(aligned.west,4.0);
        assert_eq!(aligned.north,4.0);
        assert_eq!(aligned.columns,4);
        assert_eq!(aligned.rows,4);
    }

    #[test]
    fn cell_lookup() {
        let grid = unit_grid();
        assert_eq!(grid.cell_center(0, 0),(0.5,9.5));
        assert_eq!(grid.cell_at(0.5, 9.5),Some((0,0)));
        assert_eq!(grid.cell_at(9.9, 0.1),Some((9,9)));
        assert_eq!(grid.cell_at(10.0, 5.0),None);
        assert_eq!(grid.cell_at(-0.1, 5.0),None);
        assert_eq!(grid.cell_centers().count(),grid.cell_count());
        assert_eq!(grid.sub_grid(2, 3, 4, 5).extent(),Extent::new(3.0, 4.0, 8.0, 8.0).unwrap());
    }
}
