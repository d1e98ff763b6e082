/*!
Zonal metrics. A metric reduces one raster, as seen through the current window and mask, to a single value that is
written into an attribute column.
*/

use clap::ValueEnum;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::attributes::AttributeValue;
use crate::engine::GisEngine;
use crate::engine::RasterExpression;
use crate::errors::CommandError;

const MASKED_COPY_PREFIX: &str = "masked_copy";

pub(crate) trait Metric<Engine: GisEngine + ?Sized> {

    fn compute(&self, engine: &mut Engine, raster: &str) -> Result<AttributeValue,CommandError>;

}

// Any closure with the right signature works as a metric. Extra parameters are captured by the closure.
impl<Engine: GisEngine + ?Sized, Callback: Fn(&mut Engine, &str) -> Result<AttributeValue,CommandError>> Metric<Engine> for Callback {

    fn compute(&self, engine: &mut Engine, raster: &str) -> Result<AttributeValue,CommandError> {
        self(engine, raster)
    }
}

/// Percentage of habitat cells (value 1) among the cells that are either habitat or non-habitat (value 0). Null
/// cells are ignored, any other value is an error.
pub(crate) struct ProportionHabitat;

impl<Engine: GisEngine + ?Sized> Metric<Engine> for ProportionHabitat {

    fn compute(&self, engine: &mut Engine, raster: &str) -> Result<AttributeValue,CommandError> {
        let mut zeros = 0;
        let mut ones = 0;
        for row in engine.value_frequencies(raster)? {
            match row.value {
                Some(0) => zeros += row.count,
                Some(1) => ones += row.count,
                Some(value) => return Err(CommandError::InvalidRasterValues(raster.to_owned(), value)),
                None => ()
            }
        }
        let total = zeros + ones;
        if total == 0 {
            return Err(CommandError::DivisionUndefined(raster.to_owned()))
        }
        #[allow(clippy::cast_precision_loss)] // cell counts are well within the precision of a double.
        let proportion = 100.0 * ones as f64 / total as f64;
        Ok(proportion.into())
    }
}

/// Number of distinct category labels in the raster. Category lists cover the whole map, so with `use_mask` the
/// raster is first copied through the current window and mask, and the labels of the copy are counted.
pub(crate) struct NumberPatches {
    pub(crate) use_mask: bool
}

impl<Engine: GisEngine + ?Sized> Metric<Engine> for NumberPatches {

    fn compute(&self, engine: &mut Engine, raster: &str) -> Result<AttributeValue,CommandError> {
        if self.use_mask {
            let copy = engine.temporary_name(MASKED_COPY_PREFIX);
            engine.evaluate(&copy, &RasterExpression::masked_copy(raster))?;
            let categories = engine.categories(&copy);
            // the copy is removed whether or not the categories could be read
            engine.remove_raster(&copy)?;
            Ok(categories?.len().into())
        } else {
            Ok(engine.categories(raster)?.len().into())
        }
    }
}

/// The metrics available from the command line and job files.
#[derive(Clone,Copy,Debug,PartialEq,Eq,ValueEnum,Serialize,Deserialize,JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum MetricKind {
    /// Percentage of habitat (1) cells among habitat and non-habitat (0) cells
    ProportionHabitat,
    /// Number of distinct patch labels
    NumberPatches
}

/// A reference metric chosen by `MetricKind`, with its parameters.
pub(crate) struct SelectedMetric {
    kind: MetricKind,
    use_mask: bool
}

impl SelectedMetric {

    pub(crate) const fn new(kind: MetricKind, use_mask: bool) -> Self {
        Self {
            kind,
            use_mask
        }
    }
}

impl<Engine: GisEngine + ?Sized> Metric<Engine> for SelectedMetric {

    fn compute(&self, engine: &mut Engine, raster: &str) -> Result<AttributeValue,CommandError> {
        match self.kind {
            MetricKind::ProportionHabitat => ProportionHabitat.compute(engine, raster),
            MetricKind::NumberPatches => NumberPatches { use_mask: self.use_mask }.compute(engine, raster),
        }
    }
}

#[cfg(test)]
mod test {

    use super::Metric as _;
    use super::NumberPatches;
    use super::ProportionHabitat;
    use crate::attributes::AttributeValue;
    use crate::attributes::FeatureId;
    use crate::engine::GisEngine as _;
    use crate::engine::Grid;
    use crate::errors::CommandError;
    use crate::test::fixture_workspace;
    use crate::test::HABITAT;
    use crate::test::PATCHES;
    use crate::test::ZONES;
    use crate::workspace::raster::RasterMap;
    use crate::workspace::Workspace;

    fn single_row(values: &[Option<i64>]) -> Workspace {
        let grid = Grid {
            west: 0.0,
            north: 1.0,
            ew_resolution: 1.0,
            ns_resolution: 1.0,
            columns: values.len(),
            rows: 1
        };
        let mut workspace = Workspace::new();
        workspace.insert_raster("r", RasterMap::from_rows(grid, &[values]));
        workspace
    }

    #[test]
    fn proportion_of_ones() {
        let mut workspace = single_row(&[Some(0),Some(0),Some(0),Some(1),None]);
        assert_eq!(ProportionHabitat.compute(&mut workspace, "r").unwrap(),AttributeValue::Float(25.0));

        let mut workspace = single_row(&[Some(0),Some(0)]);
        assert_eq!(ProportionHabitat.compute(&mut workspace, "r").unwrap(),AttributeValue::Float(0.0));

        let mut workspace = single_row(&[Some(1),None,Some(1)]);
        assert_eq!(ProportionHabitat.compute(&mut workspace, "r").unwrap(),AttributeValue::Float(100.0));
    }

    #[test]
    fn proportion_errors() {
        let mut workspace = single_row(&[None,None]);
        assert!(matches!(ProportionHabitat.compute(&mut workspace, "r"),Err(CommandError::DivisionUndefined(_))));

        let mut workspace = single_row(&[Some(0),Some(2),Some(1)]);
        assert!(matches!(ProportionHabitat.compute(&mut workspace, "r"),Err(CommandError::InvalidRasterValues(_,2))));
    }

    #[test]
    fn count_patches() {
        let mut workspace = single_row(&[Some(4),Some(4),Some(8),None,Some(1)]);
        assert_eq!(NumberPatches { use_mask: false }.compute(&mut workspace, "r").unwrap(),AttributeValue::Integer(3));

        let mut workspace = single_row(&[None,None]);
        assert_eq!(NumberPatches { use_mask: true }.compute(&mut workspace, "r").unwrap(),AttributeValue::Integer(0));
    }

    #[test]
    fn masked_patches_only_count_inside_the_mask() {
        let mut workspace = fixture_workspace();
        let extent = workspace.feature_extent(ZONES, FeatureId::new(1)).unwrap();
        workspace.set_window_aligned(&extent, PATCHES).unwrap();
        workspace.set_mask_from_feature(ZONES, FeatureId::new(1)).unwrap();

        assert_eq!(NumberPatches { use_mask: false }.compute(&mut workspace, PATCHES).unwrap(),AttributeValue::Integer(6));
        assert_eq!(NumberPatches { use_mask: true }.compute(&mut workspace, PATCHES).unwrap(),AttributeValue::Integer(3));
        assert_eq!(ProportionHabitat.compute(&mut workspace, HABITAT).unwrap(),AttributeValue::Float(100.0));
        // the masked copy does not outlive the call
        assert_eq!(workspace.raster_names(),vec![HABITAT.to_owned(),PATCHES.to_owned()]);
    }

    #[test]
    fn closures_are_metrics() {
        let mut workspace = single_row(&[Some(3),None,Some(5)]);
        let threshold = 4;
        let above = |engine: &mut Workspace, raster: &str| -> Result<AttributeValue,CommandError> {
            let count: u64 = engine.value_frequencies(raster)?.iter().filter(|row| row.value.is_some_and(|value| value > threshold)).map(|row| row.count).sum();
            Ok(AttributeValue::Integer(count as i64))
        };
        assert_eq!(above.compute(&mut workspace, "r").unwrap(),AttributeValue::Integer(1));
    }
}
