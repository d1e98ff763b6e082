/*!
The zonal statistics driver. A `ZonalJob` loads a polygon layer and a list of rasters into the engine, makes sure the
polygon layer has one destination column per raster, then visits the polygons one at a time. For every polygon the
processing window is fitted to it, the rasters are restricted to its footprint, and the metric is computed for each
raster and written into the polygon's attribute row.
*/

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use clap::ValueEnum;
use indexmap::IndexMap;
use indexmap::IndexSet;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::attributes::AttributeValue;
use crate::attributes::ColumnSpec;
use crate::attributes::ColumnType;
use crate::attributes::FeatureId;
use crate::columns::ensure_columns;
use crate::columns::ConflictResolver;
use crate::engine::GisEngine;
use crate::engine::RasterExpression;
use crate::errors::CommandError;
use crate::errors::Precondition;
use crate::metrics::Metric;
use crate::progress::ProgressObserver;
use crate::utils::join_display;

const FOOTPRINT_PREFIX: &str = "zone_footprint";
const CLIPPED_PREFIX: &str = "zone_input";

/// A map in the engine, and optionally the file it is imported from.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) struct LayerSource {
    pub(crate) name: String,
    pub(crate) path: Option<PathBuf>
}

impl LayerSource {

    /// A layer that must already be in the engine.
    #[cfg(test)]
    pub(crate) fn named<Name: Into<String>>(name: Name) -> Self {
        Self {
            name: name.into(),
            path: None
        }
    }

    /// A layer imported from a file, named after the file unless a name is given.
    pub(crate) fn from_path<FilePath: AsRef<Path>>(path: FilePath, name: Option<String>) -> Self {
        let path = path.as_ref();
        let name = name.unwrap_or_else(|| path.file_stem().map_or_else(|| path.display().to_string(), |stem| stem.to_string_lossy().into_owned()));
        Self {
            name,
            path: Some(path.to_path_buf())
        }
    }

}

#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub(crate) enum JobState {
    Uninitialized,
    Loaded,
    ColumnsReady,
    Running,
    Done,
    Failed
}

/// How each raster is restricted to the polygon being processed.
#[derive(Clone,Copy,Debug,Default,PartialEq,Eq,ValueEnum,Serialize,Deserialize,JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum MaskingStrategy {
    /// Make the polygon the active mask while its rasters are processed
    #[default]
    GlobalMask,
    /// Leave the mask alone, and give the metric a copy of each raster clipped to the polygon
    ConditionalCopy
}

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub(crate) enum FeatureSelection {
    #[default]
    All,
    /// Only these features, in this order. Duplicates are ignored, unknown identifiers are dropped and reported.
    Subset(Vec<FeatureId>)
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub(crate) enum ErrorPolicy {
    /// Stop the run at the first failing feature
    #[default]
    Abort,
    /// Record the failure and go on to the next feature
    Continue
}

#[derive(Clone,Debug,Default)]
pub(crate) struct RunOptions {
    pub(crate) strategy: MaskingStrategy,
    pub(crate) selection: FeatureSelection,
    pub(crate) on_error: ErrorPolicy
}

#[derive(Debug)]
pub(crate) struct FeatureOutcome {
    pub(crate) id: FeatureId,
    /// The values written for this feature, by column. A failed feature keeps whatever was written before the failure.
    pub(crate) values: IndexMap<String,AttributeValue>,
    pub(crate) error: Option<CommandError>
}

#[derive(Debug,Default)]
pub(crate) struct RunReport {
    pub(crate) outcomes: Vec<FeatureOutcome>,
    /// Requested identifiers that are not in the vector map.
    pub(crate) dropped: Vec<FeatureId>
}

impl RunReport {

    pub(crate) fn failures(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.error.is_some()).count()
    }
}

// Temporary rasters and the mask created while processing one feature. Everything recorded here is released when
// the feature is finished, whether or not it succeeded.
#[derive(Default)]
struct FeatureScratch {
    rasters: Vec<String>,
    mask_set: bool
}

impl FeatureScratch {

    fn allocate<Engine: GisEngine + ?Sized>(&mut self, engine: &mut Engine, prefix: &str) -> String {
        let name = engine.temporary_name(prefix);
        self.rasters.push(name.clone());
        name
    }

    fn release<Engine: GisEngine + ?Sized>(&mut self, engine: &mut Engine, name: &str) -> Result<(),CommandError> {
        self.rasters.retain(|raster| raster != name);
        engine.remove_raster(name)
    }

    fn set_mask<Engine: GisEngine + ?Sized>(&mut self, engine: &mut Engine, vector: &str, id: FeatureId) -> Result<(),CommandError> {
        engine.set_mask_from_feature(vector, id)?;
        self.mask_set = true;
        Ok(())
    }

    fn clean_up<Engine: GisEngine + ?Sized>(self, engine: &mut Engine) -> Result<(),CommandError> {
        // every step is attempted, the first error is reported
        let mut result = Ok(());
        if self.mask_set {
            result = result.and(engine.remove_mask());
        }
        for raster in self.rasters {
            if engine.has_raster(&raster) {
                result = result.and(engine.remove_raster(&raster));
            }
        }
        result
    }

}

fn with_feature_scratch<Engine: GisEngine + ?Sized, Callback: FnOnce(&mut Engine, &mut FeatureScratch) -> Result<(),CommandError>>(engine: &mut Engine, callback: Callback) -> Result<(),CommandError> {
    let mut scratch = FeatureScratch::default();
    let result = callback(engine, &mut scratch);
    let cleaned = scratch.clean_up(engine);
    // an error from the work itself is more interesting than one from cleaning up after it
    result.and(cleaned)
}

pub(crate) struct ZonalJob {
    vector: LayerSource,
    rasters: Vec<LayerSource>,
    column_names: Vec<String>,
    column_types: Vec<String>,
    overwrite_layers: bool,
    state: JobState
}

impl ZonalJob {

    pub(crate) const fn new(vector: LayerSource, rasters: Vec<LayerSource>, column_names: Vec<String>, column_types: Vec<String>) -> Self {
        Self {
            vector,
            rasters,
            column_names,
            column_types,
            overwrite_layers: false,
            state: JobState::Uninitialized
        }
    }

    /// Re-import layers from their files even if the engine already has them.
    #[cfg(test)]
    pub(crate) fn overwrite_layers(mut self, overwrite: bool) -> Self {
        self.overwrite_layers = overwrite;
        self
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn vector_name(&self) -> &str {
        &self.vector.name
    }

    fn require(&self, precondition: Precondition) -> Result<(),CommandError> {
        let ready = match (self.state, precondition) {
            (JobState::Uninitialized, _) |
            (JobState::Loaded, Precondition::ColumnsReady) => false,
            (JobState::Loaded, Precondition::Loaded) |
            (JobState::ColumnsReady | JobState::Running | JobState::Done | JobState::Failed, _) => true,
        };
        if ready {
            Ok(())
        } else {
            Err(CommandError::NotReady(precondition))
        }
    }

    fn load_layer<Engine: GisEngine + ?Sized, Progress: ProgressObserver>(&self, engine: &mut Engine, layer: &LayerSource, is_vector: bool, progress: &mut Progress) -> Result<(),CommandError> {
        let exists = if is_vector {
            engine.has_vector(&layer.name)
        } else {
            engine.has_raster(&layer.name)
        };
        if let Some(path) = layer.path.as_ref().filter(|_| !exists || self.overwrite_layers) {
            progress.message(|| format!("Importing {} from {}.",layer.name,path.display()));
            if is_vector {
                engine.import_vector(&layer.name, path)
            } else {
                engine.import_raster(&layer.name, path)
            }
        } else if exists {
            progress.warning(|| format!("Layer '{}' already exists and will not be imported again.",layer.name));
            Ok(())
        } else {
            Err(CommandError::MissingLayerSource(layer.name.clone()))
        }
    }

    /// Brings the vector map and every raster into the engine. Layers that are already there are only imported again
    /// if the job overwrites layers.
    pub(crate) fn load<Engine: GisEngine + ?Sized, Progress: ProgressObserver>(&mut self, engine: &mut Engine, progress: &mut Progress) -> Result<(),CommandError> {
        self.state = JobState::Uninitialized;
        if self.rasters.is_empty() {
            return Err(CommandError::NoRastersConfigured)
        }
        // two files with the same stem would otherwise end up as one map
        for (index,raster) in self.rasters.iter().enumerate() {
            if self.rasters[..index].iter().any(|other| other.name == raster.name && other.path != raster.path) {
                return Err(CommandError::DuplicateLayerName(raster.name.clone()))
            }
        }
        self.load_layer(engine, &self.vector, true, progress)?;
        for raster in &self.rasters {
            self.load_layer(engine, raster, false, progress)?;
        }
        for raster in &self.rasters {
            if !engine.same_crs(&self.vector.name, &raster.name)? {
                return Err(CommandError::CrsMismatch {
                    vector: self.vector.name.clone(),
                    raster: raster.name.clone()
                })
            }
        }
        self.state = JobState::Loaded;
        Ok(())
    }

    /// Creates the destination columns, one per raster. On failure nothing is created and the job stays loaded.
    pub(crate) fn create_columns<Engine: GisEngine + ?Sized, Resolver: ConflictResolver>(&mut self, engine: &mut Engine, resolver: &mut Resolver) -> Result<IndexMap<String,ColumnType>,CommandError> {
        self.require(Precondition::Loaded)?;
        if self.column_names.len() != self.rasters.len() || self.column_types.len() != self.rasters.len() {
            return Err(CommandError::MismatchedColumnCount {
                rasters: self.rasters.len(),
                columns: self.column_names.len(),
                types: self.column_types.len()
            })
        }
        let specs: Vec<ColumnSpec> = self.column_names.iter().zip(&self.column_types).map(|(name,type_tag)| ColumnSpec::new(name.clone(), type_tag.clone())).collect();
        let columns = ensure_columns(engine, &self.vector.name, &specs, resolver)?;
        // a kept column may be spelled differently from the request
        self.column_names = columns.keys().cloned().collect();
        self.state = JobState::ColumnsReady;
        Ok(columns)
    }

    fn select_features<Engine: GisEngine + ?Sized>(&self, engine: &Engine, selection: &FeatureSelection) -> Result<(Vec<FeatureId>,Vec<FeatureId>),CommandError> {
        let existing = engine.feature_ids(&self.vector.name)?;
        match selection {
            FeatureSelection::All => Ok((existing,Vec::new())),
            FeatureSelection::Subset(requested) => {
                let existing: HashSet<FeatureId> = existing.into_iter().collect();
                let requested: IndexSet<FeatureId> = requested.iter().copied().collect();
                let (selected,dropped): (Vec<FeatureId>,Vec<FeatureId>) = requested.into_iter().partition(|id| existing.contains(id));
                Ok((selected,dropped))
            }
        }
    }

    fn process_feature<Engine: GisEngine + ?Sized, MetricType: Metric<Engine> + ?Sized>(&self, engine: &mut Engine, metric: &MetricType, strategy: MaskingStrategy, id: FeatureId, values: &mut IndexMap<String,AttributeValue>) -> Result<(),CommandError> {
        let vector = &self.vector.name;
        let align_to = &self.rasters.first().ok_or(CommandError::NoRastersConfigured)?.name;

        let extent = engine.feature_extent(vector, id)?;
        engine.set_window_aligned(&extent, align_to)?;

        with_feature_scratch(engine, |engine, scratch| {
            let footprint = scratch.allocate(engine, FOOTPRINT_PREFIX);
            engine.rasterize_feature(vector, id, &footprint)?;
            engine.zoom_window(&footprint)?;
            if strategy == MaskingStrategy::GlobalMask {
                scratch.set_mask(engine, vector, id)?;
            }

            for (raster,column) in self.rasters.iter().zip(&self.column_names) {
                let value = match strategy {
                    MaskingStrategy::GlobalMask => metric.compute(engine, &raster.name)?,
                    MaskingStrategy::ConditionalCopy => {
                        let clipped = scratch.allocate(engine, CLIPPED_PREFIX);
                        engine.evaluate(&clipped, &RasterExpression::clip_to(&footprint, &raster.name))?;
                        let value = metric.compute(engine, &clipped)?;
                        scratch.release(engine, &clipped)?;
                        value
                    }
                };
                engine.update_attribute(vector, id, column, value.clone())?;
                _ = values.insert(column.clone(), value);
            }
            Ok(())
        })
    }

    fn run_features<Engine: GisEngine + ?Sized, MetricType: Metric<Engine> + ?Sized, Progress: ProgressObserver>(&self, engine: &mut Engine, metric: &MetricType, options: &RunOptions, progress: &mut Progress) -> Result<RunReport,CommandError> {
        let (features,dropped) = self.select_features(engine, &options.selection)?;
        if !dropped.is_empty() {
            progress.warning(|| format!("Vector map '{}' has no features with cat {}, they will be skipped.",self.vector.name,join_display(&dropped)));
        }

        let mut report = RunReport {
            outcomes: Vec::with_capacity(features.len()),
            dropped
        };

        progress.start_known_endpoint(|| ("Computing zonal statistics.",features.len()));
        for (i,id) in features.into_iter().enumerate() {
            let mut values = IndexMap::new();
            let result = self.process_feature(engine, metric, options.strategy, id, &mut values);
            progress.update(|| i + 1);
            match (result, options.on_error) {
                (Ok(()), _) => report.outcomes.push(FeatureOutcome {
                    id,
                    values,
                    error: None
                }),
                (Err(err), ErrorPolicy::Abort) => {
                    progress.finish(|| format!("Zonal statistics stopped at feature {id}."));
                    return Err(err)
                },
                (Err(err), ErrorPolicy::Continue) => {
                    progress.warning(|| format!("Feature {id} failed: {err}"));
                    report.outcomes.push(FeatureOutcome {
                        id,
                        values,
                        error: Some(err)
                    })
                }
            }
        }
        progress.finish(|| "Zonal statistics computed.");

        Ok(report)
    }

    /**
    Computes the metric for every selected feature and every raster, writing the results into the destination columns.

    The engine is borrowed for the whole run, since the window and mask it holds are changed for every feature. The
    window in effect before the run is put back afterwards, and no temporary raster or mask created by the run is left
    behind, whether it succeeds or not.
    */
    pub(crate) fn run<Engine: GisEngine + ?Sized, MetricType: Metric<Engine> + ?Sized, Progress: ProgressObserver>(&mut self, engine: &mut Engine, metric: &MetricType, options: &RunOptions, progress: &mut Progress) -> Result<RunReport,CommandError> {
        self.require(Precondition::Loaded)?;
        self.require(Precondition::ColumnsReady)?;

        self.state = JobState::Running;
        let saved_window = engine.window();
        let result = self.run_features(engine, metric, options, progress);
        engine.restore_window(saved_window);

        self.state = if result.is_ok() {
            JobState::Done
        } else {
            JobState::Failed
        };
        result
    }

}
