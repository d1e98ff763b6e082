/*!
Zonal jobs as they are described by the user, either on the command line or in a JSON job file, and the code that
carries one out against a fresh workspace.
*/

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::attributes::AttributeValue;
use crate::attributes::FeatureId;
use crate::columns::ConflictPolicy;
use crate::errors::CommandError;
use crate::metrics::MetricKind;
use crate::metrics::SelectedMetric;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator as _;
use crate::utils::join_display;
use crate::workspace::Workspace;
use crate::zonal::ErrorPolicy;
use crate::zonal::FeatureSelection;
use crate::zonal::LayerSource;
use crate::zonal::MaskingStrategy;
use crate::zonal::RunOptions;
use crate::zonal::RunReport;
use crate::zonal::ZonalJob;

#[derive(Clone,Debug,PartialEq,Serialize,Deserialize,JsonSchema)]
#[serde(deny_unknown_fields)]
/// A zonal statistics job. Relative paths are resolved against the folder containing the job file.
pub(crate) struct ZonalJobConfig {
    /// The polygon layer holding the zones, in any vector format GDAL can read
    pub(crate) vector: PathBuf,
    /// The name of the zones in the workspace, the file name without extension if not given
    #[serde(default)]
    pub(crate) vector_name: Option<String>,
    /// The rasters to compute statistics for, in any raster format GDAL can read. The first one also defines the cell alignment.
    pub(crate) rasters: Vec<PathBuf>,
    /// The destination columns, one for each raster, in the same order
    pub(crate) columns: Vec<String>,
    /// The types of the destination columns: int, float or string
    pub(crate) types: Vec<String>,
    /// The statistic to compute
    pub(crate) metric: MetricKind,
    /// For number-patches, only count the patches inside the zone
    #[serde(default)]
    pub(crate) use_mask: bool,
    /// How the rasters are restricted to each zone
    #[serde(default)]
    pub(crate) strategy: MaskingStrategy,
    /// Only process the zones with these category identifiers
    #[serde(default)]
    pub(crate) features: Option<Vec<FeatureId>>,
    /// What to do if a destination column already exists
    #[serde(default)]
    pub(crate) on_conflict: ConflictPolicy,
    /// Record failing zones and go on with the rest, instead of stopping
    #[serde(default)]
    pub(crate) continue_on_error: bool,
    /// Write the zones, with the computed columns, to this file
    #[serde(default)]
    pub(crate) output: Option<PathBuf>,
    /// Write a JSON report of the results for each zone to this file
    #[serde(default)]
    pub(crate) report: Option<PathBuf>
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum FeatureStatus {
    Done,
    Failed
}

#[derive(Serialize)]
struct FeatureRecord<'report> {
    cat: FeatureId,
    status: FeatureStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    values: &'report IndexMap<String,AttributeValue>
}

#[derive(Serialize)]
struct ReportDocument<'report> {
    vector: &'report str,
    features: Vec<FeatureRecord<'report>>,
    dropped: &'report [FeatureId]
}

impl ZonalJobConfig {

    pub(crate) fn from_file<FilePath: AsRef<Path>>(path: FilePath) -> Result<Self,CommandError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader).map_err(|e| CommandError::JobSourceRead(format!("{e}")))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_paths(base))
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: PathBuf| if path.is_relative() { base.join(path) } else { path };
        self.vector = resolve(self.vector);
        self.rasters = self.rasters.into_iter().map(resolve).collect();
        self.output = self.output.map(resolve);
        self.report = self.report.map(resolve);
        self
    }

    fn job(&self) -> ZonalJob {
        let vector = LayerSource::from_path(&self.vector, self.vector_name.clone());
        let rasters = self.rasters.iter().map(|path| LayerSource::from_path(path, None)).collect();
        ZonalJob::new(vector, rasters, self.columns.clone(), self.types.clone())
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            strategy: self.strategy,
            selection: self.features.clone().map_or(FeatureSelection::All, FeatureSelection::Subset),
            on_error: if self.continue_on_error {
                ErrorPolicy::Continue
            } else {
                ErrorPolicy::Abort
            }
        }
    }

    /// Loads the layers into a new workspace, creates the columns and computes the statistics, then writes out
    /// whatever output and report were asked for.
    pub(crate) fn execute<Progress: ProgressObserver>(&self, progress: &mut Progress) -> Result<RunReport,CommandError> {
        let mut workspace = Workspace::new();
        let mut job = self.job();

        progress.start_unknown_endpoint(|| "Loading layers.");
        job.load(&mut workspace, progress)?;
        progress.finish(|| "Layers loaded.");

        let mut resolver = self.on_conflict;
        let columns = job.create_columns(&mut workspace, &mut resolver)?;
        progress.message(|| format!("Results will be written to {}.",join_display(columns.iter().map(|(name,column_type)| format!("{name} ({column_type})")))));

        let metric = SelectedMetric::new(self.metric, self.use_mask);
        let report = job.run(&mut workspace, &metric, &self.run_options(), progress)?;

        if let Some(output) = &self.output {
            progress.message(|| format!("Writing zones to {}.",output.display()));
            workspace.vector(job.vector_name())?.save(output)?;
        }

        if let Some(path) = &self.report {
            write_report(path, job.vector_name(), &report, progress)?;
        }

        progress.message(|| format!("{} zones processed, {} failed, {} skipped.",report.outcomes.len(),report.failures(),report.dropped.len()));

        Ok(report)
    }

}

fn write_report<Progress: ProgressObserver>(path: &Path, vector: &str, report: &RunReport, progress: &mut Progress) -> Result<(),CommandError> {
    let features = report.outcomes.iter().watch(progress, "Writing report.", "Report written.").map(|outcome| FeatureRecord {
        cat: outcome.id,
        status: if outcome.error.is_some() {
            FeatureStatus::Failed
        } else {
            FeatureStatus::Done
        },
        error: outcome.error.as_ref().map(ToString::to_string),
        values: &outcome.values
    }).collect();
    let document = ReportDocument {
        vector,
        features,
        dropped: &report.dropped
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &document).map_err(|e| CommandError::ReportWrite(format!("{e}")))
}

#[cfg(test)]
mod test {

    use std::path::Path;
    use std::path::PathBuf;

    use super::ZonalJobConfig;
    use crate::attributes::FeatureId;
    use crate::columns::ConflictPolicy;
    use crate::metrics::MetricKind;
    use crate::zonal::MaskingStrategy;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("zonal-stats-{}-{name}",std::process::id()));
        _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("Scratch folder should have been created.");
        dir
    }

    #[test]
    fn parse_minimal_job() {
        let config: ZonalJobConfig = serde_json::from_str(r#"{
            "vector": "zones.gpkg",
            "rasters": ["habitat.tif"],
            "columns": ["hab"],
            "types": ["float"],
            "metric": "proportion-habitat"
        }"#).unwrap();
        assert_eq!(config.metric,MetricKind::ProportionHabitat);
        assert_eq!(config.strategy,MaskingStrategy::GlobalMask);
        assert_eq!(config.on_conflict,ConflictPolicy::Abort);
        assert!(!config.use_mask);
        assert!(!config.continue_on_error);
        assert_eq!(config.features,None);

        let resolved = config.resolve_paths(Path::new("/jobs"));
        assert_eq!(resolved.vector,PathBuf::from("/jobs/zones.gpkg"));
        assert_eq!(resolved.rasters,vec![PathBuf::from("/jobs/habitat.tif")]);
    }

    #[test]
    fn parse_full_job() {
        let config: ZonalJobConfig = serde_json::from_str(r#"{
            "vector": "/data/zones.gpkg",
            "vector_name": "zones",
            "rasters": ["/data/patches.tif"],
            "columns": ["patches"],
            "types": ["int"],
            "metric": "number-patches",
            "use_mask": true,
            "strategy": "conditional-copy",
            "features": [3, 1],
            "on_conflict": "overwrite",
            "continue_on_error": true
        }"#).unwrap();
        assert_eq!(config.strategy,MaskingStrategy::ConditionalCopy);
        assert_eq!(config.on_conflict,ConflictPolicy::Overwrite);
        assert_eq!(config.features,Some(vec![FeatureId::new(3),FeatureId::new(1)]));
        assert_eq!(config.resolve_paths(Path::new("/jobs")).vector,PathBuf::from("/data/zones.gpkg"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<ZonalJobConfig>(r#"{
            "vector": "zones.gpkg",
            "rasters": [],
            "columns": [],
            "types": [],
            "metric": "number-patches",
            "colour": "blue"
        }"#).is_err());
    }

    #[test]
    fn execute_job_file() {
        let dir = scratch_dir("job");
        std::fs::write(dir.join("zones.geojson"), r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "properties": { "cat": 1 },
      "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] } },
    { "type": "Feature", "properties": { "cat": 2 },
      "geometry": { "type": "Polygon", "coordinates": [[[2,0],[4,0],[4,2],[2,2],[2,0]]] } }
  ]
}"#).unwrap();
        std::fs::write(dir.join("habitat.asc"), "ncols 4\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n1 1 0 0\n1 0 0 1\n").unwrap();
        std::fs::write(dir.join("job.json"), r#"{
            "vector": "zones.geojson",
            "rasters": ["habitat.asc"],
            "columns": ["hab"],
            "types": ["float"],
            "metric": "proportion-habitat",
            "features": [2, 1, 9],
            "report": "report.json"
        }"#).unwrap();

        let config = ZonalJobConfig::from_file(dir.join("job.json")).unwrap();
        let report = config.execute(&mut ()).unwrap();
        assert_eq!(report.outcomes.len(),2);
        assert_eq!(report.dropped,vec![FeatureId::new(9)]);

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("report.json")).unwrap()).unwrap();
        assert_eq!(written["vector"],"zones");
        assert_eq!(written["features"][0]["cat"],2);
        assert_eq!(written["features"][0]["status"],"done");
        assert_eq!(written["features"][0]["values"]["hab"],25.0);
        assert_eq!(written["features"][1]["values"]["hab"],75.0);
        assert_eq!(written["dropped"][0],9);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_job_file() {
        assert!(ZonalJobConfig::from_file(std::env::temp_dir().join("zonal-stats-no-such-job.json")).is_err());
    }
}
