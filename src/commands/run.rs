use std::path::PathBuf;

use clap::Args;

use crate::attributes::FeatureId;
use crate::columns::ConflictPolicy;
use crate::commands::Task;
use crate::commands::VectorArg;
use crate::config::ZonalJobConfig;
use crate::errors::CommandError;
use crate::metrics::MetricKind;
use crate::progress::ProgressObserver;
use crate::subcommand_def;
use crate::zonal::MaskingStrategy;

subcommand_def!{
    /// Computes a statistic of each raster for every zone, and stores it in a column of the zone's attributes
    pub(crate) struct Run {

        #[clap(flatten)]
        pub(crate) vector_arg: VectorArg,

        #[arg(long = "raster", required = true)]
        /// A raster to compute the statistic for, in any format GDAL can read. Repeat for more rasters. The first raster also defines the cell alignment.
        pub(crate) rasters: Vec<PathBuf>,

        #[arg(long = "column", required = true)]
        /// The destination column for each raster, in the same order. Names are at most 10 characters.
        pub(crate) columns: Vec<String>,

        #[arg(long = "type", required = true)]
        /// The type of each destination column: int, float or string
        pub(crate) types: Vec<String>,

        #[arg(long, value_enum)]
        /// The statistic to compute
        pub(crate) metric: MetricKind,

        #[arg(long)]
        /// For number-patches, only count the patches inside the zone
        pub(crate) use_mask: bool,

        #[arg(long, value_enum, default_value_t)]
        /// How the rasters are restricted to each zone
        pub(crate) strategy: MaskingStrategy,

        #[arg(long, num_args = 1..)]
        /// Only process the zones with these category identifiers, in this order
        pub(crate) features: Option<Vec<FeatureId>>,

        #[arg(long, value_enum, default_value_t)]
        /// What to do if a destination column already exists
        pub(crate) on_conflict: ConflictPolicy,

        #[arg(long)]
        /// Record failing zones and go on with the rest, instead of stopping at the first failure
        pub(crate) continue_on_error: bool,

        #[arg(long)]
        /// Write the zones, with the computed columns, to this file. The format is chosen from the extension.
        pub(crate) output: Option<PathBuf>,

        #[arg(long)]
        /// Write a JSON report of the results for each zone to this file
        pub(crate) report: Option<PathBuf>

    }
}

impl Run {

    fn into_config(self) -> ZonalJobConfig {
        ZonalJobConfig {
            vector: self.vector_arg.vector,
            vector_name: self.vector_arg.vector_name,
            rasters: self.rasters,
            columns: self.columns,
            types: self.types,
            metric: self.metric,
            use_mask: self.use_mask,
            strategy: self.strategy,
            features: self.features,
            on_conflict: self.on_conflict,
            continue_on_error: self.continue_on_error,
            output: self.output,
            report: self.report
        }
    }
}

impl Task for Run {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        progress.announce("Computing zonal statistics");
        _ = self.into_config().execute(progress)?;
        Ok(())
    }
}
