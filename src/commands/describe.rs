use std::path::PathBuf;

use clap::Args;

use crate::commands::Task;
use crate::commands::VectorArg;
use crate::engine::GisEngine as _;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator as _;
use crate::subcommand_def;
use crate::utils::join_display;
use crate::workspace::Workspace;
use crate::zonal::LayerSource;

subcommand_def!{
    /// Loads the zones and rasters and prints what was found, without computing anything
    pub(crate) struct Describe {

        #[clap(flatten)]
        pub(crate) vector_arg: VectorArg,

        #[arg(long = "raster")]
        /// A raster to describe. Repeat for more rasters.
        pub(crate) rasters: Vec<PathBuf>

    }
}

impl Describe {

    fn describe(workspace: &Workspace, vector: &str, rasters: &[String]) -> Result<Vec<String>,CommandError> {
        let mut lines = Vec::new();

        let features = workspace.feature_ids(vector)?;
        lines.push(format!("Vector map '{vector}': {} features",features.len()));
        let columns = workspace.vector_columns(vector)?;
        if !columns.is_empty() {
            lines.push(format!("  columns: {}",join_display(columns.iter().map(|(name,column_type)| format!("{name} ({column_type})")))));
        }
        for id in features {
            lines.push(format!("  cat {id}: {}",workspace.feature_extent(vector, id)?));
        }

        for raster in rasters {
            let grid = workspace.raster_grid(raster)?;
            lines.push(format!("Raster map '{raster}': {} columns x {} rows ({} cells), resolution {} x {}",grid.columns,grid.rows,grid.cell_count(),grid.ew_resolution,grid.ns_resolution));
            lines.push(format!("  extent: {}",grid.extent()));
            let categories = workspace.categories(raster)?;
            lines.push(format!("  {} categories: {}",categories.len(),join_display(categories)));
            lines.push(format!("  {} null cells",workspace.raster(raster)?.null_count()));
        }

        Ok(lines)
    }

}

impl Task for Describe {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        let mut workspace = Workspace::new();

        let vector = LayerSource::from_path(&self.vector_arg.vector, self.vector_arg.vector_name);
        let rasters: Vec<LayerSource> = self.rasters.iter().map(|path| LayerSource::from_path(path, None)).collect();

        progress.start_unknown_endpoint(|| "Loading zones.");
        if let Some(path) = &vector.path {
            workspace.import_vector(&vector.name, path)?;
        }
        progress.finish(|| "Zones loaded.");

        for raster in rasters.iter().watch(progress, "Loading rasters.", "Rasters loaded.") {
            if let Some(path) = &raster.path {
                workspace.import_raster(&raster.name, path)?;
            }
        }

        let raster_names: Vec<String> = rasters.into_iter().map(|raster| raster.name).collect();
        for line in Self::describe(&workspace, &vector.name, &raster_names)? {
            println!("{line}");
        }
        Ok(())
    }
}
