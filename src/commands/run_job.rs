use std::path::PathBuf;

use clap::Args;

use crate::commands::Task;
use crate::config::ZonalJobConfig;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

subcommand_def!{
    /// Computes zonal statistics as described by a JSON job file
    pub(crate) struct RunJob {

        /// The job file. Relative paths inside it are resolved against the folder containing it.
        pub(crate) job_file: PathBuf

    }
}

impl Task for RunJob {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        let config = ZonalJobConfig::from_file(&self.job_file)?;
        progress.announce(&format!("Running job {}",self.job_file.display()));
        _ = config.execute(progress)?;
        Ok(())
    }
}
