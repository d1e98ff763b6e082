use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;

mod run;
mod run_job;
mod describe;
mod docs;

use run::Run;
use run_job::RunJob;
use describe::Describe;
use docs::Docs;


pub(crate) trait Task {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError>;

}

#[macro_export]
macro_rules! command_def {
    ($struct_name: ident {$($command_name: ident),*}) => {

        #[derive(Subcommand)]
        pub(crate) enum $struct_name {
            $(
                $command_name($command_name)
            ),*
        }

        impl Task for $struct_name {

            fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
                match self {
                    $(Self::$command_name(a) => a.run(progress)),*
                }
            }

        }
    };
}

#[macro_export]
macro_rules! subcommand_def {
    ($(#[$attr: meta])* $visibility: vis struct $struct_name: ident $body: tt) => {

        #[derive(Args)]
        $(#[$attr])*
        $visibility struct $struct_name $body

    };
}

subcommand_def!{
    /// The polygon layer holding the zones
    pub(crate) struct VectorArg {

        /// The file containing the zones, in any vector format GDAL can read. Only the first layer is used.
        pub(crate) vector: PathBuf,

        #[arg(long)]
        /// The name of the zones in the workspace, the file name without extension if not given
        pub(crate) vector_name: Option<String>

    }
}

// "Docs" is hidden, it's only used for generating the documentation.

command_def!{
    MainCommand {
        Run,
        RunJob,
        Describe,
        Docs
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Computes zonal statistics from categorical rasters for each polygon of a vector layer.
pub(crate) struct ZonalStats {

    #[command(subcommand)]
    pub(crate) command: MainCommand

}

impl Task for ZonalStats {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        self.command.run(progress)
    }
}
