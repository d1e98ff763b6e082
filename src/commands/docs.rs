use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use clap::Args;
use clap_markdown::help_markdown;
use schemars::schema_for;
use schemars::JsonSchema;

use crate::commands::Task;
use crate::commands::ZonalStats;
use crate::config::ZonalJobConfig;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::subcommand_def;

fn write_command_help(target: PathBuf) -> Result<(),CommandError> {
    let mut target = File::create(target)?;
    write!(&mut target,"{}",help_markdown::<ZonalStats>())?;
    Ok(())
}

fn write_schema<Schema: JsonSchema>(target: PathBuf) -> Result<(),CommandError> {
    let mut target = File::create(target)?;
    let schema = schema_for!(Schema);
    let text = serde_json::to_string_pretty(&schema).map_err(|e| CommandError::DocumentationWrite(format!("{e}")))?;
    write!(&mut target,"{text}")?;
    Ok(())
}


subcommand_def!{
    /// Writes generatable documentation and json schemas to a folder.
    #[command(hide=true)]
    pub(crate) struct Docs {

        #[arg(long)]
        /// The folder to output the generated documentation to
        docs: PathBuf,

        #[arg(long)]
        /// The folder to output generated schemas to
        schemas: PathBuf

    }
}

impl Task for Docs {
    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        std::fs::create_dir_all(&self.docs)?;
        std::fs::create_dir_all(&self.schemas)?;

        let command_help = self.docs.join("Commands.md");
        progress.message(|| format!("Writing {}.",command_help.display()));
        write_command_help(command_help)?;

        let job_schema = self.schemas.join("zonal_job.schema.json");
        progress.message(|| format!("Writing {}.",job_schema.display()));
        write_schema::<ZonalJobConfig>(job_schema)
    }
}
