use std::error::Error;
use std::fmt::Display;

pub(crate) use gdal::errors::GdalError;
use ordered_float::FloatIsNan;

pub(crate) use clap::error::Error as ArgumentError;

use crate::attributes::FeatureId;

/// The readiness flags a zonal job must have before an operation is allowed.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub(crate) enum Precondition {
    Loaded,
    ColumnsReady
}

impl Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f,"loaded"),
            Self::ColumnsReady => write!(f,"columns_ready"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum CommandError {
    GdalError(GdalError),
    IoError(std::io::Error),
    FloatIsNan,
    // validation
    ColumnNameTooLong(String),
    InvalidColumnName(String),
    DuplicateColumnName(String),
    UnknownColumnType(String),
    MismatchedColumnCount { rasters: usize, columns: usize, types: usize },
    // user abort
    ColumnOverwriteDeclined(String),
    // load
    MissingLayerSource(String),
    LayerImport(String,Box<CommandError>),
    UnsupportedGeometry(String),
    MissingGeometry(String,FeatureId),
    MissingKey(String),
    DuplicateFeature(String,FeatureId),
    NonIntegerCellValue(String,f64),
    NoRastersConfigured,
    DuplicateLayerName(String),
    CrsMismatch { vector: String, raster: String },
    // readiness
    NotReady(Precondition),
    // metrics
    InvalidRasterValues(String,i64),
    DivisionUndefined(String),
    // engine
    MissingVectorMap(String),
    MissingRasterMap(String),
    MissingFeature(String,FeatureId),
    MissingColumn(String,String),
    ColumnExists(String,String),
    RasterExists(String),
    IncompatibleValue { column: String, value: String },
    EmptyRasterFootprint(String),
    MaskAlreadyActive,
    NoProcessingWindow,
    // files
    JobSourceRead(String),
    ReportWrite(String),
    UnknownOutputFormat(String),
    DocumentationWrite(String),
}

impl Error for CommandError {

}

impl Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GdalError(a) => write!(f,"gdal: {a}"),
            Self::IoError(a) => write!(f,"io: {a}"),
            Self::FloatIsNan => write!(f,"A float was not a number."),
            Self::ColumnNameTooLong(a) => write!(f,"Column name '{a}' is longer than 10 characters. Please choose a shorter name."),
            Self::InvalidColumnName(a) => write!(f,"Column name '{a}' is not valid. Names must start with a letter and contain only letters, digits and underscores, and may not be 'cat'."),
            Self::DuplicateColumnName(a) => write!(f,"Column name '{a}' was given more than once."),
            Self::UnknownColumnType(a) => write!(f,"Column type '{a}' is neither int, float or string."),
            Self::MismatchedColumnCount { rasters, columns, types } => write!(f,"The lists of column names ({columns}), column types ({types}) and input rasters ({rasters}) must have the same length. Columns were not created."),
            Self::ColumnOverwriteDeclined(a) => write!(f,"Column '{a}' already exists and overwriting it was declined. Please select another column name."),
            Self::MissingLayerSource(a) => write!(f,"Layer '{a}' is not in the workspace and no source file was given to import it from."),
            Self::LayerImport(a, b) => write!(f,"Layer '{a}' could not be imported: {b}"),
            Self::UnsupportedGeometry(a) => write!(f,"Geometry type '{a}' is not supported, only polygons and multipolygons can be used as zones."),
            Self::MissingGeometry(a, b) => write!(f,"Feature '{b}' of layer '{a}' has no geometry."),
            Self::MissingKey(a) => write!(f,"A feature of layer '{a}' has no value, or a negative value, in its 'cat' field."),
            Self::DuplicateFeature(a, b) => write!(f,"Layer '{a}' has more than one feature with cat '{b}'."),
            Self::NonIntegerCellValue(a, b) => write!(f,"Raster '{a}' contains the value {b}, but only integer or null cells are supported."),
            Self::NoRastersConfigured => write!(f,"At least one input raster is required."),
            Self::DuplicateLayerName(a) => write!(f,"More than one input file would be loaded as layer '{a}'. Please rename one of the files."),
            Self::CrsMismatch { vector, raster } => write!(f,"Raster '{raster}' is not in the same coordinate reference system as vector map '{vector}'. Please reproject one of them."),
            Self::NotReady(a) => write!(f,"The job is not ready: the '{a}' step has not completed successfully. Please retry it."),
            Self::InvalidRasterValues(a, b) => write!(f,"There is a problem with the input raster '{a}'. Raster values must be either 0, 1, or null, but {b} is present."),
            Self::DivisionUndefined(a) => write!(f,"Raster '{a}' has no 0 or 1 cells within the current mask, so the proportion is undefined."),
            Self::MissingVectorMap(a) => write!(f,"Vector map '{a}' was not found in the workspace."),
            Self::MissingRasterMap(a) => write!(f,"Raster map '{a}' was not found in the workspace."),
            Self::MissingFeature(a, b) => write!(f,"Vector map '{a}' has no feature with cat '{b}'."),
            Self::MissingColumn(a, b) => write!(f,"Vector map '{a}' has no column '{b}'."),
            Self::ColumnExists(a, b) => write!(f,"Vector map '{a}' already has a column '{b}'."),
            Self::RasterExists(a) => write!(f,"Raster map '{a}' already exists."),
            Self::IncompatibleValue { column, value } => write!(f,"Value '{value}' can not be stored in column '{column}'."),
            Self::EmptyRasterFootprint(a) => write!(f,"Raster '{a}' has no non-null cells in the current window."),
            Self::MaskAlreadyActive => write!(f,"A mask is already active. It must be removed before another is set."),
            Self::NoProcessingWindow => write!(f,"No processing window has been set."),
            Self::JobSourceRead(a) => write!(f,"Error reading job file: {a}"),
            Self::ReportWrite(a) => write!(f,"Error writing report: {a}"),
            Self::DocumentationWrite(a) => write!(f,"Error writing documentation: {a}"),
            Self::UnknownOutputFormat(a) => write!(f,"No vector format could be found for output file '{a}'. Please use a known extension, such as '.gpkg' or '.geojson'."),
        }
    }
}

impl From<GdalError> for CommandError {

    fn from(value: GdalError) -> Self {
        Self::GdalError(value)
    }
}

impl From<std::io::Error> for CommandError {

    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<FloatIsNan> for CommandError {

    fn from(_: FloatIsNan) -> Self {
        Self::FloatIsNan
    }

}

#[derive(Debug)]
pub(crate) enum ProgramError {
    ArgumentError(ArgumentError),
    CommandError(CommandError)
}

impl Error for ProgramError {

}

impl Display for ProgramError {

    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArgumentError(a) => write!(f,"{a}"),
            Self::CommandError(a) => write!(f,"{a}"),
        }
    }
}

impl From<ArgumentError> for ProgramError {

    fn from(value: ArgumentError) -> Self {
        Self::ArgumentError(value)
    }
}

impl From<CommandError> for ProgramError {

    fn from(value: CommandError) -> Self {
        Self::CommandError(value)
    }
}
