use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FormatResult;
use core::str::FromStr;

use gdal::vector::OGRFieldType;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::CommandError;

/// The category identifier (`cat`) of a vector feature, which is also the key of its attribute row.
#[derive(PartialEq,Eq,Hash,PartialOrd,Ord,Clone,Copy,Debug,Serialize,Deserialize,JsonSchema)]
#[serde(transparent)]
pub(crate) struct FeatureId(u64);

impl FeatureId {

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) const fn to_inner(self) -> u64 {
        self.0
    }

}

impl Display for FeatureId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f,"{}",self.0)
    }
}

impl FromStr for FeatureId {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug,Serialize,Deserialize,JsonSchema)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ColumnType {
    Integer,
    Float,
    String
}

impl ColumnType {

    /// The SQL type used when the column is added to an attribute table.
    pub(crate) const fn storage_type(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "double precision",
            Self::String => "varchar(20)", // increase this if longer text values are ever written
        }
    }

    pub(crate) const fn field_type(self) -> OGRFieldType::Type {
        match self {
            Self::Integer => OGRFieldType::OFTInteger64,
            Self::Float => OGRFieldType::OFTReal,
            Self::String => OGRFieldType::OFTString,
        }
    }

    pub(crate) fn from_field_type(field_type: OGRFieldType::Type) -> Self {
        match field_type {
            OGRFieldType::OFTInteger | OGRFieldType::OFTInteger64 => Self::Integer,
            OGRFieldType::OFTReal => Self::Float,
            _ => Self::String
        }
    }

}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f,"{}",self.storage_type())
    }
}

impl FromStr for ColumnType {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Integer),
            "float" | "double" => Ok(Self::Float),
            "string" | "text" | "varchar" => Ok(Self::String),
            _ => Err(CommandError::UnknownColumnType(s.to_owned()))
        }
    }
}

/// A destination column requested by a zonal job. The type is kept as the tag the caller gave, it is
/// only parsed when the columns are validated so that a bad tag fails before anything is created.
#[derive(Clone,Debug,PartialEq,Eq)]
pub(crate) struct ColumnSpec {
    pub(crate) name: String,
    pub(crate) type_tag: String
}

impl ColumnSpec {

    pub(crate) fn new<Name: Into<String>, Tag: Into<String>>(name: Name, type_tag: Tag) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into()
        }
    }
}

#[derive(Clone,Debug,PartialEq,Serialize)]
#[serde(untagged)]
pub(crate) enum AttributeValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String)
}

impl AttributeValue {

    /// Converts the value so it can be stored in a column of the given type.
    pub(crate) fn coerce_to(self, column: &str, column_type: ColumnType) -> Result<Self,CommandError> {
        match (self, column_type) {
            (Self::Null, _) => Ok(Self::Null),
            (Self::Integer(value), ColumnType::Integer) => Ok(Self::Integer(value)),
            #[allow(clippy::cast_precision_loss)] // counts of cells are well within the precision of a double.
            (Self::Integer(value), ColumnType::Float) => Ok(Self::Float(value as f64)),
            (Self::Float(value), ColumnType::Float) => Ok(Self::Float(value)),
            (Self::Text(value), ColumnType::String) => Ok(Self::Text(value)),
            (value, ColumnType::String) => Ok(Self::Text(value.to_string())),
            (value, _) => Err(CommandError::IncompatibleValue {
                column: column.to_owned(),
                value: value.to_string()
            })
        }
    }

    #[cfg(test)]
    pub(crate) fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(value) => Some(*value as f64),
            Self::Null | Self::Text(_) => None
        }
    }

}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::Null => write!(f,"NULL"),
            Self::Integer(value) => write!(f,"{value}"),
            Self::Float(value) => write!(f,"{value}"),
            Self::Text(value) => write!(f,"{value}"),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<usize> for AttributeValue {
    fn from(value: usize) -> Self {
        // a count of categories never gets anywhere near i64::MAX
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod test {

    use super::AttributeValue;
    use super::ColumnType;

    #[test]
    fn parse_column_type_tags() {
        assert_eq!("int".parse::<ColumnType>().unwrap(),ColumnType::Integer);
        assert_eq!("Float".parse::<ColumnType>().unwrap(),ColumnType::Float);
        assert_eq!(" string ".parse::<ColumnType>().unwrap(),ColumnType::String);
        assert!("bool".parse::<ColumnType>().is_err());
    }

    #[test]
    fn storage_types() {
        assert_eq!(ColumnType::Integer.storage_type(),"integer");
        assert_eq!(ColumnType::Float.storage_type(),"double precision");
        assert_eq!(ColumnType::String.storage_type(),"varchar(20)");
    }

    #[test]
    fn coerce_values() {
        assert_eq!(AttributeValue::Integer(3).coerce_to("a", ColumnType::Float).unwrap(),AttributeValue::Float(3.0));
        assert_eq!(AttributeValue::Float(2.5).coerce_to("a", ColumnType::String).unwrap(),AttributeValue::Text("2.5".to_owned()));
        assert!(AttributeValue::Float(2.5).coerce_to("a", ColumnType::Integer).is_err());
    }
}
