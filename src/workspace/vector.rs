use std::path::Path;

use gdal::Dataset;
use gdal::DriverManager;
use gdal::DriverType;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Feature;
use gdal::vector::LayerAccess as _;
use gdal::vector::LayerOptions;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal::vector::ToGdal as _;
use geo_types::Geometry as GeoGeometry;
use geo_types::MultiPolygon;
use indexmap::IndexMap;

use crate::attributes::AttributeValue;
use crate::attributes::ColumnType;
use crate::attributes::FeatureId;
use crate::errors::CommandError;

/// The name of the key column of every attribute table.
pub(crate) const KEY_COLUMN: &str = "cat";

#[derive(Clone,Debug)]
pub(crate) struct VectorFeature {
    geometry: MultiPolygon<f64>,
    attributes: IndexMap<String,AttributeValue>
}

impl VectorFeature {

    pub(crate) const fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }
}

/// A polygon layer and its attribute table, kept in the order the features were read.
#[derive(Clone,Debug)]
pub(crate) struct VectorMap {
    name: String,
    /// The coordinate reference system as WKT, if the source had one.
    crs: Option<String>,
    columns: IndexMap<String,ColumnType>,
    features: IndexMap<FeatureId,VectorFeature>
}

impl VectorMap {

    pub(crate) fn new<Name: Into<String>>(name: Name, columns: IndexMap<String,ColumnType>) -> Self {
        Self {
            name: name.into(),
            crs: None,
            columns,
            features: IndexMap::new()
        }
    }

    #[cfg(test)]
    pub(crate) fn with_crs<Wkt: Into<String>>(mut self, crs: Wkt) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Reads the first layer of an OGR dataset. If the layer has an integer `cat` field, it supplies the feature
    /// identifiers, otherwise features are numbered from 1 in the order they are read.
    pub(crate) fn open<Name: Into<String>, FilePath: AsRef<Path>>(name: Name, path: FilePath) -> Result<Self,CommandError> {
        let dataset = Dataset::open(path.as_ref())?;
        let mut layer = dataset.layer(0)?;

        let fields: Vec<(String,ColumnType)> = layer.defn().fields().map(|field| (field.name(),ColumnType::from_field_type(field.field_type()))).collect();
        let has_key = fields.iter().any(|(field,column_type)| field == KEY_COLUMN && column_type == &ColumnType::Integer);
        let columns: IndexMap<String,ColumnType> = fields.into_iter().filter(|(field,_)| !(has_key && field == KEY_COLUMN)).collect();

        let mut result = Self::new(name, columns);
        result.crs = layer.spatial_ref().map(|srs| srs.to_wkt()).transpose()?;

        for (index,feature) in layer.features().enumerate() {
            let id = if has_key {
                let key = feature.field_as_integer64(feature.field_index(KEY_COLUMN)?)?.and_then(|key| u64::try_from(key).ok());
                FeatureId::new(key.ok_or_else(|| CommandError::MissingKey(result.name.clone()))?)
            } else {
                FeatureId::new(index as u64 + 1)
            };
            let geometry = Self::read_geometry(&result.name, id, &feature)?;
            let attributes = result.read_attributes(&feature)?;
            result.add_feature(id, geometry, attributes)?;
        }

        Ok(result)
    }

    fn read_geometry(layer: &str, id: FeatureId, feature: &Feature) -> Result<MultiPolygon<f64>,CommandError> {
        let geometry = feature.geometry().ok_or_else(|| CommandError::MissingGeometry(layer.to_owned(), id))?;
        match geometry.to_geo()? {
            GeoGeometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
            GeoGeometry::MultiPolygon(polygons) => Ok(polygons),
            _ => Err(CommandError::UnsupportedGeometry(geometry.geometry_name()))
        }
    }

    fn read_attributes(&self, feature: &Feature) -> Result<IndexMap<String,AttributeValue>,CommandError> {
        let mut result = IndexMap::new();
        for (column,column_type) in &self.columns {
            let index = feature.field_index(column)?;
            let value = match column_type {
                ColumnType::Integer => feature.field_as_integer64(index)?.map_or(AttributeValue::Null, AttributeValue::Integer),
                ColumnType::Float => feature.field_as_double(index)?.map_or(AttributeValue::Null, AttributeValue::Float),
                ColumnType::String => feature.field_as_string(index)?.map_or(AttributeValue::Null, AttributeValue::Text),
            };
            _ = result.insert(column.clone(), value);
        }
        Ok(result)
    }

    pub(crate) fn add_feature(&mut self, id: FeatureId, geometry: MultiPolygon<f64>, mut attributes: IndexMap<String,AttributeValue>) -> Result<(),CommandError> {
        if self.features.contains_key(&id) {
            return Err(CommandError::DuplicateFeature(self.name.clone(), id))
        }
        // every row carries every column, so a later update never has to guess
        for column in self.columns.keys() {
            _ = attributes.entry(column.clone()).or_insert(AttributeValue::Null);
        }
        _ = self.features.insert(id, VectorFeature {
            geometry,
            attributes
        });
        Ok(())
    }

    /// Writes the map to a new file, in the format that matches the file's extension. The key is written as an
    /// integer `cat` field, followed by the attribute columns. The layer gets the map's coordinate reference system.
    pub(crate) fn save<FilePath: AsRef<Path>>(&self, path: FilePath) -> Result<(),CommandError> {
        let path = path.as_ref();
        let driver = DriverManager::get_output_driver_for_dataset_name(path, DriverType::Vector).ok_or_else(|| CommandError::UnknownOutputFormat(path.display().to_string()))?;
        let srs = self.crs.as_deref().map(SpatialRef::from_wkt).transpose()?;
        let mut dataset = driver.create_vector_only(path)?;
        let layer = dataset.create_layer(LayerOptions {
            name: &self.name,
            ty: OGRwkbGeometryType::wkbMultiPolygon,
            srs: srs.as_ref(),
            options: None
        })?;

        let mut fields = vec![(KEY_COLUMN,OGRFieldType::OFTInteger64)];
        fields.extend(self.columns.iter().map(|(column,column_type)| (column.as_str(),column_type.field_type())));
        layer.create_defn_fields(&fields)?;

        for (id,source) in &self.features {
            let mut feature = Feature::new(layer.defn())?;
            feature.set_geometry(source.geometry.to_gdal()?)?;
            let key = i64::try_from(id.to_inner()).map_err(|_| CommandError::IncompatibleValue {
                column: KEY_COLUMN.to_owned(),
                value: id.to_string()
            })?;
            feature.set_field_integer64(feature.field_index(KEY_COLUMN)?, key)?;
            for (column,value) in &source.attributes {
                let index = feature.field_index(column)?;
                match value {
                    AttributeValue::Null => feature.set_field_null(index)?,
                    AttributeValue::Integer(value) => feature.set_field_integer64(index, *value)?,
                    AttributeValue::Float(value) => feature.set_field_double(index, *value)?,
                    AttributeValue::Text(value) => feature.set_field_string(index, value)?,
                }
            }
            feature.create(&layer)?;
        }
        Ok(())
    }

    pub(crate) fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    pub(crate) const fn columns(&self) -> &IndexMap<String,ColumnType> {
        &self.columns
    }

    pub(crate) fn feature_ids(&self) -> Vec<FeatureId> {
        self.features.keys().copied().collect()
    }

    pub(crate) fn feature(&self, id: FeatureId) -> Result<&VectorFeature,CommandError> {
        self.features.get(&id).ok_or_else(|| CommandError::MissingFeature(self.name.clone(), id))
    }

    pub(crate) fn add_columns(&mut self, columns: &[(String,ColumnType)]) -> Result<(),CommandError> {
        // checked up front so a failure doesn't leave half of the batch added
        for (column,_) in columns {
            // attribute table formats mostly ignore case in field names
            if column.eq_ignore_ascii_case(KEY_COLUMN) || self.columns.keys().any(|existing| existing.eq_ignore_ascii_case(column)) {
                return Err(CommandError::ColumnExists(self.name.clone(), column.clone()))
            }
        }
        for (column,column_type) in columns {
            _ = self.columns.insert(column.clone(), *column_type);
            for feature in self.features.values_mut() {
                _ = feature.attributes.insert(column.clone(), AttributeValue::Null);
            }
        }
        Ok(())
    }

    pub(crate) fn drop_columns(&mut self, columns: &[String]) -> Result<(),CommandError> {
        for column in columns {
            if !self.columns.contains_key(column) {
                return Err(CommandError::MissingColumn(self.name.clone(), column.clone()))
            }
        }
        for column in columns {
            _ = self.columns.shift_remove(column);
            for feature in self.features.values_mut() {
                _ = feature.attributes.shift_remove(column);
            }
        }
        Ok(())
    }

    pub(crate) fn read_attribute(&self, id: FeatureId, column: &str) -> Result<AttributeValue,CommandError> {
        let feature = self.feature(id)?;
        feature.attributes.get(column).cloned().ok_or_else(|| CommandError::MissingColumn(self.name.clone(), column.to_owned()))
    }

    pub(crate) fn update_attribute(&mut self, id: FeatureId, column: &str, value: AttributeValue) -> Result<(),CommandError> {
        let column_type = *self.columns.get(column).ok_or_else(|| CommandError::MissingColumn(self.name.clone(), column.to_owned()))?;
        let value = value.coerce_to(column, column_type)?;
        let feature = self.features.get_mut(&id).ok_or_else(|| CommandError::MissingFeature(self.name.clone(), id))?;
        _ = feature.attributes.insert(column.to_owned(), value);
        Ok(())
    }

}

#[cfg(test)]
mod test {

    use geo_types::polygon;
    use geo_types::MultiPolygon;
    use indexmap::IndexMap;

    use super::VectorMap;
    use crate::attributes::AttributeValue;
    use crate::attributes::ColumnType;
    use crate::attributes::FeatureId;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)]])
    }

    #[test]
    fn columns_are_added_and_dropped_for_every_row() {
        let mut map = VectorMap::new("zones", IndexMap::from([("name".to_owned(),ColumnType::String)]));
        map.add_feature(FeatureId::new(1), square(), IndexMap::new()).unwrap();
        map.add_feature(FeatureId::new(2), square(), IndexMap::new()).unwrap();

        map.add_columns(&[("share".to_owned(),ColumnType::Float)]).unwrap();
        assert_eq!(map.read_attribute(FeatureId::new(2), "share").unwrap(),AttributeValue::Null);

        map.update_attribute(FeatureId::new(2), "share", AttributeValue::Integer(4)).unwrap();
        assert_eq!(map.read_attribute(FeatureId::new(2), "share").unwrap(),AttributeValue::Float(4.0));

        assert!(map.add_columns(&[("other".to_owned(),ColumnType::Float),("share".to_owned(),ColumnType::Float)]).is_err());
        assert!(map.add_columns(&[("SHARE".to_owned(),ColumnType::Float)]).is_err());
        assert!(!map.columns().contains_key("other"));

        map.drop_columns(&["share".to_owned()]).unwrap();
        assert!(map.read_attribute(FeatureId::new(2), "share").is_err());
        assert_eq!(map.columns().len(),1);
    }

    #[test]
    fn duplicate_and_missing_features() {
        let mut map = VectorMap::new("zones", IndexMap::new());
        map.add_feature(FeatureId::new(5), square(), IndexMap::new()).unwrap();
        assert!(map.add_feature(FeatureId::new(5), square(), IndexMap::new()).is_err());
        assert!(map.feature(FeatureId::new(6)).is_err());
        assert_eq!(map.feature_ids(),vec![FeatureId::new(5)]);
    }
}
