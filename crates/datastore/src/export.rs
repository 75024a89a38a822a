//! Export and import of Group subtrees
//!
//! A subtree is written as a JSON document:
//!
//! ```json
//! {
//!   "buffers": [ { "id": 0, "dtype": "int32", "num_elements": 4, "data": "AAAA..." } ],
//!   "group": {
//!     "views":  [ { "name": "x", "state": "BUFFER", "schema": {...}, "buffer_id": 0, "is_applied": true } ],
//!     "groups": [ { "name": "sub", "views": [...], "groups": [...] } ]
//!   }
//! }
//! ```
//!
//! Buffer data is base64 of the native-endian bytes. Only Buffers used by
//! Views inside the subtree are written. On import every Buffer gets a new
//! index and `buffer_id` references are remapped. EXTERNAL Views keep only
//! their description: they come back EMPTY and described.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use meshstore_core::{validate_name, Element, Error, IndexType, Result, Schema, Shape, TypeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::smallvec;
use tracing::{debug, info, warn};

use crate::arena::{dangling, GroupId, ViewId};
use crate::datastore::DataStore;
use crate::view::{ScalarBytes, ViewData, ViewState};

/// Exported form of a Group subtree and the Buffers it references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Buffers referenced from the subtree, by exported index
    #[serde(default)]
    pub buffers: Vec<BufferRecord>,
    /// The exported Group's contents
    pub group: GroupRecord,
}

/// One exported Buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferRecord {
    /// Index in the exporting DataStore
    pub id: usize,
    /// Element type
    pub dtype: TypeId,
    /// Element count
    pub num_elements: IndexType,
    /// Base64 of the buffer bytes; absent for unallocated buffers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Contents of an exported Group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Child Views in order
    #[serde(default)]
    pub views: Vec<ViewRecord>,
    /// Child Groups in order
    #[serde(default)]
    pub groups: Vec<ChildGroupRecord>,
}

/// A named child Group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildGroupRecord {
    /// Group name
    pub name: String,
    /// Group contents
    #[serde(flatten)]
    pub group: GroupRecord,
}

/// One exported View
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    /// View name
    pub name: String,
    /// State name (`EMPTY`, `BUFFER`, `EXTERNAL`, `SCALAR`, `STRING`)
    pub state: String,
    /// Description, when described
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Shape, only for more than one dimension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<IndexType>>,
    /// Exported index of the attached Buffer (BUFFER only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<usize>,
    /// Applied flag (BUFFER only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_applied: Option<bool>,
    /// Inline value (SCALAR and STRING only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Everything an import has added so far
#[derive(Debug, Default)]
struct ImportLog {
    buffers: Vec<usize>,
    views: Vec<ViewId>,
    groups: Vec<GroupId>,
}

fn import_error(msg: impl Into<String>) -> Error {
    Error::Import(msg.into())
}

fn scalar_to_json(dtype: TypeId, bytes: &ScalarBytes) -> Value {
    let b = &bytes.0[..];
    match dtype {
        TypeId::Int8 => Value::from(i8::read_ne(b)),
        TypeId::Int16 => Value::from(i16::read_ne(b)),
        TypeId::Int32 => Value::from(i32::read_ne(b)),
        TypeId::Int64 => Value::from(i64::read_ne(b)),
        TypeId::UInt8 => Value::from(u8::read_ne(b)),
        TypeId::UInt16 => Value::from(u16::read_ne(b)),
        TypeId::UInt32 => Value::from(u32::read_ne(b)),
        TypeId::UInt64 => Value::from(u64::read_ne(b)),
        TypeId::Float32 => Value::from(f32::read_ne(b)),
        TypeId::Float64 => Value::from(f64::read_ne(b)),
        TypeId::Char8 | TypeId::NoType => Value::Null,
    }
}

fn int_from_json<T>(value: &Value) -> Result<T>
where
    T: Element + TryFrom<i64> + TryFrom<u64>,
{
    let parsed = match (value.as_i64(), value.as_u64()) {
        (Some(v), _) => <T as TryFrom<i64>>::try_from(v).ok(),
        (None, Some(v)) => <T as TryFrom<u64>>::try_from(v).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| import_error(format!("{} is not a valid {}", value, T::TYPE_ID)))
}

fn float_from_json(value: &Value) -> Result<f64> {
    match value {
        // JSON has no NaN; it is written as null.
        Value::Null => Ok(f64::NAN),
        _ => value
            .as_f64()
            .ok_or_else(|| import_error(format!("{} is not a number", value))),
    }
}

fn scalar_from_json(dtype: TypeId, value: &Value) -> Result<ScalarBytes> {
    Ok(match dtype {
        TypeId::Int8 => ScalarBytes::from_value(int_from_json::<i8>(value)?),
        TypeId::Int16 => ScalarBytes::from_value(int_from_json::<i16>(value)?),
        TypeId::Int32 => ScalarBytes::from_value(int_from_json::<i32>(value)?),
        TypeId::Int64 => ScalarBytes::from_value(int_from_json::<i64>(value)?),
        TypeId::UInt8 => ScalarBytes::from_value(int_from_json::<u8>(value)?),
        TypeId::UInt16 => ScalarBytes::from_value(int_from_json::<u16>(value)?),
        TypeId::UInt32 => ScalarBytes::from_value(int_from_json::<u32>(value)?),
        TypeId::UInt64 => ScalarBytes::from_value(int_from_json::<u64>(value)?),
        TypeId::Float32 => ScalarBytes::from_value(float_from_json(value)? as f32),
        TypeId::Float64 => ScalarBytes::from_value(float_from_json(value)?),
        TypeId::Char8 | TypeId::NoType => {
            return Err(import_error(format!("scalar of type {} is not supported", dtype)))
        }
    })
}

fn check_schema(view: &str, schema: &Schema) -> Result<()> {
    if !schema.dtype.is_valid() {
        return Err(import_error(format!("view '{}' has no element type", view)));
    }
    if schema.num_elements < 0 || schema.offset < 0 || schema.stride <= 0 {
        return Err(import_error(format!(
            "view '{}' has an invalid layout (count {}, offset {}, stride {})",
            view, schema.num_elements, schema.offset, schema.stride
        )));
    }
    Ok(())
}

impl DataStore {
    // ---------------------------------------------------------------
    // export
    // ---------------------------------------------------------------

    /// Export the subtree rooted at `group` as a typed document
    pub fn export_document(&self, group: GroupId) -> Result<Document> {
        if self.group(group).is_none() {
            return Err(Error::NotFound {
                kind: meshstore_core::EntityKind::Group,
                name: format!("{:?}", group),
            });
        }
        let mut used = BTreeSet::new();
        let record = self.export_group_record(group, &mut used);

        let buffers = used
            .into_iter()
            .filter_map(|index| self.buffer(index))
            .map(|buffer| BufferRecord {
                id: buffer.index(),
                dtype: buffer.type_id(),
                num_elements: buffer.num_elements(),
                data: buffer.is_allocated().then(|| STANDARD.encode(buffer.bytes())),
            })
            .collect::<Vec<_>>();

        info!(
            target: "meshstore::datastore",
            group = %self.group_path(group),
            buffers = buffers.len(),
            "exported group"
        );
        Ok(Document {
            buffers,
            group: record,
        })
    }

    fn export_group_record(&self, id: GroupId, used: &mut BTreeSet<usize>) -> GroupRecord {
        let group = self.groups.get(id).unwrap_or_else(|| dangling(id));
        let views = group
            .view_ids()
            .filter_map(|vid| self.views.get(vid))
            .map(|view| {
                let mut record = ViewRecord {
                    name: view.name.clone(),
                    state: view.state().name().to_string(),
                    schema: None,
                    shape: None,
                    buffer_id: None,
                    is_applied: None,
                    value: None,
                };
                let describe = |record: &mut ViewRecord| {
                    record.schema = view.schema;
                    if view.shape.len() > 1 {
                        record.shape = Some(view.shape.to_vec());
                    }
                };
                match &view.data {
                    ViewData::Empty => describe(&mut record),
                    ViewData::Buffer(index) => {
                        describe(&mut record);
                        record.buffer_id = Some(*index);
                        record.is_applied = Some(view.applied);
                        used.insert(*index);
                    }
                    ViewData::External(_) => {
                        if view.schema.is_some() {
                            describe(&mut record);
                        } else {
                            record.state = ViewState::Empty.name().to_string();
                        }
                    }
                    ViewData::Scalar(bytes) => {
                        record.schema = view.schema;
                        record.value = Some(scalar_to_json(view.type_id(), bytes));
                    }
                    ViewData::String(s) => record.value = Some(Value::String(s.clone())),
                }
                record
            })
            .collect();
        let groups = group
            .group_ids()
            .filter_map(|gid| self.groups.get(gid).map(|g| (gid, g.name.clone())))
            .map(|(gid, name)| ChildGroupRecord {
                name,
                group: self.export_group_record(gid, used),
            })
            .collect();
        GroupRecord { views, groups }
    }

    /// Export the subtree rooted at `group` as JSON
    pub fn export_group(&self, group: GroupId) -> Result<Value> {
        Ok(serde_json::to_value(self.export_document(group)?)?)
    }

    /// Write the whole tree to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let doc = self.export_document(self.root_id())?;
        let text = serde_json::to_string_pretty(&doc)?;
        fs::write(path.as_ref(), text)?;
        debug!(target: "meshstore::datastore", path = %path.as_ref().display(), "saved json");
        Ok(())
    }

    // ---------------------------------------------------------------
    // import
    // ---------------------------------------------------------------

    /// Import a JSON document into `group`
    ///
    /// Missing or ill-typed fields fail the import with `Error::Import`.
    pub fn import_group(&mut self, group: GroupId, value: &Value) -> Result<()> {
        let doc: Document =
            serde_json::from_value(value.clone()).map_err(|e| import_error(e.to_string()))?;
        self.import_document(group, &doc)
    }

    /// Import a typed document into `group`
    ///
    /// On error every Buffer, View and Group the import created is removed
    /// again and `group` is left as it was.
    pub fn import_document(&mut self, group: GroupId, doc: &Document) -> Result<()> {
        if self.group(group).is_none() {
            return Err(Error::NotFound {
                kind: meshstore_core::EntityKind::Group,
                name: format!("{:?}", group),
            });
        }
        let mut log = ImportLog::default();
        if let Err(err) = self.import_into(group, doc, &mut log) {
            warn!(
                target: "meshstore::datastore",
                group = %self.group_path(group),
                error = %err,
                "import rejected"
            );
            self.roll_back(log);
            return Err(err);
        }
        info!(
            target: "meshstore::datastore",
            group = %self.group_path(group),
            buffers = log.buffers.len(),
            "imported group"
        );
        Ok(())
    }

    fn import_into(&mut self, group: GroupId, doc: &Document, log: &mut ImportLog) -> Result<()> {
        let mut ids = BTreeMap::new();
        for record in &doc.buffers {
            let index = self.import_buffer(record)?;
            log.buffers.push(index);
            if ids.insert(record.id, index).is_some() {
                return Err(import_error(format!("buffer id {} appears twice", record.id)));
            }
        }
        self.import_group_record(group, &doc.group, &ids, log)
    }

    fn roll_back(&mut self, log: ImportLog) {
        for id in log.views.into_iter().rev() {
            self.destroy_view_entry(id, false);
        }
        for id in log.groups.into_iter().rev() {
            self.destroy_group_entry(id);
        }
        for index in log.buffers {
            self.remove_buffer(index);
        }
    }

    fn import_buffer(&mut self, record: &BufferRecord) -> Result<usize> {
        if record.num_elements < 0 {
            return Err(import_error(format!(
                "buffer {} has negative element count",
                record.id
            )));
        }
        let bytes = record
            .data
            .as_deref()
            .map(|text| STANDARD.decode(text))
            .transpose()
            .map_err(|e| import_error(format!("buffer {} data: {}", record.id, e)))?;

        let index = self.create_buffer();
        let buffer = self.buffer_mut(index).unwrap_or_else(|| dangling(index));
        let filled = match (&bytes, record.dtype.is_valid()) {
            (Some(bytes), true) => buffer
                .allocate(record.dtype, record.num_elements)
                .and_then(|()| buffer.fill_from(bytes)),
            (Some(_), false) => Err(import_error(format!(
                "buffer {} has data but no element type",
                record.id
            ))),
            (None, true) => buffer.describe(record.dtype, record.num_elements),
            (None, false) => Ok(()),
        };
        if let Err(err) = filled {
            self.remove_buffer(index);
            return Err(err);
        }
        Ok(index)
    }

    fn import_group_record(
        &mut self,
        gid: GroupId,
        record: &GroupRecord,
        ids: &BTreeMap<usize, usize>,
        log: &mut ImportLog,
    ) -> Result<()> {
        for view in &record.views {
            let id = self.import_view(gid, view, ids)?;
            log.views.push(id);
        }
        for child in &record.groups {
            self.check_new_child(gid, &child.name)?;
            let child_id = self.insert_group(gid, &child.name);
            log.groups.push(child_id);
            self.import_group_record(child_id, &child.group, ids, log)?;
        }
        Ok(())
    }

    fn check_new_child(&self, gid: GroupId, name: &str) -> Result<()> {
        validate_name(name).map_err(|reason| Error::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        let group = self.groups.get(gid).unwrap_or_else(|| dangling(gid));
        if group.has_child(name) {
            return Err(Error::NameCollision {
                group: self.group_path(gid),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn import_view(
        &mut self,
        gid: GroupId,
        record: &ViewRecord,
        ids: &BTreeMap<usize, usize>,
    ) -> Result<ViewId> {
        let state = ViewState::from_name(&record.state).ok_or_else(|| {
            import_error(format!(
                "view '{}' has unknown state '{}'",
                record.name, record.state
            ))
        })?;
        if let Some(schema) = &record.schema {
            check_schema(&record.name, schema)?;
        }
        self.check_new_child(gid, &record.name)?;

        // Resolve everything fallible before the View exists.
        let data = match state {
            ViewState::Empty | ViewState::External => ViewData::Empty,
            ViewState::Buffer => {
                let old = record.buffer_id.ok_or_else(|| {
                    import_error(format!("BUFFER view '{}' has no buffer_id", record.name))
                })?;
                let index = *ids.get(&old).ok_or_else(|| {
                    import_error(format!(
                        "view '{}' references unknown buffer {}",
                        record.name, old
                    ))
                })?;
                ViewData::Buffer(index)
            }
            ViewState::Scalar => {
                let schema = record.schema.ok_or_else(|| {
                    import_error(format!("SCALAR view '{}' has no schema", record.name))
                })?;
                let value = record.value.as_ref().ok_or_else(|| {
                    import_error(format!("SCALAR view '{}' has no value", record.name))
                })?;
                ViewData::Scalar(scalar_from_json(schema.dtype, value)?)
            }
            ViewState::String => match &record.value {
                Some(Value::String(s)) => ViewData::String(s.clone()),
                _ => {
                    return Err(import_error(format!(
                        "STRING view '{}' has no string value",
                        record.name
                    )))
                }
            },
        };

        let schema = match (&data, record.schema) {
            (ViewData::String(s), _) => Some(Schema::new(TypeId::Char8, s.len() as IndexType)),
            (_, schema) => schema,
        };
        let shape: Shape = match (&record.shape, schema) {
            (Some(shape), _) => Shape::from_slice(shape),
            (None, Some(schema)) => smallvec![schema.num_elements],
            (None, None) => Shape::new(),
        };
        let applied = match &data {
            ViewData::Empty | ViewData::External(_) => false,
            ViewData::Scalar(_) | ViewData::String(_) => true,
            ViewData::Buffer(index) => {
                let fits = match (schema, self.buffer(*index)) {
                    (Some(schema), Some(buffer)) => {
                        buffer.is_allocated() && schema.spanned_bytes() <= buffer.allocated_bytes()
                    }
                    _ => false,
                };
                if record.is_applied == Some(true) && !fits {
                    return Err(import_error(format!(
                        "applied view '{}' does not fit its buffer",
                        record.name
                    )));
                }
                record.is_applied.unwrap_or(fits)
            }
        };

        let id = self.insert_view(gid, &record.name);
        if let ViewData::Buffer(index) = data {
            if let Some(buffer) = self.buffer_mut(index) {
                buffer.attach(id);
            }
        }
        let view = self.views.get_mut(id).unwrap_or_else(|| dangling(id));
        view.data = data;
        view.schema = schema;
        view.shape = shape;
        view.applied = applied;
        Ok(id)
    }

    /// Import a JSON file written by [`DataStore::save_json`] into the root
    pub fn load_json<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let text = fs::read_to_string(path.as_ref())?;
        let value: Value = serde_json::from_str(&text)?;
        let root = self.root_id();
        self.import_group(root, &value)?;
        debug!(target: "meshstore::datastore", path = %path.as_ref().display(), "loaded json");
        Ok(())
    }
}
