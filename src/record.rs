//! Typed access to record fields by name.
//!
//! A record type describes its fields once through [`Record::fields`] and
//! exposes them by name through [`RecordAccess`]. The [`record!`](crate::record!)
//! macro generates both from a plain struct definition, so the schema builder,
//! renderer and binder never need runtime introspection.
//!
//! ```
//! xlgrid::record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Title {
//!         #[grid("col:Main")]
//!         pub main: String,
//!         #[grid("col:Sub")]
//!         pub sub: String,
//!     }
//! }
//!
//! xlgrid::record! {
//!     #[derive(Debug, Default, Clone, PartialEq)]
//!     pub struct Book {
//!         pub title: Title,
//!         #[grid("col:Remark")]
//!         pub remark: String,
//!         #[grid("-")]
//!         pub internal_id: u64,
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

/// Primitive category of a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Kind {
    Signed,
    Unsigned,
    Float,
    String,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Signed => "signed integer",
            Self::Unsigned => "unsigned integer",
            Self::Float => "floating point",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
}

impl Value {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::Signed,
            Self::Uint(_) => Kind::Unsigned,
            Self::Float(_) => Kind::Float,
            Self::Str(_) => Kind::String,
        }
    }

    /// Parse a raw cell string as `kind`.
    ///
    /// Numbers are parsed base 10 after trimming surrounding whitespace;
    /// strings are taken verbatim.
    pub fn parse(kind: Kind, raw: &str) -> Result<Self, FieldError> {
        match kind {
            Kind::Signed => raw
                .trim()
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|e| parse_error(kind, &e)),
            Kind::Unsigned => raw
                .trim()
                .parse::<u64>()
                .map(Self::Uint)
                .map_err(|e| parse_error(kind, &e)),
            Kind::Float => raw
                .trim()
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|e| parse_error(kind, &e)),
            Kind::String => Ok(Self::Str(raw.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

/// Why a value could not be read from or stored into a record field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("path segment [{0}] does not exist")]
    MissingField(String),

    #[error("path segment [{0}] is not a nested record")]
    NotRecord(String),

    #[error("field [{0}] is not a primitive column")]
    NotLeaf(String),

    #[error("field is declared as {declared}, column holds {expected}")]
    KindMismatch { declared: Kind, expected: Kind },

    #[error("cannot parse as {kind}: {reason}")]
    Parse { kind: Kind, reason: String },

    #[error("value {value} does not fit the field")]
    OutOfRange { value: String },

    #[error("empty field path")]
    EmptyPath,
}

/// How a field type maps onto the grid.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape {
    /// A single column of the given kind.
    Leaf(Kind),
    /// A nested record spanning the columns of its own fields.
    Record(fn() -> Vec<FieldDef>),
    /// An `Option<_>`; rejected by the schema builder.
    Optional,
    /// Excluded with the `-` annotation; never inspected.
    Skipped,
}

/// One declared field of a record type.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    /// Raw annotation, e.g. `"col:Title"` or `"-"`.
    pub annotation: &'static str,
    pub shape: FieldShape,
}

/// Shared view of a field.
pub enum FieldRef<'a> {
    Leaf(Value),
    Record(&'a dyn RecordAccess),
    /// An optional field holding `None`.
    Absent,
}

/// Mutable view of a field.
pub enum FieldMut<'a> {
    Leaf(&'a mut dyn LeafSlot),
    Record(&'a mut dyn RecordAccess),
    Absent,
}

/// Object-safe, by-name access to a record's fields.
pub trait RecordAccess {
    fn field(&self, name: &str) -> Option<FieldRef<'_>>;
    fn field_mut(&mut self, name: &str) -> Option<FieldMut<'_>>;
}

/// A record type that can be laid out as grid columns.
pub trait Record: RecordAccess + Default {
    /// Declared fields, in declaration order.
    fn fields() -> Vec<FieldDef>;
}

/// A primitive field that can receive a parsed [`Value`].
pub trait LeafSlot {
    fn kind(&self) -> Kind;
    fn assign(&mut self, value: Value) -> Result<(), FieldError>;
}

/// Any type usable as a record field.
pub trait Column {
    fn shape() -> FieldShape;
    fn as_field(&self) -> FieldRef<'_>;
    fn as_field_mut(&mut self) -> FieldMut<'_>;
}

fn parse_error(kind: Kind, err: &dyn fmt::Display) -> FieldError {
    FieldError::Parse {
        kind,
        reason: err.to_string(),
    }
}

fn out_of_range(value: &impl fmt::Display) -> FieldError {
    FieldError::OutOfRange {
        value: value.to_string(),
    }
}

fn kind_mismatch(declared: Kind, value: &Value) -> FieldError {
    FieldError::KindMismatch {
        declared,
        expected: value.kind(),
    }
}

macro_rules! integer_columns {
    ($kind:ident, $variant:ident, $wide:ty => $($t:ty),*) => {
        $(
            impl LeafSlot for $t {
                fn kind(&self) -> Kind {
                    Kind::$kind
                }

                fn assign(&mut self, value: Value) -> Result<(), FieldError> {
                    match value {
                        Value::$variant(v) => {
                            *self = <$t>::try_from(v).map_err(|_| out_of_range(&v))?;
                            Ok(())
                        }
                        other => Err(kind_mismatch(Kind::$kind, &other)),
                    }
                }
            }

            impl Column for $t {
                fn shape() -> FieldShape {
                    FieldShape::Leaf(Kind::$kind)
                }

                fn as_field(&self) -> FieldRef<'_> {
                    <$wide>::try_from(*self)
                        .map_or(FieldRef::Absent, |v| FieldRef::Leaf(Value::$variant(v)))
                }

                fn as_field_mut(&mut self) -> FieldMut<'_> {
                    FieldMut::Leaf(self)
                }
            }
        )*
    };
}

integer_columns!(Signed, Int, i64 => i8, i16, i32, i64, isize);
integer_columns!(Unsigned, Uint, u64 => u8, u16, u32, u64, usize);

impl LeafSlot for f64 {
    fn kind(&self) -> Kind {
        Kind::Float
    }

    fn assign(&mut self, value: Value) -> Result<(), FieldError> {
        match value {
            Value::Float(v) => {
                *self = v;
                Ok(())
            }
            other => Err(kind_mismatch(Kind::Float, &other)),
        }
    }
}

impl Column for f64 {
    fn shape() -> FieldShape {
        FieldShape::Leaf(Kind::Float)
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Leaf(Value::Float(*self))
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Leaf(self)
    }
}

impl LeafSlot for f32 {
    fn kind(&self) -> Kind {
        Kind::Float
    }

    fn assign(&mut self, value: Value) -> Result<(), FieldError> {
        match value {
            Value::Float(v) => {
                if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                    return Err(out_of_range(&v));
                }
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = v as f32;
                *self = narrowed;
                Ok(())
            }
            other => Err(kind_mismatch(Kind::Float, &other)),
        }
    }
}

impl Column for f32 {
    fn shape() -> FieldShape {
        FieldShape::Leaf(Kind::Float)
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Leaf(Value::Float(f64::from(*self)))
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Leaf(self)
    }
}

impl LeafSlot for String {
    fn kind(&self) -> Kind {
        Kind::String
    }

    fn assign(&mut self, value: Value) -> Result<(), FieldError> {
        match value {
            Value::Str(v) => {
                *self = v;
                Ok(())
            }
            other => Err(kind_mismatch(Kind::String, &other)),
        }
    }
}

impl Column for String {
    fn shape() -> FieldShape {
        FieldShape::Leaf(Kind::String)
    }

    fn as_field(&self) -> FieldRef<'_> {
        FieldRef::Leaf(Value::Str(self.clone()))
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Leaf(self)
    }
}

impl<T: Column> Column for Option<T> {
    fn shape() -> FieldShape {
        FieldShape::Optional
    }

    fn as_field(&self) -> FieldRef<'_> {
        match self {
            Some(inner) => inner.as_field(),
            None => FieldRef::Absent,
        }
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Absent
    }
}

/// Read the leaf value at `path`, descending through nested records.
///
/// Returns `None` when the path does not lead to a present leaf.
#[must_use]
pub fn value_at(record: &dyn RecordAccess, path: &[String]) -> Option<Value> {
    match path {
        [] => None,
        [last] => match record.field(last)? {
            FieldRef::Leaf(value) => Some(value),
            FieldRef::Record(_) | FieldRef::Absent => None,
        },
        [head, rest @ ..] => match record.field(head)? {
            FieldRef::Record(inner) => value_at(inner, rest),
            FieldRef::Leaf(_) | FieldRef::Absent => None,
        },
    }
}

/// Store `value` into the leaf at `path`, checking the field's declared kind
/// against `kind` first.
pub fn assign_at(
    record: &mut dyn RecordAccess,
    path: &[String],
    kind: Kind,
    value: Value,
) -> Result<(), FieldError> {
    match path {
        [] => Err(FieldError::EmptyPath),
        [last] => match record.field_mut(last) {
            Some(FieldMut::Leaf(slot)) => {
                let declared = slot.kind();
                if declared != kind {
                    return Err(FieldError::KindMismatch {
                        declared,
                        expected: kind,
                    });
                }
                slot.assign(value)
            }
            Some(FieldMut::Record(_) | FieldMut::Absent) => Err(FieldError::NotLeaf(last.clone())),
            None => Err(FieldError::MissingField(last.clone())),
        },
        [head, rest @ ..] => match record.field_mut(head) {
            Some(FieldMut::Record(inner)) => assign_at(inner, rest, kind, value),
            Some(FieldMut::Leaf(_) | FieldMut::Absent) => Err(FieldError::NotRecord(head.clone())),
            None => Err(FieldError::MissingField(head.clone())),
        },
    }
}

/// Define a struct and implement [`Record`], [`RecordAccess`] and [`Column`]
/// for it.
///
/// Each field may carry one `#[grid("...")]` annotation: `"col:Title"` sets
/// the header title, `"-"` excludes the field from the grid entirely (its
/// type then needs no [`Column`] impl). The marker must be the exact literal
/// `"-"`; a padded `" - "` maps the field under its own name. Other field
/// attributes are not accepted.
#[macro_export]
macro_rules! record {
    (@ref ["-"] $e:expr) => {
        ::core::option::Option::None
    };
    (@ref [$($ann:tt)*] $e:expr) => {
        ::core::option::Option::Some($crate::record::Column::as_field($e))
    };
    (@mut ["-"] $e:expr) => {
        ::core::option::Option::None
    };
    (@mut [$($ann:tt)*] $e:expr) => {
        ::core::option::Option::Some($crate::record::Column::as_field_mut($e))
    };
    (@def $field:ident, ["-"], $ty:ty) => {
        $crate::record::FieldDef {
            name: ::core::stringify!($field),
            annotation: "-",
            shape: $crate::record::FieldShape::Skipped,
        }
    };
    (@def $field:ident, [], $ty:ty) => {
        $crate::record::FieldDef {
            name: ::core::stringify!($field),
            annotation: "",
            shape: <$ty as $crate::record::Column>::shape(),
        }
    };
    (@def $field:ident, [$ann:tt], $ty:ty) => {
        $crate::record::FieldDef {
            name: ::core::stringify!($field),
            annotation: $ann,
            shape: <$ty as $crate::record::Column>::shape(),
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[grid($ann:tt)])?
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $ty, )*
        }

        impl $crate::record::RecordAccess for $name {
            fn field(
                &self,
                name: &str,
            ) -> ::core::option::Option<$crate::record::FieldRef<'_>> {
                $(
                    if name == ::core::stringify!($field) {
                        return $crate::record!(@ref [$($ann)?] &self.$field);
                    }
                )*
                ::core::option::Option::None
            }

            fn field_mut(
                &mut self,
                name: &str,
            ) -> ::core::option::Option<$crate::record::FieldMut<'_>> {
                $(
                    if name == ::core::stringify!($field) {
                        return $crate::record!(@mut [$($ann)?] &mut self.$field);
                    }
                )*
                ::core::option::Option::None
            }
        }

        impl $crate::record::Record for $name {
            fn fields() -> ::std::vec::Vec<$crate::record::FieldDef> {
                ::std::vec![ $( $crate::record!(@def $field, [$($ann)?], $ty) ),* ]
            }
        }

        impl $crate::record::Column for $name {
            fn shape() -> $crate::record::FieldShape {
                $crate::record::FieldShape::Record(
                    <$name as $crate::record::Record>::fields,
                )
            }

            fn as_field(&self) -> $crate::record::FieldRef<'_> {
                $crate::record::FieldRef::Record(self)
            }

            fn as_field_mut(&mut self) -> $crate::record::FieldMut<'_> {
                $crate::record::FieldMut::Record(self)
            }
        }
    };
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Point {
            #[grid("col:x")]
            x: i32,
            #[grid("col:y")]
            y: i32,
        }
    }

    crate::record! {
        #[derive(Debug, Default, Clone, PartialEq)]
        struct Mark {
            #[grid("col:Page")]
            page: u16,
            start: Point,
            ratio: f32,
            #[grid("-")]
            scratch: Vec<u8>,
        }
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn fields_follow_declaration_order() {
        let fields = Mark::fields();
        let names: Vec<_> = fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["page", "start", "ratio", "scratch"]);
        assert_eq!(fields[0].annotation, "col:Page");
        assert!(matches!(fields[0].shape, FieldShape::Leaf(Kind::Unsigned)));
        assert!(matches!(fields[1].shape, FieldShape::Record(_)));
        assert!(matches!(fields[2].shape, FieldShape::Leaf(Kind::Float)));
        assert!(matches!(fields[3].shape, FieldShape::Skipped));
    }

    #[test]
    fn skipped_fields_are_not_accessible() {
        let mut mark = Mark::default();
        assert!(mark.field("scratch").is_none());
        assert!(mark.field_mut("scratch").is_none());
        assert!(mark.field("nope").is_none());
    }

    #[test]
    fn reads_nested_values() {
        let mark = Mark {
            page: 7,
            start: Point { x: -3, y: 4 },
            ratio: 0.5,
            scratch: vec![1],
        };
        assert_eq!(value_at(&mark, &path(&["page"])), Some(Value::Uint(7)));
        assert_eq!(
            value_at(&mark, &path(&["start", "x"])),
            Some(Value::Int(-3))
        );
        assert_eq!(value_at(&mark, &path(&["ratio"])), Some(Value::Float(0.5)));
        assert_eq!(value_at(&mark, &path(&["start"])), None);
        assert_eq!(value_at(&mark, &path(&["page", "x"])), None);
    }

    #[test]
    fn assigns_nested_values() {
        let mut mark = Mark::default();
        assign_at(&mut mark, &path(&["start", "y"]), Kind::Signed, Value::Int(9)).unwrap();
        assign_at(&mut mark, &path(&["ratio"]), Kind::Float, Value::Float(1.25)).unwrap();
        assert_eq!(mark.start.y, 9);
        assert_eq!(mark.ratio, 1.25);
    }

    #[test]
    fn assign_reports_problems() {
        let mut mark = Mark::default();
        assert_eq!(
            assign_at(&mut mark, &path(&["start", "z"]), Kind::Signed, Value::Int(1)),
            Err(FieldError::MissingField("z".into()))
        );
        assert_eq!(
            assign_at(&mut mark, &path(&["page", "x"]), Kind::Signed, Value::Int(1)),
            Err(FieldError::NotRecord("page".into()))
        );
        assert_eq!(
            assign_at(&mut mark, &path(&["page"]), Kind::Signed, Value::Int(1)),
            Err(FieldError::KindMismatch {
                declared: Kind::Unsigned,
                expected: Kind::Signed
            })
        );
        assert_eq!(
            assign_at(&mut mark, &path(&["page"]), Kind::Unsigned, Value::Uint(70_000)),
            Err(FieldError::OutOfRange {
                value: "70000".into()
            })
        );
        assert_eq!(
            assign_at(&mut mark, &[], Kind::Unsigned, Value::Uint(1)),
            Err(FieldError::EmptyPath)
        );
    }

    #[test]
    fn parses_raw_strings_by_kind() {
        assert_eq!(Value::parse(Kind::Signed, "-42").unwrap(), Value::Int(-42));
        assert_eq!(Value::parse(Kind::Unsigned, " 42 ").unwrap(), Value::Uint(42));
        assert_eq!(Value::parse(Kind::Float, "2.5").unwrap(), Value::Float(2.5));
        assert_eq!(
            Value::parse(Kind::String, " keep ").unwrap(),
            Value::Str(" keep ".into())
        );
        assert!(Value::parse(Kind::Unsigned, "-1").is_err());
        assert!(Value::parse(Kind::Signed, "1.5").is_err());
    }

    #[test]
    fn value_display_round_trips_through_parse() {
        for value in [
            Value::Int(-17),
            Value::Uint(u64::MAX),
            Value::Float(0.1),
            Value::Float(3.0),
        ] {
            let text = value.to_string();
            assert_eq!(Value::parse(value.kind(), &text).unwrap(), value);
        }
    }

    #[test]
    fn optional_fields_report_optional_shape() {
        assert!(matches!(
            <Option<String> as Column>::shape(),
            FieldShape::Optional
        ));
        let present = Some(5_i32);
        assert!(matches!(present.as_field(), FieldRef::Leaf(Value::Int(5))));
    }
}
