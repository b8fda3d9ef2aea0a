//! Field-level conversions used by `#[derive(Exportable)]`.
//!
//! Each supported Rust field type knows which `write_*` / `read_*` pair of the
//! sessions carries it. Values equal to the struct's `Default` are not
//! written at all; on load the missing field falls back to that same default.
//! An empty string that differs from its default cannot be stored and fails
//! the export with a usage error.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::exportable::{Exportable, ObjectRef};
use crate::reader::ReaderContext;
use crate::writer::WriterSession;

/// A struct field that can be written to and read from a field stream.
pub trait ExportField: Sized {
    /// Writes `self` under `name` unless it equals `default`.
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()>;

    /// Reads the value stored under `name`, or `default`.
    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl ExportField for $ty {
                fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
                    if self == default {
                        return Ok(());
                    }
                    out.$write(name, *self)
                }

                fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
                    input.$read(name, default)
                }
            }
        )*
    };
}

impl_scalar! {
    bool => write_bool, read_bool;
    u8 => write_byte, read_byte;
    i16 => write_short, read_short;
    i32 => write_int, read_int;
    i64 => write_long, read_long;
    f32 => write_float, read_float;
    f64 => write_double, read_double;
}

impl ExportField for String {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self == default {
            return Ok(());
        }
        out.write_string(name, self)
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        input.read_string_opt(name).unwrap_or(default)
    }
}

impl ExportField for Option<String> {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self == default {
            return Ok(());
        }
        match self {
            Some(value) => out.write_string(name, value),
            None => out.write_null_string(name),
        }
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        if !input.has_field(name) {
            return default;
        }
        input.read_string_opt(name)
    }
}

impl ExportField for Option<ObjectRef> {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self.is_none() && default.is_none() {
            return Ok(());
        }
        out.write_exportable(name, self.as_ref())
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        input.read_exportable(name, default)
    }
}

impl ExportField for Vec<Option<ObjectRef>> {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self.is_empty() && default.is_empty() {
            return Ok(());
        }
        out.write_exportable_array(name, self)
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        input.read_exportable_array(name, default)
    }
}

impl<T: Exportable> ExportField for Option<Rc<RefCell<T>>> {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self.is_none() && default.is_none() {
            return Ok(());
        }
        let object = self.as_ref().map(|rc| ObjectRef::from_rc(Rc::clone(rc)));
        out.write_exportable(name, object.as_ref())
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        if !input.has_field(name) {
            return default;
        }
        input.read_exportable_as::<T>(name)
    }
}

impl<T: Exportable> ExportField for Vec<Rc<RefCell<T>>> {
    fn write_field(&self, out: &mut WriterSession<'_>, name: &str, default: &Self) -> Result<()> {
        if self.is_empty() && default.is_empty() {
            return Ok(());
        }
        let objects: Vec<ObjectRef> = self
            .iter()
            .map(|object| ObjectRef::from_rc(Rc::clone(object)))
            .collect();
        out.write_exportable_list(name, &objects)
    }

    fn read_field(input: &mut ReaderContext<'_, '_>, name: &str, default: Self) -> Self {
        if !input.has_field(name) {
            return default;
        }
        input.read_exportable_list_as::<T>(name)
    }
}
