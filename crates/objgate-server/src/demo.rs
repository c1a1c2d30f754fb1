//! Demonstration catalog served by the binary.
//!
//! ```text
//! demo.Accumulator           running total
//! demo.Shape ─┬─ demo.Circle       (demo.Measurable)
//!             └─ demo.Rectangle    (demo.Measurable)
//! demo.Canvas                collects shapes
//! demo.Species               enum: FIR, SPRUCE, LARCH
//! demo.Maths                 static helpers
//! ```

use objgate_core::{
    HostObject, InvocationError, Result, TypeBuilder, TypeCatalog, TypeDescriptor, Value,
};
use std::sync::{Mutex, PoisonError};

struct Accumulator {
    total: Mutex<f64>,
}

impl Accumulator {
    fn new(total: f64) -> Self {
        Self {
            total: Mutex::new(total),
        }
    }

    fn add(&self, amount: f64) -> f64 {
        let mut total = self.total.lock().unwrap_or_else(PoisonError::into_inner);
        *total += amount;
        *total
    }

    fn total(&self) -> f64 {
        *self.total.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Shape {
    kind: &'static str,
}

struct Circle {
    shape: Shape,
    radius: f64,
}

struct Rectangle {
    shape: Shape,
    width: f64,
    height: f64,
}

#[derive(Default)]
struct Canvas {
    shapes: Mutex<Vec<HostObject>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Species {
    Fir,
    Spruce,
    Larch,
}

/// Area of any registered shape.
fn area_of(shape: &HostObject) -> std::result::Result<f64, InvocationError> {
    if let Some(circle) = shape.downcast_ref::<Circle>() {
        return Ok(std::f64::consts::PI * circle.radius * circle.radius);
    }
    if let Some(rect) = shape.downcast_ref::<Rectangle>() {
        return Ok(rect.width * rect.height);
    }
    Err(InvocationError::failed(format!(
        "{} is not a shape",
        shape.type_name()
    )))
}

fn non_negative(value: f64, what: &str) -> std::result::Result<f64, InvocationError> {
    if value < 0.0 || value.is_nan() {
        return Err(InvocationError::failed(format!(
            "{} must be non-negative, got {}",
            what, value
        )));
    }
    Ok(value)
}

/// Build the catalog the binary serves.
pub fn catalog() -> Result<TypeCatalog> {
    let mut catalog = TypeCatalog::with_builtins();

    catalog.register(
        TypeBuilder::<Accumulator>::class("demo.Accumulator")
            .constructor(&[], |_| Ok(Accumulator::new(0.0)))
            .constructor(&["double"], |args| Ok(Accumulator::new(args[0].as_f64(0)?)))
            .constructor(&["double", "double"], |args| {
                Ok(Accumulator::new(args[0].as_f64(0)? + args[1].as_f64(1)?))
            })
            .method("add", &["double"], |acc, args| {
                Ok(Value::Float(acc.add(args[0].as_f64(0)?)))
            })
            .method("add", &["demo.Accumulator"], |acc, args| {
                let other = args[0].downcast::<Accumulator>(0)?;
                Ok(Value::Float(acc.add(other.total())))
            })
            .method("total", &[], |acc, _| Ok(Value::Float(acc.total())))
            .method("reset", &[], |acc, _| {
                *acc.total.lock().unwrap_or_else(PoisonError::into_inner) = 0.0;
                Ok(Value::Unit)
            })
            .method("describe", &[], |acc, _| {
                Ok(Value::Text(format!("Accumulator({})", acc.total())))
            })
            .build(),
    )?;

    catalog.register(TypeDescriptor::interface("demo.Measurable"))?;
    catalog.register(
        TypeBuilder::<Shape>::class("demo.Shape")
            .method("kind", &[], |s, _| Ok(Value::Text(s.kind.to_string())))
            .method("describe", &[], |s, _| Ok(Value::Text(format!("a {}", s.kind))))
            .build(),
    )?;
    catalog.register(
        TypeBuilder::<Circle>::class("demo.Circle")
            .extends_via::<Shape>("demo.Shape", |c| &c.shape)
            .implements("demo.Measurable")
            .constructor(&["double"], |args| {
                Ok(Circle {
                    shape: Shape { kind: "circle" },
                    radius: non_negative(args[0].as_f64(0)?, "radius")?,
                })
            })
            .method("radius", &[], |c, _| Ok(Value::Float(c.radius)))
            .method("area", &[], |c, _| {
                Ok(Value::Float(std::f64::consts::PI * c.radius * c.radius))
            })
            .build(),
    )?;
    catalog.register(
        TypeBuilder::<Rectangle>::class("demo.Rectangle")
            .extends_via::<Shape>("demo.Shape", |r| &r.shape)
            .implements("demo.Measurable")
            .constructor(&["double", "double"], |args| {
                Ok(Rectangle {
                    shape: Shape { kind: "rectangle" },
                    width: non_negative(args[0].as_f64(0)?, "width")?,
                    height: non_negative(args[1].as_f64(1)?, "height")?,
                })
            })
            .method("area", &[], |r, _| Ok(Value::Float(r.width * r.height)))
            .method("describe", &[], |r, _| {
                Ok(Value::Text(format!("a {} by {} rectangle", r.width, r.height)))
            })
            .method("scaled", &["double"], |r, args| {
                let factor = non_negative(args[0].as_f64(0)?, "factor")?;
                Ok(Value::Object(HostObject::new(
                    "demo.Rectangle",
                    Rectangle {
                        shape: Shape { kind: "rectangle" },
                        width: r.width * factor,
                        height: r.height * factor,
                    },
                )))
            })
            .build(),
    )?;

    catalog.register(
        TypeBuilder::<Canvas>::class("demo.Canvas")
            .constructor(&[], |_| Ok(Canvas::default()))
            .method("add", &["demo.Shape"], |canvas, args| {
                let shape = args[0].as_object(0)?.clone();
                let mut shapes = canvas.shapes.lock().unwrap_or_else(PoisonError::into_inner);
                shapes.push(shape);
                Ok(Value::Int(shapes.len() as i32))
            })
            // Reached only for arguments that are not shapes.
            .method("add", &["Object"], |_, args| {
                Err(InvocationError::failed(format!(
                    "cannot draw a {}",
                    args[0].type_name()
                )))
            })
            .method("label", &["demo.Measurable"], |_, args| {
                let shape = args[0].as_object(0)?;
                Ok(Value::Text(format!(
                    "{} with area {:.2}",
                    shape.type_name(),
                    area_of(shape)?
                )))
            })
            .method("label", &["Object"], |_, args| {
                Ok(Value::Text(format!("plain {}", args[0].type_name())))
            })
            .method("count", &[], |canvas, _| {
                let shapes = canvas.shapes.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(Value::Int(shapes.len() as i32))
            })
            .method("totalArea", &[], |canvas, _| {
                let shapes = canvas.shapes.lock().unwrap_or_else(PoisonError::into_inner);
                let mut total = 0.0;
                for shape in shapes.iter() {
                    total += area_of(shape)?;
                }
                Ok(Value::Float(total))
            })
            .build(),
    )?;

    catalog.register(
        TypeBuilder::<Species>::enumeration("demo.Species")
            .constant("FIR", Species::Fir)
            .constant("SPRUCE", Species::Spruce)
            .constant("LARCH", Species::Larch)
            .method("name", &[], |s, _| {
                let name = match s {
                    Species::Fir => "FIR",
                    Species::Spruce => "SPRUCE",
                    Species::Larch => "LARCH",
                };
                Ok(Value::Text(name.to_string()))
            })
            .method("isEvergreen", &[], |s, _| Ok(Value::Bool(*s != Species::Larch)))
            .build(),
    )?;

    catalog.register(
        TypeBuilder::<()>::class("demo.Maths")
            .static_method("hypot", &["double", "double"], |args| {
                Ok(Value::Float(args[0].as_f64(0)?.hypot(args[1].as_f64(1)?)))
            })
            .static_method("max", &["int", "int"], |args| {
                Ok(Value::Int(args[0].as_i32(0)?.max(args[1].as_i32(1)?)))
            })
            .static_method("max", &["double", "double"], |args| {
                Ok(Value::Float(args[0].as_f64(0)?.max(args[1].as_f64(1)?)))
            })
            .static_method("repeat", &["String", "int"], |args| {
                let times = usize::try_from(args[1].as_i32(1)?)
                    .map_err(|_| InvocationError::failed("count must be non-negative"))?;
                Ok(Value::Text(args[0].as_str(0)?.repeat(times)))
            })
            .build(),
    )?;

    Ok(catalog)
}
