use log::debug;

use crate::{
    frame::{self, Duplicator},
    FrameId, Interpreter, RuntimeError, RuntimeResult, SeriesId, TypeSet, TypeTag, Value,
};

/// `make` over the shape of (`value`, `argument`), first match wins:
/// fresh from `utype!`, clone on an empty argument, derive from a
/// declaration block, merge with another frame.
pub(super) fn make(interp: &mut Interpreter, value: Value, argument: Value) -> RuntimeResult<Value> {
    match value {
        Value::Datatype(TypeTag::Utype) => fresh(interp, argument),
        Value::Utype(src) | Value::Object(src) => match argument {
            Value::None => clone(interp, src),
            Value::Block(decls) => {
                if interp.heap.series(decls)?.is_empty() {
                    clone(interp, src)
                } else {
                    derive(interp, src, decls)
                }
            }
            Value::Utype(other) | Value::Object(other) => merge(interp, src, other),
            _ => Err(RuntimeError::MakeNotSupported {
                value: value.type_tag(),
                argument: argument.type_tag(),
            }),
        },
        _ => Err(RuntimeError::MakeNotSupported {
            value: value.type_tag(),
            argument: argument.type_tag(),
        }),
    }
}

/// Point the self slot of a freshly built frame at the new instance.
fn adopt(interp: &mut Interpreter, id: FrameId) -> RuntimeResult<Value> {
    let instance = Value::Utype(id);
    interp.heap.frame_mut(id)?.set_self(instance);
    Ok(instance)
}

fn fresh(interp: &mut Interpreter, argument: Value) -> RuntimeResult<Value> {
    match argument {
        Value::Block(decls) => {
            debug!("make utype!: fresh from declarations");
            let id = frame::make_object(&mut interp.heap, None, Some(decls))?;
            let instance = adopt(interp, id)?;
            // the frame must be a root before anything in `decls` runs
            interp.with_roots(&[instance], |interp| interp.do_bind_block(id, decls))?;
            Ok(instance)
        }
        Value::Object(template) => {
            debug!("make utype!: fresh from object");
            let id = frame::copy_frame(&mut interp.heap, template)?;
            let instance = adopt(interp, id)?;
            interp.with_roots(&[instance], |interp| {
                let mut duplicator = Duplicator::new(TypeSet::CLONE, false);
                duplicator.copy_frame_values(&mut interp.heap, id)?;
                frame::rebind_frame(&mut interp.heap, &[template], id, &duplicator)?;
                interp.heap.frame_mut(id)?.set_spec(Some(template));
                Ok::<_, RuntimeError>(())
            })?;
            Ok(instance)
        }
        other => Err(RuntimeError::MakeTypeMismatch {
            target: TypeTag::Utype,
            got: other.type_tag(),
        }),
    }
}

fn clone(interp: &mut Interpreter, src: FrameId) -> RuntimeResult<Value> {
    debug!("make: clone {:?}", src);
    let id = frame::copy_frame(&mut interp.heap, src)?;
    let instance = adopt(interp, id)?;
    interp.with_roots(&[instance], |interp| {
        let mut duplicator = Duplicator::new(TypeSet::CLONE, false);
        duplicator.copy_frame_values(&mut interp.heap, id)?;
        frame::rebind_frame(&mut interp.heap, &[src], id, &duplicator)
    })?;
    Ok(instance)
}

fn derive(interp: &mut Interpreter, src: FrameId, decls: SeriesId) -> RuntimeResult<Value> {
    debug!("make: derive {:?}", src);
    let id = frame::make_object(&mut interp.heap, Some(src), Some(decls))?;
    let instance = adopt(interp, id)?;
    let result = interp.with_roots(&[instance], |interp| interp.do_bind_block(id, decls));
    interp.heap.frame_mut(id)?.set_parent(None);
    result?;
    Ok(instance)
}

fn merge(interp: &mut Interpreter, a: FrameId, b: FrameId) -> RuntimeResult<Value> {
    debug!("make: merge {:?} with {:?}", a, b);
    let id = frame::merge_frames(&mut interp.heap, a, b)?;
    adopt(interp, id)
}
