//! Shared image-construction helpers.
//!
//! Builds program images the way the external image parser would: functions
//! and basic blocks are plain heap objects, and each basic block carries an
//! `instrs` array of instruction objects.

use opal_core::{ObjHandle, Value};
use opal_runtime::Heap;

/// Create an empty basic block.
pub fn new_block(heap: &mut Heap) -> ObjHandle {
    let block = heap.new_object(2);
    let instrs = heap.new_array(8);
    heap.set_field(block, "instrs", Value::Array(instrs));
    block
}

/// Create a function object together with its (empty) entry block.
pub fn new_fun(heap: &mut Heap, num_params: i32, num_locals: i32) -> (ObjHandle, ObjHandle) {
    let entry = new_block(heap);
    let fun = heap.new_object(4);
    heap.set_field(fun, "entry", Value::Object(entry));
    heap.set_field(fun, "num_params", Value::int32(num_params));
    heap.set_field(fun, "num_locals", Value::int32(num_locals));
    (fun, entry)
}

fn append(heap: &mut Heap, block: ObjHandle, instr: ObjHandle) {
    let arr = heap
        .get_field(block, "instrs")
        .and_then(Value::as_array)
        .expect("block without instrs array");
    heap.arr_mut(arr).push(Value::Object(instr));
}

/// Append an instruction with no operands. Returns the instruction object
/// so callers can attach further fields.
pub fn emit(heap: &mut Heap, block: ObjHandle, op: &str) -> ObjHandle {
    let instr = heap.new_object(4);
    let op_val = heap.str_value(op);
    heap.set_field(instr, "op", op_val);
    append(heap, block, instr);
    instr
}

/// Append `push <val>`.
pub fn emit_push(heap: &mut Heap, block: ObjHandle, val: Value) -> ObjHandle {
    let instr = emit(heap, block, "push");
    heap.set_field(instr, "val", val);
    instr
}

/// Append `push` of a fresh string.
pub fn emit_push_str(heap: &mut Heap, block: ObjHandle, s: &str) -> ObjHandle {
    let val = heap.str_value(s);
    emit_push(heap, block, val)
}

/// Append an index-carrying instruction (`dup`, `get_local`, `set_local`).
pub fn emit_idx(heap: &mut Heap, block: ObjHandle, op: &str, idx: i32) -> ObjHandle {
    let instr = emit(heap, block, op);
    heap.set_field(instr, "idx", Value::int32(idx));
    instr
}

/// Append `jump <to>`.
pub fn emit_jump(heap: &mut Heap, block: ObjHandle, to: ObjHandle) -> ObjHandle {
    let instr = emit(heap, block, "jump");
    heap.set_field(instr, "to", Value::Object(to));
    instr
}

/// Append `if_true <then> <else>`.
pub fn emit_if(
    heap: &mut Heap,
    block: ObjHandle,
    then_blk: ObjHandle,
    else_blk: ObjHandle,
) -> ObjHandle {
    let instr = emit(heap, block, "if_true");
    heap.set_field(instr, "then", Value::Object(then_blk));
    heap.set_field(instr, "else", Value::Object(else_blk));
    instr
}

/// Append `call <num_args> <ret_to>`.
pub fn emit_call(
    heap: &mut Heap,
    block: ObjHandle,
    num_args: i32,
    ret_to: ObjHandle,
) -> ObjHandle {
    let instr = emit(heap, block, "call");
    heap.set_field(instr, "num_args", Value::int32(num_args));
    heap.set_field(instr, "ret_to", Value::Object(ret_to));
    instr
}

/// Append `has_tag <tag>`.
pub fn emit_has_tag(heap: &mut Heap, block: ObjHandle, tag: &str) -> ObjHandle {
    let instr = emit(heap, block, "has_tag");
    let tag_val = heap.str_value(tag);
    heap.set_field(instr, "tag", tag_val);
    instr
}

/// Attach a `src_pos` annotation to an instruction.
pub fn annotate(heap: &mut Heap, instr: ObjHandle, file: &str, line: i32, col: i32) {
    let pos = heap.new_object(3);
    let file_val = heap.str_value(file);
    heap.set_field(pos, "file", file_val);
    heap.set_field(pos, "line", Value::int32(line));
    heap.set_field(pos, "col", Value::int32(col));
    heap.set_field(instr, "src_pos", Value::Object(pos));
}

/// Wrap a function as a package exporting it under `name`.
pub fn package(heap: &mut Heap, name: &str, fun: ObjHandle) -> Value {
    let pkg = heap.new_object(2);
    heap.set_field(pkg, name, Value::Object(fun));
    Value::Object(pkg)
}
