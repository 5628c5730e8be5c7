//! Block compiler: source basic blocks to encoded dispatch streams.
//!
//! `compile` translates one block version's source instructions, in
//! order, into the dense encoding appended to the code arena. Branch
//! destinations are emitted as *stubs*: `JUMP_STUB` carries a version id,
//! and each `IF_TRUE` arm carries a version id with [`STUB_BIT`] set.
//! The interpreter resolves and patches these to arena offsets on first
//! traversal.
//!
//! No optimization and no cross-block analysis happen here; destination
//! versions are created as uncompiled stubs through the registry.

use crate::ic::FieldIc;
use crate::interp::Interp;
use crate::opcode::Opcode;
use crate::version::{RetEntry, VersionId};
use log::debug;
use opal_core::{Tag, Value, VmError, VmResult};

/// Marks an unpatched `IF_TRUE` arm: the slot holds a version id, not an
/// arena offset. Cleared when the arm is patched. Version ids and arena
/// offsets both stay far below this bit in practice (the arena is capped
/// at 1 MiB).
pub(crate) const STUB_BIT: u32 = 1 << 31;

/// Per-field inline caches for the operand reads the compiler performs on
/// instruction objects. One cache per use site, as in the interpreter
/// proper.
#[derive(Debug)]
pub(crate) struct CompileCaches {
    pub instrs: FieldIc,
    pub op: FieldIc,
    pub val: FieldIc,
    pub idx: FieldIc,
    pub to: FieldIc,
    pub then_blk: FieldIc,
    pub else_blk: FieldIc,
    pub num_args: FieldIc,
    pub ret_to: FieldIc,
    pub throw_to: FieldIc,
    pub tag: FieldIc,
}

impl CompileCaches {
    pub fn new() -> CompileCaches {
        CompileCaches {
            instrs: FieldIc::new("instrs"),
            op: FieldIc::new("op"),
            val: FieldIc::new("val"),
            idx: FieldIc::new("idx"),
            to: FieldIc::new("to"),
            then_blk: FieldIc::new("then"),
            else_blk: FieldIc::new("else"),
            num_args: FieldIc::new("num_args"),
            ret_to: FieldIc::new("ret_to"),
            throw_to: FieldIc::new("throw_to"),
            tag: FieldIc::new("tag"),
        }
    }
}

impl Interp {
    /// Compile an uncompiled block version into the code arena.
    /// Returns the version's start offset.
    pub(crate) fn compile(&mut self, id: VersionId) -> VmResult<u32> {
        debug_assert!(!self.blocks.version(id).is_compiled());

        let fun = self.blocks.version(id).fun;
        let block = self.blocks.version(id).block;

        let instrs = self.caches.instrs.get_arr(&self.heap, block)?;
        let count = self.heap.arr(instrs).len();
        if count == 0 {
            return Err(VmError::EmptyBlock);
        }

        let start = self.arena.pos() as u32;
        self.blocks.version_mut(id).start = Some(start);

        for i in 0..count {
            let elem = self.heap.arr(instrs).get(i).unwrap_or(Value::UNDEF);
            let instr = elem
                .as_object()
                .ok_or_else(|| VmError::type_mismatch("object", elem.tag().name()))?;

            let op_h = self.caches.op.get_str(&self.heap, instr)?;
            let op = self
                .heap
                .str(op_h)
                .as_utf8()
                .ok_or_else(|| VmError::type_mismatch("string", "bytes"))?;

            // Address of the encoded instruction about to be emitted.
            let at = self.arena.pos() as u32;

            match op {
                // =============================================================
                // Stack manipulation
                // =============================================================
                "push" => {
                    let val = self.caches.val.get(&self.heap, instr)?;
                    self.arena.write_op(Opcode::Push)?;
                    self.arena.write_value(val)?;
                }
                "pop" => self.arena.write_op(Opcode::Pop)?,
                "dup" => {
                    let idx = self.caches.idx.get_i32(&self.heap, instr)? as u16;
                    self.arena.write_op(Opcode::Dup)?;
                    self.arena.write_u16(idx)?;
                }
                "swap" => self.arena.write_op(Opcode::Swap)?,
                "get_local" => {
                    let idx = self.caches.idx.get_i32(&self.heap, instr)? as u16;
                    self.arena.write_op(Opcode::GetLocal)?;
                    self.arena.write_u16(idx)?;
                }
                "set_local" => {
                    let idx = self.caches.idx.get_i32(&self.heap, instr)? as u16;
                    self.arena.write_op(Opcode::SetLocal)?;
                    self.arena.write_u16(idx)?;
                }

                // =============================================================
                // Integer operations
                // =============================================================
                "add_i32" => self.arena.write_op(Opcode::AddI32)?,
                "sub_i32" => self.arena.write_op(Opcode::SubI32)?,
                "mul_i32" => self.arena.write_op(Opcode::MulI32)?,
                "lt_i32" => self.arena.write_op(Opcode::LtI32)?,
                "le_i32" => self.arena.write_op(Opcode::LeI32)?,
                "gt_i32" => self.arena.write_op(Opcode::GtI32)?,
                "ge_i32" => self.arena.write_op(Opcode::GeI32)?,
                "eq_i32" => self.arena.write_op(Opcode::EqI32)?,

                // =============================================================
                // Floating-point operations
                // =============================================================
                "add_f32" => self.arena.write_op(Opcode::AddF32)?,
                "sub_f32" => self.arena.write_op(Opcode::SubF32)?,
                "mul_f32" => self.arena.write_op(Opcode::MulF32)?,
                "div_f32" => self.arena.write_op(Opcode::DivF32)?,
                "lt_f32" => self.arena.write_op(Opcode::LtF32)?,
                "le_f32" => self.arena.write_op(Opcode::LeF32)?,
                "gt_f32" => self.arena.write_op(Opcode::GtF32)?,
                "ge_f32" => self.arena.write_op(Opcode::GeF32)?,
                "eq_f32" => self.arena.write_op(Opcode::EqF32)?,
                "sin_f32" => self.arena.write_op(Opcode::SinF32)?,
                "cos_f32" => self.arena.write_op(Opcode::CosF32)?,
                "sqrt_f32" => self.arena.write_op(Opcode::SqrtF32)?,

                // =============================================================
                // Conversions
                // =============================================================
                "i32_to_f32" => self.arena.write_op(Opcode::I32ToF32)?,
                "f32_to_i32" => self.arena.write_op(Opcode::F32ToI32)?,
                "f32_to_str" => self.arena.write_op(Opcode::F32ToStr)?,
                "str_to_f32" => self.arena.write_op(Opcode::StrToF32)?,

                // =============================================================
                // Miscellaneous
                // =============================================================
                "eq_bool" => self.arena.write_op(Opcode::EqBool)?,
                "has_tag" => {
                    let tag_h = self.caches.tag.get_str(&self.heap, instr)?;
                    let tag_str = self.heap.str(tag_h).to_text();
                    let tag = Tag::from_name(&tag_str)
                        .ok_or_else(|| VmError::unknown_tag(tag_str))?;
                    self.arena.write_op(Opcode::HasTag)?;
                    self.arena.write_u8(tag as u8)?;
                }

                // =============================================================
                // String operations
                // =============================================================
                "str_len" => self.arena.write_op(Opcode::StrLen)?,
                "get_char" => self.arena.write_op(Opcode::GetChar)?,
                "get_char_code" => self.arena.write_op(Opcode::GetCharCode)?,
                "str_cat" => self.arena.write_op(Opcode::StrCat)?,
                "eq_str" => self.arena.write_op(Opcode::EqStr)?,

                // =============================================================
                // Object operations
                // =============================================================
                "new_object" => self.arena.write_op(Opcode::NewObject)?,
                "has_field" => self.arena.write_op(Opcode::HasField)?,
                "set_field" => self.arena.write_op(Opcode::SetField)?,
                "get_field" => self.arena.write_op(Opcode::GetField)?,
                "eq_obj" => self.arena.write_op(Opcode::EqObj)?,

                // =============================================================
                // Array operations
                // =============================================================
                "new_array" => self.arena.write_op(Opcode::NewArray)?,
                "array_len" => self.arena.write_op(Opcode::ArrayLen)?,
                "array_push" => self.arena.write_op(Opcode::ArrayPush)?,
                "set_elem" => self.arena.write_op(Opcode::SetElem)?,
                "get_elem" => self.arena.write_op(Opcode::GetElem)?,

                // =============================================================
                // Branches
                // =============================================================
                "jump" => {
                    let dst_bb = self.caches.to.get_obj(&self.heap, instr)?;
                    let dst_ver = self.blocks.get_version(fun, dst_bb);
                    self.arena.write_op(Opcode::JumpStub)?;
                    self.arena.write_u32(dst_ver.0)?;
                }
                "if_true" => {
                    let then_bb = self.caches.then_blk.get_obj(&self.heap, instr)?;
                    let else_bb = self.caches.else_blk.get_obj(&self.heap, instr)?;
                    let then_ver = self.blocks.get_version(fun, then_bb);
                    let else_ver = self.blocks.get_version(fun, else_bb);
                    self.arena.write_op(Opcode::IfTrue)?;
                    self.arena.write_u32(then_ver.0 | STUB_BIT)?;
                    self.arena.write_u32(else_ver.0 | STUB_BIT)?;
                }
                "call" => {
                    // The call site address is needed at run time to
                    // recover the source position and caller identity.
                    self.blocks.register_instr(at, id);

                    let num_args = self.caches.num_args.get_i32(&self.heap, instr)? as u16;
                    let ret_bb = self.caches.ret_to.get_obj(&self.heap, instr)?;
                    let ret_ver = self.blocks.get_version(fun, ret_bb);

                    let mut entry = RetEntry::default();
                    if self.heap.obj(instr).has("throw_to") {
                        let throw_bb = self.caches.throw_to.get_obj(&self.heap, instr)?;
                        entry.exc_ver = Some(self.blocks.get_version(fun, throw_bb));
                    }
                    self.blocks.register_ret(ret_ver, entry);

                    self.arena.write_op(Opcode::Call)?;
                    self.arena.write_u16(num_args)?;
                    self.arena.write_u32(ret_ver.0)?;
                }
                "ret" => self.arena.write_op(Opcode::Ret)?,
                "throw" => {
                    // Needed to retrieve the identity of the current
                    // function when unwinding.
                    self.blocks.register_instr(at, id);
                    self.arena.write_op(Opcode::Throw)?;
                }

                "import" => self.arena.write_op(Opcode::Import)?,
                "abort" => {
                    // Needed to retrieve the source position.
                    self.blocks.register_instr(at, id);
                    self.arena.write_op(Opcode::Abort)?;
                }

                other => return Err(VmError::unknown_op(other)),
            }
        }

        let end = self.arena.pos() as u32;
        self.blocks.version_mut(id).end = Some(end);

        debug!(
            "compiled block version {} ({} instrs, {} bytes at {})",
            id.0,
            count,
            end - start,
            start
        );

        Ok(start)
    }
}
