//! The interpreter: dispatch loop, operand stack, and call frames.
//!
//! A single [`Interp`] owns every execution singleton: the heap, the code
//! arena, the block-version registry, the operand stack, the host-function
//! table and the one-character string cache. Execution is single-threaded
//! and runs to completion; embedders wanting one VM per thread create one
//! `Interp` per thread.
//!
//! # Stack discipline
//!
//! The operand stack is a fixed array of [`STACK_SIZE`] values growing
//! toward lower indices: `sp` is the index of the top slot and decreases
//! on push. `fp` indexes the first local of the active frame; local `k`
//! lives at `stack[fp - k]`. A call pops the callee, repoints `fp` at the
//! first argument, reserves the remaining locals, and pushes three saved
//! slots: the caller's stack index, the caller's frame index, and the
//! return-version id. `RET` restores all three.
//!
//! # Lazy compilation
//!
//! Blocks compile on first reach. The first traversal of a `JUMP_STUB`
//! rewrites it in place to a `JUMP` aimed at the compiled target; each
//! `IF_TRUE` arm patches its own destination slot the first time it is
//! taken. Patching is monotonic and happens at most once per slot.

use crate::arena::CodeArena;
use crate::compiler::{CompileCaches, STUB_BIT};
use crate::host::{HostFn, HostFnKind};
use crate::ic::FieldIc;
use crate::import::PackageLoader;
use crate::opcode::Opcode;
use crate::version::{VersionId, VersionTable};
use log::{debug, trace};
use opal_core::{HostFnHandle, ObjHandle, Tag, Value, VmError, VmResult};
use opal_runtime::{is_valid_ident, Heap};

/// Operand stack size in slots.
pub const STACK_SIZE: usize = 1 << 16;

/// Return-version sentinel marking the outer `call_fun` boundary.
const NO_RET: usize = usize::MAX;

/// Function-object field caches used at every call site.
#[derive(Debug)]
struct FunCaches {
    entry: FieldIc,
    num_locals: FieldIc,
    num_params: FieldIc,
}

/// The virtual machine.
pub struct Interp {
    pub(crate) heap: Heap,
    pub(crate) arena: CodeArena,
    pub(crate) blocks: VersionTable,
    pub(crate) caches: CompileCaches,
    fun_caches: FunCaches,
    /// Cache for the `instrs` read performed by source-position recovery.
    pos_instrs: FieldIc,
    host_fns: Vec<HostFn>,
    loader: Option<Box<dyn PackageLoader>>,
    stack: Box<[Value]>,
    /// Index of the stack top; decreases on push.
    sp: usize,
    /// Index of the active frame's first local.
    fp: usize,
    /// Instruction pointer: byte offset into the arena.
    pc: usize,
    /// Memoized one-character strings, keyed by byte value.
    char_strs: [Option<Value>; 256],
}

impl Interp {
    /// Create a fresh VM with all singletons initialized.
    pub fn new() -> Interp {
        Interp {
            heap: Heap::new(),
            arena: CodeArena::new(),
            blocks: VersionTable::new(),
            caches: CompileCaches::new(),
            fun_caches: FunCaches {
                entry: FieldIc::new("entry"),
                num_locals: FieldIc::new("num_locals"),
                num_params: FieldIc::new("num_params"),
            },
            pos_instrs: FieldIc::new("instrs"),
            host_fns: Vec::new(),
            loader: None,
            stack: vec![Value::UNDEF; STACK_SIZE].into_boxed_slice(),
            sp: STACK_SIZE,
            fp: 0,
            pc: 0,
            char_strs: [None; 256],
        }
    }

    /// The VM heap, for image construction and host functions.
    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Install the package loader backing the `import` instruction.
    pub fn set_loader(&mut self, loader: Box<dyn PackageLoader>) {
        self.loader = Some(loader);
    }

    /// Register a host function and return the callable value user code
    /// sees.
    pub fn register_host_fn(&mut self, name: &'static str, kind: HostFnKind) -> Value {
        let h = HostFnHandle(self.host_fns.len() as u32);
        self.host_fns.push(HostFn::new(name, kind));
        Value::HostFn(h)
    }

    /// Number of live operand-stack slots.
    #[inline]
    pub fn stack_size(&self) -> usize {
        STACK_SIZE - self.sp
    }

    // =========================================================================
    // Operand stack
    // =========================================================================

    #[inline]
    fn push(&mut self, val: Value) -> VmResult<()> {
        if self.sp == 0 {
            return Err(VmError::StackOverflow);
        }
        self.sp -= 1;
        self.stack[self.sp] = val;
        Ok(())
    }

    #[inline]
    fn push_bool(&mut self, b: bool) -> VmResult<()> {
        self.push(if b { Value::TRUE } else { Value::FALSE })
    }

    #[inline]
    fn pop(&mut self) -> Value {
        debug_assert!(self.sp < STACK_SIZE);
        let val = self.stack[self.sp];
        self.sp += 1;
        val
    }

    #[inline]
    fn pop_bool(&mut self) -> VmResult<bool> {
        let val = self.pop();
        val.as_bool()
            .ok_or_else(|| VmError::type_mismatch("bool", val.tag().name()))
    }

    #[inline]
    fn pop_i32(&mut self) -> VmResult<i32> {
        let val = self.pop();
        val.as_i32()
            .ok_or_else(|| VmError::type_mismatch("int32", val.tag().name()))
    }

    #[inline]
    fn pop_f32(&mut self) -> VmResult<f32> {
        let val = self.pop();
        val.as_f32()
            .ok_or_else(|| VmError::type_mismatch("float32", val.tag().name()))
    }

    #[inline]
    fn pop_str(&mut self) -> VmResult<opal_core::StrHandle> {
        let val = self.pop();
        val.as_str_handle()
            .ok_or_else(|| VmError::type_mismatch("string", val.tag().name()))
    }

    #[inline]
    fn pop_obj(&mut self) -> VmResult<ObjHandle> {
        let val = self.pop();
        val.as_object()
            .ok_or_else(|| VmError::type_mismatch("object", val.tag().name()))
    }

    #[inline]
    fn pop_arr(&mut self) -> VmResult<opal_core::ArrHandle> {
        let val = self.pop();
        val.as_array()
            .ok_or_else(|| VmError::type_mismatch("array", val.tag().name()))
    }

    /// Pop a saved frame slot. These are only ever written by the engine,
    /// so a wrong variant means the frame layout was corrupted.
    #[inline]
    fn pop_raw(&mut self) -> usize {
        match self.pop() {
            Value::Raw(p) => p,
            other => unreachable!("corrupt frame slot: {:?}", other),
        }
    }

    // =========================================================================
    // Compilation and source positions
    // =========================================================================

    /// Compile `id` if needed; returns its start offset.
    pub(crate) fn ensure_compiled(&mut self, id: VersionId) -> VmResult<u32> {
        match self.blocks.version(id).start {
            Some(start) => Ok(start),
            None => self.compile(id),
        }
    }

    /// Recover the source position annotation governing the instruction
    /// at `addr`, or `UNDEF` when the address is unregistered or the
    /// owning block carries no annotation.
    pub fn source_pos_for(&mut self, addr: usize) -> VmResult<Value> {
        let Some(owner) = self.blocks.owner_of(addr as u32) else {
            debug!("no instruction to block mapping at {}", addr);
            return Ok(Value::UNDEF);
        };
        let block = self.blocks.version(owner).block;
        let instrs = self.pos_instrs.get_arr(&self.heap, block)?;
        let count = self.heap.arr(instrs).len();

        // The registered sites terminate their block, so the last
        // annotation in block order is the one in effect.
        for i in (0..count).rev() {
            let Some(obj) = self.heap.arr(instrs).get(i).and_then(Value::as_object) else {
                continue;
            };
            if let Some(pos) = self.heap.get_field(obj, "src_pos") {
                return Ok(pos);
            }
        }
        Ok(Value::UNDEF)
    }

    /// Render a position object as `<file>@<line>:<col>`.
    fn pos_to_string(&self, pos: Value) -> Option<String> {
        let obj = pos.as_object()?;
        let file = self.heap.get_field(obj, "file")?.as_str_handle()?;
        let line = self.heap.get_field(obj, "line")?.as_i32()?;
        let col = self.heap.get_field(obj, "col")?.as_i32()?;
        Some(format!("{}@{}:{}", self.heap.str(file).to_text(), line, col))
    }

    fn src_pos_string(&mut self, addr: usize) -> Option<String> {
        let pos = self.source_pos_for(addr).ok()?;
        self.pos_to_string(pos)
    }

    fn check_arg_count(
        &mut self,
        call_addr: usize,
        num_params: usize,
        num_args: usize,
    ) -> VmResult<()> {
        if num_args != num_params {
            let src_pos = self.src_pos_string(call_addr);
            return Err(VmError::arg_count(num_params, num_args, src_pos));
        }
        Ok(())
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Enter a user function from a `CALL` site.
    fn fun_call(
        &mut self,
        call_addr: usize,
        fun: ObjHandle,
        num_args: usize,
        ret_ver: VersionId,
    ) -> VmResult<()> {
        let entry_bb = self.fun_caches.entry.get_obj(&self.heap, fun)?;
        let entry_ver = self.blocks.get_version(fun, entry_bb);
        let entry_start = self.ensure_compiled(entry_ver)?;

        let num_locals = self.fun_caches.num_locals.get_i32(&self.heap, fun)? as usize;
        let num_params = self.fun_caches.num_params.get_i32(&self.heap, fun)? as usize;

        self.check_arg_count(call_addr, num_params, num_args)?;
        if num_locals < num_params {
            return Err(VmError::bad_function(
                "not enough locals to store function parameters",
            ));
        }

        // Slots still needed below the arguments: the callee's extra
        // locals plus the three saved frame slots.
        let extra = num_locals - num_args;
        if self.sp < extra + 3 {
            return Err(VmError::StackOverflow);
        }

        // The stack pointer to restore after the call (arguments are
        // consumed by the callee).
        let prev_sp = self.sp + num_args;
        let prev_fp = self.fp;

        // Point the frame at the first argument, then reserve the
        // remaining locals.
        self.fp = self.sp + num_args - 1;
        self.sp -= extra;

        self.push(Value::Raw(prev_sp))?;
        self.push(Value::Raw(prev_fp))?;
        self.push(Value::Raw(ret_ver.0 as usize))?;

        self.pc = entry_start as usize;
        Ok(())
    }

    /// Invoke a host function from a `CALL` site.
    fn host_call(
        &mut self,
        call_addr: usize,
        handle: HostFnHandle,
        num_args: usize,
        ret_ver: VersionId,
    ) -> VmResult<()> {
        if num_args > 3 {
            return Err(VmError::ArityUnsupported { num_args });
        }
        let host = self.host_fns[handle.0 as usize];
        let arity = host.kind.arity();
        if num_args != arity {
            let src_pos = self.src_pos_string(call_addr);
            return Err(VmError::arg_count(arity, num_args, src_pos));
        }

        // Argument i sits at stack[sp + num_args - 1 - i]; the first
        // argument pushed is the deepest.
        let ret_val = match host.kind {
            HostFnKind::Nullary(f) => f(self)?,
            HostFnKind::Unary(f) => {
                let a0 = self.stack[self.sp];
                f(self, a0)?
            }
            HostFnKind::Binary(f) => {
                let a0 = self.stack[self.sp + 1];
                let a1 = self.stack[self.sp];
                f(self, a0, a1)?
            }
            HostFnKind::Ternary(f) => {
                let a0 = self.stack[self.sp + 2];
                let a1 = self.stack[self.sp + 1];
                let a2 = self.stack[self.sp];
                f(self, a0, a1, a2)?
            }
        };

        // Pop the arguments, push the result, continue at the return
        // continuation.
        self.sp += num_args;
        self.push(ret_val)?;

        let start = self.ensure_compiled(ret_ver)?;
        self.pc = start as usize;
        Ok(())
    }

    // =========================================================================
    // Embedding API
    // =========================================================================

    /// Drive execution of a function. May be re-entered recursively from
    /// host functions.
    pub fn call_fun(&mut self, fun: Value, args: &[Value]) -> VmResult<Value> {
        let saved_sp = self.sp;
        let saved_fp = self.fp;
        let saved_pc = self.pc;
        let result = self.enter_function(fun, args);
        if result.is_err() {
            // Leave the machine reusable for the embedder; the failed
            // activation's slots are dead.
            self.sp = saved_sp;
            self.fp = saved_fp;
            self.pc = saved_pc;
        }
        result
    }

    fn enter_function(&mut self, fun: Value, args: &[Value]) -> VmResult<Value> {
        let fun_obj = fun
            .as_object()
            .ok_or(VmError::BadCallee { found: fun.tag().name() })?;

        let num_params = self.fun_caches.num_params.get_i32(&self.heap, fun_obj)? as usize;
        let num_locals = self.fun_caches.num_locals.get_i32(&self.heap, fun_obj)? as usize;
        if args.len() > num_params {
            return Err(VmError::arg_count(num_params, args.len(), None));
        }
        if num_locals < num_params {
            return Err(VmError::bad_function(
                "not enough locals to store function parameters",
            ));
        }

        let pre_call_size = self.stack_size();

        // Save the instruction pointer of any enclosing activation.
        self.push(Value::Raw(self.pc))?;

        let prev_sp = self.sp;
        let prev_fp = self.fp;

        if self.sp < num_locals + 3 {
            return Err(VmError::StackOverflow);
        }
        self.fp = self.sp - 1;
        self.sp -= num_locals;

        self.push(Value::Raw(prev_sp))?;
        self.push(Value::Raw(prev_fp))?;
        self.push(Value::Raw(NO_RET))?;

        // Copy the arguments into the locals.
        for (i, arg) in args.iter().enumerate() {
            self.stack[self.fp - i] = *arg;
        }

        let entry_bb = self.fun_caches.entry.get_obj(&self.heap, fun_obj)?;
        let entry_ver = self.blocks.get_version(fun_obj, entry_bb);
        let entry_start = self.ensure_compiled(entry_ver)?;

        self.pc = entry_start as usize;
        let ret_val = self.exec()?;

        // Restore the enclosing activation's instruction pointer.
        self.pc = self.pop_raw();

        let post_call_size = self.stack_size();
        if post_call_size != pre_call_size {
            return Err(VmError::StackLeak {
                before: pre_call_size,
                after: post_call_size,
            });
        }
        Ok(ret_val)
    }

    /// Look up `name` on a package object and call it.
    pub fn call_export(&mut self, pkg: Value, name: &str, args: &[Value]) -> VmResult<Value> {
        let pkg_obj = pkg
            .as_object()
            .ok_or_else(|| VmError::type_mismatch("object", pkg.tag().name()))?;
        let Some(fn_val) = self.heap.get_field(pkg_obj, name) else {
            return Err(VmError::unknown_export(name));
        };
        if !fn_val.is_object() {
            return Err(VmError::not_a_function(name));
        }
        self.call_fun(fn_val, args)
    }

    // =========================================================================
    // Dispatch loop
    // =========================================================================

    /// Run until the activation entered through `call_fun` returns.
    fn exec(&mut self) -> VmResult<Value> {
        debug_assert!(self.pc < self.arena.len());

        loop {
            let op_addr = self.pc;
            let raw_op = self.arena.read_u16(&mut self.pc);
            let op = Opcode::from_u16(raw_op)
                .unwrap_or_else(|| unreachable!("corrupt dispatch stream at {}", op_addr));

            match op {
                // =============================================================
                // Stack manipulation
                // =============================================================
                Opcode::Push => {
                    let tag = self.arena.read_u8(&mut self.pc);
                    let bits = self.arena.read_u64(&mut self.pc);
                    let val = Value::from_parts(tag, bits)
                        .unwrap_or_else(|| unreachable!("corrupt push operand at {}", op_addr));
                    self.push(val)?;
                }

                Opcode::Pop => {
                    self.pop();
                }

                Opcode::Dup => {
                    let idx = self.arena.read_u16(&mut self.pc) as usize;
                    debug_assert!(self.sp + idx < STACK_SIZE);
                    let val = self.stack[self.sp + idx];
                    self.push(val)?;
                }

                Opcode::Swap => {
                    let v0 = self.pop();
                    let v1 = self.pop();
                    self.push(v0)?;
                    self.push(v1)?;
                }

                Opcode::SetLocal => {
                    let idx = self.arena.read_u16(&mut self.pc) as usize;
                    let val = self.pop();
                    self.stack[self.fp - idx] = val;
                }

                Opcode::GetLocal => {
                    let idx = self.arena.read_u16(&mut self.pc) as usize;
                    let val = self.stack[self.fp - idx];
                    self.push(val)?;
                }

                // =============================================================
                // Integer operations
                // =============================================================
                Opcode::AddI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push(Value::int32(arg0.wrapping_add(arg1)))?;
                }

                Opcode::SubI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push(Value::int32(arg0.wrapping_sub(arg1)))?;
                }

                Opcode::MulI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push(Value::int32(arg0.wrapping_mul(arg1)))?;
                }

                Opcode::LtI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push_bool(arg0 < arg1)?;
                }

                Opcode::LeI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push_bool(arg0 <= arg1)?;
                }

                Opcode::GtI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push_bool(arg0 > arg1)?;
                }

                Opcode::GeI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push_bool(arg0 >= arg1)?;
                }

                Opcode::EqI32 => {
                    let arg1 = self.pop_i32()?;
                    let arg0 = self.pop_i32()?;
                    self.push_bool(arg0 == arg1)?;
                }

                // =============================================================
                // Floating-point operations
                // =============================================================
                Opcode::AddF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push(Value::float32(arg0 + arg1))?;
                }

                Opcode::SubF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push(Value::float32(arg0 - arg1))?;
                }

                Opcode::MulF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push(Value::float32(arg0 * arg1))?;
                }

                Opcode::DivF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push(Value::float32(arg0 / arg1))?;
                }

                Opcode::LtF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push_bool(arg0 < arg1)?;
                }

                Opcode::LeF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push_bool(arg0 <= arg1)?;
                }

                Opcode::GtF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push_bool(arg0 > arg1)?;
                }

                Opcode::GeF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push_bool(arg0 >= arg1)?;
                }

                Opcode::EqF32 => {
                    let arg1 = self.pop_f32()?;
                    let arg0 = self.pop_f32()?;
                    self.push_bool(arg0 == arg1)?;
                }

                Opcode::SinF32 => {
                    let arg = self.pop_f32()?;
                    self.push(Value::float32(arg.sin()))?;
                }

                Opcode::CosF32 => {
                    let arg = self.pop_f32()?;
                    self.push(Value::float32(arg.cos()))?;
                }

                Opcode::SqrtF32 => {
                    let arg = self.pop_f32()?;
                    self.push(Value::float32(arg.sqrt()))?;
                }

                // =============================================================
                // Conversions
                // =============================================================
                Opcode::I32ToF32 => {
                    let arg = self.pop_i32()?;
                    self.push(Value::float32(arg as f32))?;
                }

                Opcode::F32ToI32 => {
                    // Truncates toward zero, saturating at the i32 range;
                    // NaN converts to 0.
                    let arg = self.pop_f32()?;
                    self.push(Value::int32(arg as i32))?;
                }

                Opcode::F32ToStr => {
                    let arg = self.pop_f32()?;
                    let text = format!("{:.6}", arg);
                    let val = self.heap.str_value(&text);
                    self.push(val)?;
                }

                Opcode::StrToF32 => {
                    let h = self.pop_str()?;
                    let parsed = self
                        .heap
                        .str(h)
                        .as_utf8()
                        .and_then(|s| s.parse::<f32>().ok());
                    match parsed {
                        Some(f) => self.push(Value::float32(f))?,
                        None => {
                            return Err(VmError::parse_error(self.heap.str(h).to_text()));
                        }
                    }
                }

                // =============================================================
                // Miscellaneous
                // =============================================================
                Opcode::EqBool => {
                    let arg1 = self.pop_bool()?;
                    let arg0 = self.pop_bool()?;
                    self.push_bool(arg0 == arg1)?;
                }

                Opcode::HasTag => {
                    let tag_byte = self.arena.read_u8(&mut self.pc);
                    let test_tag = Tag::from_u8(tag_byte)
                        .unwrap_or_else(|| unreachable!("corrupt tag operand at {}", op_addr));
                    let val = self.pop();
                    self.push_bool(val.tag() == test_tag)?;
                }

                // =============================================================
                // String operations
                // =============================================================
                Opcode::StrLen => {
                    let h = self.pop_str()?;
                    self.push(Value::int32(self.heap.str(h).len() as i32))?;
                }

                Opcode::GetChar => {
                    let idx = self.pop_i32()? as usize;
                    let h = self.pop_str()?;
                    let len = self.heap.str(h).len();
                    let Some(byte) = self.heap.str(h).byte(idx) else {
                        return Err(VmError::out_of_bounds("get_char", idx, len));
                    };
                    let cached = match self.char_strs[byte as usize] {
                        Some(v) => v,
                        None => {
                            let v = Value::Str(self.heap.alloc_bytes(vec![byte]));
                            self.char_strs[byte as usize] = Some(v);
                            v
                        }
                    };
                    self.push(cached)?;
                }

                Opcode::GetCharCode => {
                    let idx = self.pop_i32()? as usize;
                    let h = self.pop_str()?;
                    let len = self.heap.str(h).len();
                    let Some(byte) = self.heap.str(h).byte(idx) else {
                        return Err(VmError::out_of_bounds("get_char_code", idx, len));
                    };
                    self.push(Value::int32(byte as i32))?;
                }

                Opcode::StrCat => {
                    let right = self.pop_str()?;
                    let left = self.pop_str()?;
                    let result = self.heap.concat(left, right);
                    self.push(Value::Str(result))?;
                }

                Opcode::EqStr => {
                    let arg1 = self.pop_str()?;
                    let arg0 = self.pop_str()?;
                    self.push_bool(self.heap.str_eq(arg0, arg1))?;
                }

                // =============================================================
                // Object operations
                // =============================================================
                Opcode::NewObject => {
                    let capacity = self.pop_i32()?;
                    let obj = self.heap.new_object(capacity.max(0) as usize);
                    self.push(Value::Object(obj))?;
                }

                Opcode::HasField => {
                    let name_h = self.pop_str()?;
                    let obj = self.pop_obj()?;
                    let has = match self.heap.str(name_h).as_utf8() {
                        Some(name) => self.heap.has_field(obj, name),
                        None => false,
                    };
                    self.push_bool(has)?;
                }

                Opcode::SetField => {
                    let val = self.pop();
                    let name_h = self.pop_str()?;
                    let obj = self.pop_obj()?;
                    let name = {
                        let s = self.heap.str(name_h);
                        if !is_valid_ident(s.as_bytes()) {
                            return Err(VmError::bad_ident(s.to_text()));
                        }
                        s.to_text()
                    };
                    self.heap.set_field(obj, &name, val);
                }

                Opcode::GetField => {
                    let name_h = self.pop_str()?;
                    let obj = self.pop_obj()?;
                    let name = self.heap.str(name_h).to_text();
                    match self.heap.get_field(obj, &name) {
                        Some(val) => self.push(val)?,
                        None => return Err(VmError::missing_field(name)),
                    }
                }

                Opcode::EqObj => {
                    let arg1 = self.pop();
                    let arg0 = self.pop();
                    self.push_bool(arg0 == arg1)?;
                }

                // =============================================================
                // Array operations
                // =============================================================
                Opcode::NewArray => {
                    let len = self.pop_i32()?;
                    let arr = self.heap.new_array(len.max(0) as usize);
                    self.push(Value::Array(arr))?;
                }

                Opcode::ArrayLen => {
                    let arr = self.pop_arr()?;
                    self.push(Value::int32(self.heap.arr(arr).len() as i32))?;
                }

                Opcode::ArrayPush => {
                    let val = self.pop();
                    let arr = self.pop_arr()?;
                    self.heap.arr_mut(arr).push(val);
                }

                Opcode::SetElem => {
                    let val = self.pop();
                    let idx = self.pop_i32()? as usize;
                    let arr = self.pop_arr()?;
                    let len = self.heap.arr(arr).len();
                    if !self.heap.arr_mut(arr).set(idx, val) {
                        return Err(VmError::out_of_bounds("set_elem", idx, len));
                    }
                }

                Opcode::GetElem => {
                    let idx = self.pop_i32()? as usize;
                    let arr = self.pop_arr()?;
                    let len = self.heap.arr(arr).len();
                    match self.heap.arr(arr).get(idx) {
                        Some(val) => self.push(val)?,
                        None => return Err(VmError::out_of_bounds("get_elem", idx, len)),
                    }
                }

                // =============================================================
                // Branches
                // =============================================================
                Opcode::JumpStub => {
                    let slot_addr = self.pc;
                    let dst_ver = VersionId(self.arena.read_u32(&mut self.pc));
                    let start = self.ensure_compiled(dst_ver)?;

                    // Patch the jump in place; later traversals dispatch
                    // straight to the target.
                    self.arena.write_u16_at(op_addr, Opcode::Jump as u16);
                    self.arena.write_u32_at(slot_addr, start);
                    trace!("patched jump at {} -> {}", op_addr, start);

                    self.pc = start as usize;
                }

                Opcode::Jump => {
                    let dst = self.arena.read_u32(&mut self.pc);
                    self.pc = dst as usize;
                }

                Opcode::IfTrue => {
                    let then_addr = self.pc;
                    let then_slot = self.arena.read_u32(&mut self.pc);
                    let else_addr = self.pc;
                    let else_slot = self.arena.read_u32(&mut self.pc);

                    let cond = self.pop();
                    let (slot, slot_addr) = if cond == Value::TRUE {
                        (then_slot, then_addr)
                    } else {
                        (else_slot, else_addr)
                    };

                    let target = if slot & STUB_BIT != 0 {
                        let start = self.ensure_compiled(VersionId(slot & !STUB_BIT))?;
                        self.arena.write_u32_at(slot_addr, start);
                        trace!("patched branch arm at {} -> {}", slot_addr, start);
                        start
                    } else {
                        slot
                    };

                    self.pc = target as usize;
                }

                Opcode::Call => {
                    let num_args = self.arena.read_u16(&mut self.pc) as usize;
                    let ret_ver = VersionId(self.arena.read_u32(&mut self.pc));

                    let callee = self.pop();
                    if self.stack_size() < num_args {
                        return Err(VmError::StackUnderflow);
                    }

                    match callee {
                        Value::Object(f) => self.fun_call(op_addr, f, num_args, ret_ver)?,
                        Value::HostFn(h) => self.host_call(op_addr, h, num_args, ret_ver)?,
                        other => {
                            return Err(VmError::BadCallee {
                                found: other.tag().name(),
                            })
                        }
                    }
                }

                Opcode::Ret => {
                    let ret_val = self.pop();
                    let ret_ver = self.pop_raw();
                    let prev_fp = self.pop_raw();
                    let prev_sp = self.pop_raw();

                    self.fp = prev_fp;
                    self.sp = prev_sp;

                    // The outer boundary: yield the value to call_fun.
                    if ret_ver == NO_RET {
                        return Ok(ret_val);
                    }

                    self.push(ret_val)?;
                    let start = self.ensure_compiled(VersionId(ret_ver as u32))?;
                    self.pc = start as usize;
                }

                Opcode::Throw => {
                    // Handler dispatch is not implemented; a throw ends
                    // the run.
                    let _exc = self.pop();
                    let src_pos = self.src_pos_string(op_addr);
                    return Err(VmError::UnhandledThrow { src_pos });
                }

                Opcode::Import => {
                    let name_h = self.pop_str()?;
                    let name = self.heap.str(name_h).to_text();
                    let mut loader = self
                        .loader
                        .take()
                        .ok_or_else(|| VmError::unknown_package(name.clone()))?;
                    let result = loader.load(&name, &mut self.heap);
                    self.loader = Some(loader);
                    let pkg = result?;
                    debug!("imported package \"{}\"", name);
                    self.push(pkg)?;
                }

                Opcode::Abort => {
                    let msg_h = self.pop_str()?;
                    let msg = self.heap.str(msg_h).to_text();
                    if let Some(pos) = self.src_pos_string(op_addr) {
                        print!("{} - ", pos);
                    }
                    if !msg.is_empty() {
                        println!("aborting execution due to error: {}", msg);
                    } else {
                        println!("aborting execution due to error");
                    }
                    std::process::exit(-1);
                }
            }
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}
